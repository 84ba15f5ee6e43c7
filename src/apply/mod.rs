use anyhow::{anyhow, Result};
use fs_err as fs;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use crate::tree::{FileTree, Upsert};
use crate::wire::Step;

/// The live preview environment. Mirroring is best-effort: the applier logs
/// failures and carries on.
pub trait Sandbox: Send + Sync {
    fn write_file(&self, path: &str, content: &str) -> Result<()>;
}

pub struct NullSandbox;

impl Sandbox for NullSandbox {
    fn write_file(&self, _path: &str, _content: &str) -> Result<()> {
        Ok(())
    }
}

/// Mirrors the tree into a directory on disk with atomic writes.
pub struct DirSandbox {
    root: PathBuf,
    dry_run: bool,
}

impl DirSandbox {
    pub fn new(root: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self { root: root.into(), dry_run }
    }
}

impl Sandbox for DirSandbox {
    fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let abs = crate::safety::resolve_within(&self.root, path)
            .ok_or_else(|| anyhow!("refusing to write outside sandbox root: {}", path))?;
        if self.dry_run {
            return Ok(());
        }
        let parent = abs.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;
        let tmp = NamedTempFile::new_in(parent)?;
        fs::write(tmp.path(), content)?;
        tmp.persist(&abs)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Created,
    Overwritten,
    Edited,
    /// `find` was not in the file; nothing changed.
    FindNotFound,
    /// Edit target does not exist; nothing changed.
    MissingFile,
    /// Path is invalid or collides with a node of the other kind.
    Conflict(String),
}

#[derive(Debug, Clone)]
pub struct FileResult {
    pub path: String,
    pub status: StepStatus,
    pub bytes_after: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplySummary {
    pub created: usize,
    pub overwritten: usize,
    pub edited: usize,
    pub skipped: usize,
    pub bytes_written: u64,
    pub mirror_failures: usize,
    pub details: Vec<FileResult>,
}

impl ApplySummary {
    pub fn changed(&self) -> usize {
        self.created + self.overwritten + self.edited
    }

    fn record(&mut self, path: &str, status: StepStatus, bytes_after: Option<u64>) {
        match status {
            StepStatus::Created => self.created += 1,
            StepStatus::Overwritten => self.overwritten += 1,
            StepStatus::Edited => self.edited += 1,
            _ => self.skipped += 1,
        }
        self.bytes_written += bytes_after.unwrap_or(0);
        self.details.push(FileResult { path: path.to_string(), status, bytes_after });
    }
}

fn apply_one(tree: &mut FileTree, step: &Step) -> (StepStatus, Option<u64>) {
    match step {
        Step::CreateFile { path, content } => match tree.upsert_file(path, content.clone()) {
            Ok(Upsert::Created) => (StepStatus::Created, Some(content.len() as u64)),
            Ok(Upsert::Overwritten) => (StepStatus::Overwritten, Some(content.len() as u64)),
            Err(e) => (StepStatus::Conflict(e.to_string()), None),
        },
        Step::EditFile { path, find, replace } => match tree.replace_first(path, find, replace) {
            Some(true) => (StepStatus::Edited, tree.file(path).map(|c| c.len() as u64)),
            Some(false) => (StepStatus::FindNotFound, None),
            None => (StepStatus::MissingFile, None),
        },
    }
}

/// Apply a batch of steps in order. The batch runs against a working copy that
/// replaces `tree` in one assignment, so callers never observe a half-applied
/// batch. Changed files are then mirrored into `sandbox`.
pub fn apply_steps(tree: &mut FileTree, steps: &[Step], sandbox: &dyn Sandbox) -> ApplySummary {
    let mut sum = ApplySummary::default();
    if steps.is_empty() {
        return sum;
    }

    let mut working = tree.clone();
    let mut touched: BTreeSet<String> = BTreeSet::new();
    for step in steps {
        let (status, bytes) = apply_one(&mut working, step);
        if matches!(status, StepStatus::Created | StepStatus::Overwritten | StepStatus::Edited) {
            touched.insert(step.path().to_string());
        } else {
            tracing::debug!(path = step.path(), ?status, "step made no change");
        }
        sum.record(step.path(), status, bytes);
    }
    *tree = working;

    for path in &touched {
        let Some(content) = tree.file(path) else { continue };
        if let Err(e) = sandbox.write_file(path, content) {
            sum.mirror_failures += 1;
            tracing::warn!(path = %path, error = %e, "sandbox mirror failed");
        }
    }
    sum
}
