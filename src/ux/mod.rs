use colored::Colorize;
use humansize::{format_size, DECIMAL};

use crate::apply::{ApplySummary, StepStatus};
use crate::tree::FileTree;
use crate::wire::Step;

const DIFF_CONTEXT: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Overwrite,
    Edit,
    /// Edit against a file the tree does not have, or a `find` that is absent.
    Stale,
}

#[derive(Debug, Clone)]
pub struct Preview {
    pub kind: ChangeKind,
    pub path: String,
    pub bytes_before: Option<u64>,
    pub bytes_after: Option<u64>,
    pub diff: Vec<String>,
}

fn unified(path: &str, before: &str, after: &str) -> Vec<String> {
    let a: Vec<&str> = before.lines().collect();
    let b: Vec<&str> = after.lines().collect();
    difflib::unified_diff(&a, &b, &format!("a/{path}"), &format!("b/{path}"), "", "", DIFF_CONTEXT)
        .into_iter()
        .map(|l| l.trim_end_matches('\n').to_string())
        .collect()
}

/// Describe what each step would do to `tree` without touching it.
pub fn preview(tree: &FileTree, steps: &[Step]) -> Vec<Preview> {
    steps
        .iter()
        .map(|step| match step {
            Step::CreateFile { path, content } => {
                let before = tree.file(path);
                Preview {
                    kind: if before.is_some() { ChangeKind::Overwrite } else { ChangeKind::Create },
                    path: path.clone(),
                    bytes_before: before.map(|b| b.len() as u64),
                    bytes_after: Some(content.len() as u64),
                    diff: unified(path, before.unwrap_or(""), content),
                }
            }
            Step::EditFile { path, find, replace } => match tree.file(path) {
                Some(before) if before.contains(find.as_str()) => {
                    let after = before.replacen(find.as_str(), replace, 1);
                    Preview {
                        kind: ChangeKind::Edit,
                        path: path.clone(),
                        bytes_before: Some(before.len() as u64),
                        bytes_after: Some(after.len() as u64),
                        diff: unified(path, before, &after),
                    }
                }
                before => Preview {
                    kind: ChangeKind::Stale,
                    path: path.clone(),
                    bytes_before: before.map(|b| b.len() as u64),
                    bytes_after: None,
                    diff: vec![],
                },
            },
        })
        .collect()
}

fn size(b: Option<u64>) -> String {
    b.map(|b| format_size(b, DECIMAL)).unwrap_or_else(|| "-".into())
}

pub fn colorize_preview(p: &Preview) -> String {
    let label = match p.kind {
        ChangeKind::Create => "[CREATE]".green().bold(),
        ChangeKind::Overwrite => "[OVERWRITE]".yellow().bold(),
        ChangeKind::Edit => "[EDIT]".cyan().bold(),
        ChangeKind::Stale => "[SKIP]".red().bold(),
    };
    let mut out = format!("{} {}  ({} -> {})", label, p.path, size(p.bytes_before), size(p.bytes_after));
    for line in &p.diff {
        out.push('\n');
        let colored_line = if line.starts_with("+++") || line.starts_with("---") {
            line.bold()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with("@@") {
            line.cyan()
        } else {
            line.normal()
        };
        out.push_str(&colored_line.to_string());
    }
    out
}

pub fn print_preview_dashboard(previews: &[Preview]) {
    let count = |k: ChangeKind| previews.iter().filter(|p| p.kind == k).count();
    println!("\n{}", "┏━━━━━━━━━━━━━━━━━━━━━━━━ Preview ━━━━━━━━━━━━━━━━━━━━━━━━┓".bold());
    println!(
        "  {}: {}   {}: {}   {}: {}   {}: {}",
        "Create".green().bold(),
        count(ChangeKind::Create),
        "Overwrite".yellow().bold(),
        count(ChangeKind::Overwrite),
        "Edit".cyan().bold(),
        count(ChangeKind::Edit),
        "Skip".red().bold(),
        count(ChangeKind::Stale)
    );
    println!("{}", "┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛".bold());
    for p in previews {
        println!("{}\n", colorize_preview(p));
    }
}

pub fn print_apply_dashboard(sum: &ApplySummary) {
    println!("\n{}", "┏━━━━━━━━━━━━━━━━━━━━━━━ Apply Results ━━━━━━━━━━━━━━━━━━━┓".bold());
    println!(
        "  {}: {}   {}: {}   {}: {}   {}: {}   {}: {}",
        "Created".green().bold(),
        sum.created,
        "Overwritten".yellow().bold(),
        sum.overwritten,
        "Edited".cyan().bold(),
        sum.edited,
        "Skipped".bold(),
        sum.skipped,
        "Written".bold(),
        format_size(sum.bytes_written, DECIMAL)
    );
    println!("{}", "┗━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━┛".bold());

    for d in sum.details.iter() {
        let note = match &d.status {
            StepStatus::FindNotFound => Some("find text not present".to_string()),
            StepStatus::MissingFile => Some("file does not exist".to_string()),
            StepStatus::Conflict(why) => Some(why.clone()),
            _ => None,
        };
        if let Some(note) = note {
            println!("  {} {}: {}", "skipped".red(), d.path, note);
        }
    }
    if sum.mirror_failures > 0 {
        println!("  {} {} file(s) could not be written to disk", "warning:".yellow().bold(), sum.mirror_failures);
    }
}

/// Answer to a y/N question; anything but an explicit yes declines.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
