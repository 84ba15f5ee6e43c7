use anyhow::{Context, Result};
use fs_err as fs;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    File { content: String },
    Folder { children: Vec<FileNode> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl FileNode {
    fn folder(name: &str, path: String) -> Self {
        Self { name: name.to_string(), path, kind: NodeKind::Folder { children: Vec::new() } }
    }

    fn file(name: &str, path: String, content: String) -> Self {
        Self { name: name.to_string(), path, kind: NodeKind::File { content } }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("invalid path \"{0}\"")]
    InvalidPath(String),
    #[error("\"{0}\" is a file, not a folder")]
    NotAFolder(String),
    #[error("\"{0}\" is a folder, not a file")]
    NotAFile(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Overwritten,
}

/// Project files as a tree keyed by slash-delimited path. Siblings keep
/// insertion order; folders are created on first child insertion and are
/// never removed implicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileTree {
    pub roots: Vec<FileNode>,
}

fn segments(path: &str) -> Result<Vec<&str>, TreeError> {
    let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    if segs.is_empty() || segs.iter().any(|s| *s == "..") {
        return Err(TreeError::InvalidPath(path.to_string()));
    }
    Ok(segs)
}

impl FileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(files: &BTreeMap<String, String>) -> Result<Self, TreeError> {
        let mut tree = Self::new();
        for (path, content) in files {
            tree.upsert_file(path, content.clone())?;
        }
        Ok(tree)
    }

    /// Load every regular file under `root` (skipping dot-dirs and node_modules).
    pub fn load_dir(root: &Path) -> Result<Self> {
        let mut tree = Self::new();
        let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            e.depth() == 0 || !(name.starts_with('.') || name == "node_modules" || name == "target")
        });
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(root).context("walked outside root")?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // Binary files have no place in a text tree.
            let Ok(content) = fs::read_to_string(entry.path()) else { continue };
            tree.upsert_file(&rel, content)?;
        }
        Ok(tree)
    }

    /// Insert a file, creating parent folders, or overwrite an existing one.
    pub fn upsert_file(&mut self, path: &str, content: String) -> Result<Upsert, TreeError> {
        let segs = segments(path)?;
        let (file_name, dirs) = segs
            .split_last()
            .ok_or_else(|| TreeError::InvalidPath(path.to_string()))?;

        let mut level = &mut self.roots;
        let mut prefix = String::new();
        for dir in dirs {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(dir);
            let idx = match level.iter().position(|n| n.name == *dir) {
                Some(i) => i,
                None => {
                    level.push(FileNode::folder(dir, prefix.clone()));
                    level.len() - 1
                }
            };
            level = match &mut level[idx].kind {
                NodeKind::Folder { children } => children,
                NodeKind::File { .. } => return Err(TreeError::NotAFolder(prefix)),
            };
        }

        let full = segs.join("/");
        match level.iter_mut().find(|n| n.name == *file_name) {
            Some(node) => match &mut node.kind {
                NodeKind::File { content: existing } => {
                    *existing = content;
                    Ok(Upsert::Overwritten)
                }
                NodeKind::Folder { .. } => Err(TreeError::NotAFile(full)),
            },
            None => {
                level.push(FileNode::file(file_name, full, content));
                Ok(Upsert::Created)
            }
        }
    }

    pub fn node(&self, path: &str) -> Option<&FileNode> {
        let segs = segments(path).ok()?;
        let mut level = &self.roots;
        let mut found = None;
        for (i, seg) in segs.iter().enumerate() {
            let node = level.iter().find(|n| n.name == *seg)?;
            if i + 1 == segs.len() {
                found = Some(node);
            } else if let NodeKind::Folder { children } = &node.kind {
                level = children;
            } else {
                return None;
            }
        }
        found
    }

    pub fn file(&self, path: &str) -> Option<&str> {
        match &self.node(path)?.kind {
            NodeKind::File { content } => Some(content),
            NodeKind::Folder { .. } => None,
        }
    }

    fn file_mut(&mut self, path: &str) -> Option<&mut String> {
        let segs = segments(path).ok()?;
        let (last, dirs) = segs.split_last()?;
        let mut level = &mut self.roots;
        for dir in dirs {
            let node = level.iter_mut().find(|n| n.name == *dir)?;
            level = match &mut node.kind {
                NodeKind::Folder { children } => children,
                NodeKind::File { .. } => return None,
            };
        }
        match &mut level.iter_mut().find(|n| n.name == *last)?.kind {
            NodeKind::File { content } => Some(content),
            NodeKind::Folder { .. } => None,
        }
    }

    /// Replace the first literal occurrence of `find`. Returns `None` when the
    /// file is missing, `Some(false)` when `find` is absent.
    pub fn replace_first(&mut self, path: &str, find: &str, replace: &str) -> Option<bool> {
        let content = self.file_mut(path)?;
        if find.is_empty() {
            return Some(false);
        }
        match content.find(find) {
            Some(at) => {
                content.replace_range(at..at + find.len(), replace);
                Some(true)
            }
            None => Some(false),
        }
    }

    /// Flatten to path -> content, the shape projects and deploys use.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        fn walk(nodes: &[FileNode], out: &mut BTreeMap<String, String>) {
            for n in nodes {
                match &n.kind {
                    NodeKind::File { content } => { out.insert(n.path.clone(), content.clone()); }
                    NodeKind::Folder { children } => walk(children, out),
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(&self.roots, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_under_missing_folder_builds_parent() {
        let mut tree = FileTree::new();
        assert_eq!(tree.upsert_file("src/App.js", "app".into()).unwrap(), Upsert::Created);
        assert_eq!(tree.roots.len(), 1);
        let src = &tree.roots[0];
        assert_eq!(src.name, "src");
        assert_eq!(src.path, "src");
        match &src.kind {
            NodeKind::Folder { children } => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].path, "src/App.js");
                assert_eq!(children[0].kind, NodeKind::File { content: "app".into() });
            }
            other => panic!("expected folder, got {other:?}"),
        }
    }

    #[test]
    fn overwrite_keeps_paths_unique() {
        let mut tree = FileTree::new();
        tree.upsert_file("a/b.txt", "1".into()).unwrap();
        assert_eq!(tree.upsert_file("a//b.txt", "2".into()).unwrap(), Upsert::Overwritten);
        assert_eq!(tree.to_map().len(), 1);
        assert_eq!(tree.file("a/b.txt"), Some("2"));
    }

    #[test]
    fn kind_collisions_and_bad_paths_are_errors() {
        let mut tree = FileTree::new();
        tree.upsert_file("src/App.js", "x".into()).unwrap();
        assert_eq!(
            tree.upsert_file("src", "x".into()).unwrap_err(),
            TreeError::NotAFile("src".into())
        );
        assert_eq!(
            tree.upsert_file("src/App.js/inner.js", "x".into()).unwrap_err(),
            TreeError::NotAFolder("src/App.js".into())
        );
        assert!(matches!(
            tree.upsert_file("../etc/passwd", "x".into()),
            Err(TreeError::InvalidPath(_))
        ));
        assert!(matches!(tree.upsert_file("", "x".into()), Err(TreeError::InvalidPath(_))));
    }

    #[test]
    fn replace_first_only_touches_first_occurrence() {
        let mut tree = FileTree::new();
        tree.upsert_file("a.txt", "red red".into()).unwrap();
        assert_eq!(tree.replace_first("a.txt", "red", "blue"), Some(true));
        assert_eq!(tree.file("a.txt"), Some("blue red"));
        assert_eq!(tree.replace_first("a.txt", "green", "x"), Some(false));
        assert_eq!(tree.replace_first("missing.txt", "red", "x"), None);
    }

    #[test]
    fn load_dir_skips_hidden_and_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/x")).unwrap();
        fs::create_dir_all(dir.path().join(".vibe")).unwrap();
        fs::write(dir.path().join("src/App.js"), "app").unwrap();
        fs::write(dir.path().join("node_modules/x/i.js"), "dep").unwrap();
        fs::write(dir.path().join(".vibe/t.json"), "{}").unwrap();
        let tree = FileTree::load_dir(dir.path()).unwrap();
        let map = tree.to_map();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["src/App.js"]);
    }
}
