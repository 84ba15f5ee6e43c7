use std::path::{Component, Path, PathBuf};

/// Resolve a model-supplied relative path under `root`, lexically.
/// Absolute paths, drive prefixes and `..` segments are refused.
pub fn resolve_within(root: &Path, candidate: &str) -> Option<PathBuf> {
    let rel = Path::new(candidate);
    let mut out = root.to_path_buf();
    let mut depth = 0usize;
    for comp in rel.components() {
        match comp {
            Component::Normal(seg) => {
                out.push(seg);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if depth == 0 { None } else { Some(out) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_under_root() {
        let root = Path::new("/tmp/proj");
        assert_eq!(resolve_within(root, "src/App.js"), Some(root.join("src").join("App.js")));
        assert_eq!(resolve_within(root, "./index.html"), Some(root.join("index.html")));
    }

    #[test]
    fn escapes_are_refused() {
        let root = Path::new("/tmp/proj");
        assert_eq!(resolve_within(root, "../secret"), None);
        assert_eq!(resolve_within(root, "src/../../x"), None);
        assert_eq!(resolve_within(root, "/etc/passwd"), None);
        assert_eq!(resolve_within(root, ""), None);
    }
}
