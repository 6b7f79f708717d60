//! Path helpers for config-relative resolution

use std::path::{Component, Path, PathBuf};

/// Collapse `.` and `..` components without touching the filesystem
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Join `value` to `base` unless it is already absolute, then normalize
pub fn resolve_against(base: &Path, value: &str) -> PathBuf {
    let candidate = Path::new(value);
    if candidate.is_absolute() {
        normalize_lexically(candidate)
    } else {
        normalize_lexically(&base.join(candidate))
    }
}

/// True when the text contains a path separator of either platform style
pub fn has_separator(text: &str) -> bool {
    text.contains('/') || text.contains('\\')
}

/// Config keys like `1:30` that name a time range rather than a file
pub fn is_bare_time_key(key: &str) -> bool {
    key.contains(':') && !has_separator(key)
}

/// Directory holding `path`, or `.` for bare names
pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/./../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_resolve_against() {
        let base = Path::new("/configs/season");
        assert_eq!(resolve_against(base, "../clips"), PathBuf::from("/configs/clips"));
        assert_eq!(resolve_against(base, "/abs/dir"), PathBuf::from("/abs/dir"));
    }

    #[test]
    fn test_bare_time_key() {
        assert!(is_bare_time_key("01:30"));
        assert!(is_bare_time_key("1:02:03.5"));
        assert!(!is_bare_time_key("clip.mp4"));
        assert!(!is_bare_time_key("C:\\clips\\a.mp4"));
        assert!(!is_bare_time_key("dir/1:30.mp4"));
    }
}
