/*!
 * Path Validation
 * Canonical slash-separated paths, checked before any backend dispatch
 */

use std::path::Path;

use super::types::{VfsError, VfsResult};

/// Canonical root path
pub const ROOT: &str = ".";

/// Validate a path and return its canonical string form.
///
/// A valid path is a sequence of non-empty, slash-separated segments
/// with no `.` or `..` segments, no backslashes, and no leading or
/// trailing slash. The single value `.` names the root. Every backend
/// rejects invalid paths with the same error, before touching storage.
pub fn canonical(path: &Path) -> VfsResult<String> {
    let raw = path
        .to_str()
        .ok_or_else(|| VfsError::InvalidPath(path.to_string_lossy().into_owned()))?;

    if raw == ROOT {
        return Ok(ROOT.to_string());
    }
    if raw.is_empty() || raw.contains('\\') {
        return Err(VfsError::InvalidPath(raw.to_string()));
    }
    for segment in raw.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(VfsError::InvalidPath(raw.to_string()));
        }
    }

    Ok(raw.to_string())
}

/// Parent of a canonical path; the root is its own parent.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => ROOT,
    }
}

/// Final segment of a canonical path.
pub fn base(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join a canonical directory path and a child segment.
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Split a canonical path into its first segment and the remainder,
/// the remainder being `.` when the path is a single segment.
pub fn split_first(path: &str) -> (&str, &str) {
    match path.find('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => (path, ROOT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_valid_paths() {
        assert_eq!(canonical(Path::new(".")).unwrap(), ".");
        assert_eq!(canonical(Path::new("a")).unwrap(), "a");
        assert_eq!(canonical(Path::new("a/b/c")).unwrap(), "a/b/c");
    }

    #[test]
    fn test_invalid_paths() {
        for bad in [
            "", "/", "/a", "a/", "a//b", "a/./b", "a/../b", "./a", "a/.", "..", "a\\b",
        ] {
            assert!(
                matches!(canonical(Path::new(bad)), Err(VfsError::InvalidPath(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_parent_base() {
        assert_eq!(parent("a/b/c"), "a/b");
        assert_eq!(parent("a"), ".");
        assert_eq!(base("a/b/c"), "c");
        assert_eq!(base("a"), "a");
    }

    #[test]
    fn test_join_split() {
        assert_eq!(join(".", "a"), "a");
        assert_eq!(join("a/b", "c"), "a/b/c");
        assert_eq!(split_first("m/x/y"), ("m", "x/y"));
        assert_eq!(split_first("m"), ("m", "."));
    }
}
