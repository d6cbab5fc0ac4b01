//! Archive path normalization.
//!
//! Entry paths are forward-slash separated and relative. Normalization
//! removes empty and `.` segments, resolves `..` against earlier segments,
//! and drops leading `..` that have nothing to pop against. Whether an empty
//! result is acceptable is the caller's decision (it is a usage error as a
//! full entry path).

/// Normalize an archive-relative path.
///
/// ```
/// use ferrozip_core::path::normalize_path;
///
/// assert_eq!(normalize_path("a/./b/../c"), "a/c");
/// assert_eq!(normalize_path("../../x"), "x");
/// assert_eq!(normalize_path("."), "");
/// ```
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&"..") | None => {} // nothing to pop against: drop it
                Some(_) => {
                    segments.pop();
                }
            },
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths_unchanged() {
        assert_eq!(normalize_path("a/b/c.txt"), "a/b/c.txt");
        assert_eq!(normalize_path("file"), "file");
    }

    #[test]
    fn test_dot_and_empty_segments_dropped() {
        assert_eq!(normalize_path("a/./b/../c"), "a/c");
        assert_eq!(normalize_path("a//b"), "a/b");
        assert_eq!(normalize_path("/a/b/"), "a/b");
        assert_eq!(normalize_path("./x"), "x");
    }

    #[test]
    fn test_leading_parent_segments_dropped() {
        assert_eq!(normalize_path("../../x"), "x");
        assert_eq!(normalize_path("../a/../b"), "b");
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("a/.."), "");
    }

    #[test]
    fn test_idempotent() {
        for p in ["a/./b/../c", "../../x", "a//b/", ".", "x/y/z", "a/../.."] {
            let once = normalize_path(p);
            assert_eq!(normalize_path(&once), once, "not idempotent for {:?}", p);
        }
    }
}
