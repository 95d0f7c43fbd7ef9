//! Path pattern resolution.
//!
//! Turns the configured, comma-separated list of glob patterns into the set
//! of files that should currently be followed.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::error::WatcherError;

/// Split a comma-separated pattern list.
///
/// Each piece is trimmed and empty pieces are dropped. If nothing remains
/// the whole (trimmed) string is used as a single pattern.
///
/// # Examples
///
/// ```
/// use w3c_tail::watcher::split_patterns;
///
/// assert_eq!(split_patterns("/a/*.log, /b/*.log"), vec!["/a/*.log", "/b/*.log"]);
/// assert_eq!(split_patterns("/a/*.log"), vec!["/a/*.log"]);
/// ```
#[must_use]
pub fn split_patterns(raw: &str) -> Vec<String> {
    let patterns: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();

    if !patterns.is_empty() {
        return patterns;
    }

    let whole = raw.trim();
    if whole.is_empty() {
        Vec::new()
    } else {
        vec![whole.to_string()]
    }
}

/// Expand one glob pattern to the readable regular files it matches.
///
/// # Errors
///
/// Returns an error if the pattern is not a valid glob.
pub fn resolve_pattern(pattern: &str) -> Result<Vec<PathBuf>, WatcherError> {
    let entries = glob::glob(pattern).map_err(|source| WatcherError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;

    Ok(entries
        .filter_map(Result::ok)
        .filter(|path| is_readable_file(path))
        .collect())
}

/// Resolve every pattern in a comma-separated list and union the results.
///
/// Invalid patterns are logged and contribute nothing.
#[must_use]
pub fn resolve_patterns(raw: &str) -> BTreeSet<PathBuf> {
    let mut matched = BTreeSet::new();
    for pattern in split_patterns(raw) {
        match resolve_pattern(&pattern) {
            Ok(paths) => matched.extend(paths),
            Err(e) => tracing::warn!(error = %e, "Skipping path pattern"),
        }
    }
    matched
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && File::open(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_trims_and_drops_empty() {
        assert_eq!(
            split_patterns(" /a/*.log ,/b/x.log,, /c/*.log "),
            vec!["/a/*.log", "/b/x.log", "/c/*.log"]
        );
    }

    #[test]
    fn test_split_empty_input() {
        assert!(split_patterns("").is_empty());
        assert!(split_patterns("   ").is_empty());
    }

    #[test]
    fn test_split_falls_back_to_whole_string() {
        assert_eq!(split_patterns(" , "), vec![","]);
    }

    #[test]
    fn test_resolve_pattern_only_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "").unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub.log")).unwrap();

        let pattern = format!("{}/*.log", dir.path().display());
        let paths = resolve_pattern(&pattern).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.log")]);
    }

    #[test]
    fn test_resolve_pattern_invalid() {
        let result = resolve_pattern("/tmp/[");
        assert!(matches!(result, Err(WatcherError::InvalidPattern { .. })));
    }

    #[test]
    fn test_resolve_patterns_union_dedups() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("one.log"), "").unwrap();
        fs::write(dir.path().join("two.log"), "").unwrap();

        let raw = format!(
            "{0}/*.log, {0}/one.log,{0}/missing.log",
            dir.path().display()
        );
        let paths = resolve_patterns(&raw);
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&dir.path().join("one.log")));
        assert!(paths.contains(&dir.path().join("two.log")));
    }

    #[test]
    fn test_resolve_patterns_skips_invalid() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("one.log"), "").unwrap();

        let raw = format!("[, {}/one.log", dir.path().display());
        let paths = resolve_patterns(&raw);
        assert_eq!(paths.len(), 1);
    }
}
