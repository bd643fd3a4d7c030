// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! File-set manifests and diffing between the release tree and the live tree

use crate::error::Result;
use crate::paths::PathClassifier;
use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// The computed work for the installer.
///
/// `to_add` is "desired final content": every non-protected release file is
/// copied unconditionally, fresh or overwrite. Content is never hashed or
/// compared. `to_remove` holds live files with no release counterpart.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub to_add: BTreeSet<String>,
    pub to_remove: BTreeSet<String>,
}

/// Walk `root` and collect regular files as forward-slash relative paths.
///
/// Iterative traversal via walkdir, so deep trees carry no recursion-depth
/// risk. Directories themselves are not recorded. `exclude` filters paths
/// out of the manifest (engine-owned dirs, protected paths).
pub fn list_files<F>(root: &Path, exclude: F) -> Result<BTreeSet<String>>
where
    F: Fn(&str) -> bool,
{
    let mut files = BTreeSet::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?;
        let rel = normalize(rel);
        if exclude(&rel) {
            continue;
        }
        files.insert(rel);
    }
    Ok(files)
}

/// Forward-slash join of path components, regardless of platform separator.
pub fn normalize(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Compute the add/remove sets. `live` is expected to already exclude
/// protected paths; the protected filter on `to_add` is applied here so the
/// invariant holds even if the release ships content at protected paths.
pub fn diff(
    live: &BTreeSet<String>,
    release: &BTreeSet<String>,
    classifier: &PathClassifier,
) -> DiffResult {
    let to_add = release
        .iter()
        .filter(|path| !classifier.is_protected(path))
        .cloned()
        .collect();

    let to_remove = live
        .iter()
        .filter(|path| !release.contains(path.as_str()) && !classifier.is_protected(path))
        .cloned()
        .collect();

    DiffResult { to_add, to_remove }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn classifier(patterns: &[&str]) -> PathClassifier {
        let patterns: Vec<String> = patterns.iter().map(|s| (*s).to_string()).collect();
        PathClassifier::from_patterns(&patterns).unwrap()
    }

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_list_files_relative_normalized() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::create_dir_all(dir.path().join("sub/deep")).unwrap();
        fs::write(dir.path().join("sub/deep/b.txt"), b"b").unwrap();

        let files = list_files(dir.path(), |_| false).unwrap();
        assert_eq!(files, set(&["a.txt", "sub/deep/b.txt"]));
    }

    #[test]
    fn test_list_files_exclude_predicate() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep.txt"), b"k").unwrap();
        fs::create_dir_all(dir.path().join("backups")).unwrap();
        fs::write(dir.path().join("backups/old.txt"), b"o").unwrap();

        let files = list_files(dir.path(), |p| p.starts_with("backups/")).unwrap();
        assert_eq!(files, set(&["keep.txt"]));
    }

    #[test]
    fn test_diff_add_and_remove() {
        let live = set(&["a.txt", "old.txt"]);
        let release = set(&["a.txt", "b.txt"]);
        let d = diff(&live, &release, &classifier(&[]));

        assert_eq!(d.to_add, set(&["a.txt", "b.txt"]));
        assert_eq!(d.to_remove, set(&["old.txt"]));
    }

    #[test]
    fn test_diff_protected_excluded() {
        // Live tree {a.txt, config/config.php, logs/x.log}, release
        // {a.txt, b.txt}, rules ["config/", "logs/"]. The live manifest
        // already excludes protected paths, so they never reach to_remove.
        let live = set(&["a.txt"]);
        let release = set(&["a.txt", "b.txt"]);
        let d = diff(&live, &release, &classifier(&["config/", "logs/"]));

        assert_eq!(d.to_add, set(&["a.txt", "b.txt"]));
        assert!(d.to_remove.is_empty());
    }

    #[test]
    fn test_diff_release_shipping_protected_content() {
        // A sample config shipped in the release must never land in to_add.
        let live = set(&["a.txt"]);
        let release = set(&["a.txt", "config/config.php"]);
        let d = diff(&live, &release, &classifier(&["config/"]));

        assert_eq!(d.to_add, set(&["a.txt"]));
    }

    #[test]
    fn test_diff_defends_unfiltered_live_manifest() {
        // Even if a caller forgets to exclude protected paths from the live
        // manifest, the classifier keeps them out of to_remove.
        let live = set(&["a.txt", "config/config.php"]);
        let release = set(&["a.txt"]);
        let d = diff(&live, &release, &classifier(&["config/"]));

        assert!(d.to_remove.is_empty());
    }
}
