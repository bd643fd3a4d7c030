// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Installer: applies a computed diff to the live tree
//!
//! Phase order is significant: delete obsolete files, copy release files,
//! then restore protected content from the transaction's snapshot. The
//! final restore guarantees protected content wins regardless of what the
//! release archive shipped at those paths.

use crate::backup::{self, BackupSnapshot};
use crate::diff::DiffResult;
use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Per-file counters for one diff application.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyReport {
    pub updated: usize,
    pub removed: usize,
    pub failed: usize,
}

/// Apply `diff` to `live_root`, sourcing new content from `release_root`.
///
/// Per-file failures (a vanished file, a copy hitting a permission error)
/// are counted and logged but never abort a phase. The trailing protected
/// restore is phase-level: its failure propagates and the caller rolls
/// back.
pub fn apply(
    diff: &DiffResult,
    release_root: &Path,
    live_root: &Path,
    snapshot: &BackupSnapshot,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();

    // Phase a: delete obsolete files
    for rel in &diff.to_remove {
        let target = live_root.join(rel);
        match fs::remove_file(&target) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!("failed to remove {rel}: {e}");
                report.failed += 1;
            }
        }
    }

    // Phase b: copy new and changed files, unconditionally
    for rel in &diff.to_add {
        let src = release_root.join(rel);
        let dst = live_root.join(rel);
        if let Err(e) = copy_file(&src, &dst) {
            warn!("failed to install {rel}: {e}");
            report.failed += 1;
            continue;
        }
        report.updated += 1;
    }

    // Phase c: protected content from the pre-update snapshot wins
    backup::restore(snapshot, live_root)?;

    info!(
        "applied diff: {} updated, {} removed, {} failed",
        report.updated, report.removed, report.failed
    );
    Ok(report)
}

fn copy_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::PathClassifier;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn set(paths: &[&str]) -> BTreeSet<String> {
        paths.iter().map(|s| (*s).to_string()).collect()
    }

    fn empty_snapshot(dir: &TempDir) -> BackupSnapshot {
        let root = dir.path().join("snap");
        fs::create_dir_all(&root).unwrap();
        BackupSnapshot {
            id: "test".to_string(),
            root_dir: root,
            captured: vec![],
        }
    }

    #[test]
    fn test_apply_deletes_copies_and_counts() {
        let release = TempDir::new().unwrap();
        let live = TempDir::new().unwrap();
        let aux = TempDir::new().unwrap();

        fs::write(release.path().join("a.txt"), b"new-a").unwrap();
        fs::write(release.path().join("b.txt"), b"new-b").unwrap();
        fs::write(live.path().join("a.txt"), b"old-a").unwrap();
        fs::write(live.path().join("old.txt"), b"obsolete").unwrap();

        let diff = DiffResult {
            to_add: set(&["a.txt", "b.txt"]),
            to_remove: set(&["old.txt"]),
        };

        let report = apply(
            &diff,
            release.path(),
            live.path(),
            &empty_snapshot(&aux),
        )
        .unwrap();

        assert_eq!(report.updated, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(fs::read(live.path().join("a.txt")).unwrap(), b"new-a");
        assert_eq!(fs::read(live.path().join("b.txt")).unwrap(), b"new-b");
        assert!(!live.path().join("old.txt").exists());
    }

    #[test]
    fn test_apply_per_file_failures_do_not_abort() {
        let release = TempDir::new().unwrap();
        let live = TempDir::new().unwrap();
        let aux = TempDir::new().unwrap();

        fs::write(release.path().join("ok.txt"), b"fine").unwrap();

        // "missing.txt" is absent from the release tree and "ghost.txt" is
        // absent from the live tree: one copy failure, one delete failure.
        let diff = DiffResult {
            to_add: set(&["ok.txt", "missing.txt"]),
            to_remove: set(&["ghost.txt"]),
        };

        let report = apply(
            &diff,
            release.path(),
            live.path(),
            &empty_snapshot(&aux),
        )
        .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.removed, 0);
        assert_eq!(report.failed, 2);
        assert!(live.path().join("ok.txt").exists());
    }

    #[test]
    fn test_apply_protected_content_wins() {
        let release = TempDir::new().unwrap();
        let live = TempDir::new().unwrap();
        let backups = TempDir::new().unwrap();

        // Live installation has a real config; the release ships a sample
        // at the same path.
        fs::create_dir_all(live.path().join("config")).unwrap();
        fs::write(live.path().join("config/config.php"), b"real-secrets").unwrap();
        fs::create_dir_all(release.path().join("config")).unwrap();
        fs::write(release.path().join("config/config.php"), b"sample").unwrap();
        fs::write(release.path().join("app.txt"), b"code").unwrap();

        let classifier =
            PathClassifier::from_patterns(&["config/".to_string()]).unwrap();
        let snap = backup::snapshot(&classifier, live.path(), backups.path(), |_| false).unwrap();

        // The diff layer already filters protected paths out of to_add;
        // simulate a release that smuggled one through anyway.
        let diff = DiffResult {
            to_add: set(&["app.txt", "config/config.php"]),
            to_remove: set(&[]),
        };

        apply(&diff, release.path(), live.path(), &snap).unwrap();

        assert_eq!(
            fs::read(live.path().join("config/config.php")).unwrap(),
            b"real-secrets"
        );
        assert_eq!(fs::read(live.path().join("app.txt")).unwrap(), b"code");
    }

    #[test]
    fn test_apply_missing_snapshot_dir_is_phase_failure() {
        let release = TempDir::new().unwrap();
        let live = TempDir::new().unwrap();

        let snap = BackupSnapshot {
            id: "gone".to_string(),
            root_dir: live.path().join("nope"),
            captured: vec![],
        };
        let diff = DiffResult::default();

        assert!(apply(&diff, release.path(), live.path(), &snap).is_err());
    }
}
