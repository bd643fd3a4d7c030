// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Backup module for pre-update snapshots of protected paths
//!
//! Snapshots are taken before the installer's first destructive operation
//! and retained afterwards, success or failure, as the rollback audit
//! trail. Only scratch resources are removed at transaction end; backups
//! are not scratch.

use crate::diff;
use crate::error::{Result, UpdaterError};
use crate::paths::{PathClassifier, ProtectedRule};
use chrono::Utc;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// A point-in-time copy of every protected path, owned by the transaction
/// that created it until restore or disposal.
#[derive(Debug, Clone)]
pub struct BackupSnapshot {
    pub id: String,
    pub root_dir: PathBuf,
    pub captured: Vec<String>,
}

fn snapshot_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), suffix)
}

/// Copy every configured protected path that exists under `live_root` into
/// a fresh, uniquely-named backup directory, preserving relative structure.
///
/// Missing paths are skipped, not errors: a protected upload directory that
/// does not exist yet simply has nothing to snapshot. `exclude` keeps
/// engine-owned paths (scratch space, the lock file, nested backup dirs)
/// out of the glob walk; a broad glob must never capture freshly extracted
/// release content.
pub fn snapshot<F>(
    classifier: &PathClassifier,
    live_root: &Path,
    backup_root: &Path,
    exclude: F,
) -> Result<BackupSnapshot>
where
    F: Fn(&str) -> bool,
{
    let id = snapshot_id();
    let root_dir = backup_root.join(&id);
    fs::create_dir_all(&root_dir)
        .map_err(|e| UpdaterError::Backup(format!("cannot create backup dir: {e}")))?;

    let mut captured = Vec::new();
    let mut needs_walk = false;

    for rule in classifier.rules() {
        match rule {
            ProtectedRule::Exact(path) => {
                capture_path(live_root, &root_dir, path, &mut captured)?;
            }
            ProtectedRule::PrefixDir(prefix) => {
                capture_path(live_root, &root_dir, prefix.trim_end_matches('/'), &mut captured)?;
            }
            ProtectedRule::Glob { .. } => needs_walk = true,
        }
    }

    // Glob rules have no single source path; one walk of the live tree
    // covers them all.
    if needs_walk {
        for entry in WalkDir::new(live_root) {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_file() || entry.path().starts_with(backup_root) {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(live_root)
                .map_err(std::io::Error::other)?;
            let rel = diff::normalize(rel);
            if captured.contains(&rel) || exclude(&rel) || !matches_glob(classifier, &rel) {
                continue;
            }
            let dst = root_dir.join(&rel);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dst)
                .map_err(|e| UpdaterError::Backup(format!("cannot back up {rel}: {e}")))?;
            captured.push(rel);
        }
    }

    info!(
        "created backup {} with {} captured paths",
        root_dir.display(),
        captured.len()
    );

    Ok(BackupSnapshot {
        id,
        root_dir,
        captured,
    })
}

fn matches_glob(classifier: &PathClassifier, rel: &str) -> bool {
    classifier
        .rules()
        .iter()
        .any(|rule| matches!(rule, ProtectedRule::Glob { .. }) && rule.matches(rel))
}

fn capture_path(
    live_root: &Path,
    backup_root: &Path,
    rel: &str,
    captured: &mut Vec<String>,
) -> Result<()> {
    let src = live_root.join(rel);
    if !src.exists() {
        debug!("protected path {rel} does not exist, skipping");
        return Ok(());
    }

    let dst = backup_root.join(rel);
    if src.is_dir() {
        copy_dir(&src, &dst)?;
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&src, &dst).map_err(|e| UpdaterError::Backup(format!("cannot back up {rel}: {e}")))?;
    }
    captured.push(rel.to_string());
    Ok(())
}

/// Copy every captured file back under `live_root`, creating intermediate
/// directories as needed. Unconditional overwrite; live files absent from
/// the snapshot are left alone. Returns the number of files restored.
pub fn restore(snapshot: &BackupSnapshot, live_root: &Path) -> Result<usize> {
    if !snapshot.root_dir.exists() {
        return Err(UpdaterError::Rollback(format!(
            "backup directory not found: {}",
            snapshot.root_dir.display()
        )));
    }

    let mut restored = 0;
    for entry in WalkDir::new(&snapshot.root_dir) {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&snapshot.root_dir)
            .map_err(std::io::Error::other)?;
        let dst = live_root.join(rel);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dst).map_err(|e| {
            UpdaterError::Rollback(format!("cannot restore {}: {e}", rel.display()))
        })?;
        restored += 1;
    }

    info!(
        "restored {restored} files from backup {}",
        snapshot.root_dir.display()
    );
    Ok(restored)
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    let mut stack = vec![(src.to_path_buf(), dst.to_path_buf())];
    while let Some((from, to)) = stack.pop() {
        for entry in fs::read_dir(&from)? {
            let entry = entry?;
            let src_path = entry.path();
            let dst_path = to.join(entry.file_name());

            if src_path.is_dir() {
                fs::create_dir_all(&dst_path)?;
                stack.push((src_path, dst_path));
            } else {
                fs::copy(&src_path, &dst_path)?;
            }
        }
    }

    Ok(())
}
