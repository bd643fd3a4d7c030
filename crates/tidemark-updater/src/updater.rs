// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Update orchestrator
//!
//! Sequences one update transaction: validate, download, extract, back up,
//! diff, apply, clean up. Phase failures after the backup snapshot exists
//! trigger a full restore; scratch resources are removed on every path,
//! success or failure. Backup directories are retained either way.

use crate::archive;
use crate::backup::{self, BackupSnapshot};
use crate::config::UpdaterConfig;
use crate::diff::{self, DiffResult};
use crate::error::{Result, UpdaterError};
use crate::fetch;
use crate::install::{self, ApplyReport};
use crate::lock::{LOCK_FILE_NAME, UpdateLock};
use crate::paths::PathClassifier;
use crate::release::{self, UpdateCheck};
use crate::version::{parse_version, version_from_tag};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Transaction phases, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePhase {
    Init,
    Validating,
    Downloading,
    Extracting,
    BackingUp,
    Diffing,
    Applying,
    Cleanup,
}

impl fmt::Display for UpdatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Validating => "validating",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
            Self::BackingUp => "backing-up",
            Self::Diffing => "diffing",
            Self::Applying => "applying",
            Self::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// The update contract handed to the external HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub success: bool,
    pub message: String,
    pub files_updated: usize,
    pub files_removed: usize,
    pub backup_path: Option<String>,
    pub error: Option<String>,
}

impl UpdateOutcome {
    fn failure(message: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            success: false,
            message: message.into(),
            files_updated: 0,
            files_removed: 0,
            backup_path: None,
            error: Some(error.to_string()),
        }
    }
}

/// Scratch paths and accumulated results of one transaction, exclusively
/// owned by the orchestrator for the transaction's lifetime.
struct Transaction {
    version: String,
    phase: UpdatePhase,
    archive_path: Option<PathBuf>,
    extract_dir: PathBuf,
    snapshot: Option<BackupSnapshot>,
    report: Option<ApplyReport>,
}

impl Transaction {
    fn new(config: &UpdaterConfig, version: &str) -> Self {
        Self {
            version: version.to_string(),
            phase: UpdatePhase::Init,
            archive_path: None,
            extract_dir: config
                .scratch_dir
                .join(format!("extract-{}-{version}", config.repo)),
            snapshot: None,
            report: None,
        }
    }

    fn enter(&mut self, phase: UpdatePhase) {
        info!("update {}: phase {phase}", self.version);
        self.phase = phase;
    }

    /// Remove scratch resources. Runs on every terminal path; failures are
    /// logged, never escalated. The backup directory is not scratch and is
    /// deliberately left in place.
    fn cleanup(&mut self) {
        self.enter(UpdatePhase::Cleanup);
        if let Some(archive_path) = self.archive_path.take()
            && archive_path.exists()
            && let Err(e) = fs::remove_file(&archive_path)
        {
            warn!("failed to remove scratch archive {}: {e}", archive_path.display());
        }
        if self.extract_dir.exists()
            && let Err(e) = fs::remove_dir_all(&self.extract_dir)
        {
            warn!(
                "failed to remove extraction dir {}: {e}",
                self.extract_dir.display()
            );
        }
    }
}

/// The update engine facade: a cheap check path and the full transactional
/// update path.
#[derive(Debug)]
pub struct Updater {
    config: UpdaterConfig,
}

impl Updater {
    pub fn new(config: UpdaterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// Check the remote feed for a newer release. Never fails outward.
    pub async fn check(&self) -> UpdateCheck {
        release::check_for_updates(&self.config).await
    }

    /// Run one update transaction to a terminal state.
    ///
    /// Always returns a structured outcome; rollback runs when a phase
    /// fails after the snapshot exists, and a rollback failure is surfaced
    /// alongside the original error, never instead of it.
    pub async fn perform_update(&self, version: &str) -> UpdateOutcome {
        let version = version_from_tag(version);
        info!("starting update to version {version}");

        let _lock = match UpdateLock::acquire(&self.config) {
            Ok(lock) => lock,
            Err(e) => {
                warn!("update rejected: {e}");
                return UpdateOutcome::failure("another update is already in progress", e);
            }
        };

        let mut tx = Transaction::new(&self.config, version);

        tx.enter(UpdatePhase::Validating);
        if let Err(e) = parse_version(version) {
            return UpdateOutcome::failure(format!("invalid version {version:?}"), e);
        }
        let classifier = match PathClassifier::from_patterns(&self.config.protected_paths) {
            Ok(classifier) => classifier,
            Err(e) => return UpdateOutcome::failure("invalid protected path rules", e),
        };

        let outcome = match self.execute(&mut tx, &classifier).await {
            Ok(()) => {
                let report = tx.report.unwrap_or_default();
                if report.failed > 0 {
                    warn!("{} file operations failed during apply", report.failed);
                }
                UpdateOutcome {
                    success: true,
                    message: format!("Updated to version {version}"),
                    files_updated: report.updated,
                    files_removed: report.removed,
                    backup_path: tx
                        .snapshot
                        .as_ref()
                        .map(|s| s.root_dir.display().to_string()),
                    error: None,
                }
            }
            Err(e) => self.fail_and_roll_back(&tx, e),
        };

        tx.cleanup();
        outcome
    }

    /// The forward phases. Any error aborts the sequence; the caller
    /// decides about rollback based on whether a snapshot was taken.
    async fn execute(&self, tx: &mut Transaction, classifier: &PathClassifier) -> Result<()> {
        tx.enter(UpdatePhase::Downloading);
        let archive_path = fetch::download(&self.config, &tx.version).await?;
        tx.archive_path = Some(archive_path.clone());

        tx.enter(UpdatePhase::Extracting);
        archive::extract(&archive_path, &tx.extract_dir)?;
        archive::unwrap_top_level(&tx.extract_dir)?;

        tx.enter(UpdatePhase::BackingUp);
        let engine_owned = self.engine_owned_paths();
        let snapshot = backup::snapshot(
            classifier,
            &self.config.project_root,
            &self.config.backup_dir,
            |rel: &str| matches_engine_owned(&engine_owned, rel),
        )?;
        tx.snapshot = Some(snapshot);

        tx.enter(UpdatePhase::Diffing);
        let diff = self.compute_diff(tx, classifier)?;
        info!(
            "diff: {} to add, {} to remove",
            diff.to_add.len(),
            diff.to_remove.len()
        );

        tx.enter(UpdatePhase::Applying);
        let snapshot = tx
            .snapshot
            .as_ref()
            .ok_or_else(|| UpdaterError::Backup("snapshot missing before apply".to_string()))?;
        let report = install::apply(
            &diff,
            &tx.extract_dir,
            &self.config.project_root,
            snapshot,
        )?;
        tx.report = Some(report);

        Ok(())
    }

    fn compute_diff(&self, tx: &Transaction, classifier: &PathClassifier) -> Result<DiffResult> {
        let engine_owned = self.engine_owned_paths();
        let is_engine_owned = |rel: &str| matches_engine_owned(&engine_owned, rel);

        let release_files = diff::list_files(&tx.extract_dir, &is_engine_owned)?;
        let live_files = diff::list_files(&self.config.project_root, |rel| {
            is_engine_owned(rel) || classifier.is_protected(rel)
        })?;

        Ok(diff::diff(&live_files, &release_files, classifier))
    }

    /// Relative paths inside the live tree that belong to the engine, not
    /// the application: the lock file, and the backup/scratch directories
    /// when they are nested under the project root. Excluded from manifests
    /// and from the backup glob walk alike.
    fn engine_owned_paths(&self) -> Vec<String> {
        let mut owned = vec![LOCK_FILE_NAME.to_string()];
        for dir in [&self.config.backup_dir, &self.config.scratch_dir] {
            if let Ok(rel) = dir.strip_prefix(&self.config.project_root) {
                let rel = diff::normalize(rel);
                if !rel.is_empty() {
                    owned.push(format!("{rel}/"));
                }
            }
        }
        owned
    }

    fn fail_and_roll_back(&self, tx: &Transaction, err: UpdaterError) -> UpdateOutcome {
        error!("update to {} failed during {}: {err}", tx.version, tx.phase);

        let mut error_text = err.to_string();
        let mut rolled_back = false;

        if let Some(snapshot) = &tx.snapshot {
            match backup::restore(snapshot, &self.config.project_root) {
                Ok(restored) => {
                    rolled_back = true;
                    info!("rolled back {restored} files from {}", snapshot.root_dir.display());
                }
                Err(rollback_err) => {
                    // Surface both failures; the original error must not be
                    // masked by the rollback's.
                    error!("rollback failed: {rollback_err}");
                    error_text = format!("{error_text}; rollback failed: {rollback_err}");
                }
            }
        }

        UpdateOutcome {
            success: false,
            message: if rolled_back {
                "update failed, previous state restored".to_string()
            } else {
                "update failed".to_string()
            },
            files_updated: 0,
            files_removed: 0,
            backup_path: tx
                .snapshot
                .as_ref()
                .map(|s| s.root_dir.display().to_string()),
            error: Some(error_text),
        }
    }
}

/// Entries ending in "/" are directory prefixes, the rest exact paths.
fn matches_engine_owned(owned: &[String], rel: &str) -> bool {
    owned.iter().any(|o| {
        if o.ends_with('/') {
            rel.starts_with(o.as_str())
        } else {
            rel == o
        }
    })
}
