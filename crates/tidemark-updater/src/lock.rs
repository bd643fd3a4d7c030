// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Mutual exclusion for update transactions
//!
//! The live tree, backup directory, and scratch space are plain filesystem
//! paths; two interleaved transactions would race destructively (one's
//! delete against another's copy). A lock file keyed on the project root
//! makes `perform_update` reject concurrent callers instead.

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdaterError};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::{debug, warn};

pub const LOCK_FILE_NAME: &str = ".tidemark-update.lock";

/// Held for the lifetime of one update transaction; released on drop.
#[derive(Debug)]
pub struct UpdateLock {
    path: PathBuf,
}

impl UpdateLock {
    pub fn lock_path(config: &UpdaterConfig) -> PathBuf {
        config.project_root.join(LOCK_FILE_NAME)
    }

    /// Create the lock file with `create_new` (O_EXCL): exactly one caller
    /// wins. Holder pid and acquisition time are recorded for diagnostics.
    pub fn acquire(config: &UpdaterConfig) -> Result<Self> {
        let path = Self::lock_path(config);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(
                    file,
                    "pid={} acquired_at={}",
                    std::process::id(),
                    Utc::now().to_rfc3339()
                );
                debug!("acquired update lock {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&path).unwrap_or_default();
                Err(UpdaterError::Locked(format!(
                    "lock file {} held by {}",
                    path.display(),
                    holder.trim()
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for UpdateLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to release update lock {}: {e}", self.path.display());
        } else {
            debug!("released update lock {}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_at(root: &TempDir) -> UpdaterConfig {
        UpdaterConfig {
            project_root: root.path().to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_acquire_and_release() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);

        let lock = UpdateLock::acquire(&config).unwrap();
        assert!(root.path().join(LOCK_FILE_NAME).exists());

        drop(lock);
        assert!(!root.path().join(LOCK_FILE_NAME).exists());
    }

    #[test]
    fn test_second_caller_rejected() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);

        let _held = UpdateLock::acquire(&config).unwrap();
        let second = UpdateLock::acquire(&config);
        assert!(matches!(second, Err(UpdaterError::Locked(_))));
    }

    #[test]
    fn test_reacquire_after_release() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);

        drop(UpdateLock::acquire(&config).unwrap());
        assert!(UpdateLock::acquire(&config).is_ok());
    }

    #[test]
    fn test_lock_records_holder() {
        let root = TempDir::new().unwrap();
        let config = config_at(&root);

        let _held = UpdateLock::acquire(&config).unwrap();
        let content = fs::read_to_string(root.path().join(LOCK_FILE_NAME)).unwrap();
        assert!(content.contains("pid="));
        assert!(content.contains("acquired_at="));
    }
}
