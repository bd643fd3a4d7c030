// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Configuration module for the updater
//!
//! The engine never holds global state: one immutable [`UpdaterConfig`] value
//! is built at startup and passed by reference into every operation.

use crate::error::{Result, UpdaterError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_API_BASE: &str = "https://api.github.com";
const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com";

fn default_protected_paths() -> Vec<String> {
    vec![
        "config/".to_string(),
        "uploads/".to_string(),
        "logs/".to_string(),
        "data/*.db".to_string(),
    ]
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("tidemark-updater")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Root of the live installation tree.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Release feed owner (e.g. "tidemark-app").
    #[serde(default)]
    pub owner: String,

    /// Release feed repository (e.g. "tidemark").
    #[serde(default)]
    pub repo: String,

    /// Currently installed version (semver string).
    #[serde(default)]
    pub current_version: String,

    /// Paths the installer must never delete or overwrite from release
    /// content. Trailing "/" marks a directory prefix, "*" marks a glob,
    /// anything else is an exact relative path.
    #[serde(default = "default_protected_paths")]
    pub protected_paths: Vec<String>,

    /// Where backup snapshots are created. Retained after every
    /// transaction as the rollback audit trail.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Scratch space for downloaded archives and extraction. Always
    /// cleaned at transaction end.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Debug flag: skip TLS verification outright on downloads.
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// Custom API base URL for testing (overrides the default forge API).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Custom download base URL for testing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_base_url: Option<String>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            project_root: default_project_root(),
            owner: String::new(),
            repo: String::new(),
            current_version: String::new(),
            protected_paths: default_protected_paths(),
            backup_dir: default_backup_dir(),
            scratch_dir: default_scratch_dir(),
            insecure_skip_tls_verify: false,
            api_base_url: None,
            download_base_url: None,
        }
    }
}

impl UpdaterConfig {
    /// Reject configurations missing the metadata every operation needs.
    /// Fatal before any network or filesystem effect.
    pub fn validate(&self) -> Result<()> {
        if self.owner.is_empty() {
            return Err(UpdaterError::Config("owner is not set".to_string()));
        }
        if self.repo.is_empty() {
            return Err(UpdaterError::Config("repo is not set".to_string()));
        }
        if self.current_version.is_empty() {
            return Err(UpdaterError::Config(
                "current_version is not set".to_string(),
            ));
        }
        crate::version::parse_version(&self.current_version).map_err(|e| {
            UpdaterError::Config(format!("current_version is malformed: {e}"))
        })?;
        Ok(())
    }

    pub fn api_base(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    pub fn download_base(&self) -> &str {
        self.download_base_url
            .as_deref()
            .unwrap_or(DEFAULT_DOWNLOAD_BASE)
    }

    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

pub fn load_config(path: &Path) -> Result<UpdaterConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| UpdaterError::Config(format!("Failed to parse config: {e}")))
    } else {
        // Create with defaults
        let config = UpdaterConfig::default();
        save_config(&config, path)?;
        Ok(config)
    }
}

pub fn save_config(config: &UpdaterConfig, path: &Path) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let content = serde_json::to_string_pretty(config)?;

    // Atomic write
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}
