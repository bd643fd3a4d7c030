// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Tidemark Updater - transactional self-update engine
//!
//! Resolves newer releases from a remote feed, downloads the release
//! zipball with URL-shape and TLS fallbacks, and replaces the installed
//! file tree while protected paths (configuration, uploads, logs, local
//! databases) are snapshotted first and always win the final state. Any
//! phase failure after the snapshot rolls the live tree back.
//!
//! The HTTP layer in front of this engine consumes the serializable
//! [`release::UpdateCheck`] and [`updater::UpdateOutcome`] contracts.

pub mod archive;
pub mod backup;
pub mod config;
pub mod diff;
pub mod error;
pub mod fetch;
pub mod install;
pub mod lock;
pub mod paths;
pub mod release;
pub mod updater;
pub mod version;

pub use config::{UpdaterConfig, load_config, save_config};
pub use error::{Result, UpdaterError};
pub use release::UpdateCheck;
pub use updater::{UpdateOutcome, Updater};
pub use version::{compare_versions, is_newer, parse_version, version_from_tag};
