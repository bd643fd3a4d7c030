// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Error types for the updater crate

use thiserror::Error;

/// Failure taxonomy of the update engine.
///
/// Phase-level errors (`Network`, `Archive`, `Backup`) abort the transaction
/// and trigger a rollback when a backup snapshot exists. Per-file failures
/// during diff application never surface here; the installer accumulates them
/// into counters instead.
#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("backup error: {0}")]
    Backup(String),

    #[error("rollback failed: {0}")]
    Rollback(String),

    #[error("update already in progress: {0}")]
    Locked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
