// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Release zipball extraction
//!
//! Forge zipballs wrap all content in a single `{repo}-{ref}` top-level
//! directory. After extraction that wrapper is flattened away so the
//! scratch tree mirrors the installation layout.

use crate::error::{Result, UpdaterError};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// Extract every entry of `archive_path` under `dest_dir`.
///
/// Entries that escape the destination (absolute paths, `..` traversal)
/// are skipped rather than written.
pub fn extract(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| UpdaterError::Archive(format!("cannot open archive: {e}")))?;

    fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| UpdaterError::Archive(format!("cannot read archive entry {i}: {e}")))?;

        let Some(rel) = entry.enclosed_name() else {
            debug!("skipping archive entry with unsafe name: {}", entry.name());
            continue;
        };
        let out_path = dest_dir.join(rel);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| UpdaterError::Archive(format!("failed to extract {}: {e}", entry.name())))?;
    }

    Ok(())
}

/// Flatten the zipball's single top-level wrapper directory.
///
/// Anything other than exactly one top-level directory passes through
/// unchanged; guessing which of several entries is "the" wrapper would be
/// worse than leaving the tree as extracted.
pub fn unwrap_top_level(dest_dir: &Path) -> Result<()> {
    let entries = fs::read_dir(dest_dir)?.collect::<io::Result<Vec<_>>>()?;

    if entries.len() != 1 || !entries[0].path().is_dir() {
        debug!(
            "no single top-level wrapper in {} ({} entries), leaving as-is",
            dest_dir.display(),
            entries.len()
        );
        return Ok(());
    }

    let wrapper = entries[0].path();
    debug!("unwrapping top-level directory {}", wrapper.display());

    for child in fs::read_dir(&wrapper)? {
        let child = child?;
        fs::rename(child.path(), dest_dir.join(child.file_name()))?;
    }
    fs::remove_dir(&wrapper)?;

    Ok(())
}
