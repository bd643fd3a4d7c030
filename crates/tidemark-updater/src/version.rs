// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Version parsing and comparison module

use crate::error::{Result, UpdaterError};
use std::cmp::Ordering;

/// Parse semver-like version strings (e.g., "1.4.2", "v1.4.2").
///
/// Fields must be plain ASCII digits; anything else (including signs or
/// whitespace that `u32::from_str` would tolerate) is rejected.
pub fn parse_version(s: &str) -> Result<(u32, u32, u32)> {
    let s = s.trim_start_matches('v').trim_start_matches('V');
    let parts: Vec<&str> = s.split('.').collect();

    if parts.len() != 3 {
        return Err(UpdaterError::Validation(format!(
            "Invalid version format: {s}, expected X.Y.Z"
        )));
    }

    let mut fields = [0u32; 3];
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(UpdaterError::Validation(format!(
                "Invalid version field: {part:?} in {s}"
            )));
        }
        fields[i] = part
            .parse::<u32>()
            .map_err(|_| UpdaterError::Validation(format!("Version field out of range: {part}")))?;
    }

    Ok((fields[0], fields[1], fields[2]))
}

/// Total order over well-formed X.Y.Z strings.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering> {
    Ok(parse_version(a)?.cmp(&parse_version(b)?))
}

/// Returns true if `remote` is newer than `local`.
pub fn is_newer(local: &str, remote: &str) -> Result<bool> {
    Ok(compare_versions(local, remote)? == Ordering::Less)
}

/// Extract version from a release tag (strips leading "v").
pub fn version_from_tag(tag: &str) -> &str {
    tag.trim_start_matches('v').trim_start_matches('V')
}
