// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Protected-path classification
//!
//! Decides whether a relative, forward-slash-normalized path is protected.
//! A protected path is never deleted and never sourced from release content.

use crate::error::{Result, UpdaterError};
use regex::Regex;

/// One configured protection rule.
#[derive(Debug, Clone)]
pub enum ProtectedRule {
    /// Exact relative path match.
    Exact(String),
    /// Directory prefix match; the stored string keeps its trailing "/".
    PrefixDir(String),
    /// Anchored glob where "*" matches any substring.
    Glob { pattern: String, matcher: Regex },
}

impl ProtectedRule {
    /// Parse a configured rule string: trailing "/" marks a directory
    /// prefix, "*" marks a glob, anything else is an exact path.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(UpdaterError::Config(
                "empty protected path rule".to_string(),
            ));
        }
        if raw.contains('*') {
            let matcher = compile_glob(raw)?;
            return Ok(Self::Glob {
                pattern: raw.to_string(),
                matcher,
            });
        }
        if raw.ends_with('/') {
            return Ok(Self::PrefixDir(raw.to_string()));
        }
        Ok(Self::Exact(raw.to_string()))
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        match self {
            Self::Exact(path) => rel_path == path,
            Self::PrefixDir(prefix) => rel_path.starts_with(prefix.as_str()),
            Self::Glob { matcher, .. } => matcher.is_match(rel_path),
        }
    }
}

/// Escape every regex metacharacter except "*", then widen "*" to ".*"
/// and anchor the whole pattern.
fn compile_glob(pattern: &str) -> Result<Regex> {
    let translated: Vec<String> = pattern.split('*').map(regex::escape).collect();
    let anchored = format!("^{}$", translated.join(".*"));
    Regex::new(&anchored)
        .map_err(|e| UpdaterError::Config(format!("bad glob rule {pattern:?}: {e}")))
}

/// OR over the configured rules, first match short-circuits. Order of the
/// rules never changes the answer.
#[derive(Debug, Clone)]
pub struct PathClassifier {
    rules: Vec<ProtectedRule>,
}

impl PathClassifier {
    pub fn from_patterns(patterns: &[String]) -> Result<Self> {
        let rules = patterns
            .iter()
            .map(|p| ProtectedRule::parse(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_protected(&self, rel_path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(rel_path))
    }

    pub fn rules(&self) -> &[ProtectedRule] {
        &self.rules
    }
}
