// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Release archive downloader with URL-shape and TLS fallback
//!
//! Forges have published zipballs under two path shapes over the years, and
//! tags may or may not carry a leading "v". The fetcher holds an ordered
//! strategy list (URL candidate x TLS mode) and walks it until one attempt
//! yields a non-empty body. A 404 means "wrong shape, try the next one"; a
//! TLS failure unlocks one retry of the same URL without verification,
//! loudly.

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdaterError};
use crate::release::USER_AGENT;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TlsMode {
    Verified,
    Insecure,
}

#[derive(Debug, Clone)]
struct FetchStrategy {
    url: String,
    tls: TlsMode,
}

enum AttemptFailure {
    /// 404-class response: wrong URL shape, move to the next candidate.
    NotFound(u16),
    /// TLS-specific transport failure: retry this URL without verification.
    Tls(String),
    /// Anything else: log and move on.
    Other(String),
}

/// The four candidate zipball URLs, in fixed order.
fn candidate_urls(config: &UpdaterConfig, version: &str) -> Vec<String> {
    let base = format!("{}/{}", config.download_base(), config.repo_slug());
    vec![
        format!("{base}/archive/refs/tags/v{version}.zip"),
        format!("{base}/archive/refs/tags/{version}.zip"),
        format!("{base}/archive/v{version}.zip"),
        format!("{base}/archive/{version}.zip"),
    ]
}

/// URL candidates crossed with TLS modes. In insecure debug mode every
/// attempt skips verification outright; otherwise each candidate gets a
/// verified attempt followed by an insecure slot that only activates after
/// a TLS failure on that same URL.
fn build_strategies(config: &UpdaterConfig, version: &str) -> Vec<FetchStrategy> {
    let mut strategies = Vec::new();
    for url in candidate_urls(config, version) {
        if config.insecure_skip_tls_verify {
            strategies.push(FetchStrategy {
                url,
                tls: TlsMode::Insecure,
            });
        } else {
            strategies.push(FetchStrategy {
                url: url.clone(),
                tls: TlsMode::Verified,
            });
            strategies.push(FetchStrategy {
                url,
                tls: TlsMode::Insecure,
            });
        }
    }
    strategies
}

/// Download the release archive for `version` into the scratch directory.
///
/// Returns the scratch path of the persisted archive. Exhausting every
/// strategy is a terminal network error naming all attempted URLs;
/// persistence failure (disk full) is terminal too.
pub async fn download(config: &UpdaterConfig, version: &str) -> Result<PathBuf> {
    let strategies = build_strategies(config, version);
    let mut attempted: Vec<String> = Vec::new();
    let mut tls_failed: HashSet<String> = HashSet::new();

    for strategy in &strategies {
        if strategy.tls == TlsMode::Insecure
            && !config.insecure_skip_tls_verify
            && !tls_failed.contains(&strategy.url)
        {
            // Insecure slot stays dormant unless the verified attempt on
            // this URL died on TLS.
            continue;
        }

        record_attempt(&mut attempted, &strategy.url);
        match attempt_fetch(strategy).await {
            Ok(body) if !body.is_empty() => {
                info!(
                    "downloaded {} bytes from {} (tls: {:?})",
                    body.len(),
                    strategy.url,
                    strategy.tls
                );
                return persist(config, version, &body);
            }
            Ok(_) => {
                debug!("empty body from {}, trying next candidate", strategy.url);
            }
            Err(AttemptFailure::NotFound(status)) => {
                debug!(
                    "candidate {} answered {status}, trying next shape",
                    strategy.url
                );
            }
            Err(AttemptFailure::Tls(msg)) => {
                warn!(
                    "TLS verification failed for {}: {msg}; retrying once without verification",
                    strategy.url
                );
                tls_failed.insert(strategy.url.clone());
            }
            Err(AttemptFailure::Other(msg)) => {
                warn!("download attempt {} failed: {msg}", strategy.url);
            }
        }
    }

    Err(UpdaterError::Network(format!(
        "failed to download release {version}, attempted URLs: {}",
        attempted.join(", ")
    )))
}

/// A URL is tried at most twice (verified, then insecure after a TLS
/// failure); the exhaustion error should still name it once.
fn record_attempt(attempted: &mut Vec<String>, url: &str) {
    if !attempted.iter().any(|u| u == url) {
        attempted.push(url.to_string());
    }
}

async fn attempt_fetch(strategy: &FetchStrategy) -> std::result::Result<Vec<u8>, AttemptFailure> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(strategy.tls == TlsMode::Insecure)
        .build()
        .map_err(|e| AttemptFailure::Other(format!("failed to build HTTP client: {e}")))?;

    let response = client.get(&strategy.url).send().await.map_err(|e| {
        if is_tls_error(&e) {
            AttemptFailure::Tls(e.to_string())
        } else {
            AttemptFailure::Other(e.to_string())
        }
    })?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
        return Err(AttemptFailure::NotFound(status.as_u16()));
    }
    if !status.is_success() {
        return Err(AttemptFailure::Other(format!("HTTP status {status}")));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| AttemptFailure::Other(format!("failed to read body: {e}")))?;
    Ok(body.to_vec())
}

fn is_tls_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        let msg = e.to_string().to_lowercase();
        if msg.contains("certificate") || msg.contains("tls") || msg.contains("handshake") {
            return true;
        }
        source = e.source();
    }
    false
}

fn persist(config: &UpdaterConfig, version: &str, body: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(&config.scratch_dir)?;
    let path = config
        .scratch_dir
        .join(format!("{}-{}.zip", config.repo, version));
    fs::write(&path, body)?;
    Ok(path)
}
