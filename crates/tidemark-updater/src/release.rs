// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Release feed checking module
//!
//! Fetches the forge's release list and selects the newest eligible entry.
//! Checking fails soft: every error degrades into `available = false` with
//! a populated `error` field, never a propagated failure.

use crate::config::UpdaterConfig;
use crate::error::{Result, UpdaterError};
use crate::version::{is_newer, version_from_tag};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub(crate) const USER_AGENT: &str = "tidemark-updater/0.4";
const ACCEPT_MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const NO_VALID_RELEASE: &str = "No valid release found";

/// One entry of the remote release feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseCandidate {
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub body: String,
}

/// The check contract handed to the external HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCheck {
    pub available: bool,
    pub current_version: String,
    pub latest_version: Option<String>,
    pub release_url: Option<String>,
    pub release_notes: Option<String>,
    pub error: Option<String>,
}

impl UpdateCheck {
    fn unavailable(current_version: String, error: impl Into<String>) -> Self {
        Self {
            available: false,
            current_version,
            latest_version: None,
            release_url: None,
            release_notes: None,
            error: Some(error.into()),
        }
    }
}

/// Check the remote feed for a newer release. Never fails outward.
pub async fn check_for_updates(config: &UpdaterConfig) -> UpdateCheck {
    let current = config.current_version.clone();

    let feed = match fetch_release_feed(config).await {
        Ok(feed) => feed,
        Err(e) => return UpdateCheck::unavailable(current, e.to_string()),
    };

    let Some(release) = select_release(&feed) else {
        return UpdateCheck::unavailable(current, NO_VALID_RELEASE);
    };

    let latest = version_from_tag(&release.tag_name).to_string();
    debug!("latest eligible release: {latest} (current: {current})");

    match is_newer(&current, &latest) {
        Ok(available) => UpdateCheck {
            available,
            current_version: current,
            latest_version: Some(latest),
            release_url: Some(release.html_url.clone()),
            release_notes: Some(release.body.clone()),
            error: None,
        },
        Err(e) => UpdateCheck::unavailable(current, e.to_string()),
    }
}

/// Feed order is assumed newest-first; the first non-draft, non-prerelease,
/// tagged entry wins. The engine does not re-sort.
pub fn select_release(feed: &[ReleaseCandidate]) -> Option<&ReleaseCandidate> {
    feed.iter()
        .find(|r| !r.draft && !r.prerelease && !r.tag_name.is_empty())
}

async fn fetch_release_feed(config: &UpdaterConfig) -> Result<Vec<ReleaseCandidate>> {
    let url = format!(
        "{}/repos/{}/releases",
        config.api_base(),
        config.repo_slug()
    );

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| UpdaterError::Network(format!("Failed to build HTTP client: {e}")))?;

    let response = client
        .get(&url)
        .header(reqwest::header::ACCEPT, ACCEPT_MEDIA_TYPE)
        .send()
        .await
        .map_err(|e| UpdaterError::Network(format!("Release feed request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        return Err(UpdaterError::Network(format!(
            "Release feed error {status}: {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| UpdaterError::Network(format!("Failed to parse release feed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;
    use serde_json::json;

    fn test_config(api_base: String) -> UpdaterConfig {
        UpdaterConfig {
            owner: "tidemark-app".to_string(),
            repo: "tidemark".to_string(),
            current_version: "1.4.2".to_string(),
            api_base_url: Some(api_base),
            ..Default::default()
        }
    }

    fn entry(tag: &str, draft: bool, prerelease: bool) -> serde_json::Value {
        json!({
            "tag_name": tag,
            "draft": draft,
            "prerelease": prerelease,
            "html_url": format!("https://example.test/releases/{tag}"),
            "body": format!("notes for {tag}"),
        })
    }

    #[tokio::test]
    async fn test_check_update_available() {
        let mut server = Server::new_async().await;
        let feed = json!([entry("v1.5.0", false, false), entry("v1.4.2", false, false)]);

        let mock = server
            .mock("GET", "/repos/tidemark-app/tidemark/releases")
            .match_header("accept", ACCEPT_MEDIA_TYPE)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(feed.to_string())
            .create_async()
            .await;

        let check = check_for_updates(&test_config(server.url())).await;

        assert!(check.available);
        assert_eq!(check.current_version, "1.4.2");
        assert_eq!(check.latest_version.as_deref(), Some("1.5.0"));
        assert_eq!(
            check.release_url.as_deref(),
            Some("https://example.test/releases/v1.5.0")
        );
        assert_eq!(check.release_notes.as_deref(), Some("notes for v1.5.0"));
        assert!(check.error.is_none());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_check_already_current() {
        let mut server = Server::new_async().await;
        let feed = json!([entry("v1.4.2", false, false)]);

        let _mock = server
            .mock("GET", "/repos/tidemark-app/tidemark/releases")
            .with_status(200)
            .with_body(feed.to_string())
            .create_async()
            .await;

        let check = check_for_updates(&test_config(server.url())).await;
        assert!(!check.available);
        assert!(check.error.is_none());
        assert_eq!(check.latest_version.as_deref(), Some("1.4.2"));
    }

    #[tokio::test]
    async fn test_check_skips_drafts_and_prereleases() {
        let mut server = Server::new_async().await;
        // Feed order wins: the draft and prerelease are skipped, the first
        // eligible entry is taken even though a newer prerelease exists.
        let feed = json!([
            entry("v2.0.0", true, false),
            entry("v1.9.0", false, true),
            entry("v1.5.0", false, false),
            entry("v1.6.0", false, false),
        ]);

        let _mock = server
            .mock("GET", "/repos/tidemark-app/tidemark/releases")
            .with_status(200)
            .with_body(feed.to_string())
            .create_async()
            .await;

        let check = check_for_updates(&test_config(server.url())).await;
        assert_eq!(check.latest_version.as_deref(), Some("1.5.0"));
    }

    #[tokio::test]
    async fn test_check_only_drafts_and_prereleases() {
        let mut server = Server::new_async().await;
        let feed = json!([entry("v2.0.0", true, false), entry("v1.9.0", false, true)]);

        let _mock = server
            .mock("GET", "/repos/tidemark-app/tidemark/releases")
            .with_status(200)
            .with_body(feed.to_string())
            .create_async()
            .await;

        let check = check_for_updates(&test_config(server.url())).await;
        assert!(!check.available);
        assert_eq!(check.error.as_deref(), Some("No valid release found"));
    }

    #[tokio::test]
    async fn test_check_untagged_entries_skipped() {
        let mut server = Server::new_async().await;
        let feed = json!([entry("", false, false), entry("v1.5.0", false, false)]);

        let _mock = server
            .mock("GET", "/repos/tidemark-app/tidemark/releases")
            .with_status(200)
            .with_body(feed.to_string())
            .create_async()
            .await;

        let check = check_for_updates(&test_config(server.url())).await;
        assert_eq!(check.latest_version.as_deref(), Some("1.5.0"));
    }

    #[tokio::test]
    async fn test_check_fails_soft_on_server_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/tidemark-app/tidemark/releases")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let check = check_for_updates(&test_config(server.url())).await;
        assert!(!check.available);
        assert!(check.error.as_deref().unwrap_or_default().contains("500"));
    }

    #[tokio::test]
    async fn test_check_fails_soft_on_malformed_feed() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/tidemark-app/tidemark/releases")
            .with_status(200)
            .with_body("{not json")
            .create_async()
            .await;

        let check = check_for_updates(&test_config(server.url())).await;
        assert!(!check.available);
        assert!(check.error.is_some());
    }

    #[tokio::test]
    async fn test_check_fails_soft_on_malformed_remote_version() {
        let mut server = Server::new_async().await;
        let feed = json!([entry("nightly-build", false, false)]);

        let _mock = server
            .mock("GET", "/repos/tidemark-app/tidemark/releases")
            .with_status(200)
            .with_body(feed.to_string())
            .create_async()
            .await;

        let check = check_for_updates(&test_config(server.url())).await;
        assert!(!check.available);
        assert!(check.error.is_some());
    }
}
