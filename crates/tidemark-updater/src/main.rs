// Copyright (c) 2026 Tidemark Software
//
// This file is part of Tidemark.
//
// Licensed under the MIT License. See LICENSE in the repository root.
//
// This software is provided "AS IS", without warranty of any kind.

//! Tidemark Updater - CLI entry point
//!
//! Thin wrapper around the engine for operators and for the web layer's
//! process boundary: `check` prints the update-check contract, `update
//! <version>` runs one transaction. Both print pretty JSON on stdout.

use anyhow::Context;
use std::path::Path;
use tidemark_updater::updater::Updater;
use tidemark_updater::{UpdaterError, load_config};
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "updater.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tidemark_updater=info".parse().unwrap()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "check".to_string());

    let config_path = std::env::var("TIDEMARK_UPDATER_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(Path::new(&config_path))?;
    info!(
        "loaded config from {config_path}: {} (current {})",
        config.repo_slug(),
        config.current_version
    );

    let updater = Updater::new(config).map_err(|e| match e {
        UpdaterError::Config(msg) => anyhow::anyhow!(
            "invalid configuration in {config_path}: {msg}"
        ),
        other => anyhow::Error::from(other),
    })?;

    match command.as_str() {
        "check" => {
            let check = updater.check().await;
            println!("{}", serde_json::to_string_pretty(&check)?);
        }
        "update" => {
            let version = args
                .next()
                .context("usage: tidemark-updater update <version>")?;
            let outcome = updater.perform_update(&version).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            if !outcome.success {
                std::process::exit(1);
            }
        }
        other => {
            anyhow::bail!("unknown command {other:?}, expected \"check\" or \"update <version>\"");
        }
    }

    Ok(())
}
