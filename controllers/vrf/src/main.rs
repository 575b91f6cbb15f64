//! NDFC VRF Controller
//!
//! Reconciles the VRFs of one NDFC fabric against a YAML playbook:
//! - merged: create and update the listed VRFs and attachments
//! - replaced: also detach switches the playbook omits
//! - overridden: also delete VRFs the playbook omits
//! - deleted: remove the listed VRFs, or all of them
//! - query: report controller state without changing it
//!
//! The run result is printed to stdout as JSON.

mod error;
mod reconciler;

#[cfg(test)]
mod test_utils;

use anyhow::Context;
use ndfc_client::{ApiPaths, ApiVersion, NdfcClient};
use reconciler::inventory::Inventory;
use reconciler::{Reconciler, ReconcilerSettings};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vrf_playbook::Playbook;

/// Startup configuration read from the environment
#[derive(Debug)]
struct Config {
    url: String,
    token: String,
    api_version: ApiVersion,
    playbook: String,
    check_mode: bool,
    delete_wait_timeout: u64,
    accept_invalid_certs: bool,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        let url = env::var("NDFC_URL").unwrap_or_else(|_| "https://ndfc.local".to_string());
        let token = env::var("NDFC_TOKEN").context("NDFC_TOKEN environment variable is required")?;
        let api_version = match env::var("NDFC_API_VERSION") {
            Ok(raw) => raw.parse::<ApiVersion>().context("NDFC_API_VERSION must be 11 or 12")?,
            Err(_) => ApiVersion::default(),
        };
        let playbook = env::var("NDFC_PLAYBOOK").context("NDFC_PLAYBOOK environment variable is required")?;
        let check_mode = env_flag("NDFC_CHECK_MODE")?;
        let delete_wait_timeout = match env::var("NDFC_DELETE_WAIT_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .context("NDFC_DELETE_WAIT_TIMEOUT_SECS must be a number of seconds")?,
            Err(_) => ReconcilerSettings::default().delete_wait_timeout,
        };
        let accept_invalid_certs = env_flag("NDFC_INSECURE")?;

        Ok(Self {
            url,
            token,
            api_version,
            playbook,
            check_mode,
            delete_wait_timeout,
            accept_invalid_certs,
        })
    }
}

fn env_flag(name: &str) -> anyhow::Result<bool> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" | "" => Ok(false),
            other => anyhow::bail!("{name} must be true or false, got {other}"),
        },
        Err(_) => Ok(false),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    info!("Starting NDFC VRF Controller");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  NDFC URL: {}", config.url);
    info!("  API version: {:?}", config.api_version);
    info!("  Playbook: {}", config.playbook);
    info!("  Check mode: {}", config.check_mode);

    let playbook = Playbook::load(&config.playbook)
        .with_context(|| format!("Failed to load playbook {}", config.playbook))?;
    playbook
        .validate()
        .with_context(|| format!("Invalid playbook {}", config.playbook))?;

    let client = NdfcClient::new(config.url.clone(), config.token.clone(), config.accept_invalid_certs)
        .context("Failed to create NDFC client")?;
    if config.api_version == ApiVersion::V12 {
        client
            .validate_token()
            .await
            .with_context(|| format!("Unable to reach NDFC at {}", config.url))?;
    }
    let paths = ApiPaths::for_version(config.api_version);

    let inventory = Inventory::fetch(&client, &paths, &playbook.fabric)
        .await
        .with_context(|| format!("Failed to read inventory of fabric {}", playbook.fabric))?;

    let settings = ReconcilerSettings {
        check_mode: config.check_mode,
        delete_wait_timeout: config.delete_wait_timeout,
        ..ReconcilerSettings::default()
    };
    let reconciler = Reconciler::new(client, paths, playbook.fabric.clone(), inventory, settings);

    match reconciler.run(&playbook).await {
        Ok(result) => {
            let rendered = serde_json::to_string_pretty(&result).context("Failed to render run result")?;
            println!("{rendered}");
            info!("Run finished, changed={}", result.changed);
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}
