//! `vidfetch cookies ...`: presence check, upload, browser sync, and test.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{info, warn};
use vidfetch_core::{CredentialBridge, CredentialState, NetscapeFileStore};

use super::{build_orchestrator, user_facing};
use crate::config::Settings;

pub async fn run_cookies_check_command(settings: &Settings) -> Result<()> {
    let orchestrator = build_orchestrator(settings)?;
    match orchestrator.startup_check().await {
        CredentialState::Present => {
            info!(user_id = %settings.user_id, "Backend has cookies for this user");
            println!("present");
            Ok(())
        }
        CredentialState::Absent | CredentialState::Unknown => {
            println!("absent");
            bail!(
                "No cookies stored for user `{}`.\nHint: {}",
                settings.user_id,
                vidfetch_core::FaultClass::Auth.suggestion()
            )
        }
    }
}

pub async fn run_cookies_upload_command(settings: &Settings, file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .map_err(|error| anyhow!("Cannot read cookie file '{}': {error}", file.display()))?;
    let orchestrator = build_orchestrator(settings)?;
    orchestrator
        .upload_credentials(&text)
        .await
        .map_err(|error| user_facing(error, &orchestrator))?;
    info!(path = %file.display(), "Cookies uploaded");
    println!("Cookies uploaded");
    Ok(())
}

pub async fn run_cookies_sync_command(
    settings: &Settings,
    from: &Path,
    domain: Option<&str>,
    timeout: Option<Duration>,
) -> Result<()> {
    if !from.is_file() {
        bail!("Browser cookie export not found: {}", from.display());
    }
    let domain = domain.unwrap_or(&settings.cookie_domain);
    let timeout = timeout.unwrap_or(settings.bridge_timeout);

    let orchestrator = build_orchestrator(settings)?;
    let bridge = CredentialBridge::spawn(Arc::new(NetscapeFileStore::new(from)), domain);
    info!(domain, timeout_secs = timeout.as_secs(), "Requesting cookies from browser bridge");

    let result = orchestrator
        .sync_browser_credentials(bridge.page(), timeout)
        .await;
    drop(bridge);

    result.map_err(|error| user_facing(error, &orchestrator))?;
    println!("Cookies synced");
    Ok(())
}

pub async fn run_cookies_test_command(settings: &Settings, url: &str) -> Result<()> {
    let orchestrator = build_orchestrator(settings)?;
    match orchestrator.test_credentials(url).await {
        Ok(title) => {
            info!(title = %title, "Cookie test successful");
            println!("Cookie test successful: {title}");
            Ok(())
        }
        Err(error) => {
            if orchestrator.snapshot().credentials == CredentialState::Absent {
                warn!("Cookies invalid or expired");
            }
            Err(user_facing(error, &orchestrator))
        }
    }
}
