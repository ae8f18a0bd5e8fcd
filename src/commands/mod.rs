//! CLI command handlers.

mod cookies;
mod download;
mod info;

pub use cookies::{
    run_cookies_check_command, run_cookies_sync_command, run_cookies_test_command,
    run_cookies_upload_command,
};
pub use download::run_download_command;
pub use info::run_info_command;

use std::sync::Arc;

use anyhow::{Context, Result};
use vidfetch_core::{HttpBackend, Orchestrator, OrchestratorError};

use crate::config::Settings;

/// Builds the orchestrator for the configured backend.
pub(crate) fn build_orchestrator(settings: &Settings) -> Result<Arc<Orchestrator>> {
    let backend = HttpBackend::with_timeouts(
        &settings.backend_url,
        settings.connect_timeout_secs,
        settings.read_timeout_secs,
    )
    .with_context(|| format!("Cannot use backend {}", settings.backend_url))?;
    Ok(Arc::new(Orchestrator::new(
        Arc::new(backend),
        settings.user_id.clone(),
    )))
}

/// Wraps an orchestrator failure with the message and hint the user sees.
pub(crate) fn user_facing(error: OrchestratorError, orchestrator: &Orchestrator) -> anyhow::Error {
    let class = error.fault_class();
    let message = orchestrator
        .snapshot()
        .last_error
        .unwrap_or_else(|| error.to_string());
    anyhow::Error::new(error).context(format!("{message}\nHint: {}", class.suggestion()))
}
