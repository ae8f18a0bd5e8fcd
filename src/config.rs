//! Configuration file loading and CLI/file/default merging.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use crate::cli::Cli;

/// Backend used when neither flag nor file set one.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
/// Identity used when neither flag nor file set one.
pub const DEFAULT_USER_ID: &str = "default_user";
/// Domain whose cookies are harvested by `cookies sync`.
pub const DEFAULT_COOKIE_DOMAIN: &str = ".youtube.com";
/// How long `cookies sync` waits for the browser bridge.
pub const DEFAULT_BRIDGE_TIMEOUT_SECS: u64 = 10;

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Backend base URL.
    pub backend_url: Option<String>,
    /// Identity the backend stores cookies under.
    pub user_id: Option<String>,
    /// Directory downloads are written to.
    pub output_dir: Option<PathBuf>,
    /// Cookie domain harvested by the bridge.
    pub cookie_domain: Option<String>,
    /// Bridge timeout in seconds.
    pub bridge_timeout_secs: Option<u64>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = self.backend_url.as_deref()
            && url.trim().is_empty()
        {
            bail!("Invalid config value for `backend_url`: must not be empty");
        }
        if let Some(user_id) = self.user_id.as_deref()
            && user_id.trim().is_empty()
        {
            bail!("Invalid config value for `user_id`: must not be empty");
        }
        if let Some(timeout) = self.bridge_timeout_secs
            && !(1..=300).contains(&timeout)
        {
            bail!(
                "Invalid config value for `bridge_timeout_secs`: {timeout}. Expected range: 1..=300"
            );
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log filter used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn filter(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose | Self::Debug => "debug",
            Self::Quiet => "error",
        }
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/vidfetch/config.toml`
/// 2. `$HOME/.config/vidfetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("vidfetch")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("vidfetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional.
pub fn load(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return load_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse_file_config(&raw)
        .with_context(|| format!("Failed to load config file {}", path.display()))?;
    debug!(path = %path.display(), "config file loaded");
    Ok(config)
}

fn parse_file_config(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw).context("Invalid TOML")?;
    config.validate()?;
    Ok(config)
}

/// Effective settings after merging flags, file, and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
    pub user_id: String,
    pub output_dir: PathBuf,
    pub cookie_domain: String,
    pub bridge_timeout: Duration,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Settings {
    /// CLI flags override file values, which override defaults.
    #[must_use]
    pub fn resolve(cli: &Cli, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();
        Self {
            backend_url: cli
                .backend_url
                .clone()
                .or(file.backend_url)
                .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string()),
            user_id: cli
                .user_id
                .clone()
                .or(file.user_id)
                .unwrap_or_else(|| DEFAULT_USER_ID.to_string()),
            output_dir: file.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            cookie_domain: file
                .cookie_domain
                .unwrap_or_else(|| DEFAULT_COOKIE_DOMAIN.to_string()),
            bridge_timeout: Duration::from_secs(
                file.bridge_timeout_secs
                    .unwrap_or(DEFAULT_BRIDGE_TIMEOUT_SECS),
            ),
            connect_timeout_secs: file
                .connect_timeout_secs
                .unwrap_or(vidfetch_core::remote::CONNECT_TIMEOUT_SECS),
            read_timeout_secs: file
                .read_timeout_secs
                .unwrap_or(vidfetch_core::remote::READ_TIMEOUT_SECS),
        }
    }
}
