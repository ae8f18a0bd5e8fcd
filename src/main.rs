//! CLI entry point for vidfetch.

use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;
mod config;

use cli::{Cli, Command, CookiesCommand};
use config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();
    let file_config = config::load(cli.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => file_config
                .as_ref()
                .and_then(|c| c.verbosity)
                .map_or("info", config::VerbositySetting::filter),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let settings = Settings::resolve(&cli, file_config.as_ref());
    debug!(?cli, ?settings, "CLI arguments parsed");

    match &cli.command {
        Command::Info { url } => commands::run_info_command(&settings, url).await,
        Command::Download {
            url,
            format,
            output_dir,
        } => {
            let show_progress = !cli.quiet && io::stderr().is_terminal();
            commands::run_download_command(
                &settings,
                url,
                format,
                output_dir.as_deref(),
                show_progress,
            )
            .await
        }
        Command::Cookies { command } => match command {
            CookiesCommand::Check => commands::run_cookies_check_command(&settings).await,
            CookiesCommand::Upload { file } => {
                commands::run_cookies_upload_command(&settings, file).await
            }
            CookiesCommand::Sync {
                from,
                domain,
                timeout_secs,
            } => {
                commands::run_cookies_sync_command(
                    &settings,
                    from,
                    domain.as_deref(),
                    timeout_secs.map(Duration::from_secs),
                )
                .await
            }
            CookiesCommand::Test { url } => commands::run_cookies_test_command(&settings, url).await,
        },
    }
}
