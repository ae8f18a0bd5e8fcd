//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Download videos through a vidfetch extraction backend.
///
/// Analyze a URL, pick a format, and save the finished file. Restricted
/// videos need browser session cookies; see `vidfetch cookies --help`.
#[derive(Parser, Debug)]
#[command(name = "vidfetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Backend base URL (default: http://127.0.0.1:5000)
    #[arg(long, global = true, value_name = "URL")]
    pub backend_url: Option<String>,

    /// Identity the backend stores cookies under (default: default_user)
    #[arg(long, global = true, value_name = "ID")]
    pub user_id: Option<String>,

    /// Config file path (default: $XDG_CONFIG_HOME/vidfetch/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show title, duration, and available formats for a video
    Info {
        /// Video page URL
        url: String,
    },

    /// Download a video in the chosen format
    Download {
        /// Video page URL
        url: String,

        /// Format id as listed by `vidfetch info`
        #[arg(short, long, value_name = "ID")]
        format: String,

        /// Directory to write the file to
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Manage the session cookies stored by the backend
    Cookies {
        #[command(subcommand)]
        command: CookiesCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum CookiesCommand {
    /// Check whether the backend holds cookies for this user
    Check,

    /// Upload a Netscape cookies.txt file
    Upload {
        /// Path to cookies.txt
        file: PathBuf,
    },

    /// Harvest cookies through the browser bridge and upload them
    Sync {
        /// Browser cookie export the bridge reads from
        #[arg(long, value_name = "FILE")]
        from: PathBuf,

        /// Cookie domain to harvest (default: .youtube.com)
        #[arg(long, value_name = "DOMAIN")]
        domain: Option<String>,

        /// Seconds to wait for the bridge (1-300)
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..=300))]
        timeout_secs: Option<u64>,
    },

    /// Verify the stored cookies against a restricted video
    Test {
        /// Restricted video URL
        url: String,
    },
}
