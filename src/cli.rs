//! CLI definitions for tickwork.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tickwork CLI.
#[derive(Parser)]
#[command(name = "tickwork")]
#[command(about = "Run named shell tasks on cron schedules")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        env = "TICKWORK_CONFIG",
        default_value = "config/tickwork.toml",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the configured tasks in the foreground (default)
    Run,

    /// Validate the configuration and show when each task runs next
    Check,
}
