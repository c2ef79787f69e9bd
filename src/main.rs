//! Tickwork - named shell tasks on cron schedules
//!
//! Main entry point for the tickwork CLI.

mod bootstrap;
mod cli;
mod command;

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tickwork_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig};
use tickwork_scheduler::{init_all, CronEngine, TaskManager};

use cli::{Cli, Commands};

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file_layer = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("tickwork")
                .filename_suffix("log")
                .max_log_files(config.max_log_files)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = GUARD.set(guard);
            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    let (json_layer, text_layer) = if config.format == "json" {
        (Some(fmt::layer().json().with_target(true)), None)
    } else {
        (None, Some(fmt::layer().with_target(true).with_ansi(true)))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ConfigLoader::load(&cli.config)?;

    match cli.command {
        None | Some(Commands::Run) => run(config).await,
        Some(Commands::Check) => check(&config),
    }
}

/// Schedule every configured task and run until Ctrl-C.
async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(&config.logging)?;

    let validation = ConfigValidator::validate(&config)?;
    for problem in &validation.errors {
        error!("Invalid configuration: {}", problem);
    }
    let warnings = validation.into_result()?;
    for warning in &warnings {
        warn!("Configuration warning: {}", warning);
    }

    let manager = TaskManager::new(Arc::new(CronEngine::new()));
    if let Err(e) = init_all(&manager, bootstrap::registrar(&config)) {
        manager.stop().await;
        return Err(e.into());
    }

    info!("Tickwork started, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let timeout = Duration::from_secs(config.scheduler.shutdown_timeout_secs);
    if tokio::time::timeout(timeout, manager.stop()).await.is_err() {
        warn!(
            "Tasks still running after {}s, exiting anyway",
            timeout.as_secs()
        );
    }

    info!("Tickwork stopped");
    Ok(())
}

/// Validate the configuration and print the schedule.
fn check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let validation = ConfigValidator::validate(config)?;

    for problem in &validation.errors {
        println!("error: {}", problem);
    }
    for warning in &validation.warnings {
        println!("warning: {}", warning);
    }

    let now = Utc::now();
    println!("{} task(s):", config.tasks.len());
    for task in &config.tasks {
        let next = bootstrap::next_fire_time(task, now)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        println!("  {:<24} {:<24} next: {}", task.name, task.spec, next);
    }

    if validation.is_valid() {
        println!("Configuration OK");
        Ok(())
    } else {
        Err(format!("{} configuration error(s)", validation.errors.len()).into())
    }
}
