//! Perch - a live system stats dashboard for your terminal
//!
//! Samples CPU, memory, GPU, battery and the wall clock on a fixed cadence
//! and renders the latest snapshot as a set of cards. Hardware the machine
//! lacks degrades to N/A instead of failing.

mod config;
mod core;
mod integrations;
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::core::app::App;
use crate::core::engine::SamplingEngine;
use crate::core::state::SnapshotStore;

#[derive(Parser)]
#[command(name = "perch")]
#[command(author = "Perch Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Live system stats for your terminal", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the system without the dashboard and print the result
    Snapshot {
        /// Number of sampling cycles to run before printing
        #[arg(short = 'n', long, default_value = "2")]
        cycles: u32,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

fn setup_logging(verbosity: u8) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // The dashboard owns the terminal, so logs go to a file
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("perch")
        .join("logs");

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "perch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the guard alive for the duration of the program
    let _logging_guard = setup_logging(cli.verbose)?;

    let command = match cli.command {
        Some(Commands::Init { force }) => {
            let path = match cli.config {
                Some(path) => path,
                None => Config::default_path().context("no config directory on this platform")?,
            };
            return config::init_config(&path, force);
        }
        Some(Commands::Snapshot { cycles, json }) => Some((cycles, json)),
        None => None,
    };

    let config_path = cli.config.or_else(|| {
        let default_config = Config::default_path()?;
        default_config.exists().then_some(default_config)
    });

    let config = match config_path {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    tracing::info!(?config, "configuration loaded");

    // A wedged sample gets one more timeout's worth of time, then exit proceeds
    let grace = config.sampling.adapter_timeout();
    crate::core::runtime::block_on_bounded(
        async move {
            match command {
                Some((cycles, json)) => print_snapshot(config, cycles, json).await,
                None => run_dashboard(config).await,
            }
        },
        grace,
    )?
}

async fn run_dashboard(config: Config) -> Result<()> {
    let store = SnapshotStore::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = SamplingEngine::with_system_adapters(config.sampling.clone(), store.clone());
    let sampler = engine.spawn(shutdown_rx);

    let result = match App::new(store, config) {
        Ok(mut app) => app.run().await,
        Err(e) => Err(e),
    };

    let _ = shutdown_tx.send(true);
    if let Err(e) = sampler.await {
        tracing::error!("Sampling task failed: {}", e);
    }

    result
}

/// CPU usage is a delta between readings, so one cycle right after startup
/// covers almost no time.
async fn print_snapshot(config: Config, cycles: u32, json: bool) -> Result<()> {
    let interval = config.sampling.refresh_interval();
    let mut engine = SamplingEngine::with_system_adapters(config.sampling, SnapshotStore::new());

    let mut snapshot = engine.run_cycle().await;
    for _ in 1..cycles.max(1) {
        tokio::time::sleep(interval).await;
        snapshot = engine.run_cycle().await;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&*snapshot)?);
    } else {
        println!("{}", ui::format::report(&snapshot));
    }
    Ok(())
}
