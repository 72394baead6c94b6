//! Rill demo runner
//!
//! Drives the core stream library with timer-driven and synchronous producers
//! and prints every event each pipeline delivers.

mod config;
mod demo;
mod sources;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{Overrides, RillConfig};
use demo::Scenario;

#[derive(Parser)]
#[command(name = "rill", version, about = "Run reactive stream demo pipelines")]
struct Cli {
    /// Config file (defaults to ~/.rill/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a demo scenario
    Demo {
        #[arg(value_enum)]
        scenario: Scenario,

        /// Timer period in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Increment between produced values
        #[arg(long)]
        step: Option<u64>,

        /// Values emitted per producer
        #[arg(long)]
        count: Option<u64>,

        /// Delay before the dispose scenario cancels
        #[arg(long)]
        dispose_after_ms: Option<u64>,

        /// Give up waiting for a terminal event after this long
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = match cli.config {
        Some(path) => path,
        None => RillConfig::default_path().context("Could not determine home directory")?,
    };
    let mut config = RillConfig::load(&path)?;

    let mut overrides = Overrides {
        log_level: cli.log_level,
        ..Default::default()
    };
    if let Command::Demo {
        interval_ms,
        step,
        count,
        dispose_after_ms,
        timeout_ms,
        json,
        ..
    } = &cli.command
    {
        overrides.interval_ms = *interval_ms;
        overrides.step = *step;
        overrides.count = *count;
        overrides.dispose_after_ms = *dispose_after_ms;
        overrides.timeout_ms = *timeout_ms;
        overrides.json = *json;
    }
    config.apply(overrides);

    init_tracing(&config.log_level);
    if !path.exists() {
        debug!("No config at {:?}, using defaults", path);
    }
    config.validate()?;
    debug!("Effective config from {:?}: {:?}", path, config);

    match cli.command {
        Command::Demo { scenario, .. } => demo::run(scenario, &config).await,
        Command::Config => {
            let rendered = toml::to_string_pretty(&config).context("Failed to render config")?;
            print!("{}", rendered);
            Ok(())
        }
    }
}

/// Log to stderr so stdout carries only events
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
