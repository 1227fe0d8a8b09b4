//! ETHDKG Node - Main entry point
//!
//! Runs a ceremony between local validators and prints its summary.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ethdkg_node::{LocalCeremony, NodeConfig};

#[derive(Parser)]
#[command(name = "ethdkg-node")]
#[command(about = "Distributed key generation ceremony between local validators", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $ETHDKG_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a ceremony until a round completes
    Run {
        /// Override the number of validators
        #[arg(short = 'n', long)]
        validators: Option<usize>,

        /// Override the block time (milliseconds)
        #[arg(long)]
        block_time_ms: Option<u64>,

        /// Write the JSON summary to this file as well
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Print the effective configuration
    ShowConfig,

    /// Write the default configuration
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ethdkg_node=info,ethdkg_tasks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli
        .config
        .or_else(|| std::env::var_os("ETHDKG_CONFIG").map(PathBuf::from))
        .unwrap_or_else(NodeConfig::default_path);

    match cli.command {
        Commands::Run {
            validators,
            block_time_ms,
            report,
        } => {
            let mut config = NodeConfig::load_or_create(&config_path)?;
            if let Some(count) = validators {
                config.validator_count = count;
            }
            if let Some(block_time_ms) = block_time_ms {
                config.block_time_ms = block_time_ms;
            }

            info!(
                "Starting ETHDKG ceremony v{} with {} validators",
                env!("CARGO_PKG_VERSION"),
                config.validator_count
            );
            let outcome = LocalCeremony::new(config)?.run().await?;
            let summary = serde_json::to_string_pretty(&outcome.summary())?;
            println!("{}", summary);

            if let Some(path) = report {
                std::fs::write(&path, &summary)?;
                info!("Wrote report to {:?}", path);
            }
            if !outcome.complete() {
                warn!("Ceremony did not complete");
                std::process::exit(1);
            }
        }

        Commands::ShowConfig => {
            let config = if config_path.exists() {
                NodeConfig::load(&config_path)?
            } else {
                NodeConfig::default()
            };
            println!("# {}", config_path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        Commands::InitConfig { force } => {
            if config_path.exists() && !force {
                anyhow::bail!("{} already exists (use --force)", config_path.display());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            NodeConfig::default().save(&config_path)?;
            println!("Wrote default configuration to {}", config_path.display());
        }
    }

    Ok(())
}
