#![forbid(unsafe_code)]
//! Producer node for RelayChain: mines a block for every relayed transaction

use clap::Parser;
use relaychain::config::{load_config, load_config_from};
use relaychain::node::init_tracing;
use relaychain::producer::{run_producer, ProducerOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Run a RelayChain producer",
    after_help = "Example:\n  relay-producer --coordinator ws://localhost:3000")]
struct Cli {
    /// Path to a config.toml (defaults to ./config.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Coordinator WebSocket URL, e.g. ws://localhost:3000
    #[arg(long)]
    coordinator: Option<String>,
    /// Mine on the event loop instead of a worker thread
    #[arg(long)]
    inline_mining: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(url) = cli.coordinator {
        config.producer.coordinator_url = url;
    }
    if cli.inline_mining {
        config.producer.offload_mining = false;
    }
    config.validate()?;

    init_tracing(&config.logging.filter);

    let options = ProducerOptions {
        offload_mining: config.producer.offload_mining,
    };
    run_producer(&config.producer.coordinator_url, options).await?;
    Ok(())
}
