#![forbid(unsafe_code)]
//! Coordinator node for RelayChain

use clap::Parser;
use relaychain::config::{load_config, load_config_from};
use relaychain::node::{init_tracing, Node};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about = "Run the RelayChain coordinator",
    after_help = "Example:\n  relay-coordinator --port 3000 --api-port 3001")]
struct Cli {
    /// Path to a config.toml (defaults to ./config.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Interface to bind
    #[arg(long)]
    host: Option<String>,
    /// WebSocket relay port
    #[arg(long)]
    port: Option<u16>,
    /// Status API port
    #[arg(long)]
    api_port: Option<u16>,
    /// Do not start the status API
    #[arg(long)]
    no_api: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(host) = cli.host {
        config.coordinator.host = host;
    }
    if let Some(port) = cli.port {
        config.coordinator.ws_port = port;
    }
    if let Some(port) = cli.api_port {
        config.coordinator.api_port = port;
    }
    if cli.no_api {
        config.coordinator.api_enabled = false;
    }
    config.validate()?;

    init_tracing(&config.logging.filter);

    let node = Arc::new(Node::init(config));
    node.start().await?;
    Ok(())
}
