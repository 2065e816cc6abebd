#![forbid(unsafe_code)]
//! Submit a transaction to a RelayChain coordinator

use clap::Parser;
use colored::*;
use futures::{SinkExt, StreamExt};
use relaychain::protocol::Message;
use relaychain::transaction::Transaction;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

#[derive(Parser)]
#[command(author, version, about = "Send a transaction through the relay",
    after_help = "Example:\n  relay-send alice bob 10 --wait 30")]
struct Cli {
    /// Sender identity
    from: String,
    /// Recipient identity
    to: String,
    /// Amount to transfer
    amount: f64,
    /// Opaque signature produced by a wallet
    #[arg(long)]
    signature: Option<String>,
    /// Coordinator WebSocket URL
    #[arg(long, default_value = "ws://localhost:3000")]
    coordinator: String,
    /// Wait this many seconds for the chain to grow
    #[arg(long, default_value_t = 0)]
    wait: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut transaction = Transaction::new(cli.from, cli.to, cli.amount);
    if let Some(signature) = cli.signature {
        transaction = transaction.with_signature(signature);
    }

    let (ws_stream, _) = connect_async(cli.coordinator.as_str()).await?;
    let (mut sender, mut receiver) = ws_stream.split();

    let payload = Message::Transaction { transaction: transaction.clone() }.to_json()?;
    sender.send(WsMessage::Text(payload)).await?;
    println!(
        "{} {} -> {} ({})",
        "Transaction sent:".bright_green(),
        transaction.from.bright_yellow(),
        transaction.to.bright_yellow(),
        transaction.amount
    );

    if cli.wait > 0 {
        let wait_for_block = async {
            while let Some(Ok(frame)) = receiver.next().await {
                let WsMessage::Text(text) = frame else { continue };
                if let Ok(Message::Blockchain { blockchain }) = Message::parse(&text) {
                    return Some(blockchain);
                }
            }
            None
        };
        match tokio::time::timeout(Duration::from_secs(cli.wait), wait_for_block).await {
            Ok(Some(chain)) => {
                let tip = chain.last().map(|b| b.hash.as_str()).unwrap_or("-");
                println!("{} height {}, tip {}", "Chain updated:".bright_cyan(), chain.len(), tip);
            }
            _ => println!("{}", "No block was accepted before the timeout.".yellow()),
        }
    }

    let _ = sender.close().await;
    Ok(())
}
