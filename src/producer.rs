//! Producer: keeps a cached copy of the coordinator's chain and mines a block
//! for every relayed transaction.
//!
//! Inbound messages are processed strictly one at a time. While a block is
//! being mined nothing else is read from the coordinator, and a competing
//! block arriving meanwhile does not interrupt the search.

use crate::blockchain::{Block, BlockTemplate, GENESIS_PREVIOUS_HASH};
use crate::error::ChainError;
use crate::miner::{mine_block, MiningTask};
use crate::protocol::Message;
use crate::transaction::Transaction;
use futures::{SinkExt, StreamExt};
use std::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, error, info, warn};

/// A producer's view of the chain.
#[derive(Debug, Clone, Default)]
pub struct Producer {
    chain: Vec<Block>,
    last_miner_count: Option<usize>,
}

impl Producer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached chain, as last received from the coordinator.
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn last_miner_count(&self) -> Option<usize> {
        self.last_miner_count
    }

    /// Template for the next block, built on the cached tip.
    pub fn next_template(&self, transactions: Vec<Transaction>) -> BlockTemplate {
        let previous_hash = self
            .chain
            .last()
            .map(|b| b.hash.clone())
            .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string());
        BlockTemplate::new(self.chain.len() as u64, previous_hash, transactions)
    }

    /// Apply one inbound message to the cached state.
    ///
    /// Returns the template to mine when the message relays a transaction.
    pub fn apply(&mut self, message: Message) -> Option<BlockTemplate> {
        match message {
            Message::Blockchain { blockchain } => {
                info!(blocks = blockchain.len(), "Received blockchain");
                self.chain = blockchain;
                None
            }
            Message::MinerCount { miner_count } => {
                info!("Number of miners connected: {}", miner_count);
                self.last_miner_count = Some(miner_count);
                None
            }
            Message::NewTransaction { transaction } => {
                info!(from = %transaction.from, to = %transaction.to, amount = transaction.amount, "Received new transaction");
                Some(self.next_template(vec![transaction]))
            }
            other => {
                debug!(kind = other.kind(), "Ignoring producer-bound echo");
                None
            }
        }
    }

    /// Apply a message and, for a relayed transaction, mine inline and return
    /// the `NEW_BLOCK` submission.
    pub fn handle_message(&mut self, message: Message) -> Option<Message> {
        self.apply(message)
            .map(|template| Message::NewBlock { block: mine_block(template) })
    }
}

/// How the producer client runs.
#[derive(Debug, Clone)]
pub struct ProducerOptions {
    /// Mine on a blocking worker thread instead of the event loop. Either way
    /// the next inbound message is not read until the block is submitted.
    pub offload_mining: bool,
}

impl Default for ProducerOptions {
    fn default() -> Self {
        Self { offload_mining: true }
    }
}

async fn mine(template: BlockTemplate, options: &ProducerOptions) -> Result<Block, ChainError> {
    if options.offload_mining {
        MiningTask::spawn(template).join().await
    } else {
        Ok(mine_block(template))
    }
}

/// Connect to a coordinator and serve it until the channel closes.
pub async fn run_producer(url: &str, options: ProducerOptions) -> Result<(), ChainError> {
    let (ws_stream, _) = connect_async(url).await?;
    info!("Connected to coordinator at {}", url);
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let mut producer = Producer::new();
    ws_sender
        .send(WsMessage::Text(Message::RequestBlockchain.to_json()?))
        .await?;

    while let Some(frame) = ws_receiver.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    warn!("Ignoring non-UTF-8 binary frame");
                    continue;
                }
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(e.into()),
        };

        let message = match Message::parse(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed message: {}", e);
                continue;
            }
        };

        let Some(template) = producer.apply(message) else {
            continue;
        };

        let index = template.index;
        let start = Instant::now();
        info!(index, previous_hash = %template.previous_hash, "Mining block");
        let block = match mine(template, &options).await {
            Ok(block) => block,
            Err(e) => {
                error!(index, "Mining failed: {}", e);
                continue;
            }
        };
        info!(
            index,
            nonce = block.nonce,
            hash = %block.hash,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "New block created"
        );

        let submission = Message::NewBlock { block }.to_json()?;
        if let Err(e) = ws_sender.send(WsMessage::Text(submission)).await {
            error!("Connection is not open, cannot submit block: {}", e);
        }
    }

    info!("Coordinator closed the connection");
    Ok(())
}
