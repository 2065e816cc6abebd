//! Coordinator: holds the authoritative chain and relays traffic between peers
//!
//! All chain mutation happens under one mutex, and accepted-block broadcasts
//! are issued before that mutex is released, so peers observe snapshots in
//! append order and only the first valid block for a given tip is kept.

use crate::blockchain::{Block, Blockchain};
use crate::error::ChainError;
use crate::network::{Connection, ConnectionId, ConnectionRegistry};
use crate::protocol::Message;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// What the coordinator did with one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A chain snapshot of `blocks` blocks was unicast to the requester.
    SentSnapshot { blocks: usize },
    /// The block was appended at `index` and the new chain broadcast.
    BlockAccepted { index: u64, delivered: usize },
    /// The block failed validation and was dropped.
    BlockRejected(ChainError),
    /// A transaction was relayed to `delivered` connections.
    TransactionRelayed { delivered: usize },
    /// A well-formed message the coordinator does not act on.
    Ignored,
    /// The payload could not be parsed.
    Malformed(ChainError),
}

#[derive(Debug, Default)]
pub struct Coordinator {
    chain: Mutex<Blockchain>,
    registry: ConnectionRegistry,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, conn: Connection) -> ConnectionId {
        let id = conn.id();
        let count = self.registry.register(conn);
        info!(connection = %id, miners = count, "Miner connected");
        id
    }

    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let removed = self.registry.unregister(id);
        if removed {
            info!(connection = %id, miners = self.registry.len(), "Miner disconnected");
        }
        removed
    }

    /// Parse and dispatch a raw inbound payload. Malformed input is ignored.
    pub fn handle_text(&self, from: ConnectionId, raw: &str) -> Dispatch {
        match Message::parse(raw) {
            Ok(message) => self.handle_message(from, message),
            Err(e) => {
                warn!(connection = %from, "Ignoring malformed message: {}", e);
                Dispatch::Malformed(e)
            }
        }
    }

    pub fn handle_message(&self, from: ConnectionId, message: Message) -> Dispatch {
        match message {
            Message::RequestBlockchain => {
                let blockchain = self.chain.lock().snapshot();
                let blocks = blockchain.len();
                self.registry.send(from, &Message::Blockchain { blockchain });
                debug!(connection = %from, blocks, "Sent chain snapshot");
                Dispatch::SentSnapshot { blocks }
            }
            Message::NewBlock { block } => self.submit_block(from, block),
            Message::Transaction { transaction } => {
                let delivered = self
                    .registry
                    .broadcast(&Message::NewTransaction { transaction });
                debug!(connection = %from, delivered, "Relayed transaction");
                Dispatch::TransactionRelayed { delivered }
            }
            other => {
                debug!(connection = %from, kind = other.kind(), "Ignoring coordinator-bound echo");
                Dispatch::Ignored
            }
        }
    }

    fn submit_block(&self, from: ConnectionId, block: Block) -> Dispatch {
        let mut chain = self.chain.lock();
        let index = block.index;
        let hash = block.hash.clone();

        if let Err(e) = chain.try_append(block) {
            info!(connection = %from, index, hash = %hash, "Rejected block: {}", e);
            return Dispatch::BlockRejected(e);
        }

        let delivered = self.registry.broadcast(&Message::Blockchain {
            blockchain: chain.snapshot(),
        });
        info!(index, hash = %hash, height = chain.len(), "New block added");
        Dispatch::BlockAccepted { index, delivered }
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.chain.lock().snapshot()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        self.chain.lock().get(index).cloned()
    }

    pub fn chain_len(&self) -> usize {
        self.chain.lock().len()
    }

    pub fn miner_count(&self) -> usize {
        self.registry.len()
    }
}
