//! Wire messages exchanged between coordinator, producers and wallets.
//!
//! Every message is a JSON object with a `type` discriminator, e.g.
//! `{"type":"MINER_COUNT","minerCount":3}`.

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Producer asks for the full chain.
    RequestBlockchain,
    /// Full chain snapshot.
    Blockchain { blockchain: Vec<Block> },
    /// Producer submits a mined block.
    NewBlock { block: Block },
    /// A wallet submits a transaction for relay.
    Transaction { transaction: Transaction },
    /// Coordinator relays a transaction to producers.
    NewTransaction { transaction: Transaction },
    /// Number of live connections.
    MinerCount {
        #[serde(rename = "minerCount")]
        miner_count: usize,
    },
}

impl Message {
    pub fn parse(raw: &str) -> Result<Self, ChainError> {
        serde_json::from_str(raw).map_err(|e| ChainError::Protocol(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The wire name of this message's type, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::RequestBlockchain => "REQUEST_BLOCKCHAIN",
            Message::Blockchain { .. } => "BLOCKCHAIN",
            Message::NewBlock { .. } => "NEW_BLOCK",
            Message::Transaction { .. } => "TRANSACTION",
            Message::NewTransaction { .. } => "NEW_TRANSACTION",
            Message::MinerCount { .. } => "MINER_COUNT",
        }
    }
}
