//! Proof-of-work mining
//!
//! The search is CPU bound and unbounded: it increments the nonce until the
//! content hash meets [`DIFFICULTY_PREFIX`](crate::blockchain::DIFFICULTY_PREFIX).
//! [`MiningTask`] runs the same search on a blocking worker thread and carries a
//! [`CancelToken`]; nothing in the producer cancels it today.

use crate::blockchain::{meets_difficulty, Block, BlockTemplate};
use crate::error::ChainError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// How many nonces are tried between cancellation checks.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Shared flag asking a running search to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Search for a nonce whose hash meets the difficulty prefix and seal the block.
///
/// Runs to completion on the calling thread.
pub fn mine_block(template: BlockTemplate) -> Block {
    let mut template = template;
    loop {
        template.nonce = template.nonce.wrapping_add(1);
        let hash = template.content_hash();
        if meets_difficulty(&hash) {
            return template.seal(hash);
        }
    }
}

/// Like [`mine_block`], but gives up and returns `None` once `cancel` is set.
pub fn mine_block_with_cancel(template: BlockTemplate, cancel: &CancelToken) -> Option<Block> {
    let mut template = template;
    let mut attempts: u64 = 0;
    loop {
        if attempts % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
            return None;
        }
        attempts += 1;

        template.nonce = template.nonce.wrapping_add(1);
        let hash = template.content_hash();
        if meets_difficulty(&hash) {
            return Some(template.seal(hash));
        }
    }
}

/// A proof-of-work search running on tokio's blocking pool.
pub struct MiningTask {
    handle: JoinHandle<Option<Block>>,
    cancel: CancelToken,
}

impl MiningTask {
    pub fn spawn(template: BlockTemplate) -> Self {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let index = template.index;
            let start = Instant::now();
            let mined = mine_block_with_cancel(template, &token);
            match &mined {
                Some(block) => tracing::debug!(
                    index,
                    nonce = block.nonce,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "miner.found"
                ),
                None => tracing::debug!(index, "miner.cancelled"),
            }
            mined
        });
        Self { handle, cancel }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the search to finish.
    pub async fn join(self) -> Result<Block, ChainError> {
        match self.handle.await {
            Ok(Some(block)) => Ok(block),
            Ok(None) => Err(ChainError::MiningAborted),
            Err(e) => Err(ChainError::InvalidBlock(format!("mining worker failed: {}", e))),
        }
    }
}
