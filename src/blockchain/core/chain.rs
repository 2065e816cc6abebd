use crate::blockchain::core::validation::check_block;
use crate::error::ChainError;
use crate::transaction::types::update_str;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// `previousHash` carried by the first block of a chain.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Number of leading `'0'` hex characters a block hash must have.
pub const DIFFICULTY_PREFIX: usize = 4;

/// Domain tag opening the canonical block encoding. The trailing version is
/// bumped whenever the encoding changes.
const HASH_DOMAIN_TAG: &[u8] = b"relaychain/block/v1";

/// Content hash of a block's fields, excluding `hash` and `proofOfWork`.
///
/// Encoding (v1), in order:
/// - the ASCII domain tag `relaychain/block/v1`
/// - `index`, `timestamp` as u64 little-endian
/// - transaction count as u64 little-endian, then each transaction
///   (`from`, `to` length-prefixed; `amount` as f64 LE bits; a presence byte
///   and, if present, the length-prefixed `signature`)
/// - `previousHash` length-prefixed
/// - `nonce` as u64 little-endian
///
/// Strings are length-prefixed with their byte length as u64 LE.
pub fn content_hash(
    index: u64,
    timestamp: u64,
    transactions: &[Transaction],
    previous_hash: &str,
    nonce: u64,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(HASH_DOMAIN_TAG);
    hasher.update(index.to_le_bytes());
    hasher.update(timestamp.to_le_bytes());
    hasher.update((transactions.len() as u64).to_le_bytes());
    for tx in transactions {
        tx.hash_into(&mut hasher);
    }
    update_str(&mut hasher, previous_hash);
    hasher.update(nonce.to_le_bytes());
    hex::encode(hasher.finalize())
}

/// True if `hash` starts with [`DIFFICULTY_PREFIX`] zero hex digits.
pub fn meets_difficulty(hash: &str) -> bool {
    hash.len() >= DIFFICULTY_PREFIX && hash.bytes().take(DIFFICULTY_PREFIX).all(|b| b == b'0')
}

/// A block that has not been sealed with a proof of work yet.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTemplate {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
}

impl BlockTemplate {
    /// Template stamped with the current time, nonce 0.
    pub fn new(index: u64, previous_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        BlockTemplate {
            index,
            timestamp: chrono::Utc::now().timestamp_millis() as u64,
            transactions,
            previous_hash: previous_hash.into(),
            nonce: 0,
        }
    }

    pub fn content_hash(&self) -> String {
        content_hash(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        )
    }

    /// Turn the template into a block carrying `hash` as both hash and proof of work.
    pub fn seal(self, hash: String) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            nonce: self.nonce,
            proof_of_work: hash.clone(),
            hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
    pub proof_of_work: String,
}

impl Block {
    /// Recompute the content hash from the block's current fields.
    pub fn calculate_hash(&self) -> String {
        content_hash(
            self.index,
            self.timestamp,
            &self.transactions,
            &self.previous_hash,
            self.nonce,
        )
    }
}

/// The coordinator's authoritative, append-only chain.
#[derive(Debug, Clone, Default)]
pub struct Blockchain {
    blocks: Vec<Block>,
}

impl Blockchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `block` against the current tip and append it.
    ///
    /// Returns `false` and leaves the chain untouched if validation fails.
    pub fn append(&mut self, block: Block) -> bool {
        self.try_append(block).is_ok()
    }

    /// Same as [`Blockchain::append`] but reports why a block was rejected.
    pub fn try_append(&mut self, block: Block) -> Result<(), ChainError> {
        check_block(&block, &self.blocks)?;
        self.blocks.push(block);
        Ok(())
    }

    /// An owned copy of every block in order.
    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::mine_block;

    fn template(index: u64, previous_hash: &str) -> BlockTemplate {
        BlockTemplate {
            index,
            timestamp: 1_700_000_000_000,
            transactions: vec![Transaction::new("alice", "bob", 5.0)],
            previous_hash: previous_hash.to_string(),
            nonce: 0,
        }
    }

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = template(0, GENESIS_PREVIOUS_HASH);
        let b = template(0, GENESIS_PREVIOUS_HASH);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
        assert!(a.content_hash().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_content_hash_covers_every_field() {
        let base = template(0, GENESIS_PREVIOUS_HASH);
        let base_hash = base.content_hash();

        let mut changed = base.clone();
        changed.index = 1;
        assert_ne!(changed.content_hash(), base_hash);

        let mut changed = base.clone();
        changed.timestamp += 1;
        assert_ne!(changed.content_hash(), base_hash);

        let mut changed = base.clone();
        changed.transactions[0].amount = 6.0;
        assert_ne!(changed.content_hash(), base_hash);

        let mut changed = base.clone();
        changed.previous_hash = "1".to_string();
        assert_ne!(changed.content_hash(), base_hash);

        let mut changed = base;
        changed.nonce = 7;
        assert_ne!(changed.content_hash(), base_hash);
    }

    #[test]
    fn test_seal_sets_hash_and_proof_of_work() {
        let t = template(0, GENESIS_PREVIOUS_HASH);
        let hash = t.content_hash();
        let block = t.seal(hash.clone());
        assert_eq!(block.hash, hash);
        assert_eq!(block.proof_of_work, hash);
        assert_eq!(block.calculate_hash(), hash);
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("0000abcdef"));
        assert!(meets_difficulty("00000000"));
        assert!(!meets_difficulty("000abcdef"));
        assert!(!meets_difficulty("a0000"));
        assert!(!meets_difficulty("000"));
    }

    #[test]
    fn test_block_wire_field_names() {
        let block = mine_block(template(0, GENESIS_PREVIOUS_HASH));
        let json = serde_json::to_value(&block).unwrap();
        for key in ["index", "timestamp", "transactions", "previousHash", "nonce", "hash", "proofOfWork"] {
            assert!(json.get(key).is_some(), "missing field {}", key);
        }
    }

    #[test]
    fn test_append_and_snapshot() {
        let mut chain = Blockchain::new();
        let genesis = mine_block(template(0, GENESIS_PREVIOUS_HASH));
        assert!(chain.append(genesis.clone()));

        let next = mine_block(template(1, &genesis.hash));
        assert!(chain.append(next.clone()));

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.tip(), Some(&next));
        assert_eq!(chain.get(0), Some(&genesis));
        assert!(chain.get(2).is_none());

        // Mutating a snapshot must not reach the store.
        let mut snapshot = chain.snapshot();
        snapshot.clear();
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_rejected_block_leaves_chain_untouched() {
        let mut chain = Blockchain::new();
        let genesis = mine_block(template(0, GENESIS_PREVIOUS_HASH));
        assert!(chain.append(genesis));

        let orphan = mine_block(template(1, "not-the-tip"));
        assert_eq!(chain.try_append(orphan), Err(ChainError::InvalidBlockLinkage));
        assert_eq!(chain.len(), 1);
    }
}
