use crate::blockchain::core::chain::{meets_difficulty, Block};
use crate::error::ChainError;

/// Check a candidate block against the chain it would extend.
///
/// Checks run in order and stop at the first failure:
/// 1. linkage to the tip (skipped when `chain` is empty)
/// 2. the stored hash matches the recomputed content hash
/// 3. `proofOfWork` equals `hash` and the hash meets the difficulty prefix
pub fn check_block(candidate: &Block, chain: &[Block]) -> Result<(), ChainError> {
    // An empty chain accepts any previousHash for its first block.
    if let Some(tip) = chain.last() {
        if candidate.previous_hash != tip.hash {
            return Err(ChainError::InvalidBlockLinkage);
        }
    }

    if candidate.calculate_hash() != candidate.hash {
        return Err(ChainError::HashMismatch);
    }

    if candidate.proof_of_work != candidate.hash || !meets_difficulty(&candidate.hash) {
        return Err(ChainError::InvalidProofOfWork);
    }

    Ok(())
}

/// Boolean form of [`check_block`].
pub fn validate_block(candidate: &Block, chain: &[Block]) -> bool {
    check_block(candidate, chain).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{BlockTemplate, GENESIS_PREVIOUS_HASH};
    use crate::miner::mine_block;
    use crate::transaction::Transaction;

    fn mined(index: u64, previous_hash: &str, amount: f64) -> Block {
        mine_block(BlockTemplate {
            index,
            timestamp: 1_700_000_000_000 + index,
            transactions: vec![Transaction::new("alice", "bob", amount)],
            previous_hash: previous_hash.to_string(),
            nonce: 0,
        })
    }

    #[test]
    fn test_valid_block_on_tip() {
        let genesis = mined(0, GENESIS_PREVIOUS_HASH, 1.0);
        let next = mined(1, &genesis.hash, 2.0);
        assert!(validate_block(&next, &[genesis]));
    }

    #[test]
    fn test_empty_chain_skips_linkage() {
        let first = mined(0, "anything-goes", 1.0);
        assert!(validate_block(&first, &[]));
    }

    #[test]
    fn test_wrong_previous_hash() {
        let genesis = mined(0, GENESIS_PREVIOUS_HASH, 1.0);
        let stray = mined(1, GENESIS_PREVIOUS_HASH, 2.0);
        assert_eq!(check_block(&stray, &[genesis]), Err(ChainError::InvalidBlockLinkage));
    }

    #[test]
    fn test_tampered_field_breaks_hash() {
        let mut block = mined(0, GENESIS_PREVIOUS_HASH, 1.0);
        block.transactions[0].amount = 1_000_000.0;
        assert_eq!(check_block(&block, &[]), Err(ChainError::HashMismatch));

        let mut block = mined(0, GENESIS_PREVIOUS_HASH, 1.0);
        block.nonce += 1;
        assert_eq!(check_block(&block, &[]), Err(ChainError::HashMismatch));
    }

    #[test]
    fn test_hash_without_leading_zeros_is_rejected() {
        // Correct content hash, but no proof of work was done.
        let template = BlockTemplate {
            index: 0,
            timestamp: 1,
            transactions: vec![],
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
        };
        let mut nonce = 0;
        let block = loop {
            let mut t = template.clone();
            t.nonce = nonce;
            let hash = t.content_hash();
            if !meets_difficulty(&hash) {
                break t.seal(hash);
            }
            nonce += 1;
        };
        assert_eq!(check_block(&block, &[]), Err(ChainError::InvalidProofOfWork));
    }

    #[test]
    fn test_proof_of_work_must_equal_hash() {
        let mut block = mined(0, GENESIS_PREVIOUS_HASH, 1.0);
        block.proof_of_work = String::new();
        assert_eq!(check_block(&block, &[]), Err(ChainError::InvalidProofOfWork));
    }

    #[test]
    fn test_linkage_checked_before_hash() {
        let genesis = mined(0, GENESIS_PREVIOUS_HASH, 1.0);
        let mut bad = mined(1, "elsewhere", 2.0);
        bad.hash = "ffff".to_string();
        assert_eq!(check_block(&bad, &[genesis]), Err(ChainError::InvalidBlockLinkage));
    }
}
