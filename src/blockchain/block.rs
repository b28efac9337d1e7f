use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{GENESIS_ADDRESS, GENESIS_TIMESTAMP, TIMESTAMP_TOLERANCE_SECS};
use crate::error::{ChainError, Result};
use crate::transaction::Transaction;

/// A single block in the blockchain holding a list of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub hash: String, // Cached hash of the block
    pub previous_hash: String,
    pub timestamp: i64, // Unix timestamp (UTC)
    /// Coinbase first.
    pub transactions: Vec<Transaction>,
    /// Required number of leading zero bits in `hash`.
    pub difficulty: u32,
    pub nonce: u64, // Proof-of-Work nonce
}

/// SHA-256 over the block fields (everything but the hash itself).
/// Transactions enter the preimage in their fixed canonical form.
pub fn hash_block(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    transactions: &[Transaction],
    difficulty: u32,
    nonce: u64,
) -> String {
    let mut txs = String::new();
    for tx in transactions {
        tx.write_canonical(&mut txs);
    }
    let preimage = format!(
        "{}:{}:{}:{}:{}:{}",
        index, previous_hash, timestamp, txs, difficulty, nonce
    );
    let mut hasher = Sha256::new();
    hasher.update(preimage.as_bytes());
    hex::encode(hasher.finalize())
}

/// Binary expansion of a hex digest, four bits per hex digit.
pub fn hex_to_binary(hash: &str) -> Option<String> {
    let mut bits = String::with_capacity(hash.len() * 4);
    for c in hash.chars() {
        let nibble = c.to_digit(16)?;
        bits.push_str(&format!("{:04b}", nibble));
    }
    Some(bits)
}

/// True when the binary form of `hash` starts with `difficulty` zero bits.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    if difficulty == 0 {
        return true;
    }
    match hex_to_binary(hash) {
        Some(bits) => {
            let prefix = difficulty as usize;
            bits.len() >= prefix && bits.bytes().take(prefix).all(|b| b == b'0')
        }
        None => false,
    }
}

impl Block {
    /// The fixed first block, identical on every node. Its single coinbase
    /// pre-allocates the initial coins to [`GENESIS_ADDRESS`].
    pub fn genesis() -> Self {
        let transactions = vec![Transaction::coinbase(GENESIS_ADDRESS, 0)];
        let hash = hash_block(0, "", GENESIS_TIMESTAMP, &transactions, 0, 0);
        Self {
            index: 0,
            hash,
            previous_hash: String::new(),
            timestamp: GENESIS_TIMESTAMP,
            transactions,
            difficulty: 0,
            nonce: 0,
        }
    }

    pub fn compute_hash(&self) -> String {
        hash_block(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.transactions,
            self.difficulty,
            self.nonce,
        )
    }

    pub fn validate_structure(&self) -> Result<()> {
        if self.hash.len() != 64 || !self.hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ChainError::InvalidBlockStructure(format!(
                "block {} hash is not a 64 char hex digest",
                self.index
            )));
        }
        if self.index == 0 {
            return Ok(());
        }
        if self.previous_hash.len() != 64
            || !self.previous_hash.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(ChainError::InvalidBlockStructure(format!(
                "block {} previous hash is not a 64 char hex digest",
                self.index
            )));
        }
        Ok(())
    }

    /// Stored hash matches the content and satisfies the stored difficulty.
    pub fn validate_hash(&self) -> Result<()> {
        let expected = self.compute_hash();
        if self.hash != expected {
            warn!("invalid hash {} (expected {})", self.hash, expected);
            return Err(ChainError::InvalidHash(format!(
                "block {} stored {} computed {}",
                self.index, self.hash, expected
            )));
        }
        if !meets_difficulty(&self.hash, self.difficulty) {
            warn!(
                "block difficulty not satisfied. Expected: {} got: {}",
                self.difficulty, self.hash
            );
            return Err(ChainError::DifficultyNotMet {
                hash: self.hash.clone(),
                difficulty: self.difficulty,
            });
        }
        Ok(())
    }
}

pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Not too far behind its predecessor, not too far ahead of `now`.
pub fn is_valid_timestamp(candidate: &Block, previous: &Block, now: i64) -> bool {
    previous.timestamp - TIMESTAMP_TOLERANCE_SECS < candidate.timestamp
        && candidate.timestamp - TIMESTAMP_TOLERANCE_SECS < now
}

/// Validate `candidate` as the successor of `previous`, with `now` as wall-clock.
pub fn validate_new_block_at(candidate: &Block, previous: &Block, now: i64) -> Result<()> {
    candidate.validate_structure()?;
    if candidate.index != previous.index + 1 {
        return Err(ChainError::InvalidIndex {
            expected: previous.index + 1,
            got: candidate.index,
        });
    }
    if candidate.previous_hash != previous.hash {
        return Err(ChainError::InvalidPreviousHash(format!(
            "block {} points at {}, head is {}",
            candidate.index, candidate.previous_hash, previous.hash
        )));
    }
    if !is_valid_timestamp(candidate, previous, now) {
        return Err(ChainError::InvalidTimestamp(format!(
            "block {} at {} (previous {}, now {})",
            candidate.index, candidate.timestamp, previous.timestamp, now
        )));
    }
    candidate.validate_hash()
}

pub fn validate_new_block(candidate: &Block, previous: &Block) -> Result<()> {
    validate_new_block_at(candidate, previous, now_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::miner::find_block;
    use crate::transaction::Transaction;

    fn next_block(previous: &Block, timestamp: i64, difficulty: u32) -> Block {
        let txs = vec![Transaction::coinbase(GENESIS_ADDRESS, previous.index + 1)];
        find_block(
            previous.index + 1,
            &previous.hash,
            timestamp,
            txs,
            difficulty,
        )
    }

    #[test]
    fn genesis_is_deterministic() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a, b);
        assert_eq!(a.hash, a.compute_hash());
        assert!(a.validate_structure().is_ok());
        assert!(a.previous_hash.is_empty());
    }

    #[test]
    fn binary_prefix_check() {
        assert_eq!(hex_to_binary("0f").as_deref(), Some("00001111"));
        assert!(meets_difficulty("0fff", 4));
        assert!(!meets_difficulty("0fff", 5));
        assert!(meets_difficulty("1fff", 3));
        assert!(!meets_difficulty("2fff", 3));
        assert!(meets_difficulty("anything", 0));
        assert!(!meets_difficulty("zz", 1));
        assert!(!meets_difficulty("00", 9));
    }

    #[test]
    fn accepts_well_formed_successor() {
        let genesis = Block::genesis();
        let block = next_block(&genesis, now_timestamp(), 1);
        assert!(hex_to_binary(&block.hash).unwrap().starts_with('0'));
        assert_eq!(validate_new_block(&block, &genesis), Ok(()));
    }

    #[test]
    fn rejects_wrong_index_and_link() {
        let genesis = Block::genesis();
        let now = now_timestamp();
        let mut block = next_block(&genesis, now, 0);
        block.index = 5;
        block.hash = block.compute_hash();
        assert!(matches!(
            validate_new_block_at(&block, &genesis, now),
            Err(ChainError::InvalidIndex { expected: 1, got: 5 })
        ));

        let mut block = next_block(&genesis, now, 0);
        block.previous_hash = "ab".repeat(32);
        block.hash = block.compute_hash();
        assert!(matches!(
            validate_new_block_at(&block, &genesis, now),
            Err(ChainError::InvalidPreviousHash(_))
        ));
    }

    #[test]
    fn timestamp_window() {
        let genesis = Block::genesis();
        let now = GENESIS_TIMESTAMP + 10_000;

        let too_old = next_block(&genesis, GENESIS_TIMESTAMP - 60, 0);
        assert!(matches!(
            validate_new_block_at(&too_old, &genesis, now),
            Err(ChainError::InvalidTimestamp(_))
        ));

        let slightly_old = next_block(&genesis, GENESIS_TIMESTAMP - 59, 0);
        assert!(validate_new_block_at(&slightly_old, &genesis, now).is_ok());

        let future = next_block(&genesis, now + 60, 0);
        assert!(matches!(
            validate_new_block_at(&future, &genesis, now),
            Err(ChainError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn rejects_tampered_content() {
        let genesis = Block::genesis();
        let now = now_timestamp();
        let mut block = next_block(&genesis, now, 0);
        block.transactions[0].outputs[0].amount = 1_000;
        assert!(matches!(
            validate_new_block_at(&block, &genesis, now),
            Err(ChainError::InvalidHash(_))
        ));
    }

    #[test]
    fn rejects_unmet_difficulty() {
        let genesis = Block::genesis();
        let now = now_timestamp();
        let mut block = next_block(&genesis, now, 0);
        // find a nonce whose hash starts with a one bit, then claim difficulty 1
        block.difficulty = 1;
        loop {
            block.hash = block.compute_hash();
            if !meets_difficulty(&block.hash, 1) {
                break;
            }
            block.nonce += 1;
        }
        assert!(matches!(
            validate_new_block_at(&block, &genesis, now),
            Err(ChainError::DifficultyNotMet { difficulty: 1, .. })
        ));
    }
}
