use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::block::{Block, hash_block, meets_difficulty, now_timestamp};
use crate::transaction::Transaction;

/// Nonces tried between two looks at the cancellation flag.
const CANCEL_CHECK_EVERY: u64 = 4096;

/// Shared generation counter used to abandon in-flight mining attempts.
/// Bumping it (on every block accepted from a peer) invalidates all
/// outstanding [`MiningTicket`]s.
#[derive(Debug, Clone, Default)]
pub struct MiningSignal {
    generation: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct MiningTicket {
    generation: Arc<AtomicU64>,
    issued_at: u64,
}

impl MiningSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> MiningTicket {
        MiningTicket {
            generation: self.generation.clone(),
            issued_at: self.generation.load(Ordering::Acquire),
        }
    }

    pub fn interrupt(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl MiningTicket {
    pub fn is_cancelled(&self) -> bool {
        self.generation.load(Ordering::Acquire) != self.issued_at
    }
}

/// Search nonces from 0 upward until the hash meets `difficulty`.
/// Unbounded CPU work; run it off the async executor.
pub fn find_block(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    transactions: Vec<Transaction>,
    difficulty: u32,
) -> Block {
    let mut nonce: u64 = 0;
    loop {
        let hash = hash_block(index, previous_hash, timestamp, &transactions, difficulty, nonce);
        if meets_difficulty(&hash, difficulty) {
            return Block {
                index,
                hash,
                previous_hash: previous_hash.to_string(),
                timestamp,
                transactions,
                difficulty,
                nonce,
            };
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// Like [`find_block`], but gives up (returns `None`) once `ticket` is cancelled.
pub fn find_block_cancellable(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    transactions: Vec<Transaction>,
    difficulty: u32,
    ticket: &MiningTicket,
) -> Option<Block> {
    let mut nonce: u64 = 0;
    loop {
        if nonce % CANCEL_CHECK_EVERY == 0 && ticket.is_cancelled() {
            return None;
        }
        let hash = hash_block(index, previous_hash, timestamp, &transactions, difficulty, nonce);
        if meets_difficulty(&hash, difficulty) {
            return Some(Block {
                index,
                hash,
                previous_hash: previous_hash.to_string(),
                timestamp,
                transactions,
                difficulty,
                nonce,
            });
        }
        nonce = nonce.wrapping_add(1);
    }
}

/// Mine the successor of `previous` at the current wall-clock time.
pub fn mine(previous: &Block, difficulty: u32, transactions: Vec<Transaction>) -> Block {
    find_block(
        previous.index + 1,
        &previous.hash,
        now_timestamp(),
        transactions,
        difficulty,
    )
}
