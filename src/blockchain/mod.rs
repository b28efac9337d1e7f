pub mod block;
pub mod difficulty;
pub mod ledger;
pub mod miner;

pub use block::Block;
pub use ledger::{BlockTemplate, Ledger};
pub use miner::MiningSignal;

/// Target seconds between blocks.
pub const BLOCK_GENERATION_INTERVAL_SECS: i64 = 30;

/// Difficulty is retargeted every this many blocks.
pub const DIFFICULTY_ADJUSTMENT_INTERVAL: u64 = 20;

/// Allowed drift of a block timestamp against its predecessor and the clock.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 60;

pub const GENESIS_TIMESTAMP: i64 = 1465154705;

/// Owner of the genesis coinbase: the uncompressed secp256k1 generator point,
/// i.e. the public key of secret scalar 1. That key is public knowledge, so
/// the genesis coins are spendable by anyone; they exist as a deterministic
/// fixture for local networks and tests, not as a real allocation.
pub const GENESIS_ADDRESS: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";
