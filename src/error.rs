//! Error types for ledger, pool and wallet operations

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("transaction id mismatch: {0}")]
    IdMismatch(String),

    #[error("referenced output not found: {0}")]
    UnknownInput(String),

    #[error("invalid signature: {0}")]
    BadSignature(String),

    #[error("inputs and outputs do not balance: {0}")]
    ValueMismatch(String),

    #[error("output spent twice: {0}")]
    DuplicateInput(String),

    #[error("invalid coinbase transaction: {0}")]
    InvalidCoinbase(String),

    #[error("invalid block structure: {0}")]
    InvalidBlockStructure(String),

    #[error("invalid block index: expected {expected}, got {got}")]
    InvalidIndex { expected: u64, got: u64 },

    #[error("invalid previous hash: {0}")]
    InvalidPreviousHash(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("block hash does not match content: {0}")]
    InvalidHash(String),

    #[error("hash {hash} does not meet difficulty {difficulty}")]
    DifficultyNotMet { hash: String, difficulty: u32 },

    #[error("invalid chain: {0}")]
    InvalidChain(String),

    #[error("transaction rejected by pool: {0}")]
    InvalidTransaction(Box<ChainError>),

    #[error("input already spent by a pooled transaction: {0}")]
    PoolConflict(String),

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u128 },

    #[error("private key does not own referenced output: {0}")]
    KeyMismatch(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("mined block is stale: {0}")]
    StaleBlock(String),

    #[error("mining task failed: {0}")]
    MiningAborted(String),

    #[error("wallet storage error: {0}")]
    Wallet(String),
}

pub type Result<T> = std::result::Result<T, ChainError>;
