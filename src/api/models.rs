use serde::{Deserialize, Serialize};

use crate::blockchain::Block;
use crate::transaction::{Transaction, UnspentOutput};

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub difficulty: u32,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct UnspentOutputsResponse {
    pub count: usize,
    pub unspent_outputs: Vec<UnspentOutput>,
}

impl From<Vec<UnspentOutput>> for UnspentOutputsResponse {
    fn from(unspent_outputs: Vec<UnspentOutput>) -> Self {
        Self {
            count: unspent_outputs.len(),
            unspent_outputs,
        }
    }
}

/* ---------- Mining API Models ---------- */

#[derive(Deserialize)]
pub struct MineRawRequest {
    pub data: Vec<Transaction>,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct PaymentRequest {
    pub address: String,
    pub amount: u64,
}

#[derive(Serialize)]
pub struct PoolResponse {
    pub size: usize,
    pub transactions: Vec<Transaction>,
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct AddressResponse {
    pub address: String,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u128,
    pub utxos: usize,
}

/* ---------- Peer API Models ---------- */

#[derive(Deserialize)]
pub struct AddPeerRequest {
    pub peer: String,
}

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<String>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub difficulty: u32,
    pub accumulated_difficulty: u128,
    pub target_block_time_secs: i64,
    pub adjust_interval: u64,
    pub last_interval_secs: Option<i64>,
    pub avg_interval_secs: Option<f64>,
    pub pool_size: usize,
    pub utxo_size: usize,
    pub peers: usize,
}

/* ---------- Control API Models ---------- */

#[derive(Serialize)]
pub struct StopResponse {
    pub msg: &'static str,
}
