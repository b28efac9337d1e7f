use actix_web::{HttpResponse, Responder, get, web};

use super::models::StatsResponse;
use crate::blockchain::{BLOCK_GENERATION_INTERVAL_SECS, DIFFICULTY_ADJUSTMENT_INTERVAL};
use crate::node::Node;

#[get("/stats/")]
pub async fn get_stats(node: web::Data<Node>) -> impl Responder {
    let peers = node.peers().len().await;
    let ledger = node.ledger().lock().await;
    let chain = ledger.chain();
    let height = chain.len();

    let last_interval_secs = match chain {
        [.., older, newer] => Some(newer.timestamp - older.timestamp),
        _ => None,
    };

    // average over the last retarget window
    let window = DIFFICULTY_ADJUSTMENT_INTERVAL as usize;
    let avg_interval_secs = if height > window {
        let newest = &chain[height - 1];
        let oldest = &chain[height - 1 - window];
        Some((newest.timestamp - oldest.timestamp) as f64 / window as f64)
    } else {
        None
    };

    HttpResponse::Ok().json(StatsResponse {
        height,
        difficulty: ledger.difficulty(),
        accumulated_difficulty: ledger.accumulated_difficulty(),
        target_block_time_secs: BLOCK_GENERATION_INTERVAL_SECS,
        adjust_interval: DIFFICULTY_ADJUSTMENT_INTERVAL,
        last_interval_secs,
        avg_interval_secs,
        pool_size: ledger.pool().len(),
        utxo_size: ledger.utxo().len(),
        peers,
    })
}
