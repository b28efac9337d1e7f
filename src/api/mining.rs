use actix_web::{HttpResponse, Responder, post, web};
use log::warn;

use super::bad_request;
use super::models::{MineRawRequest, PaymentRequest};
use crate::node::Node;

/// Mine a block carrying exactly the given transactions (coinbase first).
#[post("/mine-raw-block/")]
pub async fn mine_raw_block(
    node: web::Data<Node>,
    body: web::Json<MineRawRequest>,
) -> impl Responder {
    let MineRawRequest { data } = body.into_inner();
    match node.generate_raw_next_block(data).await {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(e) => {
            warn!("MINER - raw block rejected: {e}");
            bad_request(e)
        }
    }
}

/// Mine a block from the pool with a coinbase to this node's wallet.
#[post("/mine-block/")]
pub async fn mine_block(node: web::Data<Node>) -> impl Responder {
    match node.generate_next_block().await {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(e) => bad_request(e),
    }
}

/// Mine a block with a coinbase and one payment from this node's wallet.
#[post("/mine-transaction/")]
pub async fn mine_transaction(
    node: web::Data<Node>,
    body: web::Json<PaymentRequest>,
) -> impl Responder {
    match node.generate_next_block_with_transaction(&body.address, body.amount).await {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(e) => bad_request(e),
    }
}
