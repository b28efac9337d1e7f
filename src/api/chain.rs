use actix_web::{HttpResponse, Responder, get, web};

use super::models::{ChainResponse, PoolResponse, UnspentOutputsResponse};
use crate::node::Node;

/// Get the full blockchain.
#[get("/blocks/")]
pub async fn get_blocks(node: web::Data<Node>) -> impl Responder {
    let ledger = node.ledger().lock().await;
    HttpResponse::Ok().json(ChainResponse {
        length: ledger.chain().len(),
        difficulty: ledger.difficulty(),
        chain: ledger.chain(),
    })
}

#[get("/block/{hash}/")]
pub async fn get_block(node: web::Data<Node>, path: web::Path<(String,)>) -> impl Responder {
    let hash = path.into_inner().0;
    let ledger = node.ledger().lock().await;
    match ledger.find_block(&hash) {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().body(format!("block {hash} not found")),
    }
}

/// Look up a transaction included in the chain.
#[get("/transaction/{id}/")]
pub async fn get_transaction(node: web::Data<Node>, path: web::Path<(String,)>) -> impl Responder {
    let id = path.into_inner().0;
    let ledger = node.ledger().lock().await;
    match ledger.find_transaction(&id) {
        Some(tx) => HttpResponse::Ok().json(tx),
        None => HttpResponse::NotFound().body(format!("transaction {id} not found")),
    }
}

#[get("/address/{address}/")]
pub async fn get_address_outputs(
    node: web::Data<Node>,
    path: web::Path<(String,)>,
) -> impl Responder {
    let address = path.into_inner().0;
    let outputs = node.ledger().lock().await.unspent_outputs_of(&address);
    HttpResponse::Ok().json(UnspentOutputsResponse::from(outputs))
}

#[get("/unspent-outputs/")]
pub async fn get_unspent_outputs(node: web::Data<Node>) -> impl Responder {
    let outputs = node.ledger().lock().await.unspent_outputs();
    HttpResponse::Ok().json(UnspentOutputsResponse::from(outputs))
}

#[get("/transaction-pool/")]
pub async fn get_transaction_pool(node: web::Data<Node>) -> impl Responder {
    let transactions = node.ledger().lock().await.pool().snapshot();
    HttpResponse::Ok().json(PoolResponse {
        size: transactions.len(),
        transactions,
    })
}
