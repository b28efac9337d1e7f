use actix_web::{HttpResponse, Responder, get, post, web};

use super::bad_request;
use super::models::{AddressResponse, BalanceResponse, PaymentRequest, UnspentOutputsResponse};
use crate::node::Node;

#[get("/address/")]
pub async fn get_address(node: web::Data<Node>) -> impl Responder {
    HttpResponse::Ok().json(AddressResponse {
        address: node.wallet().public_address().to_string(),
    })
}

#[get("/balance/")]
pub async fn get_balance(node: web::Data<Node>) -> impl Responder {
    let address = node.wallet().public_address().to_string();
    let ledger = node.ledger().lock().await;
    HttpResponse::Ok().json(BalanceResponse {
        balance: ledger.balance_of(&address),
        utxos: ledger.unspent_outputs_of(&address).len(),
        address,
    })
}

#[get("/my-unspent-outputs/")]
pub async fn get_my_unspent_outputs(node: web::Data<Node>) -> impl Responder {
    let outputs = node
        .ledger()
        .lock()
        .await
        .unspent_outputs_of(node.wallet().public_address());
    HttpResponse::Ok().json(UnspentOutputsResponse::from(outputs))
}

/// Pay from this node's wallet through the pool.
#[post("/send-transaction/")]
pub async fn send_transaction(
    node: web::Data<Node>,
    body: web::Json<PaymentRequest>,
) -> impl Responder {
    match node.send_transaction(&body.address, body.amount).await {
        Ok(tx) => HttpResponse::Ok().json(tx),
        Err(e) => bad_request(e),
    }
}
