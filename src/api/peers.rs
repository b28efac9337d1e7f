use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::bad_request;
use super::models::{AddPeerRequest, PeersResponse};
use crate::node::Node;

#[get("/peers/")]
pub async fn get_peers(node: web::Data<Node>) -> impl Responder {
    let peers = node
        .peers()
        .addresses()
        .await
        .into_iter()
        .map(|a| a.to_string())
        .collect();
    HttpResponse::Ok().json(PeersResponse { peers })
}

#[post("/add-peer/")]
pub async fn add_peer(node: web::Data<Node>, body: web::Json<AddPeerRequest>) -> impl Responder {
    match node.connect_to_peer(&body.peer).await {
        Ok(address) => {
            info!("added peer {address}");
            HttpResponse::Ok().json(PeersResponse {
                peers: vec![address.to_string()],
            })
        }
        Err(e) => bad_request(e),
    }
}
