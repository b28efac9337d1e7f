mod api;
mod blockchain;
mod config;
mod error;
mod node;
mod p2p;
mod transaction;
mod wallet;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info};
use std::io;
use std::net::SocketAddr;

use config::NodeConfig;
use node::Node;
use wallet::Wallet;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = NodeConfig::from_env();
    let wallet = Wallet::load_or_create(&config.private_key_path)
        .map_err(|e| io::Error::other(e.to_string()))?;
    info!("wallet address: {}", wallet.public_address());

    let node = Node::new(wallet);

    let p2p_addr: SocketAddr = format!("{}:{}", config.host, config.p2p_port)
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    node.start_p2p_server(p2p_addr)
        .await
        .map_err(|e| io::Error::other(e.to_string()))?;

    for peer in &config.peers {
        match node.connect_to_peer(peer).await {
            Ok(address) => info!("connected to bootstrap peer {address}"),
            Err(e) => error!("connection to bootstrap peer {peer} failed: {e}"),
        }
    }

    info!(
        "⛓️ Starting node API at http://{}:{}",
        config.host, config.http_port
    );

    let state = web::Data::new(node);
    let (shutdown, mut stop_requested) = api::Shutdown::new();
    let shutdown = web::Data::new(shutdown);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(shutdown.clone())
            .configure(api::init_routes)
    })
    .bind((config.host.as_str(), config.http_port))?
    .run();

    let handle = server.handle();
    actix_web::rt::spawn(async move {
        if stop_requested.recv().await.is_some() {
            info!("stop requested over the API, shutting down");
            handle.stop(true).await;
        }
    });

    server.await
}
