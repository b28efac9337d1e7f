mod chain;
mod control;
mod health;
mod mining;
pub mod models;
mod peers;
mod stats;
mod wallet;

pub use control::Shutdown;

use actix_web::HttpResponse;
use actix_web::web::{self, ServiceConfig};
use std::fmt::Display;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_blocks)
            .service(chain::get_block)
            .service(chain::get_transaction)
            .service(chain::get_address_outputs)
            .service(chain::get_unspent_outputs)
            .service(chain::get_transaction_pool)
            .service(wallet::get_address)
            .service(wallet::get_balance)
            .service(wallet::get_my_unspent_outputs)
            .service(wallet::send_transaction)
            .service(mining::mine_raw_block)
            .service(mining::mine_block)
            .service(mining::mine_transaction)
            .service(peers::get_peers)
            .service(peers::add_peer)
            .service(stats::get_stats)
            .service(control::stop),
    );
}

fn bad_request(err: impl Display) -> HttpResponse {
    HttpResponse::BadRequest().body(err.to_string())
}
