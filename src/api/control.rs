use actix_web::{HttpResponse, Responder, post, web};
use log::warn;
use tokio::sync::mpsc;

use super::models::StopResponse;

/// Sender side of the stop request; `main` awaits the receiver and stops the
/// HTTP server gracefully.
#[derive(Clone)]
pub struct Shutdown(mpsc::Sender<()>);

impl Shutdown {
    pub fn new() -> (Self, mpsc::Receiver<()>) {
        let (send, recv) = mpsc::channel(1);
        (Self(send), recv)
    }
}

#[post("/stop/")]
pub async fn stop(shutdown: web::Data<Shutdown>) -> impl Responder {
    // A full channel means a stop is already pending.
    if let Err(mpsc::error::TrySendError::Closed(_)) = shutdown.0.try_send(()) {
        warn!("stop requested but nobody is listening for it");
    }
    HttpResponse::Ok().json(StopResponse {
        msg: "stopping server",
    })
}
