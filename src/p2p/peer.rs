use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{
        RwLock,
        mpsc::{self, Receiver, error::TrySendError},
    },
    time::sleep,
};

use super::message::PeerMessage;
use crate::node::Node;

/// Outgoing queue depth per peer
const PEER_QUEUE: usize = 64;

/// Delay before asking a fresh peer for its pool
pub const POOL_QUERY_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum PeerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message encoding error: {0}")]
    Encode(String),

    #[error("Message decoding error: {0}")]
    Decode(String),

    #[error("Peer disconnected")]
    Disconnected,
}

/// Used to reference and send to a connected peer
#[derive(Clone, Debug)]
pub struct PeerHandle {
    pub address: SocketAddr,
    send: mpsc::Sender<PeerMessage>,
}

impl PeerHandle {
    pub fn new(address: SocketAddr) -> (Self, Receiver<PeerMessage>) {
        let (send, recv) = mpsc::channel(PEER_QUEUE);
        (Self { address, send }, recv)
    }

    /// Queue `message` without waiting. Fails only when the peer is gone.
    pub fn send(&self, message: PeerMessage) -> Result<(), PeerError> {
        match self.send.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!("send queue to {} is full, dropping message", self.address);
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(PeerError::Disconnected),
        }
    }
}

/// Connected peers keyed by socket address
#[derive(Clone, Debug, Default)]
pub struct PeerRegistry {
    peers: Arc<RwLock<HashMap<SocketAddr, PeerHandle>>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: PeerHandle) {
        self.peers.write().await.insert(handle.address, handle);
    }

    pub async fn remove(&self, address: &SocketAddr) -> bool {
        self.peers.write().await.remove(address).is_some()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn addresses(&self) -> Vec<SocketAddr> {
        let mut addresses: Vec<SocketAddr> = self.peers.read().await.keys().copied().collect();
        addresses.sort();
        addresses
    }

    pub async fn send_to(&self, address: &SocketAddr, message: PeerMessage) {
        let handle = self.peers.read().await.get(address).cloned();
        match handle {
            Some(handle) => {
                if handle.send(message).is_err() {
                    self.remove(address).await;
                }
            }
            None => debug!("reply to {} dropped, peer is gone", address),
        }
    }

    /// Fire-and-forget send to every peer; peers whose connection closed are
    /// removed.
    pub async fn broadcast(&self, message: PeerMessage) {
        let closed: Vec<SocketAddr> = {
            let peers = self.peers.read().await;
            peers
                .values()
                .filter(|p| p.send(message.clone()).is_err())
                .map(|p| p.address)
                .collect()
        };
        if closed.is_empty() {
            return;
        }
        let mut peers = self.peers.write().await;
        for address in closed {
            debug!("dropping closed peer {}", address);
            peers.remove(&address);
        }
    }
}

/// Register `stream` as a peer of `node`, start its reader and writer tasks
/// and run the connect handshake.
pub async fn spawn_peer(stream: TcpStream, node: Node) -> Result<SocketAddr, PeerError> {
    let address = stream.peer_addr()?;
    let (handle, outgoing) = PeerHandle::new(address);
    let (reader, writer) = stream.into_split();

    node.peers().insert(handle.clone()).await;
    info!("peer connected: {}", address);

    tokio::spawn(writer_task(writer, outgoing, address));

    let reader_node = node.clone();
    tokio::spawn(async move {
        if let Err(e) = reader_task(reader, address, reader_node.clone()).await {
            error!("Peer error (disconnected): {e}");
        }
        reader_node.peers().remove(&address).await;
        info!("connection to peer closed: {}", address);
    });

    handle.send(PeerMessage::QueryLatest)?;
    tokio::spawn(async move {
        sleep(POOL_QUERY_DELAY).await;
        node.peers().broadcast(PeerMessage::QueryTransactionPool).await;
    });

    Ok(address)
}

/// Read newline-terminated messages until EOF. A line that is not UTF-8 or
/// not a known message is logged and skipped; only I/O errors end the loop.
async fn reader_task(
    reader: OwnedReadHalf,
    address: SocketAddr,
    node: Node,
) -> Result<(), PeerError> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!("dropping non UTF-8 message from {}: {}", address, e);
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match PeerMessage::decode(line) {
            Ok(message) => node.on_peer_message(address, message).await,
            Err(e) => warn!("could not parse received JSON message from {}: {}", address, e),
        }
    }
}

async fn writer_task(
    mut writer: OwnedWriteHalf,
    mut outgoing: Receiver<PeerMessage>,
    address: SocketAddr,
) {
    while let Some(message) = outgoing.recv().await {
        let line = match message.encode_line() {
            Ok(line) => line,
            Err(e) => {
                error!("failed to encode message for {}: {}", address, e);
                continue;
            }
        };
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!("write to {} failed: {}", address, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
