//! A running node: the shared ledger, the wallet, connected peers and the
//! mining coordination between them.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::blockchain::{Block, BlockTemplate, Ledger, MiningSignal};
use crate::error::{ChainError, Result};
use crate::p2p::{PeerError, PeerMessage, PeerRegistry, SyncAction, handle_message, spawn_peer};
use crate::transaction::Transaction;
use crate::wallet::Wallet;

pub type SharedLedger = Arc<Mutex<Ledger>>;

#[derive(Clone)]
pub struct Node {
    ledger: SharedLedger,
    peers: PeerRegistry,
    wallet: Arc<Wallet>,
    mining: MiningSignal,
}

impl Node {
    pub fn new(wallet: Wallet) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::new())),
            peers: PeerRegistry::new(),
            wallet: Arc::new(wallet),
            mining: MiningSignal::new(),
        }
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Accept peer connections on `address` in a background task.
    pub async fn start_p2p_server(
        &self,
        address: SocketAddr,
    ) -> std::result::Result<(SocketAddr, JoinHandle<()>), PeerError> {
        let listener = TcpListener::bind(address).await?;
        let local = listener.local_addr()?;
        info!("listening p2p port on: {}", local.port());

        let node = self.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, remote)) = listener.accept().await {
                if let Err(e) = spawn_peer(stream, node.clone()).await {
                    error!("Failed to create (incoming) peer {remote}: {e}");
                }
            }
        });
        Ok((local, handle))
    }

    pub async fn connect_to_peer(&self, peer: &str) -> std::result::Result<SocketAddr, PeerError> {
        let stream = TcpStream::connect(peer).await?;
        spawn_peer(stream, self.clone()).await
    }

    pub async fn on_peer_message(&self, from: SocketAddr, message: PeerMessage) {
        debug!("received message from {}: {:?}", from, message);
        let outcome = {
            let mut ledger = self.ledger.lock().await;
            handle_message(&mut ledger, message)
        };
        if outcome.chain_advanced {
            self.mining.interrupt();
        }
        for action in outcome.actions {
            match action {
                SyncAction::Reply(reply) => self.peers.send_to(&from, reply).await,
                SyncAction::Broadcast(message) => self.peers.broadcast(message).await,
            }
        }
    }

    pub async fn broadcast_latest(&self) {
        let latest = self.ledger.lock().await.latest_block().clone();
        self.peers
            .broadcast(PeerMessage::ResponseBlockchain(vec![latest]))
            .await;
    }

    pub async fn broadcast_pool(&self) {
        let pool = self.ledger.lock().await.pool().snapshot();
        self.peers
            .broadcast(PeerMessage::ResponseTransactionPool(pool))
            .await;
    }

    /// Mine a block with the wallet's coinbase and the current pool.
    pub async fn generate_next_block(&self) -> Result<Block> {
        let txs = self.ledger.lock().await.block_data(&self.wallet);
        self.generate_raw_next_block(txs).await
    }

    /// Mine a block with the wallet's coinbase and one new payment.
    pub async fn generate_next_block_with_transaction(
        &self,
        receiver: &str,
        amount: u64,
    ) -> Result<Block> {
        let txs = self
            .ledger
            .lock()
            .await
            .block_data_with_transaction(&self.wallet, receiver, amount)?;
        self.generate_raw_next_block(txs).await
    }

    /// Mine a block carrying exactly `transactions`.
    pub async fn generate_raw_next_block(&self, transactions: Vec<Transaction>) -> Result<Block> {
        let template = self.ledger.lock().await.next_block_template(transactions);
        self.mine_template(template).await
    }

    /// Search a nonce for `template` off the async runtime, then append and
    /// announce the block. Fails with `StaleBlock` when a peer block moves the
    /// head first, either during the search or before the append.
    pub async fn mine_template(&self, template: BlockTemplate) -> Result<Block> {
        let ticket = self.mining.ticket();
        let parent = template.previous_hash.clone();

        let found = tokio::task::spawn_blocking(move || template.mine_cancellable(&ticket))
            .await
            .map_err(|e| ChainError::MiningAborted(e.to_string()))?;
        let Some(block) = found else {
            info!("mining on top of {} interrupted by a block from a peer", parent);
            return Err(ChainError::StaleBlock(format!(
                "chain moved past {} while mining",
                parent
            )));
        };

        {
            let mut ledger = self.ledger.lock().await;
            if ledger.latest_block().hash != block.previous_hash {
                warn!("discarding mined block #{}: parent is no longer the head", block.index);
                return Err(ChainError::StaleBlock(format!(
                    "block #{} builds on {}",
                    block.index, block.previous_hash
                )));
            }
            ledger.add_block(block.clone())?;
        }
        info!(
            "MINER - sealed block #{} (hash={}, nonce={})",
            block.index, block.hash, block.nonce
        );
        self.broadcast_latest().await;
        Ok(block)
    }

    /// Create a payment from the wallet, pool it and announce the pool.
    pub async fn send_transaction(&self, receiver: &str, amount: u64) -> Result<Transaction> {
        let tx = self
            .ledger
            .lock()
            .await
            .send_transaction(&self.wallet, receiver, amount)?;
        self.broadcast_pool().await;
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::validation::tests::{KEY_ONE, KEY_TWO, addr_of};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::time::{Instant, sleep, timeout};

    fn node(key: &str) -> Node {
        Node::new(Wallet::from_private_key(key).unwrap())
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !check().await {
            assert!(Instant::now() < deadline, "condition not reached in time");
            sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn mined_block_reaches_connected_peer() {
        let a = &node(KEY_ONE);
        let b = &node(KEY_TWO);
        let (addr, _server) = a
            .start_p2p_server(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        b.connect_to_peer(&addr.to_string()).await.unwrap();
        eventually(|| async move { a.peers().len().await == 1 }).await;

        let block = a.generate_next_block().await.unwrap();
        assert_eq!(block.index, 1);

        eventually(|| async move { b.ledger().lock().await.chain().len() == 2 }).await;
        assert_eq!(b.ledger().lock().await.latest_block(), &block);
    }

    #[tokio::test]
    async fn late_joiner_catches_up_on_full_chain() {
        let a = &node(KEY_ONE);
        for _ in 0..3 {
            a.generate_next_block().await.unwrap();
        }
        let (addr, _server) = a
            .start_p2p_server(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();

        let b = &node(KEY_TWO);
        b.connect_to_peer(&addr.to_string()).await.unwrap();

        let expected = &a.ledger().lock().await.chain().to_vec();
        eventually(|| async move { b.ledger().lock().await.chain() == expected.as_slice() }).await;
    }

    #[tokio::test]
    async fn pooled_transaction_propagates() {
        let a = &node(KEY_ONE);
        let b = &node(KEY_TWO);
        let (addr, _server) = a
            .start_p2p_server(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        b.connect_to_peer(&addr.to_string()).await.unwrap();
        eventually(|| async move { a.peers().len().await == 1 }).await;

        let tx = a.send_transaction(&addr_of(KEY_TWO), 25).await.unwrap();
        let id = tx.id.as_str();
        eventually(|| async move { b.ledger().lock().await.pool().contains(id) }).await;
    }

    #[tokio::test]
    async fn mining_without_peers_appends_locally() {
        let a = &node(KEY_ONE);
        let block = a.generate_next_block_with_transaction(&addr_of(KEY_TWO), 40).await.unwrap();
        let ledger = a.ledger().lock().await;
        assert_eq!(ledger.latest_block(), &block);
        assert_eq!(ledger.balance_of(&addr_of(KEY_TWO)), 40);
    }

    #[tokio::test]
    async fn undecodable_line_does_not_drop_the_peer() {
        let a = &node(KEY_ONE);
        let (addr, _server) = a
            .start_p2p_server(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();

        let (reader, mut writer) = TcpStream::connect(addr).await.unwrap().into_split();
        let mut lines = BufReader::new(reader).lines();
        let handshake = lines.next_line().await.unwrap().unwrap();
        assert_eq!(
            PeerMessage::decode(&handshake).unwrap(),
            PeerMessage::QueryLatest
        );

        writer.write_all(b"\xff\xfe garbage\n").await.unwrap();
        writer.write_all(b"{\"type\":\"QUERY_ALL\"}\n").await.unwrap();

        let reply = timeout(Duration::from_secs(5), async {
            loop {
                let line = lines.next_line().await.unwrap().unwrap();
                let message = PeerMessage::decode(&line).unwrap();
                if let PeerMessage::ResponseBlockchain(chain) = message {
                    return chain;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(reply.len(), 1);
        assert_eq!(a.peers().len().await, 1);
    }

    #[tokio::test]
    async fn peer_block_preempts_running_search() {
        let a = &node(KEY_ONE);
        let mut template = {
            let ledger = a.ledger().lock().await;
            ledger.next_block_template(ledger.block_data(a.wallet()))
        };
        template.difficulty = 64;
        let miner = a.clone();
        let search = tokio::spawn(async move { miner.mine_template(template).await });
        sleep(Duration::from_millis(50)).await;

        let mut remote = Ledger::new();
        let peer_block = remote
            .generate_next_block(&Wallet::from_private_key(KEY_TWO).unwrap())
            .unwrap();
        a.on_peer_message(
            SocketAddr::from(([127, 0, 0, 1], 9)),
            PeerMessage::ResponseBlockchain(vec![peer_block.clone()]),
        )
        .await;

        let result = timeout(Duration::from_secs(5), search).await.unwrap().unwrap();
        assert!(matches!(result, Err(ChainError::StaleBlock(_))));
        let ledger = a.ledger().lock().await;
        assert_eq!(ledger.chain().len(), 2);
        assert_eq!(ledger.latest_block(), &peer_block);
    }

    #[tokio::test]
    async fn block_mined_on_old_head_is_discarded() {
        let a = &node(KEY_ONE);
        let template = {
            let ledger = a.ledger().lock().await;
            ledger.next_block_template(ledger.block_data(a.wallet()))
        };
        let head = a
            .ledger()
            .lock()
            .await
            .generate_next_block(&Wallet::from_private_key(KEY_TWO).unwrap())
            .unwrap();

        let result = a.mine_template(template).await;
        assert!(matches!(result, Err(ChainError::StaleBlock(_))));
        let ledger = a.ledger().lock().await;
        assert_eq!(ledger.chain().len(), 2);
        assert_eq!(ledger.latest_block(), &head);
    }
}
