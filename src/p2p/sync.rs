//! Reaction of a node to each peer message. Pure over the ledger: the caller
//! holds the ledger lock and performs the returned sends.

use log::{debug, info, warn};

use super::message::PeerMessage;
use crate::blockchain::{Block, Ledger};
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// Send to the peer the message came from.
    Reply(PeerMessage),
    /// Send to every connected peer.
    Broadcast(PeerMessage),
}

#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub actions: Vec<SyncAction>,
    /// The head moved because of this message.
    pub chain_advanced: bool,
}

impl SyncOutcome {
    fn reply(message: PeerMessage) -> Self {
        Self {
            actions: vec![SyncAction::Reply(message)],
            chain_advanced: false,
        }
    }

    fn advanced(latest: &Block) -> Self {
        Self {
            actions: vec![SyncAction::Broadcast(PeerMessage::ResponseBlockchain(vec![
                latest.clone(),
            ]))],
            chain_advanced: true,
        }
    }
}

pub fn handle_message(ledger: &mut Ledger, message: PeerMessage) -> SyncOutcome {
    match message {
        PeerMessage::QueryLatest => SyncOutcome::reply(PeerMessage::ResponseBlockchain(vec![
            ledger.latest_block().clone(),
        ])),
        PeerMessage::QueryAll => {
            SyncOutcome::reply(PeerMessage::ResponseBlockchain(ledger.chain().to_vec()))
        }
        PeerMessage::ResponseBlockchain(blocks) => handle_blockchain_response(ledger, blocks),
        PeerMessage::QueryTransactionPool => {
            SyncOutcome::reply(PeerMessage::ResponseTransactionPool(ledger.pool().snapshot()))
        }
        PeerMessage::ResponseTransactionPool(txs) => handle_pool_response(ledger, txs),
    }
}

fn handle_blockchain_response(ledger: &mut Ledger, blocks: Vec<Block>) -> SyncOutcome {
    let Some(received) = blocks.last() else {
        debug!("received block chain size of 0");
        return SyncOutcome::default();
    };
    if let Err(e) = received.validate_structure() {
        warn!("block structure not valid: {}", e);
        return SyncOutcome::default();
    }

    let held = ledger.latest_block();
    if received.index <= held.index {
        debug!("received blockchain is not longer than local blockchain. Do nothing");
        return SyncOutcome::default();
    }
    debug!(
        "blockchain possibly behind. We got: {} Peer got: {}",
        held.index, received.index
    );

    if held.hash == received.previous_hash {
        let block = received.clone();
        return match ledger.add_block(block) {
            Ok(()) => SyncOutcome::advanced(ledger.latest_block()),
            Err(e) => {
                warn!("block from peer rejected: {}", e);
                SyncOutcome::default()
            }
        };
    }

    if blocks.len() == 1 {
        info!("we have to query the chain from our peer");
        return SyncOutcome::reply(PeerMessage::QueryAll);
    }

    info!("received blockchain is longer than current blockchain");
    match ledger.replace_chain(blocks) {
        Ok(()) => SyncOutcome::advanced(ledger.latest_block()),
        Err(e) => {
            debug!("candidate chain not adopted: {}", e);
            SyncOutcome::default()
        }
    }
}

fn handle_pool_response(ledger: &mut Ledger, txs: Vec<Transaction>) -> SyncOutcome {
    let mut admitted = 0usize;
    for tx in txs {
        let id = tx.id.clone();
        match ledger.admit_transaction(tx) {
            Ok(()) => admitted += 1,
            Err(e) => debug!("pooled transaction {} not admitted: {}", id, e),
        }
    }
    if admitted == 0 {
        return SyncOutcome::default();
    }
    debug!("admitted {} transactions from peer", admitted);
    SyncOutcome {
        actions: vec![SyncAction::Broadcast(PeerMessage::ResponseTransactionPool(
            ledger.pool().snapshot(),
        ))],
        chain_advanced: false,
    }
}
