use log::{debug, info, warn};

use super::block::{Block, now_timestamp, validate_new_block};
use super::difficulty::{accumulated_difficulty, get_difficulty};
use super::miner::{MiningTicket, find_block_cancellable};
use crate::error::{ChainError, Result};
use crate::transaction::{
    Transaction, TransactionPool, UnspentOutput, UtxoSet, apply_transactions,
    process_transactions,
};
use crate::wallet::{self, Wallet};

/// Chain, UTXO set and pending pool of one node.
///
/// The three parts form one consistency domain: every mutating operation
/// either updates all of them or leaves all of them untouched.
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Never empty: starts as `[genesis]` and is only ever extended or
    /// swapped for another validated chain, which also starts with genesis.
    chain: Vec<Block>,
    genesis: Block,
    utxo: UtxoSet,
    pool: TransactionPool,
}

/// Everything needed to mine the next block, captured from the ledger so the
/// nonce search can run without holding it.
#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub index: u64,
    pub previous_hash: String,
    pub timestamp: i64,
    pub difficulty: u32,
    pub transactions: Vec<Transaction>,
}

impl BlockTemplate {
    #[cfg(test)]
    pub fn mine(self) -> Block {
        super::miner::find_block(
            self.index,
            &self.previous_hash,
            self.timestamp,
            self.transactions,
            self.difficulty,
        )
    }

    pub fn mine_cancellable(self, ticket: &MiningTicket) -> Option<Block> {
        find_block_cancellable(
            self.index,
            &self.previous_hash,
            self.timestamp,
            self.transactions,
            self.difficulty,
            ticket,
        )
    }
}

/// Replay `chain` from an empty UTXO set. Returns the resulting set, or an
/// error if any block or transaction is invalid.
pub fn is_valid_chain(chain: &[Block]) -> Result<UtxoSet> {
    let genesis = Block::genesis();
    match chain.first() {
        Some(first) if *first == genesis => {}
        _ => return Err(ChainError::InvalidChain("genesis block mismatch".into())),
    }

    let mut utxo = UtxoSet::new();
    for (i, block) in chain.iter().enumerate() {
        if i != 0 {
            validate_new_block(block, &chain[i - 1])
                .map_err(|e| ChainError::InvalidChain(format!("block {}: {}", i, e)))?;
        }
        utxo = process_transactions(&block.transactions, &utxo, block.index)
            .map_err(|e| ChainError::InvalidChain(format!("block {}: {}", i, e)))?;
    }
    Ok(utxo)
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Start from the genesis block alone.
    pub fn new() -> Self {
        let genesis = Block::genesis();
        let utxo = apply_transactions(&genesis.transactions, &UtxoSet::new());
        Self {
            chain: vec![genesis.clone()],
            genesis,
            utxo,
            pool: TransactionPool::new(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn latest_block(&self) -> &Block {
        match self.chain.last() {
            Some(head) => head,
            None => &self.genesis,
        }
    }

    pub fn utxo(&self) -> &UtxoSet {
        &self.utxo
    }

    pub fn unspent_outputs(&self) -> Vec<UnspentOutput> {
        self.utxo.unspent_outputs()
    }

    pub fn unspent_outputs_of(&self, address: &str) -> Vec<UnspentOutput> {
        wallet::find_unspent_outputs(address, &self.utxo)
    }

    pub fn balance_of(&self, address: &str) -> u128 {
        wallet::balance(address, &self.utxo)
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    /// Difficulty required of the next block.
    pub fn difficulty(&self) -> u32 {
        get_difficulty(&self.chain)
    }

    pub fn accumulated_difficulty(&self) -> u128 {
        accumulated_difficulty(&self.chain)
    }

    pub fn find_block(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|b| b.hash == hash)
    }

    pub fn find_transaction(&self, id: &str) -> Option<&Transaction> {
        self.chain
            .iter()
            .flat_map(|b| b.transactions.iter())
            .find(|t| t.id == id)
    }

    /// Append `block` on top of the head. On any failure nothing changes.
    pub fn add_block(&mut self, block: Block) -> Result<()> {
        validate_new_block(&block, self.latest_block())?;
        let next_utxo = process_transactions(&block.transactions, &self.utxo, block.index)?;

        info!(
            "appending block #{} (hash={}, txs={})",
            block.index,
            block.hash,
            block.transactions.len()
        );
        self.chain.push(block);
        self.utxo = next_utxo;
        self.pool.prune(&self.utxo);
        Ok(())
    }

    /// Adopt `candidate` if it is valid and strictly heavier than the current
    /// chain. On rejection nothing changes.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<()> {
        let next_utxo = is_valid_chain(&candidate).inspect_err(|e| {
            warn!("received blockchain invalid: {}", e);
        })?;

        let current_weight = self.accumulated_difficulty();
        let candidate_weight = accumulated_difficulty(&candidate);
        if candidate_weight <= current_weight {
            debug!(
                "received chain weight {} does not beat {}",
                candidate_weight, current_weight
            );
            return Err(ChainError::InvalidChain(format!(
                "accumulated difficulty {} does not exceed {}",
                candidate_weight, current_weight
            )));
        }

        info!(
            "replacing chain: {} blocks (weight {}) -> {} blocks (weight {})",
            self.chain.len(),
            current_weight,
            candidate.len(),
            candidate_weight
        );
        self.chain = candidate;
        self.utxo = next_utxo;
        self.pool.prune(&self.utxo);
        Ok(())
    }

    pub fn admit_transaction(&mut self, tx: Transaction) -> Result<()> {
        self.pool.admit(tx, &self.utxo)
    }

    pub fn next_block_template(&self, transactions: Vec<Transaction>) -> BlockTemplate {
        let previous = self.latest_block();
        BlockTemplate {
            index: previous.index + 1,
            previous_hash: previous.hash.clone(),
            timestamp: now_timestamp(),
            difficulty: self.difficulty(),
            transactions,
        }
    }

    /// Coinbase to the wallet followed by every pooled transaction.
    pub fn block_data(&self, wallet: &Wallet) -> Vec<Transaction> {
        let coinbase =
            Transaction::coinbase(wallet.public_address(), self.latest_block().index + 1);
        let mut txs = vec![coinbase];
        txs.extend(self.pool.snapshot());
        txs
    }

    /// Coinbase to the wallet followed by one new payment to `receiver`.
    pub fn block_data_with_transaction(
        &self,
        wallet: &Wallet,
        receiver: &str,
        amount: u64,
    ) -> Result<Vec<Transaction>> {
        let coinbase =
            Transaction::coinbase(wallet.public_address(), self.latest_block().index + 1);
        let payment = wallet::create_transaction(
            receiver,
            amount,
            wallet.private_key(),
            &self.utxo,
            &self.pool.snapshot(),
        )?;
        Ok(vec![coinbase, payment])
    }

    /// Mine `transactions` on top of the head and append the result, all
    /// under `&mut self`. The node mines off-lock instead.
    #[cfg(test)]
    pub fn generate_raw_next_block(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        let block = self.next_block_template(transactions).mine();
        self.add_block(block.clone())?;
        Ok(block)
    }

    #[cfg(test)]
    pub fn generate_next_block(&mut self, wallet: &Wallet) -> Result<Block> {
        let txs = self.block_data(wallet);
        self.generate_raw_next_block(txs)
    }

    #[cfg(test)]
    pub fn generate_next_block_with_transaction(
        &mut self,
        wallet: &Wallet,
        receiver: &str,
        amount: u64,
    ) -> Result<Block> {
        let txs = self.block_data_with_transaction(wallet, receiver, amount)?;
        self.generate_raw_next_block(txs)
    }

    /// Create a signed payment from the wallet and admit it to the pool.
    pub fn send_transaction(
        &mut self,
        wallet: &Wallet,
        receiver: &str,
        amount: u64,
    ) -> Result<Transaction> {
        let tx = wallet::create_transaction(
            receiver,
            amount,
            wallet.private_key(),
            &self.utxo,
            &self.pool.snapshot(),
        )?;
        self.admit_transaction(tx.clone())?;
        Ok(tx)
    }
}
