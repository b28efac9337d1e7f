use log::{debug, info, warn};
use std::collections::HashSet;

use super::model::Transaction;
use super::utxo::{OutPoint, UtxoSet};
use super::validation::validate_transaction;
use crate::error::{ChainError, Result};

/// Pending transactions. No two entries spend the same outpoint, and every
/// entry only spends outputs present in the UTXO set it was last pruned with.
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    transactions: Vec<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self {
            transactions: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.transactions.iter().any(|t| t.id == id)
    }

    /// Owned copy for transmission or mining.
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    /// Outpoints consumed by pooled transactions.
    pub fn spent_outpoints(&self) -> HashSet<&OutPoint> {
        self.transactions
            .iter()
            .flat_map(|t| t.inputs.iter().map(|i| &i.outpoint))
            .collect()
    }

    /// Insert `tx` if it is valid against `utxo` and spends nothing another
    /// pooled transaction already spends. Conflicts are rejected, never replaced.
    pub fn admit(&mut self, tx: Transaction, utxo: &UtxoSet) -> Result<()> {
        if let Err(e) = validate_transaction(&tx, utxo) {
            return Err(ChainError::InvalidTransaction(Box::new(e)));
        }

        let spent = self.spent_outpoints();
        if let Some(input) = tx.inputs.iter().find(|i| spent.contains(&i.outpoint)) {
            warn!(
                "pool rejects {}: {}:{} already spent in pool",
                tx.id, input.outpoint.txid, input.outpoint.vout
            );
            return Err(ChainError::PoolConflict(format!(
                "{}:{}",
                input.outpoint.txid, input.outpoint.vout
            )));
        }

        debug!("adding {} to pool (size {})", tx.id, self.transactions.len() + 1);
        self.transactions.push(tx);
        Ok(())
    }

    /// Drop every transaction that spends an outpoint missing from `utxo`.
    /// Returns how many were removed.
    pub fn prune(&mut self, utxo: &UtxoSet) -> usize {
        let before = self.transactions.len();
        self.transactions
            .retain(|t| t.inputs.iter().all(|i| utxo.contains(&i.outpoint)));
        let removed = before - self.transactions.len();
        if removed > 0 {
            info!("pruned {} stale transactions from pool", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TxOutput;
    use crate::transaction::validation::tests::{KEY_ONE, KEY_TWO, addr_of, funded, signed_spend};

    fn to(key: &str, amount: u64) -> Vec<TxOutput> {
        vec![TxOutput {
            address: addr_of(key),
            amount,
        }]
    }

    #[test]
    fn admits_valid_transaction() {
        let (utxo, op) = funded();
        let tx = signed_spend(&utxo, &[op], to(KEY_TWO, 50), KEY_ONE);
        let mut pool = TransactionPool::new();
        pool.admit(tx.clone(), &utxo).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&tx.id));
    }

    #[test]
    fn same_transaction_twice_conflicts() {
        let (utxo, op) = funded();
        let tx = signed_spend(&utxo, &[op], to(KEY_TWO, 50), KEY_ONE);
        let mut pool = TransactionPool::new();
        pool.admit(tx.clone(), &utxo).unwrap();
        assert!(matches!(
            pool.admit(tx, &utxo),
            Err(ChainError::PoolConflict(_))
        ));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn double_spend_rejected_in_either_order() {
        let (utxo, op) = funded();
        let a = signed_spend(&utxo, &[op.clone()], to(KEY_TWO, 50), KEY_ONE);
        let b = signed_spend(&utxo, &[op], to(KEY_ONE, 50), KEY_ONE);

        for (first, second) in [(a.clone(), b.clone()), (b, a)] {
            let mut pool = TransactionPool::new();
            pool.admit(first, &utxo).unwrap();
            assert!(matches!(
                pool.admit(second, &utxo),
                Err(ChainError::PoolConflict(_))
            ));
        }
    }

    #[test]
    fn invalid_transaction_is_wrapped() {
        let (utxo, op) = funded();
        let tx = signed_spend(&utxo, &[op], to(KEY_TWO, 10), KEY_ONE);
        let mut pool = TransactionPool::new();
        match pool.admit(tx, &utxo) {
            Err(ChainError::InvalidTransaction(inner)) => {
                assert!(matches!(*inner, ChainError::ValueMismatch(_)))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(pool.is_empty());
    }

    #[test]
    fn prune_keeps_entries_with_live_inputs() {
        let (utxo, op) = funded();
        let tx = signed_spend(&utxo, &[op], to(KEY_TWO, 50), KEY_ONE);
        let mut pool = TransactionPool::new();
        pool.admit(tx, &utxo).unwrap();
        assert_eq!(pool.prune(&utxo), 0);
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.prune(&UtxoSet::new()), 1);
        assert!(pool.is_empty());
    }
}
