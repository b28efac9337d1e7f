use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::model::{Transaction, TxOutput};

/// Identifies a specific transaction output by its txid and index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: String,
    pub vout: u64,
}

/// Flat view of one spendable output, as exposed to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub txid: String,
    pub vout: u64,
    pub address: String,
    pub amount: u64,
}

/// Spendable outputs keyed by (txid, vout).
///
/// The set is derived from the chain and is never edited in place by the
/// ledger: every accepted block produces a fresh set via [`apply_transactions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    map: BTreeMap<OutPoint, TxOutput>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Insert a single output into the set.
    pub fn insert(&mut self, outpoint: OutPoint, output: TxOutput) {
        self.map.insert(outpoint, output);
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.map.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.map.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutput)> {
        self.map.iter()
    }

    pub fn total_value(&self) -> u128 {
        self.map.values().map(|o| o.amount as u128).sum()
    }

    pub fn unspent_outputs(&self) -> Vec<UnspentOutput> {
        self.iter()
            .map(|(op, out)| UnspentOutput {
                txid: op.txid.clone(),
                vout: op.vout,
                address: out.address.clone(),
                amount: out.amount,
            })
            .collect()
    }

    /// Outputs owned by `address`, in (txid, vout) order.
    pub fn owned_by(&self, address: &str) -> Vec<UnspentOutput> {
        self.unspent_outputs()
            .into_iter()
            .filter(|u| u.address == address)
            .collect()
    }
}

/// Produce the set that results from `txs`: every consumed outpoint is
/// removed and each output is added under (tx.id, position).
///
/// Does not validate; callers go through `process_transactions`.
pub fn apply_transactions(txs: &[Transaction], utxo: &UtxoSet) -> UtxoSet {
    let mut next = utxo.clone();
    for tx in txs {
        for input in &tx.inputs {
            next.map.remove(&input.outpoint);
        }
    }
    for tx in txs {
        for (i, out) in tx.outputs.iter().enumerate() {
            next.insert(
                OutPoint {
                    txid: tx.id.clone(),
                    vout: i as u64,
                },
                out.clone(),
            );
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{TxInput, TxOutput};

    fn addr(tag: &str) -> String {
        format!("04{}", tag.repeat(64))
    }

    #[test]
    fn apply_removes_inputs_and_adds_outputs() {
        let mut utxo = UtxoSet::new();
        let spent = OutPoint {
            txid: "11".repeat(32),
            vout: 0,
        };
        let kept = OutPoint {
            txid: "22".repeat(32),
            vout: 3,
        };
        utxo.insert(
            spent.clone(),
            TxOutput {
                address: addr("aa"),
                amount: 40,
            },
        );
        utxo.insert(
            kept.clone(),
            TxOutput {
                address: addr("aa"),
                amount: 7,
            },
        );

        let tx = Transaction::new(
            vec![TxInput::unsigned(spent.clone())],
            vec![
                TxOutput {
                    address: addr("bb"),
                    amount: 30,
                },
                TxOutput {
                    address: addr("aa"),
                    amount: 10,
                },
            ],
        );
        let next = apply_transactions(std::slice::from_ref(&tx), &utxo);

        assert_eq!(next.len(), utxo.len() - tx.inputs.len() + tx.outputs.len());
        assert_eq!(next.total_value(), utxo.total_value());
        assert!(!next.contains(&spent));
        assert!(next.contains(&kept));
        let second = OutPoint {
            txid: tx.id.clone(),
            vout: 1,
        };
        assert_eq!(next.get(&second).map(|o| o.amount), Some(10));
        // source set untouched
        assert!(utxo.contains(&spent));
    }

    #[test]
    fn owned_by_filters_on_address() {
        let mut utxo = UtxoSet::new();
        for (i, tag) in ["aa", "bb", "aa"].iter().enumerate() {
            utxo.insert(
                OutPoint {
                    txid: "33".repeat(32),
                    vout: i as u64,
                },
                TxOutput {
                    address: addr(tag),
                    amount: 1,
                },
            );
        }
        let mine = utxo.owned_by(&addr("aa"));
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].vout, 0);
        assert_eq!(mine[1].vout, 2);
    }
}
