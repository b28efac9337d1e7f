use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::utxo::OutPoint;

/// Reward paid out by the coinbase transaction of every block.
pub const COINBASE_AMOUNT: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// References a previous unspent output (UTXO).
    /// A coinbase input has an empty txid and carries the block index in `vout`.
    pub outpoint: OutPoint,
    /// Hex-encoded DER ECDSA signature over the transaction id; empty until signed.
    pub signature: String,
}

impl TxInput {
    pub fn unsigned(outpoint: OutPoint) -> Self {
        Self {
            outpoint,
            signature: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Hex of the owner's uncompressed public key ("04" + X + Y).
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// SHA-256 over the referenced outpoints and the outputs. Signatures are
    /// not part of the id, so signing never changes it.
    pub id: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Build a transaction and compute its id from its content.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let id = transaction_id(&inputs, &outputs);
        Self {
            id,
            inputs,
            outputs,
        }
    }

    /// Reward transaction for the block at `block_index`, paying `address`.
    pub fn coinbase(address: &str, block_index: u64) -> Self {
        Self::new(
            vec![TxInput::unsigned(OutPoint {
                txid: String::new(),
                vout: block_index,
            })],
            vec![TxOutput {
                address: address.to_string(),
                amount: COINBASE_AMOUNT,
            }],
        )
    }

    pub fn compute_id(&self) -> String {
        transaction_id(&self.inputs, &self.outputs)
    }

    pub fn total_output_amount(&self) -> u128 {
        self.outputs.iter().map(|o| o.amount as u128).sum()
    }

    /// Append the fixed-order preimage of this transaction to `buf`.
    /// Used by the block hash; signatures are included.
    pub fn write_canonical(&self, buf: &mut String) {
        buf.push_str(&self.id);
        for input in &self.inputs {
            buf.push(':');
            buf.push_str(&input.outpoint.txid);
            buf.push(':');
            buf.push_str(&input.outpoint.vout.to_string());
            buf.push(':');
            buf.push_str(&input.signature);
        }
        buf.push('|');
        for output in &self.outputs {
            buf.push(':');
            buf.push_str(&output.address);
            buf.push(':');
            buf.push_str(&output.amount.to_string());
        }
        buf.push(';');
    }
}

/// SHA-256 of concat(input.txid + input.vout) followed by concat(output.address + output.amount).
pub fn transaction_id(inputs: &[TxInput], outputs: &[TxOutput]) -> String {
    let mut hasher = Sha256::new();
    for input in inputs {
        hasher.update(input.outpoint.txid.as_bytes());
        hasher.update(input.outpoint.vout.to_string().as_bytes());
    }
    for output in outputs {
        hasher.update(output.address.as_bytes());
        hasher.update(output.amount.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}
