//! Structural, cryptographic and value checks for transactions and for the
//! transaction list of a block.

use log::{debug, warn};
use std::collections::HashSet;

use super::model::{COINBASE_AMOUNT, Transaction};
use super::utxo::{OutPoint, UtxoSet, apply_transactions};
use crate::error::{ChainError, Result};
use crate::wallet::keys::{address_from_private_key, sign_digest, verify_signature};

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A valid address is an uncompressed EC public key: "04" + X + Y, hex, 130 chars.
pub fn is_valid_address(address: &str) -> bool {
    if address.len() != 130 {
        debug!("invalid address length {}", address.len());
        return false;
    }
    if !is_hex(address) {
        debug!("address must contain only hex characters");
        return false;
    }
    if !address.starts_with("04") {
        debug!("address must start with 04");
        return false;
    }
    true
}

pub fn validate_structure(tx: &Transaction) -> Result<()> {
    if tx.id.len() != 64 || !is_hex(&tx.id) {
        return Err(ChainError::MalformedTransaction(format!(
            "id is not a 64 char hex digest: {:?}",
            tx.id
        )));
    }
    if tx.inputs.is_empty() {
        return Err(ChainError::MalformedTransaction(format!(
            "{} has no inputs",
            tx.id
        )));
    }
    if tx.outputs.is_empty() {
        return Err(ChainError::MalformedTransaction(format!(
            "{} has no outputs",
            tx.id
        )));
    }
    for (i, input) in tx.inputs.iter().enumerate() {
        if !is_hex(&input.outpoint.txid) || !is_hex(&input.signature) {
            return Err(ChainError::MalformedTransaction(format!(
                "{} input[{}] carries non-hex data",
                tx.id, i
            )));
        }
    }
    for (i, output) in tx.outputs.iter().enumerate() {
        if !is_valid_address(&output.address) {
            return Err(ChainError::MalformedTransaction(format!(
                "{} output[{}] has invalid address",
                tx.id, i
            )));
        }
        if output.amount == 0 {
            return Err(ChainError::MalformedTransaction(format!(
                "{} output[{}] has zero amount",
                tx.id, i
            )));
        }
    }
    Ok(())
}

/// Every problem found with `tx` against `utxo`, in check order.
///
/// All inputs are examined even after one fails, so the list names each bad
/// input. An empty list means the transaction is valid.
pub fn transaction_issues(tx: &Transaction, utxo: &UtxoSet) -> Vec<ChainError> {
    if let Err(e) = validate_structure(tx) {
        return vec![e];
    }

    let mut issues = Vec::new();
    let expected_id = tx.compute_id();
    if expected_id != tx.id {
        issues.push(ChainError::IdMismatch(format!(
            "stored {} computed {}",
            tx.id, expected_id
        )));
    }

    let mut seen = HashSet::<&OutPoint>::new();
    let mut input_sum: u128 = 0;
    let mut all_resolved = true;
    for (i, input) in tx.inputs.iter().enumerate() {
        let op = &input.outpoint;
        if !seen.insert(op) {
            issues.push(ChainError::DuplicateInput(format!(
                "{}:{} spent twice by {}",
                op.txid, op.vout, tx.id
            )));
            continue;
        }
        let Some(prev_out) = utxo.get(op) else {
            all_resolved = false;
            issues.push(ChainError::UnknownInput(format!(
                "{} input[{}] -> {}:{}",
                tx.id, i, op.txid, op.vout
            )));
            continue;
        };
        match verify_signature(&prev_out.address, &input.signature, &tx.id) {
            Ok(true) => {}
            Ok(false) => issues.push(ChainError::BadSignature(format!(
                "{} input[{}] not signed by {}",
                tx.id, i, prev_out.address
            ))),
            Err(reason) => issues.push(ChainError::BadSignature(format!(
                "{} input[{}]: {}",
                tx.id, i, reason
            ))),
        }
        input_sum += prev_out.amount as u128;
    }

    if all_resolved {
        let output_sum = tx.total_output_amount();
        if input_sum != output_sum {
            issues.push(ChainError::ValueMismatch(format!(
                "{} inputs {} outputs {}",
                tx.id, input_sum, output_sum
            )));
        }
    }

    for issue in &issues {
        warn!("transaction {} rejected: {}", tx.id, issue);
    }
    issues
}

/// Validate a regular (non-coinbase) transaction against the UTXO set.
pub fn validate_transaction(tx: &Transaction, utxo: &UtxoSet) -> Result<()> {
    match transaction_issues(tx, utxo).into_iter().next() {
        Some(first) => Err(first),
        None => Ok(()),
    }
}

pub fn validate_coinbase(tx: &Transaction, block_index: u64) -> Result<()> {
    validate_structure(tx)?;
    let expected_id = tx.compute_id();
    if expected_id != tx.id {
        return Err(ChainError::IdMismatch(format!(
            "coinbase stored {} computed {}",
            tx.id, expected_id
        )));
    }
    if tx.inputs.len() != 1 {
        return Err(ChainError::InvalidCoinbase(
            "exactly one input must be specified".into(),
        ));
    }
    let input = &tx.inputs[0];
    if !input.outpoint.txid.is_empty() {
        return Err(ChainError::InvalidCoinbase(
            "coinbase input must not reference an output".into(),
        ));
    }
    if input.outpoint.vout != block_index {
        return Err(ChainError::InvalidCoinbase(format!(
            "input index {} must equal block index {}",
            input.outpoint.vout, block_index
        )));
    }
    if tx.outputs.len() != 1 {
        return Err(ChainError::InvalidCoinbase(
            "exactly one output must be specified".into(),
        ));
    }
    if tx.outputs[0].amount != COINBASE_AMOUNT {
        return Err(ChainError::InvalidCoinbase(format!(
            "amount {} must be {}",
            tx.outputs[0].amount, COINBASE_AMOUNT
        )));
    }
    Ok(())
}

pub fn validate_block_transactions(
    txs: &[Transaction],
    utxo: &UtxoSet,
    block_index: u64,
) -> Result<()> {
    let coinbase = txs.first().ok_or_else(|| {
        ChainError::InvalidCoinbase("the first transaction must be the coinbase".into())
    })?;
    validate_coinbase(coinbase, block_index)?;

    // each outpoint may be consumed once per block
    let mut seen = HashSet::<&OutPoint>::new();
    for input in txs.iter().flat_map(|t| t.inputs.iter()) {
        if !seen.insert(&input.outpoint) {
            return Err(ChainError::DuplicateInput(format!(
                "{}:{} spent twice in block {}",
                input.outpoint.txid, input.outpoint.vout, block_index
            )));
        }
    }

    for tx in &txs[1..] {
        validate_transaction(tx, utxo)?;
    }
    Ok(())
}

/// Validate the transactions of block `block_index` and return the UTXO set
/// they produce. On failure no set is returned.
pub fn process_transactions(
    txs: &[Transaction],
    utxo: &UtxoSet,
    block_index: u64,
) -> Result<UtxoSet> {
    if let Err(e) = validate_block_transactions(txs, utxo, block_index) {
        warn!("invalid transactions in block {}: {}", block_index, e);
        return Err(e);
    }
    Ok(apply_transactions(txs, utxo))
}

/// Sign input `input_index` of `tx` with `private_key`. The key must own the
/// output that input references.
pub fn sign_input(
    tx: &Transaction,
    input_index: usize,
    private_key: &str,
    utxo: &UtxoSet,
) -> Result<String> {
    let input = tx.inputs.get(input_index).ok_or_else(|| {
        ChainError::MalformedTransaction(format!("{} has no input[{}]", tx.id, input_index))
    })?;
    let referenced = utxo.get(&input.outpoint).ok_or_else(|| {
        ChainError::UnknownInput(format!(
            "{}:{}",
            input.outpoint.txid, input.outpoint.vout
        ))
    })?;
    let signer = address_from_private_key(private_key)?;
    if signer != referenced.address {
        return Err(ChainError::KeyMismatch(format!(
            "input[{}] belongs to {}",
            input_index, referenced.address
        )));
    }
    sign_digest(private_key, &tx.id)
}
