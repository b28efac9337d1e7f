//! Node wallet: one secp256k1 secret kept in a file, plus helpers to build
//! signed transactions from the UTXO set.

pub mod keys;

use log::{debug, info};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{ChainError, Result};
use crate::transaction::{
    OutPoint, Transaction, TxInput, TxOutput, UnspentOutput, UtxoSet, is_valid_address,
    sign_input,
};

pub use keys::{address_from_private_key, generate_private_key};

#[derive(Debug, Clone)]
pub struct Wallet {
    private_key: String,
    address: String,
}

impl Wallet {
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let private_key = private_key.trim().to_string();
        let address = address_from_private_key(&private_key)?;
        Ok(Self {
            private_key,
            address,
        })
    }

    pub fn generate() -> Result<Self> {
        Self::from_private_key(&generate_private_key())
    }

    /// Read the secret at `path`, creating the file (and its directory) with
    /// a fresh key when it does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let stored = fs::read_to_string(path)
                .map_err(|e| ChainError::Wallet(format!("{}: {}", path.display(), e)))?;
            let wallet = Self::from_private_key(&stored)?;
            debug!("loaded wallet {} from {}", wallet.address, path.display());
            return Ok(wallet);
        }

        let wallet = Self::generate()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| ChainError::Wallet(format!("{}: {}", dir.display(), e)))?;
        }
        fs::write(path, &wallet.private_key)
            .map_err(|e| ChainError::Wallet(format!("{}: {}", path.display(), e)))?;
        info!("new wallet with private key created at {}", path.display());
        Ok(wallet)
    }

    pub fn public_address(&self) -> &str {
        &self.address
    }

    pub fn private_key(&self) -> &str {
        &self.private_key
    }
}

pub fn find_unspent_outputs(address: &str, utxo: &UtxoSet) -> Vec<UnspentOutput> {
    utxo.owned_by(address)
}

pub fn balance(address: &str, utxo: &UtxoSet) -> u128 {
    find_unspent_outputs(address, utxo)
        .iter()
        .map(|u| u.amount as u128)
        .sum()
}

/// Take outputs in order until `amount` is covered; returns them and the change.
fn find_outputs_for_amount(
    amount: u64,
    outputs: Vec<UnspentOutput>,
) -> Result<(Vec<UnspentOutput>, u64)> {
    let mut current: u128 = 0;
    let mut included = Vec::new();
    for output in outputs {
        current += output.amount as u128;
        included.push(output);
        if current >= amount as u128 {
            let left_over = (current - amount as u128) as u64;
            return Ok((included, left_over));
        }
    }
    Err(ChainError::InsufficientFunds {
        required: amount,
        available: current,
    })
}

fn create_outputs(
    receiver: &str,
    own_address: &str,
    amount: u64,
    left_over: u64,
) -> Vec<TxOutput> {
    let mut outputs = vec![TxOutput {
        address: receiver.to_string(),
        amount,
    }];
    if left_over > 0 {
        outputs.push(TxOutput {
            address: own_address.to_string(),
            amount: left_over,
        });
    }
    outputs
}

/// Build and sign a transaction paying `amount` to `receiver` from the
/// outputs owned by `private_key`. Outputs already spent by `pool` are skipped.
pub fn create_transaction(
    receiver: &str,
    amount: u64,
    private_key: &str,
    utxo: &UtxoSet,
    pool: &[Transaction],
) -> Result<Transaction> {
    if !is_valid_address(receiver) {
        return Err(ChainError::InvalidAddress(receiver.to_string()));
    }
    if amount == 0 {
        return Err(ChainError::MalformedTransaction(
            "amount must be positive".into(),
        ));
    }

    let own_address = address_from_private_key(private_key)?;
    let pending: HashSet<&OutPoint> = pool
        .iter()
        .flat_map(|t| t.inputs.iter().map(|i| &i.outpoint))
        .collect();
    let spendable: Vec<UnspentOutput> = find_unspent_outputs(&own_address, utxo)
        .into_iter()
        .filter(|u| {
            !pending.contains(&OutPoint {
                txid: u.txid.clone(),
                vout: u.vout,
            })
        })
        .collect();

    let (included, left_over) = find_outputs_for_amount(amount, spendable)?;
    let inputs = included
        .into_iter()
        .map(|u| {
            TxInput::unsigned(OutPoint {
                txid: u.txid,
                vout: u.vout,
            })
        })
        .collect();

    let mut tx = Transaction::new(
        inputs,
        create_outputs(receiver, &own_address, amount, left_over),
    );
    for i in 0..tx.inputs.len() {
        tx.inputs[i].signature = sign_input(&tx, i, private_key, utxo)?;
    }
    debug!(
        "created transaction {} ({} inputs, {} outputs)",
        tx.id,
        tx.inputs.len(),
        tx.outputs.len()
    );
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionPool;
    use crate::transaction::validation::validate_transaction;
    use crate::transaction::validation::tests::{KEY_ONE, KEY_TWO, addr_of, funded};

    #[test]
    fn creates_payment_with_change() {
        let (utxo, _) = funded();
        let tx = create_transaction(&addr_of(KEY_TWO), 20, KEY_ONE, &utxo, &[]).unwrap();
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].amount, 20);
        assert_eq!(tx.outputs[1].address, addr_of(KEY_ONE));
        assert_eq!(tx.outputs[1].amount, 30);
        assert_eq!(validate_transaction(&tx, &utxo), Ok(()));
    }

    #[test]
    fn exact_amount_has_no_change() {
        let (utxo, _) = funded();
        let tx = create_transaction(&addr_of(KEY_TWO), 50, KEY_ONE, &utxo, &[]).unwrap();
        assert_eq!(tx.outputs.len(), 1);
    }

    #[test]
    fn insufficient_funds() {
        let (utxo, _) = funded();
        assert_eq!(
            create_transaction(&addr_of(KEY_TWO), 51, KEY_ONE, &utxo, &[]),
            Err(ChainError::InsufficientFunds {
                required: 51,
                available: 50
            })
        );
    }

    #[test]
    fn skips_outputs_pending_in_pool() {
        let (utxo, _) = funded();
        let first = create_transaction(&addr_of(KEY_TWO), 10, KEY_ONE, &utxo, &[]).unwrap();
        let mut pool = TransactionPool::new();
        pool.admit(first, &utxo).unwrap();
        assert!(matches!(
            create_transaction(&addr_of(KEY_TWO), 10, KEY_ONE, &utxo, &pool.snapshot()),
            Err(ChainError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn rejects_bad_receiver() {
        let (utxo, _) = funded();
        assert!(matches!(
            create_transaction("not-an-address", 1, KEY_ONE, &utxo, &[]),
            Err(ChainError::InvalidAddress(_))
        ));
    }

    #[test]
    fn balance_sums_owned_outputs() {
        let (utxo, _) = funded();
        assert_eq!(balance(&addr_of(KEY_ONE), &utxo), 50);
        assert_eq!(balance(&addr_of(KEY_TWO), &utxo), 0);
    }

    #[test]
    fn load_or_create_persists_key() {
        let dir = std::env::temp_dir().join(format!("naivecoin-wallet-{}", std::process::id()));
        let path = dir.join("private_key");
        let _ = fs::remove_dir_all(&dir);

        let created = Wallet::load_or_create(&path).unwrap();
        let loaded = Wallet::load_or_create(&path).unwrap();
        assert_eq!(created.public_address(), loaded.public_address());
        assert_eq!(created.private_key(), loaded.private_key());
        assert!(is_valid_address(loaded.public_address()));

        let _ = fs::remove_dir_all(&dir);
    }
}
