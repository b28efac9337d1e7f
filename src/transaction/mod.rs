pub mod model;
pub mod pool;
pub mod utxo;
pub mod validation;

pub use model::{Transaction, TxInput, TxOutput};
pub use pool::TransactionPool;
pub use utxo::{OutPoint, UnspentOutput, UtxoSet, apply_transactions};
pub use validation::{is_valid_address, process_transactions, sign_input};
