//! Ledger state storage
//!
//! The unspent-output pool the ledger validates against, and the binary
//! snapshot that carries the whole ledger across restarts.

pub mod snapshot;
pub mod utxo_pool;

pub use snapshot::LedgerSnapshot;
pub use utxo_pool::UtxoPool;
