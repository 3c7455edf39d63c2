//! # Architect Ledger
//!
//! A single-process ledger: signed transfers move value between unspent
//! outputs, pending transfers are sealed into proof-of-work blocks, and every
//! block commits to its transactions through a Merkle root.
//!
//! ## Layout
//! - `core/`: transactions, blocks, Merkle trees, proof-of-work and the
//!   [`Ledger`] that coordinates submission and mining
//! - `storage/`: the unspent-output pool and ledger snapshots
//! - `wallet/`: key pairs, addresses and the local wallet store
//! - `config/`: TOML and environment configuration
//! - `utils/`: hashing, signatures, encodings and serialization
//! - `cli/`: arguments for the `architect-ledger` binary
//!
//! ## Usage
//! ```no_run
//! use architect_ledger::{Ledger, LedgerConfig, Transaction, Wallet};
//!
//! # fn main() -> architect_ledger::Result<()> {
//! let config = LedgerConfig::default();
//! let alice = Wallet::new()?;
//! let bob = Wallet::new()?;
//! let ledger = Ledger::new(&config, &alice.get_address(), config.genesis_units()?)?;
//!
//! let amount = config.rules()?.parse_amount("80")?;
//! ledger.submit_transaction(Transaction::build_now(&alice, &bob.get_address(), amount)?)?;
//! ledger.mine()?;
//! assert!(ledger.is_chain_valid());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::LedgerConfig;
pub use core::{
    is_chain_valid, merkle_root, validate_chain, Block, Ledger, MerkleProof, MerkleTree,
    MiningRequest, ProofOfWork, PurchaseRequest, Receipt, RequestOutcome, SignedPayload,
    SignedRequest, Transaction, TransactionRequest, TransactionRules, UnspentOutput,
};
pub use error::{BlockchainError, Result};
pub use storage::{LedgerSnapshot, UtxoPool};
pub use utils::{
    base58_decode, base58_encode, base64_decode, base64_encode, current_timestamp,
    ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, generate_key_pair,
    new_key_pair, ripemd160_digest, sha256_digest, sha256_hex,
};
pub use wallet::{
    address_matches_key, convert_address, derive_address, hash_pub_key, validate_address,
    Wallet, Wallets, ADDRESS_CHECK_SUM_LEN,
};
