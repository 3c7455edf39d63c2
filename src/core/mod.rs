//! Core ledger functionality
//!
//! Transactions and the unspent outputs they move, blocks sealed by
//! proof-of-work, Merkle commitments, and the [`Ledger`] that coordinates
//! submission and mining.

pub mod block;
pub mod ledger;
pub mod merkle;
pub mod monetary;
pub mod proof_of_work;
pub mod request;
pub mod transaction;

pub use block::{compute_block_hash, Block, GENESIS_PREVIOUS_HASH};
pub use ledger::{is_chain_valid, validate_chain, Ledger, Receipt, RequestOutcome};
pub use merkle::{merkle_root, MerkleProof, MerkleTree, ProofElement};
pub use monetary::{
    format_units, parse_units, units_per_coin, TransactionRules, DEFAULT_AMOUNT_SCALE,
    MAX_AMOUNT_SCALE,
};
pub use proof_of_work::{PowSolution, ProofOfWork, MAX_DIFFICULTY};
pub use request::{
    MiningRequest, PurchaseRequest, SignedPayload, SignedRequest, TransactionRequest,
    PURCHASE_MEMO_PREFIX,
};
pub use transaction::{Transaction, UnspentOutput, GENESIS_TRANSACTION_ID};
