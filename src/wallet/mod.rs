//! Wallet management
//!
//! Key pairs, address derivation and the file-backed wallet store used to
//! sign transactions locally.

#[allow(clippy::module_inception)]
pub mod wallet;
pub mod wallets;

pub use wallet::{
    address_matches_key, convert_address, derive_address, hash_pub_key,
    pub_key_hash_from_address, validate_address, Wallet, ADDRESS_CHECK_SUM_LEN,
};
pub use wallets::{Wallets, WALLET_FILE};
