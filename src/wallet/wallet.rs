use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;
const PUB_KEY_HASH_LEN: usize = 20;

/// A P-256 key pair and the address derived from it.
///
/// The PKCS#8 document is wiped from memory when the wallet is dropped.
#[derive(
    Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode, Zeroize, ZeroizeOnDrop,
)]
pub struct Wallet {
    pkcs8: Vec<u8>,
    public_key: Vec<u8>,
}

impl Wallet {
    pub fn new() -> Result<Wallet> {
        let (pkcs8, public_key) = crate::utils::generate_key_pair()?;
        Ok(Wallet { pkcs8, public_key })
    }

    /// Rebuild a wallet from a stored PKCS#8 document.
    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Wallet> {
        let public_key = crate::utils::public_key_from_pkcs8(pkcs8)?;
        Ok(Wallet {
            pkcs8: pkcs8.to_vec(),
            public_key,
        })
    }

    pub fn get_address(&self) -> String {
        derive_address(self.public_key.as_slice())
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_pkcs8(&self) -> &[u8] {
        self.pkcs8.as_slice()
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        crate::utils::ecdsa_p256_sha256_sign_digest(self.pkcs8.as_slice(), message)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.get_address())
            .finish_non_exhaustive()
    }
}

pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    let pub_key_sha256 = crate::utils::sha256_digest(pub_key);
    crate::utils::ripemd160_digest(pub_key_sha256.as_slice())
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let first_sha = crate::utils::sha256_digest(payload);
    let second_sha = crate::utils::sha256_digest(first_sha.as_slice());
    second_sha[0..ADDRESS_CHECK_SUM_LEN].to_vec()
}

/// version + RIPEMD160(SHA256(public_key)) + checksum, Base58 encoded.
/// One-way: there is no way back from an address to its key.
pub fn derive_address(public_key: &[u8]) -> String {
    convert_address(hash_pub_key(public_key).as_slice())
}

pub fn validate_address(address: &str) -> bool {
    let payload = match crate::utils::base58_decode(address) {
        Ok(payload) => payload,
        Err(_) => return false, // Invalid base58 encoding
    };

    if payload.len() != 1 + PUB_KEY_HASH_LEN + ADDRESS_CHECK_SUM_LEN {
        return false;
    }

    let actual_checksum = payload[payload.len() - ADDRESS_CHECK_SUM_LEN..].to_vec();
    let target_checksum = checksum(&payload[..payload.len() - ADDRESS_CHECK_SUM_LEN]);
    actual_checksum.eq(target_checksum.as_slice())
}

/// Extract the public key hash an address commits to.
pub fn pub_key_hash_from_address(address: &str) -> Result<Vec<u8>> {
    if !validate_address(address) {
        return Err(BlockchainError::InvalidAddress(address.to_string()));
    }
    let payload = crate::utils::base58_decode(address)?;
    Ok(payload[1..payload.len() - ADDRESS_CHECK_SUM_LEN].to_vec())
}

/// Does `address` derive from `public_key`?
pub fn address_matches_key(address: &str, public_key: &[u8]) -> bool {
    validate_address(address) && derive_address(public_key) == address
}

pub fn convert_address(pub_hash_key: &[u8]) -> String {
    let mut payload: Vec<u8> = vec![];
    payload.push(VERSION);
    payload.extend(pub_hash_key);
    let checksum = checksum(payload.as_slice());
    payload.extend(checksum.as_slice());
    crate::utils::base58_encode(payload.as_slice())
}
