//! Utility functions and helpers
//!
//! Hashing, signatures, encodings and the binary/JSON serialization layer
//! used throughout the ledger.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, base64_decode, base64_encode, canonical_signature,
    current_sequence, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, generate_key_pair, new_key_pair, public_key_from_pkcs8, ripemd160_digest, sha256_digest,
    sha256_hex, signature_replay_key,
};

pub use serialization::{deserialize, from_json, serialize, to_json};
