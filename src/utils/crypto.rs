use data_encoding::{BASE64, HEXLOWER};
use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{
    EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED, ECDSA_P256_SHA256_FIXED_SIGNING,
};
use num_bigint::BigUint;
use ripemd::{Digest as RipemdDigest, Ripemd160};

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    // Ensure the timestamp fits in i64
    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

/// Nanosecond clock reading used as a transaction sequence number.
pub fn current_sequence() -> Result<u64> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_nanos();

    u64::try_from(nanos).map_err(|_| BlockchainError::Crypto("Sequence overflow".to_string()))
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

/// SHA-256 rendered as lowercase hex. This is the digest used for every id
/// and block hash in the ledger.
pub fn sha256_hex(data: &[u8]) -> String {
    HEXLOWER.encode(&sha256_digest(data))
}

pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

pub fn base58_decode(data: &str) -> Result<Vec<u8>> {
    bs58::decode(data)
        .into_vec()
        .map_err(|e| BlockchainError::InvalidAddress(format!("Invalid base58 encoding: {e}")))
}

pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn base64_decode(data: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data.as_bytes())
        .map_err(|e| BlockchainError::Crypto(format!("Invalid base64 encoding: {e}")))
}

pub fn new_key_pair() -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?
        .as_ref()
        .to_vec();
    Ok(pkcs8)
}

/// Generate a P-256 key pair, returning `(pkcs8_private_key, public_key)`.
/// The public key is the uncompressed SEC1 point.
pub fn generate_key_pair() -> Result<(Vec<u8>, Vec<u8>)> {
    let pkcs8 = new_key_pair()?;
    let public_key = public_key_from_pkcs8(&pkcs8)?;
    Ok((pkcs8, public_key))
}

pub fn public_key_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| {
            BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
        })?;
    Ok(key_pair.public_key().as_ref().to_vec())
}

pub fn ecdsa_p256_sha256_sign_digest(pkcs8: &[u8], message: &[u8]) -> Result<Vec<u8>> {
    let rng = ring::rand::SystemRandom::new();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8, &rng)
        .map_err(|e| {
            BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
        })?;
    let signature = key_pair
        .sign(&rng, message)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to sign message: {e}")))?
        .as_ref()
        .to_vec();
    Ok(signature)
}

/// Never fails: malformed keys or signatures simply do not verify.
pub fn ecdsa_p256_sha256_sign_verify(public_key: &[u8], signature: &[u8], message: &[u8]) -> bool {
    let peer_public_key =
        ring::signature::UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, public_key);
    let result = peer_public_key.verify(message, signature.as_ref());
    result.is_ok()
}

// Order of the P-256 group. A fixed signature is r || s, and ring accepts
// both (r, s) and (r, n - s), so I fold the high half of s onto the low half
// whenever I need one stable identity per signature
const P256_ORDER_HEX: &[u8] = b"ffffffff00000000ffffffffffffffffbce6faada7179e84f3b9cac2fc632551";
const P256_SCALAR_LEN: usize = 32;

/// Low-S form of a fixed-size P-256 signature, or `None` if it is not one.
pub fn canonical_signature(signature: &[u8]) -> Option<Vec<u8>> {
    if signature.len() != 2 * P256_SCALAR_LEN {
        return None;
    }
    let order = BigUint::parse_bytes(P256_ORDER_HEX, 16)?;
    let (r, s) = signature.split_at(P256_SCALAR_LEN);
    let s = BigUint::from_bytes_be(s);
    if s == BigUint::from(0u8) || s >= order {
        return None;
    }
    let half_order = order.clone() >> 1usize;
    let low_s = if s > half_order { &order - &s } else { s };

    let s_bytes = low_s.to_bytes_be();
    let mut canonical = Vec::with_capacity(signature.len());
    canonical.extend_from_slice(r);
    canonical.resize(signature.len() - s_bytes.len(), 0);
    canonical.extend_from_slice(&s_bytes);
    Some(canonical)
}

/// Key under which a Base64 signature is remembered as spent. Both encodings
/// of the same signature map to one key; anything unparseable keys as itself.
pub fn signature_replay_key(signature: &str) -> String {
    base64_decode(signature)
        .ok()
        .and_then(|raw| canonical_signature(&raw))
        .map(|canonical| base64_encode(&canonical))
        .unwrap_or_else(|| signature.to_string())
}
