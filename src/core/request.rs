//! Signed requests accepted by the ledger
//!
//! Every request a remote wallet can send is one variant of [`SignedRequest`].
//! Each variant knows the exact bytes its signer committed to, so the ledger
//! can certify any request with the same replay, key and signature checks
//! before acting on it.

use crate::core::{parse_units, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::base64_encode;
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};

/// Memo prefix recorded on transfers created from a purchase
pub const PURCHASE_MEMO_PREFIX: &str = "purchase:";

/// Common view over every signed request.
pub trait SignedPayload {
    /// Base64 public key of the signer
    fn signer_public_key(&self) -> &str;
    /// Address the signer claims to own
    fn signer_address(&self) -> &str;
    /// Base64 signature over [`SignedPayload::signing_payload`]
    fn signature(&self) -> &str;
    /// Bytes the signer committed to, with amounts rendered in units of `scale`
    fn signing_payload(&self, scale: u32) -> Result<Vec<u8>>;
    /// Names of required fields left empty
    fn missing_fields(&self) -> Vec<&'static str>;
}

/// Value transfer between two addresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender_public_key: String,
    pub sender_address: String,
    pub recipient_address: String,
    /// Decimal amount, e.g. `"80.25"`
    pub amount: String,
    pub sequence: u64,
    pub signature: String,
}

/// Asks the ledger to seal its pending block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningRequest {
    pub miner_public_key: String,
    pub miner_address: String,
    pub sequence: u64,
    pub signature: String,
}

/// Payment from a buyer to a merchant for a named item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub buyer_public_key: String,
    pub buyer_address: String,
    pub merchant_address: String,
    pub item: String,
    /// Decimal amount, e.g. `"12.5"`
    pub amount: String,
    pub sequence: u64,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignedRequest {
    Transaction(TransactionRequest),
    Mining(MiningRequest),
    Purchase(PurchaseRequest),
}

fn collect_missing(fields: &[(&'static str, &str)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect()
}

impl TransactionRequest {
    /// Sign a transfer on the wallet side.
    pub fn sign(
        wallet: &Wallet,
        recipient_address: &str,
        amount: &str,
        sequence: u64,
        scale: u32,
    ) -> Result<TransactionRequest> {
        let mut request = TransactionRequest {
            sender_public_key: base64_encode(wallet.get_public_key()),
            sender_address: wallet.get_address(),
            recipient_address: recipient_address.to_string(),
            amount: amount.to_string(),
            sequence,
            signature: String::new(),
        };
        request.signature = base64_encode(&wallet.sign(&request.signing_payload(scale)?)?);
        Ok(request)
    }

    /// The transfer this request describes, with `amount` already in units
    pub fn to_transaction(&self, amount: u64) -> Transaction {
        Transaction::from_signed_parts(
            &self.sender_public_key,
            &self.sender_address,
            &self.recipient_address,
            amount,
            self.sequence,
            "",
            &self.signature,
        )
    }
}

impl SignedPayload for TransactionRequest {
    fn signer_public_key(&self) -> &str {
        &self.sender_public_key
    }

    fn signer_address(&self) -> &str {
        &self.sender_address
    }

    fn signature(&self) -> &str {
        &self.signature
    }

    fn signing_payload(&self, scale: u32) -> Result<Vec<u8>> {
        Ok(Transaction::signing_payload(
            &self.sender_address,
            &self.recipient_address,
            parse_units(&self.amount, scale)?,
            self.sequence,
            "",
        ))
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        collect_missing(&[
            ("sender_public_key", &self.sender_public_key),
            ("sender_address", &self.sender_address),
            ("recipient_address", &self.recipient_address),
            ("amount", &self.amount),
            ("signature", &self.signature),
        ])
    }
}

impl MiningRequest {
    pub fn sign(wallet: &Wallet, sequence: u64) -> Result<MiningRequest> {
        let mut request = MiningRequest {
            miner_public_key: base64_encode(wallet.get_public_key()),
            miner_address: wallet.get_address(),
            sequence,
            signature: String::new(),
        };
        request.signature = base64_encode(&wallet.sign(&request.signing_payload(0)?)?);
        Ok(request)
    }
}

impl SignedPayload for MiningRequest {
    fn signer_public_key(&self) -> &str {
        &self.miner_public_key
    }

    fn signer_address(&self) -> &str {
        &self.miner_address
    }

    fn signature(&self) -> &str {
        &self.signature
    }

    fn signing_payload(&self, _scale: u32) -> Result<Vec<u8>> {
        Ok(format!("mine:{}:{}", self.miner_address, self.sequence).into_bytes())
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        collect_missing(&[
            ("miner_public_key", &self.miner_public_key),
            ("miner_address", &self.miner_address),
            ("signature", &self.signature),
        ])
    }
}

impl PurchaseRequest {
    pub fn sign(
        wallet: &Wallet,
        merchant_address: &str,
        item: &str,
        amount: &str,
        sequence: u64,
        scale: u32,
    ) -> Result<PurchaseRequest> {
        let mut request = PurchaseRequest {
            buyer_public_key: base64_encode(wallet.get_public_key()),
            buyer_address: wallet.get_address(),
            merchant_address: merchant_address.to_string(),
            item: item.to_string(),
            amount: amount.to_string(),
            sequence,
            signature: String::new(),
        };
        request.signature = base64_encode(&wallet.sign(&request.signing_payload(scale)?)?);
        Ok(request)
    }

    pub fn memo(&self) -> String {
        format!("{PURCHASE_MEMO_PREFIX}{}", self.item)
    }

    /// The transfer paying the merchant, with `amount` already in units
    pub fn to_transaction(&self, amount: u64) -> Transaction {
        Transaction::from_signed_parts(
            &self.buyer_public_key,
            &self.buyer_address,
            &self.merchant_address,
            amount,
            self.sequence,
            &self.memo(),
            &self.signature,
        )
    }
}

impl SignedPayload for PurchaseRequest {
    fn signer_public_key(&self) -> &str {
        &self.buyer_public_key
    }

    fn signer_address(&self) -> &str {
        &self.buyer_address
    }

    fn signature(&self) -> &str {
        &self.signature
    }

    fn signing_payload(&self, scale: u32) -> Result<Vec<u8>> {
        Ok(Transaction::signing_payload(
            &self.buyer_address,
            &self.merchant_address,
            parse_units(&self.amount, scale)?,
            self.sequence,
            &self.memo(),
        ))
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        collect_missing(&[
            ("buyer_public_key", &self.buyer_public_key),
            ("buyer_address", &self.buyer_address),
            ("merchant_address", &self.merchant_address),
            ("item", &self.item),
            ("amount", &self.amount),
            ("signature", &self.signature),
        ])
    }
}

impl SignedRequest {
    fn inner(&self) -> &dyn SignedPayload {
        match self {
            SignedRequest::Transaction(request) => request,
            SignedRequest::Mining(request) => request,
            SignedRequest::Purchase(request) => request,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignedRequest::Transaction(_) => "transaction",
            SignedRequest::Mining(_) => "mining",
            SignedRequest::Purchase(_) => "purchase",
        }
    }

    /// Fail with [`BlockchainError::MissingFields`] naming every empty field
    pub fn require_fields(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BlockchainError::MissingFields(missing.join(", ")))
        }
    }
}

impl SignedPayload for SignedRequest {
    fn signer_public_key(&self) -> &str {
        self.inner().signer_public_key()
    }

    fn signer_address(&self) -> &str {
        self.inner().signer_address()
    }

    fn signature(&self) -> &str {
        self.inner().signature()
    }

    fn signing_payload(&self, scale: u32) -> Result<Vec<u8>> {
        self.inner().signing_payload(scale)
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        self.inner().missing_fields()
    }
}
