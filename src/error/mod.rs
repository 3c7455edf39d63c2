//! Error handling for the ledger
//!
//! Every failure the ledger can report lives in one enum. Validation
//! rejections carry a stable reason code (see [`BlockchainError::code`]) so an
//! outer surface can map them to user-visible messages without leaking
//! internal state.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

/// Error types for ledger operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// Cryptographic operation errors (key decode, provider failure)
    Crypto(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// File I/O errors
    Io(String),
    /// Configuration errors, fatal at startup
    Config(String),
    /// A shared lock was poisoned by a panicking thread
    Lock(String),
    /// Wallet operation errors
    Wallet(String),
    /// Transaction construction errors that are not validation rejections
    Transaction(String),
    /// Invalid address format
    InvalidAddress(String),
    /// Block or chain integrity errors
    InvalidBlock(String),
    /// Mining errors
    Mining(String),

    /// A required request field is empty
    MissingFields(String),
    /// Signature does not verify against the sender's public key
    InvalidSignature,
    /// Sender address does not derive from the supplied public key
    AddressKeyMismatch { address: String },
    /// Amount is zero
    AmountNotPositive,
    /// Amount has more fractional digits than the configured scale
    AmountScaleOverflow { scale: u32 },
    /// Amount exceeds the configured ceiling
    AmountTooLarge { amount: u64, maximum: u64 },
    /// Insufficient funds for transaction
    InsufficientFunds { required: u64, available: u64 },
    /// Covering inputs are below the configured transaction floor
    BelowMinimumTransactionValue { value: u64, minimum: u64 },
    /// The signature was already consumed by an accepted transaction
    SignatureAlreadyConsumed,
    /// Mining was requested with no pending transactions
    MiningPoolEmpty,
    /// Mining was cancelled before a nonce was found
    MiningCancelled,
}

impl BlockchainError {
    /// Stable reason code for the external interface
    pub fn code(&self) -> &'static str {
        match self {
            BlockchainError::Crypto(_) => "CRYPTO_ERROR",
            BlockchainError::Serialization(_) => "SERIALIZATION_ERROR",
            BlockchainError::Io(_) => "IO_ERROR",
            BlockchainError::Config(_) => "CONFIG_ERROR",
            BlockchainError::Lock(_) => "LOCK_POISONED",
            BlockchainError::Wallet(_) => "WALLET_ERROR",
            BlockchainError::Transaction(_) => "TRANSACTION_ERROR",
            BlockchainError::InvalidAddress(_) => "INVALID_ADDRESS",
            BlockchainError::InvalidBlock(_) => "INVALID_BLOCK",
            BlockchainError::Mining(_) => "MINING_ERROR",
            BlockchainError::MissingFields(_) => "MISSING_FIELDS",
            BlockchainError::InvalidSignature => "INVALID_SIGNATURE",
            BlockchainError::AddressKeyMismatch { .. } => "ADDRESS_KEY_MISMATCH",
            BlockchainError::AmountNotPositive => "AMOUNT_NOT_POSITIVE",
            BlockchainError::AmountScaleOverflow { .. } => "AMOUNT_SCALE_OVERFLOW",
            BlockchainError::AmountTooLarge { .. } => "AMOUNT_TOO_LARGE",
            BlockchainError::InsufficientFunds { .. } => "INSUFFICIENT_BALANCE",
            BlockchainError::BelowMinimumTransactionValue { .. } => {
                "BELOW_MINIMUM_TRANSACTION_VALUE"
            }
            BlockchainError::SignatureAlreadyConsumed => "SIGNATURE_ALREADY_CONSUMED",
            BlockchainError::MiningPoolEmpty => "MINING_POOL_EMPTY",
            BlockchainError::MiningCancelled => "MINING_CANCELLED",
        }
    }

    /// True for validation outcomes a caller caused, false for faults in the
    /// ledger's own environment (I/O, poisoned locks, serialization).
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            BlockchainError::Serialization(_)
                | BlockchainError::Io(_)
                | BlockchainError::Config(_)
                | BlockchainError::Lock(_)
                | BlockchainError::InvalidBlock(_)
                | BlockchainError::Mining(_)
        )
    }
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::Lock(msg) => write!(f, "Lock poisoned: {msg}"),
            BlockchainError::Wallet(msg) => write!(f, "Wallet error: {msg}"),
            BlockchainError::Transaction(msg) => write!(f, "Transaction error: {msg}"),
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::Mining(msg) => write!(f, "Mining error: {msg}"),
            BlockchainError::MissingFields(fields) => {
                write!(f, "Missing required fields: {fields}")
            }
            BlockchainError::InvalidSignature => write!(f, "Signature verification failed"),
            BlockchainError::AddressKeyMismatch { address } => {
                write!(f, "Address {address} does not belong to the supplied public key")
            }
            BlockchainError::AmountNotPositive => write!(f, "Amount must be positive"),
            BlockchainError::AmountScaleOverflow { scale } => {
                write!(f, "Amount has more than {scale} fractional digits")
            }
            BlockchainError::AmountTooLarge { amount, maximum } => {
                write!(f, "Amount {amount} exceeds the maximum of {maximum}")
            }
            BlockchainError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            BlockchainError::BelowMinimumTransactionValue { value, minimum } => {
                write!(
                    f,
                    "Transaction value {value} is below the minimum of {minimum}"
                )
            }
            BlockchainError::SignatureAlreadyConsumed => {
                write!(f, "Signature has already been used by another transaction")
            }
            BlockchainError::MiningPoolEmpty => write!(f, "No pending transactions to mine"),
            BlockchainError::MiningCancelled => write!(f, "Mining was cancelled"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BlockchainError {
    fn from(err: toml::de::Error) -> Self {
        BlockchainError::Config(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for BlockchainError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        BlockchainError::Lock(err.to_string())
    }
}
