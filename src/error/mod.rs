//! Error handling for the ledger core
//!
//! Every rejection carries a machine-readable variant plus a human-readable
//! message; nothing in the core silently swallows a failed validation.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error taxonomy for the ledger core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Malformed or rule-violating transaction/block
    Validation(String),
    /// Proof-of-work search exhausted its attempt budget (recoverable)
    MiningFailed(String),
    /// Transaction pool is at capacity (backpressure signal)
    PoolFull { max_size: usize },
    /// User-correctable consensus state error, e.g. withdrawal while locked
    ConsensusState(String),
    /// Full-chain validation failed; fatal for this chain instance
    ChainIntegrity(Vec<String>),
    /// Insufficient spendable balance for a transaction
    InsufficientFunds { required: u64, available: u64 },
    /// Database-related errors
    Database(String),
    /// Cryptographic operation errors
    Crypto(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(String),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::Validation(msg) => write!(f, "Validation error: {msg}"),
            LedgerError::MiningFailed(msg) => write!(f, "Mining failed: {msg}"),
            LedgerError::PoolFull { max_size } => {
                write!(f, "Transaction pool is full (capacity: {max_size})")
            }
            LedgerError::ConsensusState(msg) => write!(f, "Consensus state error: {msg}"),
            LedgerError::ChainIntegrity(errors) => {
                write!(f, "Chain integrity violated: {}", errors.join("; "))
            }
            LedgerError::InsufficientFunds {
                required,
                available,
            } => {
                write!(
                    f,
                    "Insufficient funds: required {required}, available {available}"
                )
            }
            LedgerError::Database(msg) => write!(f, "Database error: {msg}"),
            LedgerError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            LedgerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            LedgerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            LedgerError::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<bincode::error::EncodeError> for LedgerError {
    fn from(err: bincode::error::EncodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for LedgerError {
    fn from(err: bincode::error::DecodeError) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
