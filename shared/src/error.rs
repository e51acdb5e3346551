use thiserror::Error;

/// Error taxonomy shared by every crate in the workspace.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("invalid block: {0}")]
    InvalidBlock(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("proof-of-work does not meet the configured difficulty")]
    InsufficientDifficulty,

    #[error("fragment {0} not found")]
    FragmentNotFound(String),

    #[error("fragment {0} already spent")]
    DoubleSpend(String),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid key size: expected {expected}, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("cryptographic error: {0}")]
    CryptographicError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("io error: {0}")]
    IoError(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("block height {height} is too far behind the primary tip (minimum {minimum})")]
    HeightTooOld { height: u64, minimum: u64 },

    #[error("block height {height} is too far ahead of the primary tip (maximum {maximum})")]
    HeightTooFar { height: u64, maximum: u64 },

    #[error("merkle root does not match the recomputed value")]
    MerkleMismatch,

    #[error("previous block hash does not match the chain tip")]
    PreviousHashMismatch,

    #[error("block is already known")]
    DuplicateBlock,

    #[error("transaction is already known")]
    DuplicateTransaction,
}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for BlockchainError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BlockchainError>;
