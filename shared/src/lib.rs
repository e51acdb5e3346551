pub mod config;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod types;

pub use crypto::{
    make_address, make_keys, make_uuid, pkhash, ripemd160, sha256, sign, sign_transaction_hash,
    validate_address, verify, verify_transaction_signature, KeyPair, PrivateKey, PublicKey,
    Signature,
};
pub use error::BlockchainError;
pub use hash::Hash256;
pub use types::{
    Amount, BlockHeight, BlockId, InputIndex, NodeConfig, OutPoint, OutputIndex, PublicKeyHex,
    SignatureHex, Timestamp, TxId,
};

pub type Result<T> = std::result::Result<T, BlockchainError>;
