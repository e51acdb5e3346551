//! Type aliases and small shared value types.

use serde::{Deserialize, Serialize};

/// Transaction identifier: 64 hex chars from 32 random bytes.
pub type TxId = crate::Hash256;

/// Block identifier: the block header hash.
pub type BlockId = crate::Hash256;

/// Public key, carried as PEM text.
pub type PublicKeyHex = String;

/// Hex-encoded ECDSA signature.
pub type SignatureHex = String;

/// Monetary amount in the smallest currency unit.
pub type Amount = u64;

/// Unix timestamp, seconds.
pub type Timestamp = i64;

/// Block height, 0-based.
pub type BlockHeight = u64;

/// Output index within a transaction.
pub type OutputIndex = u32;

/// Input index within a transaction.
pub type InputIndex = u32;

/// A reference to a transaction output: `txid:vout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub vout: OutputIndex,
}

impl OutPoint {
    #[must_use]
    pub const fn new(txid: TxId, vout: OutputIndex) -> Self {
        Self { txid, vout }
    }

    /// Renders the chainstate fragment key `txid_vout`.
    #[must_use]
    pub fn fragment_key(&self) -> String {
        format!("{}_{}", self.txid, self.vout)
    }
}

/// Per-node operational configuration: data directory layout, RPC bind
/// address, and the seed peer address list. Not part of consensus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Root directory holding the chainstate store, block index store,
    /// serialized block files, and the coinbase key file.
    pub data_dir: String,
    /// Address the node's JSON-RPC-shaped dispatch surface binds to.
    pub rpc_bind_address: String,
    /// Port the node's JSON-RPC-shaped dispatch surface binds to.
    pub rpc_port: u16,
    /// Initial peer address list, each of the form `ip:port`.
    pub bootstrap_peers: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            rpc_bind_address: "127.0.0.1".to_string(),
            rpc_port: 8332,
            bootstrap_peers: vec![],
        }
    }
}
