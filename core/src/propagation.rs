//! Peer propagation hooks.
//!
//! The directory/peer-registration service and the HTTP transport that
//! carries JSON-RPC requests between nodes are both out of scope; what
//! remains in scope is the fan-out itself — after a transaction is
//! accepted into the mempool, or a block is committed, every known peer
//! address is notified, fire-and-forget, with no retry or delivery
//! confirmation.

use crate::block::Block;
use crate::transaction::Transaction;
use tracing::{debug, warn};

/// Fans a transaction or block out to a list of peer addresses.
///
/// Implementations must not block the caller for longer than a single
/// delivery attempt per peer, and must never propagate a panic: a peer
/// that cannot be reached is logged and skipped.
pub trait Propagator: Send + Sync {
    fn propagate_transaction(&self, tx: &Transaction, addresses: &[String]);
    fn propagate_block(&self, block: &Block, addresses: &[String]);
}

/// The default propagator: logs the fan-out instead of performing it.
/// Suitable for single-node operation and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPropagator;

impl Propagator for LoggingPropagator {
    fn propagate_transaction(&self, tx: &Transaction, addresses: &[String]) {
        debug!(txid = %tx.txid, peers = addresses.len(), "would propagate transaction");
    }

    fn propagate_block(&self, block: &Block, addresses: &[String]) {
        debug!(height = block.height(), peers = addresses.len(), "would propagate block");
    }
}

/// Posts a JSON-RPC 2.0 envelope to every peer address over HTTP,
/// matching the source's fire-and-forget client calls to `receive_transaction`
/// and `receive_block`.
pub struct HttpPropagator {
    client: reqwest::blocking::Client,
}

impl HttpPropagator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }

    fn post(&self, address: &str, method: &str, params: serde_json::Value) {
        let envelope = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let url = format!("http://{address}/");
        if let Err(err) = self.client.post(&url).json(&envelope).send() {
            warn!(%address, %method, error = %err, "failed to propagate to peer");
        }
    }
}

impl Default for HttpPropagator {
    fn default() -> Self {
        Self::new()
    }
}

impl Propagator for HttpPropagator {
    fn propagate_transaction(&self, tx: &Transaction, addresses: &[String]) {
        let params = serde_json::json!({ "trx": tx });
        for address in addresses {
            self.post(address, "receive_transaction", params.clone());
        }
    }

    fn propagate_block(&self, block: &Block, addresses: &[String]) {
        let params = serde_json::json!({ "block": block });
        for address in addresses {
            self.post(address, "receive_block", params.clone());
        }
    }
}
