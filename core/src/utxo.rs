//! The chainstate fragment: a single unspent-or-spent transaction output
//! considered as a UTXO entry, keyed by `txid_vout` in the chainstate store.

use serde::{Deserialize, Serialize};
use shared::types::OutPoint;

/// A chainstate record for one transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// RIPEMD-160(SHA-256(public key)) of the output's lock script.
    pub pkhash: String,
    /// The output's value in the smallest currency unit.
    pub value: u64,
    /// Whether this fragment has been consumed by a later transaction.
    pub spent: bool,
    /// When spent, `consuming_txid_input_index`; empty otherwise.
    pub tx_chain: String,
}

impl Fragment {
    #[must_use]
    pub const fn new_unspent(pkhash: String, value: u64) -> Self {
        Self {
            pkhash,
            value,
            spent: false,
            tx_chain: String::new(),
        }
    }

    /// Marks this fragment consumed by `consumer_txid:input_index`.
    pub fn mark_spent(&mut self, consumer_txid: &str, input_index: u32) {
        self.spent = true;
        self.tx_chain = format!("{consumer_txid}_{input_index}");
    }
}

/// Renders the chainstate fragment key for a given outpoint: `txid_vout`.
#[must_use]
pub fn fragment_key(outpoint: &OutPoint) -> String {
    outpoint.fragment_key()
}
