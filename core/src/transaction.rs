//! Transaction data model and structural validation.
//!
//! Semantic validation that needs chainstate access (fragment existence,
//! spent state, fee computation) lives in [`crate::validation`]; this
//! module only covers what can be checked from the transaction's own
//! fields.

use crate::script::{LockScript, UnlockScript};
use serde::{Deserialize, Serialize};
use shared::types::OutPoint;
use shared::{config, crypto, BlockchainError, Hash256, OutputIndex, Result, TxId};

/// A transaction input: a reference to a prior output plus its unlock script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: TxId,
    pub vout: OutputIndex,
    pub script_sig: UnlockScript,
}

impl TxInput {
    #[must_use]
    pub fn new(txid: TxId, vout: OutputIndex, script_sig: UnlockScript) -> Self {
        Self {
            txid,
            vout,
            script_sig,
        }
    }

    #[must_use]
    pub fn previous_output(&self) -> OutPoint {
        OutPoint::new(self.txid, self.vout)
    }
}

/// A transaction output: a value plus its lock script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: LockScript,
}

impl TxOutput {
    #[must_use]
    pub const fn new(value: u64, script_pubkey: LockScript) -> Self {
        Self {
            value,
            script_pubkey,
        }
    }

    #[must_use]
    pub fn pay_to(pkhash: &str, value: u64) -> Self {
        Self::new(value, LockScript::p2pkh(pkhash))
    }
}

/// A Helium transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: TxId,
    pub version: String,
    pub locktime: i64,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
}

impl Transaction {
    /// Builds a transaction with a freshly generated 64-hex-char identifier.
    #[must_use]
    pub fn new(vin: Vec<TxInput>, vout: Vec<TxOutput>, locktime: i64) -> Self {
        let txid = Hash256::from_hex(&crypto::make_uuid()).expect("make_uuid yields 64 hex chars");
        Self {
            txid,
            version: config::VERSION_NO.to_string(),
            locktime,
            vin,
            vout,
        }
    }

    /// Builds a coinbase transaction: no inputs, a single reward output.
    #[must_use]
    pub fn coinbase(miner_pkhash: &str, reward: u64, locktime: i64) -> Self {
        Self::new(vec![], vec![TxOutput::pay_to(miner_pkhash, reward)], locktime)
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.vin.is_empty()
    }

    /// The canonical serialized form hashed to build Merkle leaves.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Into::into)
    }

    /// Hashes the canonical serialized form (used only for Merkle leaves;
    /// the transaction's own identity is its random `txid`, not this hash).
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn leaf_hash(&self) -> Result<Hash256> {
        Ok(Hash256::sha256_bytes(&self.canonical_bytes()?))
    }

    #[must_use]
    pub fn total_output_value(&self) -> u64 {
        self.vout.iter().map(|o| o.value).sum()
    }

    /// Structural validation: attribute shape, independent of chainstate.
    /// `zero_inputs` is true for genesis and coinbase transactions.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated invariant.
    pub fn validate_basic(&self, zero_inputs: bool) -> Result<()> {
        if !Hash256::is_valid_hex(&self.txid.to_hex()) {
            return Err(BlockchainError::InvalidTransaction(
                "transaction id is not valid hex".to_string(),
            ));
        }
        if self.version != config::VERSION_NO {
            return Err(BlockchainError::InvalidTransaction(
                "wrong transaction version".to_string(),
            ));
        }
        if self.locktime < 0 {
            return Err(BlockchainError::InvalidTransaction(
                "negative locktime".to_string(),
            ));
        }
        if self.vin.len() > config::MAX_INPUTS {
            return Err(BlockchainError::InvalidTransaction(
                "too many inputs".to_string(),
            ));
        }
        if zero_inputs {
            if !self.vin.is_empty() {
                return Err(BlockchainError::InvalidTransaction(
                    "coinbase/genesis transaction must have no inputs".to_string(),
                ));
            }
        } else if self.vin.is_empty() {
            return Err(BlockchainError::InvalidTransaction(
                "non-coinbase transaction must have at least one input".to_string(),
            ));
        }
        if self.vout.is_empty() || self.vout.len() > config::MAX_OUTPUTS {
            return Err(BlockchainError::InvalidTransaction(
                "output count out of range".to_string(),
            ));
        }
        for output in &self.vout {
            if output.value == 0 {
                return Err(BlockchainError::InvalidTransaction(
                    "zero-value output".to_string(),
                ));
            }
            if !output.script_pubkey.is_well_formed() {
                return Err(BlockchainError::InvalidTransaction(
                    "malformed lock script".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::UnlockScript;

    fn sample_pkhash() -> String {
        "a".repeat(40)
    }

    #[test]
    fn coinbase_has_no_inputs() {
        let tx = Transaction::coinbase(&sample_pkhash(), 5_000_000, 0);
        assert!(tx.is_coinbase());
        assert!(tx.validate_basic(true).is_ok());
    }

    #[test]
    fn coinbase_rejected_when_zero_inputs_is_false() {
        let tx = Transaction::coinbase(&sample_pkhash(), 5_000_000, 0);
        assert!(tx.validate_basic(false).is_err());
    }

    #[test]
    fn non_coinbase_with_no_inputs_is_rejected() {
        let tx = Transaction::new(vec![], vec![TxOutput::pay_to(&sample_pkhash(), 100)], 0);
        assert!(tx.validate_basic(false).is_err());
    }

    #[test]
    fn zero_value_output_is_rejected() {
        let tx = Transaction::new(
            vec![TxInput::new(
                Hash256::zero(),
                0,
                UnlockScript::new("sig", "pub"),
            )],
            vec![TxOutput::pay_to(&sample_pkhash(), 0)],
            0,
        );
        assert!(tx.validate_basic(false).is_err());
    }

    #[test]
    fn too_many_outputs_is_rejected() {
        let outputs = (0..=config::MAX_OUTPUTS)
            .map(|_| TxOutput::pay_to(&sample_pkhash(), 1))
            .collect();
        let tx = Transaction::new(
            vec![TxInput::new(
                Hash256::zero(),
                0,
                UnlockScript::new("sig", "pub"),
            )],
            outputs,
            0,
        );
        assert!(tx.validate_basic(false).is_err());
    }

    #[test]
    fn leaf_hash_is_deterministic() {
        let tx = Transaction::coinbase(&sample_pkhash(), 5_000_000, 0);
        assert_eq!(tx.leaf_hash().unwrap(), tx.leaf_hash().unwrap());
    }

    #[test]
    fn distinct_transactions_generate_distinct_ids() {
        let a = Transaction::coinbase(&sample_pkhash(), 100, 0);
        let b = Transaction::coinbase(&sample_pkhash(), 100, 0);
        assert_ne!(a.txid, b.txid);
    }
}
