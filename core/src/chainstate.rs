//! Persistent chainstate: one fragment record per transaction output,
//! keyed by `txid_vout`, backed by an embedded ordered key-value store.

use crate::transaction::Transaction;
use crate::utxo::{fragment_key, Fragment};
use rocksdb::DB;
use shared::{BlockchainError, Result};
use std::path::Path;

/// Handle to the open chainstate store.
pub struct ChainState {
    db: DB,
}

impl ChainState {
    /// Opens (creating if missing) the chainstate store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = DB::open_default(path).map_err(|e| BlockchainError::StoreError(e.to_string()))?;
        Ok(Self { db })
    }

    /// Upserts a fragment. Delete-then-insert so an overwrite never leaves
    /// a reader observing a half-written value.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or serialization failure.
    pub fn put_fragment(&self, key: &str, fragment: &Fragment) -> Result<()> {
        self.db
            .delete(key.as_bytes())
            .map_err(|e| BlockchainError::StoreError(e.to_string()))?;
        let encoded = serde_json::to_vec(fragment)?;
        self.db
            .put(key.as_bytes(), encoded)
            .map_err(|e| BlockchainError::StoreError(e.to_string()))?;
        Ok(())
    }

    /// Fetches a fragment by key.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::FragmentNotFound`] if the key is absent,
    /// or a store/serialization error.
    pub fn get_fragment(&self, key: &str) -> Result<Fragment> {
        let bytes = self
            .db
            .get(key.as_bytes())
            .map_err(|e| BlockchainError::StoreError(e.to_string()))?
            .ok_or_else(|| BlockchainError::FragmentNotFound(key.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[must_use]
    pub fn has_fragment(&self, key: &str) -> bool {
        matches!(self.db.get(key.as_bytes()), Ok(Some(_)))
    }

    /// Deletes a fragment.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::FragmentNotFound`] if the key is absent.
    pub fn delete_fragment(&self, key: &str) -> Result<()> {
        if !self.has_fragment(key) {
            return Err(BlockchainError::FragmentNotFound(key.to_string()));
        }
        self.db
            .delete(key.as_bytes())
            .map_err(|e| BlockchainError::StoreError(e.to_string()))
    }

    /// Applies a transaction to the chainstate: marks every input's
    /// fragment spent, then writes a fresh unspent fragment for every
    /// output. Fails, leaving prior writes of this call in place, if any
    /// input fragment is missing or already spent (a double spend); the
    /// caller is expected to have already validated the transaction, in
    /// which case this can only fail on a genuine I/O fault or a race with
    /// a concurrent spend of the same output.
    ///
    /// # Errors
    ///
    /// Returns [`BlockchainError::FragmentNotFound`] or
    /// [`BlockchainError::DoubleSpend`] for a missing or already-spent
    /// input, or a store error.
    pub fn apply_transaction(&self, tx: &Transaction) -> Result<()> {
        for (input_index, input) in tx.vin.iter().enumerate() {
            let key = fragment_key(&input.previous_output());
            let mut fragment = self.get_fragment(&key)?;
            if fragment.spent {
                return Err(BlockchainError::DoubleSpend(key));
            }
            fragment.mark_spent(&tx.txid.to_hex(), input_index as u32);
            self.put_fragment(&key, &fragment)?;
        }

        for (vout, output) in tx.vout.iter().enumerate() {
            let key = format!("{}_{}", tx.txid, vout);
            let fragment = Fragment::new_unspent(
                output.script_pubkey.pkhash().to_string(),
                output.value,
            );
            self.put_fragment(&key, &fragment)?;
        }

        Ok(())
    }

    /// Reverses a previously applied transaction: deletes the fragments it
    /// created, and un-marks its input fragments as spent. Used to unwind a
    /// block commit when a later transaction in the same block fails to
    /// apply, since the stores underneath are not atomic across multiple
    /// `put`s.
    ///
    /// Missing fragments are tolerated (a best-effort inverse of whatever
    /// actually got written); any other store error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn revert_transaction(&self, tx: &Transaction) -> Result<()> {
        for (vout, _) in tx.vout.iter().enumerate() {
            let key = format!("{}_{}", tx.txid, vout);
            match self.delete_fragment(&key) {
                Ok(()) | Err(BlockchainError::FragmentNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        for input in &tx.vin {
            let key = fragment_key(&input.previous_output());
            match self.get_fragment(&key) {
                Ok(mut fragment) => {
                    fragment.spent = false;
                    fragment.tx_chain = String::new();
                    self.put_fragment(&key, &fragment)?;
                }
                Err(BlockchainError::FragmentNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(())
    }
}
