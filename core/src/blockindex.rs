//! Persistent block index: maps a transaction identifier to the height of
//! the block that contains it, backed by an embedded ordered key-value
//! store.

use rocksdb::DB;
use shared::{BlockchainError, BlockHeight, Result, TxId};
use std::path::Path;

/// Handle to the open block index store.
pub struct BlockIndex {
    db: DB,
}

impl BlockIndex {
    /// Opens (creating if missing) the block index store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = DB::open_default(path).map_err(|e| BlockchainError::StoreError(e.to_string()))?;
        Ok(Self { db })
    }

    /// Records that `txid` was included in the block at `height`.
    ///
    /// # Errors
    ///
    /// Returns an error if `txid` is not 64 hex characters or on I/O
    /// failure.
    pub fn put_index(&self, txid: &TxId, height: BlockHeight) -> Result<()> {
        let key = txid.to_hex();
        if key.len() != 64 {
            return Err(BlockchainError::InvalidTransaction(
                "txid has invalid length".to_string(),
            ));
        }
        self.db
            .put(key.as_bytes(), height.to_string().as_bytes())
            .map_err(|e| BlockchainError::StoreError(e.to_string()))
    }

    /// Looks up the height of the block containing `txid`.
    ///
    /// # Errors
    ///
    /// Returns an error if `txid` is unknown or the stored value is
    /// malformed.
    pub fn get_blockno(&self, txid: &TxId) -> Result<BlockHeight> {
        let key = txid.to_hex();
        let bytes = self
            .db
            .get(key.as_bytes())
            .map_err(|e| BlockchainError::StoreError(e.to_string()))?
            .ok_or_else(|| BlockchainError::FragmentNotFound(key.clone()))?;
        let text = String::from_utf8(bytes)
            .map_err(|e| BlockchainError::StoreError(e.to_string()))?;
        text.parse()
            .map_err(|_| BlockchainError::StoreError(format!("malformed height for {key}")))
    }

    /// Removes the index entry for `txid`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure.
    pub fn delete_index(&self, txid: &TxId) -> Result<()> {
        self.db
            .delete(txid.to_hex().as_bytes())
            .map_err(|e| BlockchainError::StoreError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Hash256;
    use tempfile::tempdir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let index = BlockIndex::open(dir.path()).unwrap();
        let txid = Hash256::sha256("tx");
        index.put_index(&txid, 7).unwrap();
        assert_eq!(index.get_blockno(&txid).unwrap(), 7);
    }

    #[test]
    fn missing_txid_errors() {
        let dir = tempdir().unwrap();
        let index = BlockIndex::open(dir.path()).unwrap();
        assert!(index.get_blockno(&Hash256::sha256("nowhere")).is_err());
    }

    #[test]
    fn delete_removes_entry() {
        let dir = tempdir().unwrap();
        let index = BlockIndex::open(dir.path()).unwrap();
        let txid = Hash256::sha256("tx");
        index.put_index(&txid, 3).unwrap();
        index.delete_index(&txid).unwrap();
        assert!(index.get_blockno(&txid).is_err());
    }
}
