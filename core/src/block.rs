//! Block header, Merkle root, and structural block validation.

use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use shared::{config, BlockchainError, Hash256, Result};

/// A block header. `previous_hash` is `None` only for the genesis block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: String,
    pub previous_hash: Option<Hash256>,
    pub merkle_root: Hash256,
    pub timestamp: i64,
    pub difficulty_bits: u32,
    pub nonce: u64,
    pub height: u64,
}

impl BlockHeader {
    #[must_use]
    pub const fn new(
        previous_hash: Option<Hash256>,
        merkle_root: Hash256,
        timestamp: i64,
        difficulty_bits: u32,
        nonce: u64,
        height: u64,
    ) -> Self {
        Self {
            version: config::VERSION_NO.to_string(),
            previous_hash,
            merkle_root,
            timestamp,
            difficulty_bits,
            nonce,
            height,
        }
    }

    fn previous_hash_text(&self) -> String {
        self.previous_hash.map_or_else(String::new, |h| h.to_hex())
    }

    /// The header hash: SHA-256 over the ASCII concatenation of every
    /// field, in the order version, previous hash, Merkle root, timestamp,
    /// difficulty bits, nonce.
    #[must_use]
    pub fn hash(&self) -> Hash256 {
        let mut s = String::new();
        s.push_str(&self.version);
        s.push_str(&self.previous_hash_text());
        s.push_str(&self.merkle_root.to_hex());
        s.push_str(&self.timestamp.to_string());
        s.push_str(&self.difficulty_bits.to_string());
        s.push_str(&self.nonce.to_string());
        Hash256::sha256(&s)
    }

    /// Whether this header's hash satisfies `difficulty_number` (the PoW
    /// condition `1/H < difficulty_number`).
    #[must_use]
    pub fn meets_difficulty(&self, difficulty_number: f64) -> bool {
        self.hash().meets_difficulty(difficulty_number)
    }

    fn validate_shape(&self) -> Result<()> {
        if self.version != config::VERSION_NO {
            return Err(BlockchainError::InvalidBlock(
                "wrong block version".to_string(),
            ));
        }
        if self.timestamp < 0 {
            return Err(BlockchainError::InvalidBlock(
                "negative timestamp".to_string(),
            ));
        }
        if self.difficulty_bits == 0 {
            return Err(BlockchainError::InvalidBlock(
                "difficulty bits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A full block: header plus its ordered transaction list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    #[must_use]
    pub const fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    #[must_use]
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        self.header.height
    }

    #[must_use]
    pub fn is_genesis(&self) -> bool {
        self.header.height == 0
    }

    /// Estimated serialized size in bytes.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map(|b| b.len()).unwrap_or(usize::MAX)
    }

    /// Structural validation, independent of the previous block or
    /// chainstate: record shape, transaction basics, Merkle root, and
    /// block size. Chain-continuity and proof-of-work are checked by the
    /// caller, which has access to the previous block and the active
    /// difficulty number.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated invariant.
    pub fn validate_basic(&self) -> Result<()> {
        self.header.validate_shape()?;

        if self.transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "block has no transactions".to_string(),
            ));
        }

        if self.is_genesis() {
            if self.header.previous_hash.is_some() {
                return Err(BlockchainError::InvalidBlock(
                    "genesis block must have no previous hash".to_string(),
                ));
            }
            if !self.transactions[0].is_coinbase() {
                return Err(BlockchainError::InvalidBlock(
                    "genesis transaction must have no inputs".to_string(),
                ));
            }
        } else {
            if self.header.previous_hash.is_none() {
                return Err(BlockchainError::InvalidBlock(
                    "non-genesis block must reference a previous hash".to_string(),
                ));
            }
            if self.transactions.len() < 2 {
                return Err(BlockchainError::InvalidBlock(
                    "non-genesis block must carry a coinbase and at least one more transaction"
                        .to_string(),
                ));
            }
            if !self.transactions[0].is_coinbase() {
                return Err(BlockchainError::InvalidBlock(
                    "first transaction must be coinbase".to_string(),
                ));
            }
        }

        for tx in self.transactions.iter().skip(1) {
            if tx.is_coinbase() {
                return Err(BlockchainError::InvalidBlock(
                    "only the first transaction may be coinbase".to_string(),
                ));
            }
        }

        for (i, tx) in self.transactions.iter().enumerate() {
            tx.validate_basic(i == 0 && tx.is_coinbase())?;
        }

        let merkle_root = merkle_root(&self.transactions)?;
        if merkle_root != self.header.merkle_root {
            return Err(BlockchainError::MerkleMismatch);
        }

        if self.serialized_size() > config::MAX_BLOCK_SIZE {
            return Err(BlockchainError::InvalidBlock(
                "block exceeds maximum size".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builds the Merkle root over a transaction list.
///
/// Leaves are the hash of each transaction's canonical serialized form. An
/// odd trailing leaf is duplicated before combining. Pairs combine as
/// `SHA-256(left ∥ right)`, treating the concatenation as hex strings, and
/// recurse until one hash remains.
///
/// # Errors
///
/// Returns an error if a transaction fails to serialize.
pub fn merkle_root(transactions: &[Transaction]) -> Result<Hash256> {
    if transactions.is_empty() {
        return Ok(Hash256::zero());
    }

    let mut level: Vec<Hash256> = transactions
        .iter()
        .map(Transaction::leaf_hash)
        .collect::<Result<Vec<_>>>()?;

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().expect("non-empty level"));
        }
        level = level
            .chunks(2)
            .map(|pair| Hash256::sha256(&format!("{}{}", pair[0], pair[1])))
            .collect();
    }

    Ok(level[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TxOutput;

    fn sample_pkhash() -> String {
        "a".repeat(40)
    }

    fn genesis_block() -> Block {
        let coinbase = Transaction::coinbase(&sample_pkhash(), 5_000_000, 0);
        let root = merkle_root(std::slice::from_ref(&coinbase)).unwrap();
        let header = BlockHeader::new(None, root, 0, config::DIFFICULTY_BITS, 0, 0);
        Block::new(header, vec![coinbase])
    }

    #[test]
    fn genesis_block_validates() {
        let block = genesis_block();
        assert!(block.validate_basic().is_ok());
    }

    #[test]
    fn header_hash_is_deterministic() {
        let block = genesis_block();
        assert_eq!(block.hash(), block.hash());
    }

    #[test]
    fn non_genesis_without_previous_hash_is_rejected() {
        let coinbase = Transaction::coinbase(&sample_pkhash(), 100, 0);
        let root = merkle_root(std::slice::from_ref(&coinbase)).unwrap();
        let header = BlockHeader::new(None, root, 0, config::DIFFICULTY_BITS, 0, 1);
        let block = Block::new(header, vec![coinbase]);
        assert!(block.validate_basic().is_err());
    }

    #[test]
    fn tampered_merkle_root_is_rejected() {
        let coinbase = Transaction::coinbase(&sample_pkhash(), 100, 0);
        let header = BlockHeader::new(None, Hash256::zero(), 0, config::DIFFICULTY_BITS, 0, 0);
        let block = Block::new(header, vec![coinbase]);
        assert!(matches!(
            block.validate_basic(),
            Err(BlockchainError::MerkleMismatch)
        ));
    }

    #[test]
    fn merkle_root_duplicates_odd_trailing_leaf() {
        let a = Transaction::coinbase(&sample_pkhash(), 1, 0);
        let b = Transaction::new(
            vec![crate::transaction::TxInput::new(
                Hash256::zero(),
                0,
                crate::script::UnlockScript::new("s", "p"),
            )],
            vec![TxOutput::pay_to(&sample_pkhash(), 1)],
            0,
        );
        let c = Transaction::new(
            vec![crate::transaction::TxInput::new(
                Hash256::zero(),
                1,
                crate::script::UnlockScript::new("s", "p"),
            )],
            vec![TxOutput::pay_to(&sample_pkhash(), 1)],
            0,
        );
        let root_three = merkle_root(&[a.clone(), b.clone(), c.clone()]).unwrap();
        let root_four = merkle_root(&[a, b, c.clone(), c]).unwrap();
        assert_eq!(root_three, root_four);
    }

    #[test]
    fn multiple_coinbase_transactions_rejected() {
        let a = Transaction::coinbase(&sample_pkhash(), 1, 0);
        let b = Transaction::coinbase(&sample_pkhash(), 1, 0);
        let root = merkle_root(&[a.clone(), b.clone()]).unwrap();
        let header = BlockHeader::new(
            Some(Hash256::sha256("parent")),
            root,
            10,
            config::DIFFICULTY_BITS,
            0,
            1,
        );
        let block = Block::new(header, vec![a, b]);
        assert!(block.validate_basic().is_err());
    }
}
