//! Contextual validation: the checks that need chainstate access, layered
//! on top of the structural checks in [`crate::transaction`] and
//! [`crate::block`].

use crate::block::Block;
use crate::chainstate::ChainState;
use crate::transaction::Transaction;
use crate::utxo::fragment_key;
use shared::{BlockchainError, Result};

/// Validates a transaction, returning its fee.
///
/// `zero_inputs` must be true for genesis and coinbase transactions, which
/// have no inputs and therefore no fee. For every other transaction, every
/// input's fragment must exist, be unspent, carry positive value, and
/// unlock under its script; the fee (sum of input values minus sum of
/// output values) must be non-negative.
///
/// # Errors
///
/// Returns an error describing the first violated invariant.
pub fn validate_transaction(
    tx: &Transaction,
    zero_inputs: bool,
    chainstate: &ChainState,
) -> Result<u64> {
    tx.validate_basic(zero_inputs)?;

    if zero_inputs {
        return Ok(0);
    }

    let mut total_in: u64 = 0;
    for input in &tx.vin {
        let key = fragment_key(&input.previous_output());
        let fragment = chainstate.get_fragment(&key)?;
        if fragment.spent {
            return Err(BlockchainError::DoubleSpend(key));
        }
        if fragment.value == 0 {
            return Err(BlockchainError::InvalidTransaction(
                "referenced fragment has no value".to_string(),
            ));
        }
        if !input.script_sig.unlocks(&fragment.pkhash) {
            return Err(BlockchainError::InvalidSignature);
        }
        total_in += fragment.value;
    }

    let total_out = tx.total_output_value();
    if total_in < total_out {
        return Err(BlockchainError::InsufficientFunds);
    }

    Ok(total_in - total_out)
}

/// Validates a block in chain context.
///
/// `last_block` is `None` only when the chain it is being appended to is
/// empty. `difficulty_number` is the currently active proof-of-work
/// threshold.
///
/// # Errors
///
/// Returns an error describing the first violated invariant.
pub fn validate_block(
    block: &Block,
    last_block: Option<&Block>,
    difficulty_number: f64,
    chainstate: &ChainState,
) -> Result<()> {
    block.validate_basic()?;

    match last_block {
        None => {
            if block.height() != 0 {
                return Err(BlockchainError::InvalidBlock(
                    "first block in an empty chain must have height 0".to_string(),
                ));
            }
        }
        Some(last) => {
            if block.height() != last.height() + 1 {
                return Err(BlockchainError::HeightTooFar {
                    height: block.height(),
                    maximum: last.height() + 1,
                });
            }
            if block.header.previous_hash != Some(last.hash()) {
                return Err(BlockchainError::PreviousHashMismatch);
            }
        }
    }

    if !block.header.meets_difficulty(difficulty_number) {
        return Err(BlockchainError::InsufficientDifficulty);
    }

    for (i, tx) in block.transactions.iter().enumerate() {
        validate_transaction(tx, i == 0, chainstate)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{merkle_root, BlockHeader};
    use crate::script::UnlockScript;
    use crate::transaction::{TxInput, TxOutput};
    use shared::{config, crypto};
    use tempfile::tempdir;

    fn genesis_with_reward(pkhash: &str, reward: u64) -> Block {
        let coinbase = Transaction::coinbase(pkhash, reward, 0);
        let root = merkle_root(std::slice::from_ref(&coinbase)).unwrap();
        let header = BlockHeader::new(None, root, 0, 1, 0, 0);
        Block::new(header, vec![coinbase])
    }

    #[test]
    fn genesis_validates_with_zero_difficulty_bar() {
        let dir = tempdir().unwrap();
        let chainstate = ChainState::open(dir.path()).unwrap();
        let block = genesis_with_reward(&"a".repeat(40), 5_000_000);
        assert!(validate_block(&block, None, f64::INFINITY, &chainstate).is_ok());
    }

    #[test]
    fn non_genesis_rejects_wrong_height() {
        let dir = tempdir().unwrap();
        let chainstate = ChainState::open(dir.path()).unwrap();
        let last = genesis_with_reward(&"a".repeat(40), 5_000_000);

        let coinbase = Transaction::coinbase(&"a".repeat(40), 5_000_000, 0);
        let spend = Transaction::new(
            vec![TxInput::new(last.transactions[0].txid, 0, UnlockScript::new("s", "p"))],
            vec![TxOutput::pay_to(&"b".repeat(40), 1)],
            0,
        );
        let root = merkle_root(&[coinbase.clone(), spend.clone()]).unwrap();
        let header = BlockHeader::new(Some(last.hash()), root, 10, 1, 0, 5);
        let block = Block::new(header, vec![coinbase, spend]);

        assert!(matches!(
            validate_block(&block, Some(&last), f64::INFINITY, &chainstate),
            Err(BlockchainError::HeightTooFar { .. })
        ));
    }

    #[test]
    fn unlock_failure_is_rejected() {
        let dir = tempdir().unwrap();
        let chainstate = ChainState::open(dir.path()).unwrap();
        let coinbase = Transaction::coinbase(&"a".repeat(40), 1_000, 0);
        chainstate.apply_transaction(&coinbase).unwrap();

        let spend = Transaction::new(
            vec![TxInput::new(
                coinbase.txid,
                0,
                UnlockScript::new("deadbeef", "not-the-right-key"),
            )],
            vec![TxOutput::pay_to(&"b".repeat(40), 900)],
            0,
        );
        assert!(matches!(
            validate_transaction(&spend, false, &chainstate),
            Err(BlockchainError::InvalidSignature)
        ));
    }

    #[test]
    fn fee_is_input_value_minus_output_value() {
        let dir = tempdir().unwrap();
        let chainstate = ChainState::open(dir.path()).unwrap();
        let (priv_key, pub_key) = crypto::make_keys().unwrap();
        let pkhash = crypto::pkhash(pub_key.as_pem());
        let coinbase = Transaction::coinbase(&pkhash, 1_000, 0);
        chainstate.apply_transaction(&coinbase).unwrap();

        let signature = crypto::sign(&priv_key, pub_key.as_pem()).unwrap();
        let spend = Transaction::new(
            vec![TxInput::new(
                coinbase.txid,
                0,
                UnlockScript::new(signature.as_hex().to_string(), pub_key.as_pem().to_string()),
            )],
            vec![TxOutput::pay_to(&"b".repeat(40), 700)],
            0,
        );
        let fee = validate_transaction(&spend, false, &chainstate).unwrap();
        assert_eq!(fee, 300);
    }

    #[test]
    fn double_spend_is_rejected() {
        let dir = tempdir().unwrap();
        let chainstate = ChainState::open(dir.path()).unwrap();
        let (priv_key, pub_key) = crypto::make_keys().unwrap();
        let pkhash = crypto::pkhash(pub_key.as_pem());
        let coinbase = Transaction::coinbase(&pkhash, 1_000, 0);
        chainstate.apply_transaction(&coinbase).unwrap();

        let signature = crypto::sign(&priv_key, pub_key.as_pem()).unwrap();
        let spend = Transaction::new(
            vec![TxInput::new(
                coinbase.txid,
                0,
                UnlockScript::new(signature.as_hex().to_string(), pub_key.as_pem().to_string()),
            )],
            vec![TxOutput::pay_to(&"b".repeat(40), 700)],
            0,
        );
        chainstate.apply_transaction(&spend).unwrap();

        let double_spend = Transaction::new(
            vec![TxInput::new(
                coinbase.txid,
                0,
                UnlockScript::new(signature.as_hex().to_string(), pub_key.as_pem().to_string()),
            )],
            vec![TxOutput::pay_to(&"c".repeat(40), 700)],
            0,
        );
        assert!(matches!(
            validate_transaction(&double_spend, false, &chainstate),
            Err(BlockchainError::DoubleSpend(_))
        ));
    }

    #[test]
    fn genesis_has_no_fee() {
        let block = genesis_with_reward(&"a".repeat(40), config::MINING_REWARD);
        assert_eq!(
            block.transactions[0].total_output_value(),
            config::MINING_REWARD
        );
    }
}
