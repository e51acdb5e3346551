//! Mempool, candidate block assembly, coinbase reward law, proof-of-work
//! search, and difficulty retargeting.

use crate::block::{merkle_root, Block, BlockHeader};
use crate::chainstate::ChainState;
use crate::script::LockScript;
use crate::transaction::{Transaction, TxOutput};
use crate::validation;
use shared::{config, crypto, BlockchainError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Transactions awaiting inclusion in a mined block.
#[derive(Debug, Default)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, tx: &Transaction) -> bool {
        self.transactions.iter().any(|t| t == tx)
    }

    pub fn insert(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    /// Drops every transaction present in `block` from the mempool.
    pub fn remove_block_transactions(&mut self, block: &Block) {
        self.transactions
            .retain(|tx| !block.transactions.iter().any(|included| included.txid == tx.txid));
    }

    #[must_use]
    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// The mining reward for a block at `height`: `MINING_REWARD / 2^halvings`,
/// rounded, floored to zero below one [`config::HELIUM_CENT`].
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn reward_for_height(height: u64) -> u64 {
    let halvings = height / config::REWARD_INTERVAL;
    if halvings == 0 {
        return config::MINING_REWARD;
    }
    let reward = config::MINING_REWARD as f64 / 2f64.powi(halvings as i32);
    let reward = reward.round();
    if reward < config::HELIUM_CENT {
        return 0;
    }
    reward as u64
}

/// Recomputes the difficulty number after a retarget interval elapses.
///
/// `elapsed_seconds` is the time between the block that triggers the
/// retarget and the block `RETARGET_INTERVAL` heights before it.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn retarget(old_difficulty_number: f64, elapsed_seconds: i64) -> f64 {
    let expected = elapsed_seconds as f64 / config::TARGET_BLOCK_SECONDS as f64;
    let discrepancy = config::RETARGET_INTERVAL as f64 - expected;
    old_difficulty_number
        * (1.0 - config::RETARGET_DAMPING * discrepancy / (config::RETARGET_INTERVAL as f64 + expected))
}

/// Generates a fresh miner keypair, appends both key texts to the
/// append-only coinbase-keys file at `path` (private key then public key,
/// each newline-terminated), and returns the resulting pkhash:
/// `RIPEMD160(SHA256(public key))`.
///
/// A new keypair is generated every time a candidate block is assembled,
/// so the mining reward and collected fees for that block go to a fresh
/// address rather than one reused across the node's lifetime.
///
/// # Errors
///
/// Returns an error if key generation fails or the coinbase-keys file
/// cannot be opened or written to.
pub fn generate_miner_keys(path: &Path) -> Result<String> {
    let (private_key, public_key) = crypto::make_keys()?;
    let pkhash = crypto::pkhash(public_key.as_pem());

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", private_key.as_pem())?;
    writeln!(file, "{}", public_key.as_pem())?;

    Ok(pkhash)
}

/// Builds the fixed header-size estimate used by candidate assembly:
/// 1 KB reserve for the coinbase transaction plus 64 bytes for the Merkle
/// root, on top of the header's own serialized size.
fn header_size_budget(header: &BlockHeader) -> usize {
    serde_json::to_vec(header).map(|b| b.len()).unwrap_or(0) + 1024 + 64
}

/// Assembles a candidate block from the mempool. Returns `None` if no
/// mempool transaction could be included.
///
/// Generates a fresh miner keypair via [`generate_miner_keys`] first,
/// appending it to the coinbase-keys file at `coinbase_keys_path`; the
/// resulting pkhash receives both the mining reward and every included
/// transaction's fee for this round. For each mempool transaction in
/// order: skip if its lock-time is in the future; re-credit any positive
/// fee to the miner as an extra output; include it while the accumulated
/// size stays within [`config::MAX_BLOCK_SIZE`], otherwise stop. A
/// coinbase transaction carrying the mining reward is prepended once at
/// least one transaction was included.
///
/// # Errors
///
/// Returns an error if the miner keypair cannot be generated or
/// persisted, a mempool transaction's fee cannot be computed (e.g. it
/// references a fragment that no longer exists), or the Merkle root
/// cannot be built.
pub fn assemble_candidate(
    mempool: &Mempool,
    last_block: Option<&Block>,
    coinbase_keys_path: &Path,
    difficulty_bits: u32,
    difficulty_number: f64,
    chainstate: &ChainState,
    now: i64,
) -> Result<Option<Block>> {
    let miner_pkhash = generate_miner_keys(coinbase_keys_path)?;

    let height = last_block.map_or(0, |b| b.height() + 1);
    let previous_hash = last_block.map(Block::hash);

    let header = BlockHeader::new(previous_hash, shared::Hash256::zero(), now, difficulty_bits, 0, height);
    let mut size_budget = header_size_budget(&header);

    let mut included = Vec::new();
    for tx in mempool.iter() {
        if tx.locktime > now {
            continue;
        }

        let fee = validation::validate_transaction(tx, false, chainstate)?;
        let mut tx = tx.clone();
        if fee > 0 {
            tx.vout.push(TxOutput::new(fee, LockScript::p2pkh(&miner_pkhash)));
        }

        let tx_size = serde_json::to_vec(&tx).map(|b| b.len()).unwrap_or(0);
        if size_budget + tx_size > config::MAX_BLOCK_SIZE {
            break;
        }
        size_budget += tx_size;
        included.push(tx);
    }

    if included.is_empty() {
        return Ok(None);
    }

    let reward = reward_for_height(height);
    let coinbase = Transaction::coinbase(
        &miner_pkhash,
        reward,
        i64::try_from(config::COINBASE_INTERVAL * 600)
            .map_err(|_| BlockchainError::InvalidBlock("coinbase locktime overflow".to_string()))?,
    );

    let mut transactions = Vec::with_capacity(included.len() + 1);
    transactions.push(coinbase);
    transactions.extend(included);

    let root = merkle_root(&transactions)?;
    let header = BlockHeader::new(previous_hash, root, now, difficulty_bits, 0, height);
    let block = Block::new(header, transactions);

    validation::validate_block(&block, last_block, difficulty_number, chainstate)?;

    Ok(Some(block))
}

/// Searches for a nonce that solves `block`'s header under
/// `difficulty_number`, calling `should_abort` between attempts. Returns
/// the solved block, or `None` if `should_abort` ever returns true.
pub fn search_proof_of_work(
    mut block: Block,
    difficulty_number: f64,
    mut should_abort: impl FnMut(&Block) -> bool,
) -> Option<Block> {
    loop {
        if block.header.meets_difficulty(difficulty_number) {
            return Some(block);
        }
        if should_abort(&block) {
            return None;
        }
        block.header.nonce += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::UnlockScript;
    use crate::transaction::TxInput;
    use shared::Hash256;
    use tempfile::tempdir;

    #[test]
    fn reward_has_no_halving_before_first_interval() {
        assert_eq!(reward_for_height(0), config::MINING_REWARD);
        assert_eq!(reward_for_height(config::REWARD_INTERVAL - 1), config::MINING_REWARD);
    }

    #[test]
    fn reward_halves_at_interval() {
        assert_eq!(
            reward_for_height(config::REWARD_INTERVAL),
            config::MINING_REWARD / 2
        );
        assert_eq!(
            reward_for_height(config::REWARD_INTERVAL * 2),
            config::MINING_REWARD / 4
        );
    }

    #[test]
    fn retarget_increases_difficulty_when_blocks_are_slow() {
        let old = config::DIFFICULTY_NUMBER;
        let expected_seconds = config::RETARGET_INTERVAL as i64 * config::TARGET_BLOCK_SECONDS;
        let slow = retarget(old, expected_seconds * 2);
        assert!(slow < old);
    }

    #[test]
    fn retarget_is_unchanged_at_expected_pace() {
        let old = config::DIFFICULTY_NUMBER;
        let expected_seconds = config::RETARGET_INTERVAL as i64 * config::TARGET_BLOCK_SECONDS;
        let same = retarget(old, expected_seconds);
        assert!((same - old).abs() < old * 1e-9);
    }

    #[test]
    fn generate_miner_keys_appends_a_fresh_pair_each_call() {
        let dir = tempdir().unwrap();
        let keys_path = dir.path().join("coinbase_keys.txt");

        let first = generate_miner_keys(&keys_path).unwrap();
        let second = generate_miner_keys(&keys_path).unwrap();
        assert_ne!(first, second);

        let contents = std::fs::read_to_string(&keys_path).unwrap();
        assert_eq!(contents.matches("BEGIN PRIVATE KEY").count(), 2);
        assert_eq!(contents.matches("BEGIN PUBLIC KEY").count(), 2);
    }

    #[test]
    fn assemble_candidate_without_mempool_entries_returns_none() {
        let dir = tempdir().unwrap();
        let chainstate = ChainState::open(dir.path().join("chainstate")).unwrap();
        let keys_path = dir.path().join("coinbase_keys.txt");
        let mempool = Mempool::new();
        let candidate = assemble_candidate(
            &mempool,
            None,
            &keys_path,
            config::DIFFICULTY_BITS,
            f64::INFINITY,
            &chainstate,
            0,
        )
        .unwrap();
        assert!(candidate.is_none());
    }

    #[test]
    fn assemble_candidate_includes_eligible_transaction_and_credits_fee() {
        let dir = tempdir().unwrap();
        let chainstate = ChainState::open(dir.path().join("chainstate")).unwrap();
        let keys_path = dir.path().join("coinbase_keys.txt");
        let (priv_key, pub_key) = shared::crypto::make_keys().unwrap();
        let pkhash = shared::crypto::pkhash(pub_key.as_pem());
        let coinbase = Transaction::coinbase(&pkhash, 1_000, 0);
        chainstate.apply_transaction(&coinbase).unwrap();

        let signature = shared::crypto::sign(&priv_key, pub_key.as_pem()).unwrap();
        let spend = Transaction::new(
            vec![TxInput::new(
                coinbase.txid,
                0,
                UnlockScript::new(signature.as_hex().to_string(), pub_key.as_pem().to_string()),
            )],
            vec![TxOutput::pay_to(&"b".repeat(40), 700)],
            0,
        );

        let mut mempool = Mempool::new();
        mempool.insert(spend);

        let candidate = assemble_candidate(
            &mempool,
            None,
            &keys_path,
            1,
            f64::INFINITY,
            &chainstate,
            0,
        )
        .unwrap()
        .expect("candidate should include the eligible spend");

        assert_eq!(candidate.transactions.len(), 2);
        assert!(candidate.transactions[0].is_coinbase());
        let miner_pkhash = candidate.transactions[0].vout[0].script_pubkey.pkhash();
        let spend_in_block = &candidate.transactions[1];
        assert_eq!(spend_in_block.vout.len(), 2);
        assert_eq!(spend_in_block.vout[1].script_pubkey.pkhash(), miner_pkhash);
        assert_eq!(spend_in_block.vout[1].value, 300);
        assert!(keys_path.exists());
    }

    #[test]
    fn assemble_candidate_skips_future_locked_transaction() {
        let dir = tempdir().unwrap();
        let chainstate = ChainState::open(dir.path().join("chainstate")).unwrap();
        let keys_path = dir.path().join("coinbase_keys.txt");
        let tx = Transaction::new(vec![], vec![TxOutput::pay_to(&"a".repeat(40), 1)], i64::MAX);
        let mut mempool = Mempool::new();
        mempool.insert(tx);
        let candidate = assemble_candidate(
            &mempool,
            None,
            &keys_path,
            1,
            f64::INFINITY,
            &chainstate,
            0,
        )
        .unwrap();
        assert!(candidate.is_none());
    }

    #[test]
    fn search_proof_of_work_finds_a_nonce_under_easy_difficulty() {
        let coinbase = Transaction::coinbase(&"a".repeat(40), 100, 0);
        let root = merkle_root(std::slice::from_ref(&coinbase)).unwrap();
        let header = BlockHeader::new(None, root, 0, 1, 0, 0);
        let block = Block::new(header, vec![coinbase]);
        let solved = search_proof_of_work(block, f64::INFINITY, |_| false);
        assert!(solved.is_some());
    }

    #[test]
    fn search_proof_of_work_aborts_when_asked() {
        let coinbase = Transaction::coinbase(&"a".repeat(40), 100, 0);
        let root = merkle_root(std::slice::from_ref(&coinbase)).unwrap();
        let header = BlockHeader::new(None, root, 0, 1, 0, 0);
        let block = Block::new(header, vec![coinbase]);
        let solved = search_proof_of_work(block, f64::EPSILON, |_| true);
        assert!(solved.is_none());
    }

    #[test]
    fn mempool_contains_and_removes_block_transactions() {
        let mut mempool = Mempool::new();
        let tx = Transaction::coinbase(&"a".repeat(40), 1, 0);
        mempool.insert(tx.clone());
        assert!(mempool.contains(&tx));

        let header = BlockHeader::new(None, Hash256::zero(), 0, 1, 0, 0);
        let block = Block::new(header, vec![tx]);
        mempool.remove_block_transactions(&block);
        assert!(mempool.is_empty());
    }
}
