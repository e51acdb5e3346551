//! The owned runtime value binding every consensus component together
//! behind a single coarse mutex, mirroring the source's process-wide
//! mutable lists (primary chain, secondary chain, mempool, received
//! queue, orphan set, address list, active difficulty number) guarded by
//! one semaphore.

use crate::block::Block;
use crate::blockindex::BlockIndex;
use crate::chainstate::ChainState;
use crate::mining::{self, Mempool};
use crate::propagation::Propagator;
use crate::reconciler::{self, Attachment, OrphanSet, ReceivedQueue};
use crate::transaction::Transaction;
use crate::validation;
use shared::{config, BlockchainError, NodeConfig, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};

struct EngineState {
    primary: Vec<Block>,
    secondary: Vec<Block>,
    mempool: Mempool,
    received: ReceivedQueue,
    orphans: OrphanSet,
    addresses: Vec<String>,
    difficulty_number: f64,
}

/// The owned node runtime: open store handles plus the mutex-guarded
/// in-memory state. Construct with [`Engine::open`]; there is one engine
/// per running node process.
pub struct Engine {
    state: Mutex<EngineState>,
    chainstate: ChainState,
    block_index: BlockIndex,
    block_dir: PathBuf,
    coinbase_keys_path: PathBuf,
    propagator: Box<dyn Propagator>,
}

impl Engine {
    /// Opens the chainstate and block-index stores under `config.data_dir`
    /// and returns a fresh engine with empty in-memory chains.
    ///
    /// # Errors
    ///
    /// Returns an error if either store cannot be opened or the block
    /// directory cannot be created.
    pub fn open(node_config: &NodeConfig, propagator: Box<dyn Propagator>) -> Result<Self> {
        let root = PathBuf::from(&node_config.data_dir);
        let chainstate = ChainState::open(root.join("chainstate"))?;
        let block_index = BlockIndex::open(root.join("blockindex"))?;
        let block_dir = root.join("blocks");
        fs::create_dir_all(&block_dir)?;
        let coinbase_keys_path = root.join("coinbase_keys.txt");

        Ok(Self {
            state: Mutex::new(EngineState {
                primary: Vec::new(),
                secondary: Vec::new(),
                mempool: Mempool::new(),
                received: ReceivedQueue::new(),
                orphans: OrphanSet::new(),
                addresses: node_config.bootstrap_peers.clone(),
                difficulty_number: config::DIFFICULTY_NUMBER,
            }),
            chainstate,
            block_index,
            block_dir,
            coinbase_keys_path,
            propagator,
        })
    }

    /// Closes the engine, dropping the open store handles. Any in-memory
    /// state not yet committed is lost.
    pub fn close(self) -> Result<()> {
        Ok(())
    }

    /// Current blockchain height, or -1 if the primary chain is empty.
    #[must_use]
    pub fn blockchain_height(&self) -> i64 {
        let state = self.lock();
        state.primary.len() as i64 - 1
    }

    /// Returns a clone of the primary-chain block at `height`, if present.
    #[must_use]
    pub fn get_block(&self, height: u64) -> Option<Block> {
        let state = self.lock();
        usize::try_from(height).ok().and_then(|i| state.primary.get(i)).cloned()
    }

    /// Clears the in-memory primary and secondary chains. The persistent
    /// chainstate and block-index stores are left untouched, matching the
    /// source's operational reset, which never rewinds the stores.
    pub fn clear_blockchain(&self) {
        let mut state = self.lock();
        state.primary.clear();
        state.secondary.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Accepts a transaction into the mempool.
    ///
    /// Rejects a transaction already present in the mempool. Silently
    /// accepts (without re-validating) a transaction already reflected in
    /// the chainstate, keyed `txid_0`. Otherwise validates with
    /// `zero_inputs = tx.is_coinbase()` and, on success, appends to the
    /// mempool and propagates to the known peer list.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is already queued or fails
    /// validation.
    pub fn receive_transaction(&self, tx: Transaction) -> Result<()> {
        {
            let state = self.lock();
            if state.mempool.contains(&tx) {
                return Err(BlockchainError::DuplicateTransaction);
            }
        }

        if self.chainstate.has_fragment(&format!("{}_0", tx.txid)) {
            return Ok(());
        }

        if let Err(err) = validation::validate_transaction(&tx, tx.is_coinbase(), &self.chainstate) {
            warn!(txid = %tx.txid, error = %err, "rejected transaction");
            return Err(err);
        }

        let addresses = {
            let mut state = self.lock();
            state.mempool.insert(tx.clone());
            state.addresses.clone()
        };

        info!(txid = %tx.txid, "transaction accepted into mempool");
        self.propagator.propagate_transaction(&tx, &addresses);
        Ok(())
    }

    /// Accepts a block delivered from a peer.
    ///
    /// Rejects a block already known (queued, or present among the last
    /// two entries of either chain), one whose proof of work fails, or one
    /// whose height falls outside `[primary_tip.height - 2,
    /// primary_tip.height + 1]`. Otherwise runs structural validation,
    /// appends to the received-block queue, and drains the queue.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated invariant.
    pub fn receive_block(&self, block: Block) -> Result<()> {
        let difficulty_number = {
            let state = self.lock();
            if reconciler::is_already_known(&block, &state.primary, &state.secondary, &state.received) {
                return Err(BlockchainError::DuplicateBlock);
            }
            state.difficulty_number
        };

        if !block.header.meets_difficulty(difficulty_number) {
            return Err(BlockchainError::InsufficientDifficulty);
        }

        block.validate_basic()?;

        {
            let state = self.lock();
            let tip_height = state.primary.last().map(Block::height);
            if !reconciler::is_acceptable_height(block.height(), tip_height) {
                let tip = tip_height.unwrap_or(0);
                return if block.height() < tip {
                    Err(BlockchainError::HeightTooOld {
                        height: block.height(),
                        minimum: tip.saturating_sub(2),
                    })
                } else {
                    Err(BlockchainError::HeightTooFar {
                        height: block.height(),
                        maximum: tip + 1,
                    })
                };
            }
        }

        {
            let mut state = self.lock();
            state.received.push(block);
        }

        self.process_received_blocks();
        Ok(())
    }

    fn process_received_blocks(&self) {
        loop {
            let block = {
                let mut state = self.lock();
                match state.received.pop() {
                    Some(b) => b,
                    None => return,
                }
            };
            self.process_one_received_block(block);
        }
    }

    fn process_one_received_block(&self, block: Block) {
        let mut state = self.lock();
        let attachment = reconciler::classify_attachment(&block, &state.primary, &state.secondary);

        let outcome = match attachment {
            Attachment::Primary => self.commit_primary(&mut state, block.clone()),
            Attachment::Fork => self.commit_fork(&mut state, block.clone()),
            Attachment::Secondary => self.commit_secondary(&mut state, block.clone()),
            Attachment::Orphan => {
                state.orphans.insert(block.clone());
                Ok(())
            }
        };

        let committed = matches!(outcome, Ok(())) && !matches!(attachment, Attachment::Orphan);
        if let Err(err) = &outcome {
            warn!(height = block.height(), error = %err, "block rejected during reconciliation");
        }

        if committed {
            if block.height() > 0 && block.height() % config::RETARGET_INTERVAL == 0 {
                self.retarget(&mut state, &block);
            }
            self.attach_orphans(&mut state);
            reconciler::apply_swap_rule(&mut state.primary, &mut state.secondary);
            let tip_height = state.primary.last().map_or(0, Block::height);
            state.orphans.prune_stale(tip_height);
            state.mempool.remove_block_transactions(&block);
        }

        let addresses = state.addresses.clone();
        drop(state);

        if committed {
            self.propagator.propagate_block(&block, &addresses);
        }
    }

    /// Repeatedly attaches any orphan whose previous hash and height match
    /// either chain tip, committing it through the same path as a directly
    /// received block, until no more orphans can be attached.
    fn attach_orphans(&self, state: &mut EngineState) {
        loop {
            let mut attached_any = false;

            if let Some(tip) = state.primary.last() {
                let attachable = state.orphans.take_attachable(tip.hash(), tip.height());
                for orphan in attachable {
                    attached_any = true;
                    if let Err(err) = self.commit_primary(state, orphan.clone()) {
                        warn!(height = orphan.height(), error = %err, "orphan rejected on attach");
                        continue;
                    }
                    state.mempool.remove_block_transactions(&orphan);
                }
            }

            if let Some(tip) = state.secondary.last() {
                let attachable = state.orphans.take_attachable(tip.hash(), tip.height());
                for orphan in attachable {
                    attached_any = true;
                    if let Err(err) = self.commit_secondary(state, orphan.clone()) {
                        warn!(height = orphan.height(), error = %err, "orphan rejected on attach");
                        continue;
                    }
                    state.mempool.remove_block_transactions(&orphan);
                }
            }

            if !attached_any {
                break;
            }
        }
    }

    fn retarget(&self, state: &mut EngineState, block: &Block) {
        let Some(index) = block.height().checked_sub(config::RETARGET_INTERVAL) else {
            return;
        };
        let Some(initial) = state.primary.get(index as usize) else {
            warn!(height = block.height(), "retarget reference block unavailable, skipping");
            return;
        };
        let elapsed = block.header.timestamp - initial.header.timestamp;
        let new_difficulty = mining::retarget(state.difficulty_number, elapsed);
        info!(old = state.difficulty_number, new = new_difficulty, "retargeted difficulty");
        state.difficulty_number = new_difficulty;
    }

    /// Validates and applies `block` against `last_block`, serializes it to
    /// a block file named by its insertion index, and records a
    /// `(txid -> height)` entry per transaction. Any sub-step failure rolls
    /// back every chainstate write this call made.
    fn commit(&self, last_block: Option<&Block>, difficulty_number: f64, insertion_index: usize, block: &Block) -> Result<()> {
        validation::validate_block(block, last_block, difficulty_number, &self.chainstate)?;

        let mut applied: Vec<&Transaction> = Vec::with_capacity(block.transactions.len());
        for tx in &block.transactions {
            if let Err(err) = self.chainstate.apply_transaction(tx) {
                for done in applied.into_iter().rev() {
                    if let Err(rollback_err) = self.chainstate.revert_transaction(done) {
                        warn!(txid = %done.txid, error = %rollback_err, "failed to roll back transaction during commit failure");
                    }
                }
                return Err(err);
            }
            applied.push(tx);
        }

        if let Err(err) = self.write_block_file(insertion_index, block) {
            for done in applied.into_iter().rev() {
                if let Err(rollback_err) = self.chainstate.revert_transaction(done) {
                    warn!(txid = %done.txid, error = %rollback_err, "failed to roll back transaction after block-file write failure");
                }
            }
            return Err(err);
        }

        for tx in &block.transactions {
            self.block_index.put_index(&tx.txid, block.height())?;
        }

        Ok(())
    }

    fn write_block_file(&self, insertion_index: usize, block: &Block) -> Result<()> {
        let path = self.block_dir.join(format!("block_{insertion_index}.dat"));
        let encoded = serde_json::to_vec(block)?;
        fs::write(path, encoded)?;
        Ok(())
    }

    fn commit_primary(&self, state: &mut EngineState, block: Block) -> Result<()> {
        let insertion_index = state.primary.len();
        self.commit(state.primary.last(), state.difficulty_number, insertion_index, &block)?;
        state.primary.push(block);
        Ok(())
    }

    fn commit_fork(&self, state: &mut EngineState, block: Block) -> Result<()> {
        let parent = state.primary.get(state.primary.len().saturating_sub(2)).cloned();
        let insertion_index = state.primary.len();
        self.commit(parent.as_ref(), state.difficulty_number, insertion_index, &block)?;
        state.secondary = reconciler::fork(&state.primary, block);
        reconciler::apply_swap_rule(&mut state.primary, &mut state.secondary);
        Ok(())
    }

    fn commit_secondary(&self, state: &mut EngineState, block: Block) -> Result<()> {
        reconciler::apply_swap_rule(&mut state.primary, &mut state.secondary);
        let insertion_index = state.primary.len();
        self.commit(state.primary.last(), state.difficulty_number, insertion_index, &block)?;
        state.primary.push(block);
        Ok(())
    }

    /// Assembles a candidate block from the current mempool using a fresh
    /// miner keypair, searches for a solving nonce, and commits the block
    /// through the shared acceptance path on success. `should_abort` is
    /// polled between nonce attempts so an in-progress search yields to
    /// newly received blocks sharing a transaction with the candidate.
    ///
    /// # Errors
    ///
    /// Returns an error if candidate assembly or commit fails.
    pub fn mine_once(&self, now: i64) -> Result<Option<Block>> {
        let candidate = {
            let state = self.lock();
            mining::assemble_candidate(
                &state.mempool,
                state.primary.last(),
                &self.coinbase_keys_path,
                config::DIFFICULTY_BITS,
                state.difficulty_number,
                &self.chainstate,
                now,
            )?
        };

        let Some(candidate) = candidate else {
            return Ok(None);
        };

        let difficulty_number = self.lock().difficulty_number;
        let solved = mining::search_proof_of_work(candidate, difficulty_number, |candidate| {
            let state = self.lock();
            !state.received.is_empty() && state.received.shares_transaction_with(candidate)
        });

        let Some(solved) = solved else {
            return Ok(None);
        };

        let mut state = self.lock();
        let attachment = reconciler::classify_attachment(&solved, &state.primary, &state.secondary);
        if !matches!(attachment, Attachment::Primary) {
            // Another block landed on the tip while we were mining; drop
            // this solution and let the caller retry against the new tip.
            return Ok(None);
        }
        self.commit_primary(&mut state, solved.clone())?;

        if solved.height() > 0 && solved.height() % config::RETARGET_INTERVAL == 0 {
            self.retarget(&mut state, &solved);
        }
        self.attach_orphans(&mut state);
        reconciler::apply_swap_rule(&mut state.primary, &mut state.secondary);
        state.mempool.remove_block_transactions(&solved);

        let addresses = state.addresses.clone();
        drop(state);

        info!(height = solved.height(), "mined block");
        self.propagator.propagate_block(&solved, &addresses);

        Ok(Some(solved))
    }
}
