//! Chain reconciliation: the received-block queue, orphan set, fork
//! detection, and the primary/secondary swap rule.

use crate::block::Block;
use shared::BlockHeight;

/// Blocks that could not be attached to either chain tip when received.
#[derive(Debug, Default)]
pub struct OrphanSet {
    blocks: Vec<Block>,
}

impl OrphanSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block: Block) {
        self.blocks.push(block);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Removes and returns every orphan whose previous hash matches `tip`
    /// and whose height is exactly `tip_height + 1`.
    pub fn take_attachable(&mut self, tip: shared::Hash256, tip_height: BlockHeight) -> Vec<Block> {
        let (attachable, remaining): (Vec<_>, Vec<_>) = self.blocks.drain(..).partition(|block| {
            block.header.previous_hash == Some(tip) && block.height() == tip_height + 1
        });
        self.blocks = remaining;
        attachable
    }

    /// Drops orphans that have fallen too far behind the primary tip.
    pub fn prune_stale(&mut self, primary_tip_height: BlockHeight) {
        if primary_tip_height < 3 {
            return;
        }
        self.blocks
            .retain(|block| primary_tip_height.saturating_sub(block.height()) < 2);
    }
}

/// Ordered blocks delivered from peers and not yet reconciled.
#[derive(Debug, Default)]
pub struct ReceivedQueue {
    blocks: Vec<Block>,
}

impl ReceivedQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn pop(&mut self) -> Option<Block> {
        self.blocks.pop()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    #[must_use]
    pub fn contains(&self, block: &Block) -> bool {
        self.blocks.iter().any(|b| b.hash() == block.hash())
    }

    /// Whether any queued block shares a transaction with `candidate` —
    /// used to cooperatively cancel an in-progress mining attempt.
    #[must_use]
    pub fn shares_transaction_with(&self, candidate: &Block) -> bool {
        self.blocks.iter().any(|queued| {
            queued
                .transactions
                .iter()
                .any(|qtx| candidate.transactions.iter().any(|ctx| ctx.txid == qtx.txid))
        })
    }
}

/// Where a newly received block would attach, determined by comparing its
/// previous hash against the chain tips.
pub enum Attachment {
    /// Appends directly to the primary chain.
    Primary,
    /// Forks off the primary chain's parent, creating a new secondary
    /// chain.
    Fork,
    /// Appends to the existing secondary chain.
    Secondary,
    /// Neither chain can currently accept this block.
    Orphan,
}

/// Classifies where `block` would attach given the current primary and
/// secondary chains.
#[must_use]
pub fn classify_attachment(block: &Block, primary: &[Block], secondary: &[Block]) -> Attachment {
    let primary_tip = primary.last();
    let attaches_to_primary = match primary_tip {
        None => block.header.previous_hash.is_none(),
        Some(tip) => block.header.previous_hash == Some(tip.hash()),
    };
    if attaches_to_primary {
        return Attachment::Primary;
    }

    if primary.len() >= 2 {
        let parent = &primary[primary.len() - 2];
        if block.header.previous_hash == Some(parent.hash()) {
            return Attachment::Fork;
        }
    }

    if let Some(tip) = secondary.last() {
        if block.header.previous_hash == Some(tip.hash()) {
            return Attachment::Secondary;
        }
    }

    Attachment::Orphan
}

/// Builds the secondary chain from the primary chain's parent-of-tip,
/// appending `block`.
#[must_use]
pub fn fork(primary: &[Block], block: Block) -> Vec<Block> {
    let mut secondary = primary[..primary.len() - 1].to_vec();
    secondary.push(block);
    secondary
}

/// Applies the swap rule in place: if the secondary chain is at least as
/// long as the primary, exchange them; then if the primary leads the
/// secondary by more than two blocks, clear the secondary.
pub fn apply_swap_rule(primary: &mut Vec<Block>, secondary: &mut Vec<Block>) {
    if secondary.len() >= primary.len() {
        std::mem::swap(primary, secondary);
    }
    if primary.len().saturating_sub(secondary.len()) > 2 {
        secondary.clear();
    }
}

/// Rejects blocks that are already known (in the received queue or either
/// chain's last two entries) or whose height falls outside the acceptable
/// window relative to the primary tip.
#[must_use]
pub fn is_acceptable_height(height: BlockHeight, primary_tip_height: Option<BlockHeight>) -> bool {
    match primary_tip_height {
        None => true,
        Some(tip) => height + 2 >= tip && height <= tip + 1,
    }
}

#[must_use]
pub fn is_already_known(block: &Block, primary: &[Block], secondary: &[Block], received: &ReceivedQueue) -> bool {
    if received.contains(block) {
        return true;
    }
    let matches_tail = |chain: &[Block]| {
        let len = chain.len();
        (len >= 1 && chain[len - 1].hash() == block.hash())
            || (len >= 2 && chain[len - 2].hash() == block.hash())
    };
    matches_tail(primary) || matches_tail(secondary)
}
