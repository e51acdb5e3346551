//! Consensus primitives for a minimal proof-of-work UTXO cryptocurrency:
//! blocks, transactions, fixed-shape scripts, chainstate and block-index
//! stores, contextual validation, mining, chain reconciliation, peer
//! propagation, and the [`engine`] type that binds them into a running
//! node.

pub mod block;
pub mod blockindex;
pub mod chainstate;
pub mod engine;
pub mod mining;
pub mod propagation;
pub mod reconciler;
pub mod script;
pub mod transaction;
pub mod utxo;
pub mod validation;

pub use block::{merkle_root, Block, BlockHeader};
pub use blockindex::BlockIndex;
pub use chainstate::ChainState;
pub use engine::Engine;
pub use mining::{
    assemble_candidate, generate_miner_keys, reward_for_height, retarget, search_proof_of_work,
    Mempool,
};
pub use propagation::{HttpPropagator, LoggingPropagator, Propagator};
pub use reconciler::{classify_attachment, fork, Attachment, OrphanSet, ReceivedQueue};
pub use script::{LockScript, UnlockScript};
pub use transaction::{Transaction, TxInput, TxOutput};
pub use utxo::{fragment_key, Fragment};
pub use validation::{validate_block, validate_transaction};

pub use shared::{BlockchainError, Hash256, Result};
