//! Consensus configuration constants.
//!
//! These values are normative: every node on the network must agree on them.
//! They mirror a single flat configuration table rather than a hierarchy of
//! overridable settings, since none of them is meant to vary per node.

/// The Helium protocol version tag carried by every transaction and block.
pub const VERSION_NO: &str = "1";

/// The maximum number of Helium coins that can ever be mined.
pub const MAX_HELIUM_COINS: u64 = 21_000_000;

/// The smallest Helium currency unit, as a fraction of one coin.
pub const HELIUM_CENT: f64 = 1.0 / 100_000_000.0;

/// The maximum serialized size of a block, in bytes.
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// The maximum lock-time a transaction may carry, in seconds.
pub const MAX_LOCKTIME: i64 = 30 * 1440 * 60;

/// The maximum number of inputs a transaction may carry.
pub const MAX_INPUTS: usize = 10;

/// The maximum number of outputs a transaction may carry.
pub const MAX_OUTPUTS: usize = 10;

/// The number of blocks that must be mined on top of a reference block
/// before that block's coinbase output can be spent.
pub const COINBASE_INTERVAL: u64 = 100;

/// The number of blocks for which a coinbase transaction's lock-time holds.
pub const COINBASE_LOCKTIME: u64 = 36;

/// The starting nonce value for proof-of-work search.
pub const NONCE: u64 = 0;

/// Difficulty bits, informational; the normative threshold is `DIFFICULTY_NUMBER`.
pub const DIFFICULTY_BITS: u32 = 20;

/// The initial proof-of-work difficulty threshold: `1 / 10^20`.
pub const DIFFICULTY_NUMBER: f64 = 1.0 / 1e20;

/// The number of blocks between difficulty retargets.
pub const RETARGET_INTERVAL: u64 = 1000;

/// The damping factor applied on each retarget.
pub const RETARGET_DAMPING: f64 = 0.20;

/// The target number of seconds between blocks, used by retargeting.
pub const TARGET_BLOCK_SECONDS: i64 = 600;

/// The initial per-block mining reward, in the smallest currency unit.
pub const MINING_REWARD: u64 = 5_000_000;

/// The number of blocks between reward halvings.
pub const REWARD_INTERVAL: u64 = 210_000;
