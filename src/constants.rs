//! Taker-wide constants.
use alloy::primitives::ChainId;
use std::time::Duration;

/// Interval between take-side status polls while waiting for a fulfillment
/// to become visible on chain.
pub const FULFILL_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Number of take-side status polls before a submitted fulfillment is
/// declared lost.
pub const FULFILL_POLL_ATTEMPTS: usize = 10;

/// Default minimum margin, in basis points, an order must clear to be
/// fulfilled by the universal policy.
pub const DEFAULT_MIN_PROFITABILITY_BPS: u32 = 4;

/// Default cadence at which postponed orders are re-driven through the
/// processor.
pub const DEFAULT_MEMPOOL_INTERVAL: Duration = Duration::from_secs(60);

/// Upper bound on mempool entries per destination chain. The oldest entry is
/// evicted once the bound is hit.
pub const DEFAULT_MEMPOOL_CAPACITY: usize = 1024;

/// Default number of fulfilled orders accumulated per source chain before a
/// single batched unlock is submitted.
pub const DEFAULT_BATCH_UNLOCK_SIZE: usize = 10;

/// Largest batch the unlock transaction can carry.
pub const MAX_BATCH_UNLOCK_SIZE: usize = 10;

/// Hard cap on block confirmations for EVM-family chains.
pub const EVM_CONFIRMATION_HARD_CAP: u64 = 256;

/// Hard cap on block confirmations for the Solana-family chain. Solana
/// finality is measured in slots, so the cap is much tighter.
pub const SVM_CONFIRMATION_HARD_CAP: u64 = 32;

/// Protocol-internal chain id of Solana.
pub const SOLANA_CHAIN_ID: ChainId = 7565164;
