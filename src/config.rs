//! Taker configuration.

use crate::{
    chains::{ChainFamily, family_of},
    constants::{
        DEFAULT_BATCH_UNLOCK_SIZE, DEFAULT_MEMPOOL_CAPACITY, DEFAULT_MEMPOOL_INTERVAL,
        DEFAULT_MIN_PROFITABILITY_BPS, MAX_BATCH_UNLOCK_SIZE,
    },
    filters::{ApprovedTakeToken, DisableFulfill, OrderFilter, WhitelistOrderId},
    types::{OrderId, TokensBucket},
};
use alloy::primitives::{Address, B256, ChainId};
use eyre::Context;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc, time::Duration};
use url::Url;

/// Errors raised by startup validation. All of them are fatal: the daemon
/// refuses to start on a bad configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The chain is not in the supported set.
    #[error("unsupported chain {0}")]
    UnsupportedChain(ChainId),
    /// The same chain is configured twice.
    #[error("duplicate chain {0}")]
    DuplicateChain(ChainId),
    /// Confirmation thresholds are not strictly increasing in both USD
    /// value and confirmations.
    #[error("confirmation thresholds for chain {0} must be strictly increasing")]
    NonMonotonicThresholds(ChainId),
    /// A threshold asks for more confirmations than the chain can provide.
    #[error("confirmation threshold {confirmations} reaches the hard cap {cap} on chain {chain_id}")]
    ThresholdAboveCap {
        /// The offending chain.
        chain_id: ChainId,
        /// Configured confirmations.
        confirmations: u64,
        /// The chain family's hard cap.
        cap: u64,
    },
    /// The batch unlock size is outside `[1, 10]`.
    #[error("batch unlock size {0} outside [1, {MAX_BATCH_UNLOCK_SIZE}]")]
    BatchUnlockSizeOutOfRange(usize),
    /// A chain entry is missing signing key material.
    #[error("missing signing key for chain {0}")]
    MissingKey(ChainId),
    /// A strict-policy chain has no approved take tokens.
    #[error("strict policy on chain {0} requires approved take tokens")]
    NoApprovedTakeTokens(ChainId),
    /// A configured bucket holds no tokens at all.
    #[error("token bucket {0} holds no tokens")]
    EmptyBucket(usize),
}

/// Order processing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PolicyKind {
    /// Profitability-gated processing with mempool retries and batched
    /// unlocks.
    UniversalProcessor,
    /// Approved-token-only processing with immediate unbatched unlocks.
    StrictProcessor,
}

/// Tunables of the universal policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UniversalParams {
    /// Minimum margin an order must clear, in basis points.
    pub min_profitability_bps: u32,
    /// Cadence at which the mempool re-drives postponed orders.
    #[serde(with = "duration_secs")]
    pub mempool_interval: Duration,
    /// Fulfilled orders accumulated per source chain before one batched
    /// unlock is submitted.
    pub batch_unlock_size: usize,
}

impl Default for UniversalParams {
    fn default() -> Self {
        Self {
            min_profitability_bps: DEFAULT_MIN_PROFITABILITY_BPS,
            mempool_interval: DEFAULT_MEMPOOL_INTERVAL,
            batch_unlock_size: DEFAULT_BATCH_UNLOCK_SIZE,
        }
    }
}

/// Declarative admission filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    /// Admit only orders whose id is whitelisted.
    WhitelistOrderIds {
        /// The whitelisted order ids.
        ids: Vec<B256>,
    },
    /// Admit only orders taking one of the listed tokens.
    ApprovedTakeTokens {
        /// The approved token addresses.
        tokens: Vec<Address>,
    },
    /// Admit nothing.
    DisableFulfill,
}

impl FilterConfig {
    /// Instantiates the configured filter.
    pub fn build(&self) -> Arc<dyn OrderFilter> {
        match self {
            Self::WhitelistOrderIds { ids } => {
                Arc::new(WhitelistOrderId::new(ids.iter().copied().map(OrderId)))
            }
            Self::ApprovedTakeTokens { tokens } => {
                Arc::new(ApprovedTakeToken::new(tokens.iter().copied()))
            }
            Self::DisableFulfill => Arc::new(DisableFulfill),
        }
    }
}

/// A single confirmation threshold point: orders worth at least
/// `threshold_amount_in_usd` need `min_block_confirmations` source-chain
/// confirmations before the feed may deliver them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdPoint {
    /// Lower USD bound of orders this point applies to.
    pub threshold_amount_in_usd: f64,
    /// Required source-chain confirmations.
    pub min_block_confirmations: u64,
}

/// Per-chain constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    /// Confirmation threshold points, ascending in USD value.
    pub required_confirmations_thresholds: Vec<ThresholdPoint>,
}

/// A confirmation rule derived from the threshold points: orders whose USD
/// value falls in `[usd_worth_from, usd_worth_to)` need
/// `min_block_confirmations` confirmations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmationRange {
    /// Inclusive lower USD bound.
    pub usd_worth_from: f64,
    /// Exclusive upper USD bound, `f64::INFINITY` for the last range.
    pub usd_worth_to: f64,
    /// Required source-chain confirmations.
    pub min_block_confirmations: u64,
}

impl Constraints {
    /// Expands the threshold points into contiguous confirmation ranges.
    pub fn confirmation_ranges(&self) -> Vec<ConfirmationRange> {
        let points = &self.required_confirmations_thresholds;
        points
            .iter()
            .enumerate()
            .map(|(i, point)| ConfirmationRange {
                usd_worth_from: point.threshold_amount_in_usd,
                usd_worth_to: points
                    .get(i + 1)
                    .map_or(f64::INFINITY, |next| next.threshold_amount_in_usd),
                min_block_confirmations: point.min_block_confirmations,
            })
            .collect()
    }
}

/// Configuration of a single chain the taker operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntry {
    /// Chain id.
    pub chain: ChainId,
    /// RPC endpoint of the chain.
    pub chain_rpc: Url,
    /// Address receiving unlocked give-side funds for orders fulfilled by
    /// this taker.
    pub beneficiary: Address,
    /// Key the taker fulfills with on this chain.
    #[serde(skip_serializing, default)]
    pub taker_private_key: String,
    /// Key authorized to unlock on behalf of the taker.
    #[serde(skip_serializing, default)]
    pub unlock_authority_private_key: String,
    /// Disables fulfillment on this chain. Disabled chains still source
    /// orders and unlock previously fulfilled ones.
    #[serde(default)]
    pub disabled: bool,
    /// Per-chain policy override.
    #[serde(default)]
    pub order_processor: Option<PolicyKind>,
    /// Take tokens the strict policy admits on this chain.
    #[serde(default)]
    pub approved_take_tokens: Vec<Address>,
    /// Filters applied to orders destined for this chain.
    #[serde(default)]
    pub dst_filters: Vec<FilterConfig>,
    /// Filters applied to orders originating from this chain.
    #[serde(default)]
    pub src_filters: Vec<FilterConfig>,
    /// Per-chain constraints.
    #[serde(default)]
    pub constraints: Constraints,
    /// Crosschain forwarder contract pre-approved to spend reserve tokens.
    #[serde(default)]
    pub crosschain_forwarder: Option<Address>,
    /// Destination PMM contract pre-approved to spend reserve tokens.
    #[serde(default)]
    pub dst_pmm: Option<Address>,
}

impl ChainEntry {
    /// The family of this chain. Only valid after [`TakerConfig::validate`].
    pub fn family(&self) -> ChainFamily {
        family_of(self.chain).expect("validated at startup")
    }
}

/// Top-level taker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakerConfig {
    /// Order feed endpoint. Absent when the embedder wires a feed instance
    /// directly.
    #[serde(default)]
    pub order_feed: Option<Url>,
    /// Reserve token buckets.
    pub buckets: Vec<TokensBucket>,
    /// Default processing policy, overridable per chain.
    #[serde(default = "default_policy")]
    pub order_processor: PolicyKind,
    /// Universal policy tunables.
    #[serde(default)]
    pub universal: UniversalParams,
    /// Filters applied to every order regardless of route.
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    /// Lifetime of a cached token price.
    #[serde(default = "default_rate_ttl", with = "duration_secs")]
    pub rate_ttl: Duration,
    /// Upper bound on mempool entries per destination chain.
    #[serde(default = "default_mempool_capacity")]
    pub mempool_capacity: usize,
    /// The chains the taker operates on.
    pub chains: Vec<ChainEntry>,
}

fn default_policy() -> PolicyKind {
    PolicyKind::UniversalProcessor
}

fn default_rate_ttl() -> Duration {
    Duration::from_secs(300)
}

fn default_mempool_capacity() -> usize {
    DEFAULT_MEMPOOL_CAPACITY
}

impl TakerConfig {
    /// Loads the configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let file = std::fs::File::open(&path)
            .wrap_err_with(|| format!("opening config file {}", path.as_ref().display()))?;
        serde_yaml::from_reader(&file).wrap_err("parsing config file")
    }

    /// Saves the configuration to a YAML file. Key material is never
    /// written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> eyre::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)
            .wrap_err_with(|| format!("writing config file {}", path.as_ref().display()))?;
        Ok(())
    }

    /// The policy governing `entry`.
    pub fn policy_for(&self, entry: &ChainEntry) -> PolicyKind {
        entry.order_processor.unwrap_or(self.order_processor)
    }

    /// Validates the configuration. Every violation is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_BATCH_UNLOCK_SIZE).contains(&self.universal.batch_unlock_size) {
            return Err(ConfigError::BatchUnlockSizeOutOfRange(self.universal.batch_unlock_size));
        }

        for (i, bucket) in self.buckets.iter().enumerate() {
            if bucket.is_empty() {
                return Err(ConfigError::EmptyBucket(i));
            }
        }

        for entry in &self.chains {
            let family =
                family_of(entry.chain).ok_or(ConfigError::UnsupportedChain(entry.chain))?;

            if self.chains.iter().filter(|other| other.chain == entry.chain).count() > 1 {
                return Err(ConfigError::DuplicateChain(entry.chain));
            }

            if entry.taker_private_key.is_empty() || entry.unlock_authority_private_key.is_empty()
            {
                return Err(ConfigError::MissingKey(entry.chain));
            }

            if self.policy_for(entry) == PolicyKind::StrictProcessor
                && entry.approved_take_tokens.is_empty()
            {
                return Err(ConfigError::NoApprovedTakeTokens(entry.chain));
            }

            let cap = family.hard_confirmation_cap();
            let points = &entry.constraints.required_confirmations_thresholds;
            for point in points {
                if point.min_block_confirmations >= cap {
                    return Err(ConfigError::ThresholdAboveCap {
                        chain_id: entry.chain,
                        confirmations: point.min_block_confirmations,
                        cap,
                    });
                }
            }
            for (lo, hi) in points.iter().tuple_windows() {
                if lo.threshold_amount_in_usd >= hi.threshold_amount_in_usd
                    || lo.min_block_confirmations >= hi.min_block_confirmations
                {
                    return Err(ConfigError::NonMonotonicThresholds(entry.chain));
                }
            }
        }

        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
