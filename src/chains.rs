//! Supported chains, their families, and the per-chain processor wiring.

use crate::{
    constants::{EVM_CONFIRMATION_HARD_CAP, SOLANA_CHAIN_ID, SVM_CONFIRMATION_HARD_CAP},
    filters::OrderFilter,
    processor::ProcessorHandle,
};
use alloy::primitives::ChainId;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// Chain families the taker can operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// Account-model chains speaking the Ethereum JSON-RPC dialect.
    Evm,
    /// Solana: address-lookup tables, large transactions, no account model.
    Svm,
}

impl ChainFamily {
    /// Hard upper bound on block confirmations a feed may be asked to wait
    /// for on this family. Configured thresholds must stay strictly below.
    pub const fn hard_confirmation_cap(self) -> u64 {
        match self {
            Self::Evm => EVM_CONFIRMATION_HARD_CAP,
            Self::Svm => SVM_CONFIRMATION_HARD_CAP,
        }
    }
}

/// Chains the protocol runs on. Anything outside this set is rejected at
/// startup.
const SUPPORTED: &[(ChainId, ChainFamily)] = &[
    (1, ChainFamily::Evm),      // Ethereum
    (10, ChainFamily::Evm),     // Optimism
    (56, ChainFamily::Evm),     // BNB Chain
    (137, ChainFamily::Evm),    // Polygon
    (8453, ChainFamily::Evm),   // Base
    (42161, ChainFamily::Evm),  // Arbitrum One
    (43114, ChainFamily::Evm),  // Avalanche C-Chain
    (59144, ChainFamily::Evm),  // Linea
    (SOLANA_CHAIN_ID, ChainFamily::Svm),
];

/// Returns the family of a supported chain, or `None` for unknown chains.
pub fn family_of(chain_id: ChainId) -> Option<ChainFamily> {
    SUPPORTED.iter().find(|(id, _)| *id == chain_id).map(|(_, family)| *family)
}

/// A configured chain wired to its processor and admission filters.
#[derive(Debug, Clone)]
pub struct ConfiguredChain {
    /// Chain id.
    pub chain_id: ChainId,
    /// Chain family.
    pub family: ChainFamily,
    /// Handle to the chain's order processor.
    pub processor: ProcessorHandle,
    /// Filters applied to orders originating from this chain.
    pub src_filters: Vec<Arc<dyn OrderFilter>>,
    /// Filters applied to orders destined for this chain.
    pub dst_filters: Vec<Arc<dyn OrderFilter>>,
}

/// The read-only chain map the executor routes over.
#[derive(Clone, Default)]
pub struct Chains {
    chains: HashMap<ChainId, ConfiguredChain>,
}

impl Chains {
    /// Registers a configured chain.
    pub fn insert(&mut self, chain: ConfiguredChain) {
        self.chains.insert(chain.chain_id, chain);
    }

    /// Looks up a chain by id.
    pub fn get(&self, chain_id: ChainId) -> Option<&ConfiguredChain> {
        self.chains.get(&chain_id)
    }
}

impl std::fmt::Debug for Chains {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chains").field("chains", &self.chains.keys()).finish()
    }
}
