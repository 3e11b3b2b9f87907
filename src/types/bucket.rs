use alloy::primitives::{Address, ChainId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An equivalence class of reserve tokens across chains, e.g. the canonical
/// USDC instances. Order within a chain's list matters: the first entry is
/// the canonical reserve token for that chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokensBucket {
    tokens: HashMap<ChainId, Vec<Address>>,
}

impl TokensBucket {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` as part of this bucket on `chain_id`.
    pub fn add(&mut self, chain_id: ChainId, token: Address) {
        let tokens = self.tokens.entry(chain_id).or_default();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }

    /// Whether the bucket has no tokens on any chain.
    pub fn is_empty(&self) -> bool {
        self.tokens.values().all(Vec::is_empty)
    }

    /// The canonical reserve token of this bucket on `chain_id`.
    pub fn find_first_token(&self, chain_id: ChainId) -> Option<Address> {
        self.tokens.get(&chain_id).and_then(|tokens| tokens.first().copied())
    }

    /// Whether `token` belongs to this bucket on `chain_id`.
    pub fn contains(&self, chain_id: ChainId, token: Address) -> bool {
        self.tokens.get(&chain_id).is_some_and(|tokens| tokens.contains(&token))
    }

    /// All tokens of this bucket on `chain_id`.
    pub fn tokens_on(&self, chain_id: ChainId) -> &[Address] {
        self.tokens.get(&chain_id).map_or(&[], Vec::as_slice)
    }

    /// Whether the bucket has a token on both ends of an order route.
    pub fn covers(&self, give_chain: ChainId, take_chain: ChainId) -> bool {
        self.find_first_token(give_chain).is_some() && self.find_first_token(take_chain).is_some()
    }
}

impl FromIterator<(ChainId, Vec<Address>)> for TokensBucket {
    fn from_iter<T: IntoIterator<Item = (ChainId, Vec<Address>)>>(iter: T) -> Self {
        Self { tokens: iter.into_iter().collect() }
    }
}

/// Returns the first bucket holding a token on both the give and the take
/// chain of an order.
pub fn find_covering_bucket(
    buckets: &[TokensBucket],
    give_chain: ChainId,
    take_chain: ChainId,
) -> Option<&TokensBucket> {
    buckets.iter().find(|bucket| bucket.covers(give_chain, take_chain))
}
