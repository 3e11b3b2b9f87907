//! Swap connector interface.
//!
//! The connector fronts whatever DEX aggregator the operator routes the
//! pre-fulfill reserve-to-take swap through. Only the estimation contract is
//! part of the core; transaction building happens inside the chain client.

use alloy::primitives::{Address, ChainId, U256};
use async_trait::async_trait;
use std::fmt;

/// Errors surfaced by swap connectors.
#[derive(Debug, thiserror::Error)]
pub enum SwapError {
    /// The aggregator found no route between the tokens.
    #[error("no swap route from {from} to {to} on chain {chain_id}")]
    NoRoute {
        /// Chain the swap was requested on.
        chain_id: ChainId,
        /// Token being sold.
        from: Address,
        /// Token being bought.
        to: Address,
    },
    /// The quote request failed.
    #[error("swap quote failed: {0}")]
    Quote(String),
}

/// A quote for buying an exact output amount.
#[derive(Debug, Clone, Copy)]
pub struct SwapEstimate {
    /// Input amount that must be sold, slippage included.
    pub input_amount: U256,
    /// Slippage the quote already prices in, in basis points.
    pub slippage_bps: u32,
}

/// Quotes reserve-to-take swaps on a destination chain. Implementations must
/// be safe for concurrent calls.
#[async_trait]
pub trait SwapConnector: Send + Sync + fmt::Debug {
    /// Estimates how much `from_token` must be sold on `chain_id` to obtain
    /// exactly `to_amount` of `to_token`.
    async fn estimate_input_amount(
        &self,
        chain_id: ChainId,
        from_token: Address,
        to_token: Address,
        to_amount: U256,
    ) -> Result<SwapEstimate, SwapError>;
}
