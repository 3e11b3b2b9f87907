//! Profitability and reserve-amount estimation.
//!
//! Answers one question per order: which reserve token to spend on the
//! destination chain, how much of it the fulfillment needs, and whether the
//! spread left after execution and unlock costs clears the operator's
//! minimum margin.

use crate::{
    client::{ChainClient, ClientError},
    price::{PriceError, PriceService},
    swap::{SwapConnector, SwapError},
    types::{Order, TokensBucket, find_covering_bucket},
};
use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Basis points in one whole.
const BPS_DENOMINATOR: f64 = 10_000.0;

/// Errors surfaced by take-amount estimation.
#[derive(Debug, Error)]
pub enum EstimationError {
    /// No token bucket spans both the give and the take chain.
    #[error("no reserve bucket covers the order route")]
    NoReserveCoverage,
    /// A price lookup failed.
    #[error(transparent)]
    Price(#[from] PriceError),
    /// A swap quote failed.
    #[error(transparent)]
    Swap(#[from] SwapError),
    /// The flow-cost query failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Services the estimator draws on.
pub struct EstimationContext<'a> {
    /// USD price source.
    pub prices: &'a dyn PriceService,
    /// Configured reserve token buckets.
    pub buckets: &'a [TokensBucket],
    /// Swap connector quoting the reserve-to-take conversion.
    pub swap: &'a dyn SwapConnector,
    /// Take-chain client, used for the flow-cost query.
    pub client: &'a dyn ChainClient,
    /// Unlock batch size the order will be amortized over. `None` when the
    /// route involves a chain that does not participate in batching.
    pub batch_size: Option<usize>,
}

/// Outcome of [`calculate_expected_take_amount`].
#[derive(Debug, Clone)]
pub struct ExpectedTakeAmount {
    /// Reserve token to spend on the destination chain.
    pub reserve_dst_token: Address,
    /// Reserve amount the fulfillment needs, slippage included.
    pub required_reserve_dst_amount: U256,
    /// Whether the order clears the minimum margin.
    pub is_profitable: bool,
    /// Estimated margin of the order, in basis points of its give value.
    pub margin_bps: i64,
    /// Slippage already priced into the reserve amount, in basis points.
    pub reserve_to_take_slippage_bps: u32,
    /// Claim and settle rewards from the flow-cost computation, passed
    /// through to the unlock on Solana give chains.
    pub reward_amounts: [U256; 2],
}

/// Estimates the reserve spend and profitability of fulfilling `order`.
///
/// The margin is the USD spread between the give and take legs minus the
/// taker's execution cost, with the unlock leg amortized over the batch it
/// will ride in.
pub async fn calculate_expected_take_amount(
    order: &Order,
    min_profitability_bps: u32,
    ctx: &EstimationContext<'_>,
) -> Result<ExpectedTakeAmount, EstimationError> {
    let give = &order.give;
    let take = &order.take;

    let bucket = find_covering_bucket(ctx.buckets, give.chain_id, take.chain_id)
        .ok_or(EstimationError::NoReserveCoverage)?;
    // covers() guarantees the take side is present
    let reserve_dst_token =
        bucket.find_first_token(take.chain_id).ok_or(EstimationError::NoReserveCoverage)?;

    let give_price = ctx.prices.get_price(give.chain_id, give.token).await?;
    let take_price = ctx.prices.get_price(take.chain_id, take.token).await?;
    let give_native_price = ctx.prices.get_price(give.chain_id, Address::ZERO).await?;
    let take_native_price = ctx.prices.get_price(take.chain_id, Address::ZERO).await?;

    let cost = ctx.client.get_taker_flow_cost(order, give_native_price, take_native_price).await?;

    let give_usd = to_f64(give.amount) * give_price;
    let take_usd = to_f64(take.amount) * take_price;
    let fulfill_cost_usd = to_f64(cost.take_native) * take_native_price;
    let unlock_cost_usd =
        to_f64(cost.give_native) * give_native_price / ctx.batch_size.unwrap_or(1).max(1) as f64;

    let margin_usd = give_usd - take_usd - fulfill_cost_usd - unlock_cost_usd;
    let margin_bps = if give_usd > 0.0 {
        (margin_usd / give_usd * BPS_DENOMINATOR).floor() as i64
    } else {
        i64::MIN
    };

    let (required_reserve_dst_amount, reserve_to_take_slippage_bps) =
        if reserve_dst_token == take.token {
            (take.amount, 0)
        } else {
            let estimate = ctx
                .swap
                .estimate_input_amount(take.chain_id, reserve_dst_token, take.token, take.amount)
                .await?;
            (estimate.input_amount, estimate.slippage_bps)
        };

    Ok(ExpectedTakeAmount {
        reserve_dst_token,
        required_reserve_dst_amount,
        is_profitable: margin_bps >= min_profitability_bps as i64,
        margin_bps,
        reserve_to_take_slippage_bps,
        reward_amounts: cost.reward_amounts,
    })
}

/// Lossy widening of a token amount for USD math. Amounts beyond `u128`
/// saturate, which only overstates the side they appear on.
fn to_f64(value: U256) -> f64 {
    u128::try_from(value).map_or(f64::MAX, |v| v as f64)
}
