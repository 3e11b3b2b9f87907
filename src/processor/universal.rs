use super::{Fulfillment, await_fulfillment, ensure_give_live, ensure_take_unfulfilled};
use crate::{
    chains::{ChainFamily, family_of},
    client::{ChainAdapter, ChainClient, FulfillPayload, SwapParams},
    error::OrderError,
    estimation::{EstimationContext, calculate_expected_take_amount},
    price::PriceService,
    swap::SwapConnector,
    types::{Order, OrderId, TokensBucket, find_covering_bucket},
};
use alloy::primitives::ChainId;
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// The default policy: fulfill any order whose margin clears the configured
/// minimum and whose reserve requirement the operator can fund.
#[derive(Debug)]
pub struct UniversalPolicy {
    /// Destination chain this policy fulfills on.
    pub take_chain_id: ChainId,
    /// Minimum margin an order must clear, in basis points.
    pub min_profitability_bps: u32,
    /// Batch size unlock costs are amortized over.
    pub batch_unlock_size: usize,
    /// Configured reserve token buckets.
    pub buckets: Arc<Vec<TokensBucket>>,
    /// USD price source.
    pub prices: Arc<dyn PriceService>,
    /// Swap connector quoting reserve-to-take conversions.
    pub swap: Arc<dyn SwapConnector>,
    /// Chain clients, keyed by chain id. Holds at least the take chain and
    /// every configured give chain.
    pub clients: Arc<HashMap<ChainId, Arc<dyn ChainClient>>>,
    /// Signing adapter of the take chain.
    pub adapter: Arc<dyn ChainAdapter>,
    /// Payload template for fulfill transactions on the take chain.
    pub fulfill_payload: FulfillPayload,
}

impl UniversalPolicy {
    fn client(&self, chain_id: ChainId) -> Result<&Arc<dyn ChainClient>, OrderError> {
        self.clients
            .get(&chain_id)
            .ok_or_else(|| OrderError::Transient(format!("no client wired for chain {chain_id}")))
    }

    /// Runs an order through the full admission pipeline and, if every gate
    /// passes, fulfills it on the take chain.
    pub(super) async fn process_order(
        &self,
        order_id: OrderId,
        order: &Order,
    ) -> Result<Fulfillment, OrderError> {
        let give_chain = order.give.chain_id;

        // reserve discovery: some bucket must span both legs
        find_covering_bucket(&self.buckets, give_chain, self.take_chain_id)
            .ok_or(OrderError::NoReserveCoverage)?;

        let take_client = self.client(self.take_chain_id)?;
        ensure_take_unfulfilled(take_client.as_ref(), order_id).await?;
        ensure_give_live(self.client(give_chain)?.as_ref(), order_id).await?;

        // Solana does not participate in batching, so unlock costs on
        // routes touching it are carried by the single order
        let batched = family_of(give_chain) != Some(ChainFamily::Svm)
            && family_of(self.take_chain_id) != Some(ChainFamily::Svm);
        let estimate = calculate_expected_take_amount(
            order,
            self.min_profitability_bps,
            &EstimationContext {
                prices: self.prices.as_ref(),
                buckets: &self.buckets,
                swap: self.swap.as_ref(),
                client: take_client.as_ref(),
                batch_size: batched.then_some(self.batch_unlock_size),
            },
        )
        .await?;

        if !estimate.is_profitable {
            return Err(OrderError::Unprofitable {
                margin_bps: estimate.margin_bps,
                required_bps: self.min_profitability_bps,
            });
        }

        let balance = self.adapter.get_balance(estimate.reserve_dst_token).await?;
        if balance < estimate.required_reserve_dst_amount {
            return Err(OrderError::InsufficientReserve {
                balance,
                required: estimate.required_reserve_dst_amount,
            });
        }

        let tx = if estimate.reserve_dst_token == order.take.token {
            take_client.fulfill_order(order, order_id, self.fulfill_payload.clone()).await
        } else {
            take_client
                .preswap_and_fulfill_order(
                    order,
                    order_id,
                    estimate.reserve_dst_token,
                    SwapParams {
                        slippage_bps: estimate.reserve_to_take_slippage_bps,
                        // the pre-swap amount already carries the slippage
                        internal_buffer_bps: 0,
                    },
                    self.fulfill_payload.clone(),
                )
                .await
        }
        .map_err(OrderError::FulfillSendFailed)?;

        let tx_hash =
            self.adapter.send_transaction(tx).await.map_err(OrderError::FulfillSendFailed)?;
        info!(
            chain_id = self.take_chain_id,
            order = %order_id,
            tx_hash = %tx_hash,
            margin_bps = estimate.margin_bps,
            "Fulfill transaction sent"
        );

        await_fulfillment(self.take_chain_id, take_client.as_ref(), order_id).await?;

        Ok(Fulfillment { tx_hash, reward_amounts: estimate.reward_amounts })
    }
}
