use super::{Fulfillment, await_fulfillment, ensure_give_live, ensure_take_unfulfilled};
use crate::{
    client::{ChainAdapter, ChainClient, FulfillPayload},
    error::OrderError,
    types::{Order, OrderId},
};
use alloy::primitives::{Address, ChainId, U256};
use std::{collections::HashMap, sync::Arc};
use tracing::info;

/// The deterministic policy: no profitability gate, no mempool. An order is
/// fulfilled iff its take token is byte-equal to one of a pre-approved set,
/// and unlocked immediately afterwards, accepting the per-order unlock
/// cost.
#[derive(Debug)]
pub struct StrictPolicy {
    /// Destination chain this policy fulfills on.
    pub take_chain_id: ChainId,
    /// Take tokens the policy admits.
    pub approved_take_tokens: Vec<Address>,
    /// Chain clients, keyed by chain id.
    pub clients: Arc<HashMap<ChainId, Arc<dyn ChainClient>>>,
    /// Signing adapter of the take chain.
    pub adapter: Arc<dyn ChainAdapter>,
    /// Payload template for fulfill transactions on the take chain.
    pub fulfill_payload: FulfillPayload,
}

impl StrictPolicy {
    fn client(&self, chain_id: ChainId) -> Result<&Arc<dyn ChainClient>, OrderError> {
        self.clients
            .get(&chain_id)
            .ok_or_else(|| OrderError::Transient(format!("no client wired for chain {chain_id}")))
    }

    pub(super) async fn process_order(
        &self,
        order_id: OrderId,
        order: &Order,
    ) -> Result<Fulfillment, OrderError> {
        if !self.approved_take_tokens.contains(&order.take.token) {
            return Err(OrderError::TakeTokenNotApproved(order.take.token));
        }

        let take_client = self.client(self.take_chain_id)?;
        ensure_take_unfulfilled(take_client.as_ref(), order_id).await?;
        ensure_give_live(self.client(order.give.chain_id)?.as_ref(), order_id).await?;

        // approved take tokens are held as reserve, so no pre-swap is needed
        let tx = take_client
            .fulfill_order(order, order_id, self.fulfill_payload.clone())
            .await
            .map_err(OrderError::FulfillSendFailed)?;
        let tx_hash =
            self.adapter.send_transaction(tx).await.map_err(OrderError::FulfillSendFailed)?;
        info!(
            chain_id = self.take_chain_id,
            order = %order_id,
            tx_hash = %tx_hash,
            "Fulfill transaction sent"
        );

        await_fulfillment(self.take_chain_id, take_client.as_ref(), order_id).await?;

        Ok(Fulfillment { tx_hash, reward_amounts: [U256::ZERO; 2] })
    }
}
