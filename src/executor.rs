//! Top-level event dispatcher.
//!
//! The executor owns nothing but the read-only chain map and the global
//! filter list. Each feed event is routed to the processor of the order's
//! destination chain; the executor never waits for processing.

use crate::{
    chains::Chains,
    filters::{FilterContext, OrderFilter, admits},
    types::{OrderEvent, OrderEventStatus},
};
use metrics::counter;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

/// Routes feed events to per-destination-chain processors.
#[derive(Debug)]
pub struct Executor {
    chains: Chains,
    global_filters: Vec<Arc<dyn OrderFilter>>,
}

impl Executor {
    /// Creates an executor over the configured chains.
    pub fn new(chains: Chains, global_filters: Vec<Arc<dyn OrderFilter>>) -> Self {
        Self { chains, global_filters }
    }

    /// Routes one event. Unroutable events and filtered orders are dropped
    /// silently; neither is an error.
    pub fn dispatch(&self, event: OrderEvent) {
        let Some(order) = event.order.as_ref() else {
            debug!(order = %event.order_id, "Event without order payload, dropping");
            return;
        };

        let Some(give_chain) = self.chains.get(order.give.chain_id) else {
            debug!(
                order = %event.order_id,
                chain_id = order.give.chain_id,
                "Give chain not configured, dropping order"
            );
            return;
        };
        let Some(take_chain) = self.chains.get(order.take.chain_id) else {
            debug!(
                order = %event.order_id,
                chain_id = order.take.chain_id,
                "Take chain not configured, dropping order"
            );
            return;
        };

        // admission filters only guard new orders; fulfillment follow-ups
        // and cancellations always pass through
        if event.status.is_created() {
            let ctx = FilterContext {
                order_id: event.order_id,
                status: event.status,
                give_chain: give_chain.chain_id,
                take_chain: take_chain.chain_id,
            };
            let admitted = admits(&self.global_filters, order, &ctx)
                && admits(&take_chain.dst_filters, order, &ctx)
                && admits(&give_chain.src_filters, order, &ctx);
            if !admitted {
                counter!("taker_orders_filtered").increment(1);
                return;
            }
        }

        counter!("taker_orders_dispatched").increment(1);
        take_chain.processor.process(event);
    }

    /// Consumes `rx` until the feed closes, dispatching every event in
    /// arrival order.
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<OrderEvent>) {
        while let Some(event) = rx.recv().await {
            self.dispatch(event);
        }
        debug!("Order feed closed, executor exiting");
    }

    /// Spawns [`Self::run`] on its own task.
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<OrderEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }
}
