//! Lifecycle notifications.
//!
//! Hooks are an observer-only sink: components emit events into an
//! unbounded channel and never wait on the consumer, so a slow or absent
//! hooks engine cannot stall a processor.

use crate::{client::TxHash, types::OrderId};
use alloy::primitives::ChainId;
use tokio::sync::mpsc;

/// A lifecycle notification emitted by the taker.
#[derive(Debug, Clone)]
pub enum HookEvent {
    /// An order was fulfilled on its destination chain.
    OrderFulfilled {
        /// The fulfilled order.
        order_id: OrderId,
        /// Destination chain.
        chain_id: ChainId,
        /// Hash of the fulfill transaction.
        tx_hash: TxHash,
    },
    /// An order was deferred to the mempool for retry.
    OrderPostponed {
        /// The postponed order.
        order_id: OrderId,
        /// Destination chain.
        chain_id: ChainId,
        /// Why the order was postponed.
        reason: String,
    },
    /// An order was dropped for good.
    OrderDropped {
        /// The dropped order.
        order_id: OrderId,
        /// Destination chain.
        chain_id: ChainId,
        /// Why the order was dropped.
        reason: String,
    },
    /// A batched unlock was submitted.
    BatchUnlockSent {
        /// Chain the unlock transaction was sent on.
        take_chain: ChainId,
        /// Chain whose locked funds the batch releases.
        give_chain: ChainId,
        /// Orders carried by the batch, in insertion order.
        order_ids: Vec<OrderId>,
        /// Hash of the unlock transaction.
        tx_hash: TxHash,
    },
}

/// Cloneable emitter half of the hooks channel. Emission is fire-and-forget.
#[derive(Debug, Clone)]
pub struct HookSender {
    tx: Option<mpsc::UnboundedSender<HookEvent>>,
}

impl HookSender {
    /// Creates a hooks channel, returning the emitter and the receiver the
    /// hooks engine consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HookEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// An emitter that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Emits an event. Never blocks; events are dropped if the engine is
    /// gone.
    pub fn emit(&self, event: HookEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
