//! Per-destination-chain order processing.
//!
//! One [`OrderProcessor`] task runs per destination chain and owns every
//! piece of that chain's state: the priority queues, the in-flight slot,
//! the mempool and the batch unlocker handles. Events enter through a
//! [`ProcessorHandle`]; at most one order is ever under active processing
//! per chain, which keeps fulfill submissions strictly serial.

use crate::{
    client::{ChainClient, TxHash},
    constants::{FULFILL_POLL_ATTEMPTS, FULFILL_POLL_INTERVAL},
    error::{Disposition, OrderError},
    hooks::{HookEvent, HookSender},
    types::{GiveOrderState, OrderEvent, OrderEventStatus, OrderId, TakeOrderState},
};
use alloy::primitives::{ChainId, U256};
use metrics::counter;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

mod mempool;
pub use mempool::{MempoolHandle, MempoolMessage, MempoolService};

mod queues;
pub use queues::{OrderQueue, ProcessorQueues};

mod strict;
pub use strict::StrictPolicy;

mod universal;
pub use universal::UniversalPolicy;

mod unlocker;
pub use unlocker::{
    BatchUnlocker, BatchUnlockerHandle, UnlockError, UnlockTarget, UnlockerMessage,
};

/// A completed fulfillment.
#[derive(Debug, Clone, Copy)]
pub struct Fulfillment {
    /// Hash of the fulfill transaction.
    pub tx_hash: TxHash,
    /// Give-side rewards from the fee computation, passed through to the
    /// unlock.
    pub reward_amounts: [U256; 2],
}

/// The processing policy driving a destination chain.
#[derive(Debug, Clone)]
pub enum Policy {
    /// Profitability-gated processing with mempool retries.
    Universal(std::sync::Arc<UniversalPolicy>),
    /// Approved-token-only processing.
    Strict(std::sync::Arc<StrictPolicy>),
}

impl Policy {
    async fn process_order(
        &self,
        order_id: OrderId,
        order: &crate::types::Order,
    ) -> Result<Fulfillment, OrderError> {
        match self {
            Self::Universal(policy) => policy.process_order(order_id, order).await,
            Self::Strict(policy) => policy.process_order(order_id, order).await,
        }
    }
}

/// Take-side admission check: the order must not show as fulfilled on the
/// destination chain. An unknown status is treated as not-set, matching a
/// chain that simply has no record yet.
async fn ensure_take_unfulfilled(
    client: &dyn ChainClient,
    order_id: OrderId,
) -> Result<(), OrderError> {
    match client.get_take_order_status(order_id).await? {
        None | Some(TakeOrderState::NotSet) => Ok(()),
        Some(_) => Err(OrderError::AlreadyFulfilled),
    }
}

/// Give-side admission check: the maker's funds must still be locked.
async fn ensure_give_live(client: &dyn ChainClient, order_id: OrderId) -> Result<(), OrderError> {
    match client.get_give_order_status(order_id).await? {
        Some(GiveOrderState::Created) => Ok(()),
        _ => Err(OrderError::NotCreatedOnSource),
    }
}

/// Polls the take side after a fulfill submission until the fulfillment is
/// visible or the poll bound is exhausted.
async fn await_fulfillment(
    chain_id: ChainId,
    client: &dyn ChainClient,
    order_id: OrderId,
) -> Result<(), OrderError> {
    for attempt in 1..=FULFILL_POLL_ATTEMPTS {
        match client.get_take_order_status(order_id).await {
            Ok(Some(TakeOrderState::Fulfilled | TakeOrderState::SentUnlock)) => {
                debug!(chain_id, order = %order_id, attempt, "Fulfillment visible on chain");
                return Ok(());
            }
            Ok(_) => {}
            // transient: keep polling until the bound
            Err(err) => {
                warn!(chain_id, order = %order_id, attempt, %err, "Fulfillment status poll failed");
            }
        }
        tokio::time::sleep(FULFILL_POLL_INTERVAL).await;
    }
    Err(OrderError::FulfillmentNotObserved(FULFILL_POLL_ATTEMPTS))
}

/// Messages accepted by the [`OrderProcessor`].
#[derive(Debug)]
pub enum ProcessorMessage {
    /// A feed event (or a mempool resubmission) for this destination chain.
    Event(OrderEvent),
}

/// Handle to communicate with the [`OrderProcessor`].
#[derive(Debug, Clone)]
pub struct ProcessorHandle {
    tx: mpsc::UnboundedSender<ProcessorMessage>,
}

impl ProcessorHandle {
    /// Creates the handle together with the receiver a processor consumes.
    pub fn new_pair() -> (Self, mpsc::UnboundedReceiver<ProcessorMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Submits an event for processing. Never blocks.
    pub fn process(&self, event: OrderEvent) {
        let _ = self.tx.send(ProcessorMessage::Event(event));
    }
}

/// The serialized order state machine of one destination chain.
pub struct OrderProcessor {
    chain_id: ChainId,
    policy: Policy,
    rx: mpsc::UnboundedReceiver<ProcessorMessage>,
    queues: ProcessorQueues,
    /// The event under active processing. `Some` is the lock: no second
    /// `process_order` starts while it is held.
    current: Option<OrderEvent>,
    mempool: Option<MempoolHandle>,
    unlocker: BatchUnlockerHandle,
    hooks: HookSender,
    outcome_tx: mpsc::UnboundedSender<(OrderId, Result<Fulfillment, OrderError>)>,
    outcome_rx: mpsc::UnboundedReceiver<(OrderId, Result<Fulfillment, OrderError>)>,
}

impl OrderProcessor {
    /// Creates a processor consuming `rx`. Strict-policy chains pass
    /// `mempool: None`; soft failures are then dropped instead of retried.
    pub fn new(
        chain_id: ChainId,
        policy: Policy,
        rx: mpsc::UnboundedReceiver<ProcessorMessage>,
        mempool: Option<MempoolHandle>,
        unlocker: BatchUnlockerHandle,
        hooks: HookSender,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            chain_id,
            policy,
            rx,
            queues: ProcessorQueues::default(),
            current: None,
            mempool,
            unlocker,
            hooks,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Spawns the processor's event loop.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(ProcessorMessage::Event(event)) => self.on_event(event),
                    None => break,
                },
                Some((order_id, result)) = self.outcome_rx.recv() => {
                    self.on_outcome(order_id, result);
                }
            }
        }
    }

    fn is_locked(&self) -> bool {
        self.current.is_some()
    }

    fn on_event(&mut self, event: OrderEvent) {
        match event.status {
            OrderEventStatus::Created | OrderEventStatus::ArchivalCreated => {
                if event.order.is_none() {
                    warn!(
                        chain_id = self.chain_id,
                        order = %event.order_id,
                        "Created event without order payload, ignoring"
                    );
                    return;
                }
                if self.is_locked() {
                    self.queues.enqueue(event);
                } else {
                    self.start(event);
                }
            }
            OrderEventStatus::Fulfilled => {
                // fulfilled by this operator earlier; all that is left is
                // the unlock
                self.forget(&event.order_id);
                self.hand_to_unlocker(event);
            }
            OrderEventStatus::ArchivalFulfilled => {
                self.hand_to_unlocker(event);
            }
            OrderEventStatus::Cancelled => {
                debug!(
                    chain_id = self.chain_id,
                    order = %event.order_id,
                    "Order cancelled, purging from queues"
                );
                self.forget(&event.order_id);
            }
            OrderEventStatus::Other => {
                debug!(
                    chain_id = self.chain_id,
                    order = %event.order_id,
                    "Ignoring unactionable order event"
                );
            }
        }
    }

    /// Removes the order from the queues and the mempool. The in-flight
    /// fulfillment, if it is this order, is deliberately not aborted: the
    /// state machine resolves against chain state on its next status check.
    fn forget(&mut self, order_id: &OrderId) {
        self.queues.forget(order_id);
        if let Some(mempool) = &self.mempool {
            mempool.delete(*order_id);
        }
    }

    fn hand_to_unlocker(&self, event: OrderEvent) {
        match event.order {
            Some(order) => {
                self.unlocker.unlock_order(event.order_id, order, [U256::ZERO; 2]);
            }
            None => warn!(
                chain_id = self.chain_id,
                order = %event.order_id,
                "Fulfilled event without order payload, cannot unlock"
            ),
        }
    }

    /// Locks the processor on `event` and runs the policy against it on a
    /// separate task, so the event loop keeps absorbing feed events while
    /// the order is in flight.
    fn start(&mut self, event: OrderEvent) {
        let order_id = event.order_id;
        let order = event.order.clone().expect("caller checked the payload");
        self.current = Some(event);

        let policy = self.policy.clone();
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            let result = policy.process_order(order_id, &order).await;
            let _ = outcome_tx.send((order_id, result));
        });
    }

    fn on_outcome(&mut self, order_id: OrderId, result: Result<Fulfillment, OrderError>) {
        let Some(event) = self.current.take() else {
            warn!(
                chain_id = self.chain_id,
                order = %order_id,
                "Outcome for an order that is not in flight"
            );
            return;
        };
        debug_assert_eq!(event.order_id, order_id);

        match result {
            Ok(fulfillment) => {
                info!(
                    chain_id = self.chain_id,
                    order = %order_id,
                    tx_hash = %fulfillment.tx_hash,
                    "Order fulfilled"
                );
                counter!("taker_orders_fulfilled").increment(1);
                self.hooks.emit(HookEvent::OrderFulfilled {
                    order_id,
                    chain_id: self.chain_id,
                    tx_hash: fulfillment.tx_hash,
                });
                if let Some(mempool) = &self.mempool {
                    mempool.delete(order_id);
                }
                if let Some(order) = event.order {
                    self.unlocker.unlock_order(order_id, order, fulfillment.reward_amounts);
                }
            }
            Err(err) => match err.disposition() {
                Disposition::Retry => {
                    counter!("taker_orders_postponed").increment(1);
                    self.hooks.emit(HookEvent::OrderPostponed {
                        order_id,
                        chain_id: self.chain_id,
                        reason: err.to_string(),
                    });
                    match &self.mempool {
                        Some(mempool) => {
                            info!(
                                chain_id = self.chain_id,
                                order = %order_id,
                                %err,
                                "Order postponed to mempool"
                            );
                            mempool.add_order(event);
                        }
                        None => {
                            // strict policy runs without a mempool
                            info!(
                                chain_id = self.chain_id,
                                order = %order_id,
                                %err,
                                "Order failed a soft gate and no mempool is configured, dropping"
                            );
                        }
                    }
                }
                Disposition::Fatal => {
                    info!(
                        chain_id = self.chain_id,
                        order = %order_id,
                        %err,
                        "Dropping order"
                    );
                    counter!("taker_orders_dropped").increment(1);
                    self.hooks.emit(HookEvent::OrderDropped {
                        order_id,
                        chain_id: self.chain_id,
                        reason: err.to_string(),
                    });
                    if let Some(mempool) = &self.mempool {
                        mempool.delete(order_id);
                    }
                }
            },
        }

        // primary drains before secondary, FIFO within each
        if let Some(next) = self.queues.next() {
            self.start(next);
        }
    }
}
