use super::ProcessorHandle;
use crate::types::{OrderEvent, OrderId};
use alloy::primitives::ChainId;
use metrics::gauge;
use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Messages accepted by the [`MempoolService`].
#[derive(Debug)]
pub enum MempoolMessage {
    /// Store an order for periodic retry.
    Add(Box<OrderEvent>),
    /// Remove an order. Sent when the processor fulfills the order or sees
    /// a terminal event for it.
    Delete(OrderId),
}

/// Handle to communicate with the [`MempoolService`].
#[derive(Debug, Clone)]
pub struct MempoolHandle {
    tx: mpsc::UnboundedSender<MempoolMessage>,
}

impl MempoolHandle {
    /// Stores an order for periodic retry. Re-adding a stored order only
    /// refreshes its context.
    pub fn add_order(&self, event: OrderEvent) {
        let _ = self.tx.send(MempoolMessage::Add(Box::new(event)));
    }

    /// Removes an order from the retry ring.
    pub fn delete(&self, order_id: OrderId) {
        let _ = self.tx.send(MempoolMessage::Delete(order_id));
    }
}

/// A timer-driven retry ring for orders that failed a soft gate
/// (profitability, reserve balance, a transient send failure).
///
/// Every `interval` the ring re-submits its entries to the processor in
/// insertion order. Entries are not removed on resubmission; deletion only
/// happens on an explicit [`MempoolMessage::Delete`], so an order keeps
/// being reconsidered until it is fulfilled or turns terminal.
#[derive(Debug)]
pub struct MempoolService {
    chain_id: ChainId,
    rx: mpsc::UnboundedReceiver<MempoolMessage>,
    processor: ProcessorHandle,
    interval: Duration,
    capacity: usize,
    order: VecDeque<OrderId>,
    entries: HashMap<OrderId, OrderEvent>,
}

impl MempoolService {
    /// Spawns a mempool re-driving entries into `processor` every
    /// `interval`, returning its handle.
    pub fn spawn(
        chain_id: ChainId,
        interval: Duration,
        capacity: usize,
        processor: ProcessorHandle,
    ) -> MempoolHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = Self {
            chain_id,
            rx,
            processor,
            interval,
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        };
        tokio::spawn(this.run());
        MempoolHandle { tx }
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        // the first tick fires immediately; skip it so entries age a full
        // interval before their first retry
        ticker.tick().await;
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(MempoolMessage::Add(event)) => self.add(*event),
                    Some(MempoolMessage::Delete(order_id)) => self.delete(order_id),
                    None => break,
                },
                _ = ticker.tick() => self.resubmit(),
            }
        }
    }

    fn add(&mut self, event: OrderEvent) {
        if self.entries.insert(event.order_id, event.clone()).is_none() {
            if self.order.len() == self.capacity {
                // bounded-effort reconsideration: the oldest entry makes room
                if let Some(evicted) = self.order.pop_front() {
                    self.entries.remove(&evicted);
                    warn!(
                        chain_id = self.chain_id,
                        order = %evicted,
                        "Mempool full, evicting oldest order"
                    );
                }
            }
            self.order.push_back(event.order_id);
        }
        gauge!("taker_mempool_size", "chain_id" => self.chain_id.to_string())
            .set(self.order.len() as f64);
    }

    fn delete(&mut self, order_id: OrderId) {
        if self.entries.remove(&order_id).is_some() {
            self.order.retain(|queued| *queued != order_id);
            gauge!("taker_mempool_size", "chain_id" => self.chain_id.to_string())
                .set(self.order.len() as f64);
        }
    }

    fn resubmit(&self) {
        if self.order.is_empty() {
            return;
        }
        debug!(
            chain_id = self.chain_id,
            orders = self.order.len(),
            "Re-driving mempool orders through the processor"
        );
        for order_id in &self.order {
            if let Some(event) = self.entries.get(order_id) {
                self.processor.process(event.clone());
            }
        }
    }
}
