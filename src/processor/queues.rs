use crate::types::{OrderEvent, OrderEventStatus, OrderId};
use std::collections::{HashMap, HashSet, VecDeque};

/// An insertion-ordered set of order ids. Re-inserting a present id is a
/// no-op, which makes duplicate feed events idempotent.
#[derive(Debug, Default)]
pub struct OrderQueue {
    order: VecDeque<OrderId>,
    members: HashSet<OrderId>,
}

impl OrderQueue {
    /// Appends `id` unless it is already queued. Returns whether the id was
    /// inserted.
    pub fn push_back(&mut self, id: OrderId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push_back(id);
        true
    }

    /// Pops the earliest-inserted id.
    pub fn pop_front(&mut self) -> Option<OrderId> {
        let id = self.order.pop_front()?;
        self.members.remove(&id);
        Some(id)
    }

    /// Removes `id` wherever it sits in the queue.
    pub fn remove(&mut self, id: &OrderId) {
        if self.members.remove(id) {
            self.order.retain(|queued| queued != id);
        }
    }

    /// Whether `id` is queued.
    pub fn contains(&self, id: &OrderId) -> bool {
        self.members.contains(id)
    }

    /// Number of queued ids.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Queue state owned by a single destination-chain processor.
///
/// Membership in `primary`/`secondary` is authoritative; `pending_context`
/// is a back-reference from a queued id to its latest feed event. Any
/// removal clears both together.
#[derive(Debug, Default)]
pub struct ProcessorQueues {
    /// Orders from live `Created` events.
    primary: OrderQueue,
    /// Orders from `ArchivalCreated` replays.
    secondary: OrderQueue,
    /// Latest event context per queued order.
    pending_context: HashMap<OrderId, OrderEvent>,
}

impl ProcessorQueues {
    /// Queues an order event while the processor is busy. Live orders go to
    /// the primary queue, archival replays to the secondary one. The stored
    /// context is refreshed even when the id is already queued.
    pub fn enqueue(&mut self, event: OrderEvent) {
        match event.status {
            OrderEventStatus::Created => {
                // a live event promotes an archival entry
                self.secondary.remove(&event.order_id);
                self.primary.push_back(event.order_id);
            }
            OrderEventStatus::ArchivalCreated => {
                // an id seen live keeps its primary slot
                if !self.primary.contains(&event.order_id) {
                    self.secondary.push_back(event.order_id);
                }
            }
            _ => return,
        }
        self.pending_context.insert(event.order_id, event);
    }

    /// Removes every trace of `id` from the queues.
    pub fn forget(&mut self, id: &OrderId) {
        self.primary.remove(id);
        self.secondary.remove(id);
        self.pending_context.remove(id);
    }

    /// Pops the next order to process: the primary queue drains fully
    /// before the secondary one, FIFO within each.
    pub fn next(&mut self) -> Option<OrderEvent> {
        while let Some(id) = self.primary.pop_front().or_else(|| self.secondary.pop_front()) {
            if let Some(event) = self.pending_context.remove(&id) {
                return Some(event);
            }
            // context was purged by a terminal event; skip the stale id
        }
        None
    }

    /// Whether both queues are drained.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }

    /// Total queued orders across both queues.
    pub fn len(&self) -> usize {
        self.primary.len() + self.secondary.len()
    }
}
