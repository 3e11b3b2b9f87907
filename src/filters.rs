//! Order admission filters.
//!
//! A filter is a pure predicate over an order and its event context. The
//! executor evaluates the global filters, the destination chain's dst
//! filters and the source chain's src filters; an order is admitted only
//! when every filter passes.

use crate::types::{Order, OrderEventStatus, OrderId};
use alloy::primitives::{Address, ChainId};
use std::{collections::HashSet, fmt, sync::Arc};
use tracing::debug;

/// Event context handed to admission filters alongside the order.
#[derive(Debug, Clone)]
pub struct FilterContext {
    /// Identifier of the order under evaluation.
    pub order_id: OrderId,
    /// Feed status that delivered the order.
    pub status: OrderEventStatus,
    /// Source chain of the order.
    pub give_chain: ChainId,
    /// Destination chain of the order.
    pub take_chain: ChainId,
}

/// An admission predicate. Filters are composable and combined by logical
/// AND; evaluation order carries no meaning.
pub trait OrderFilter: Send + Sync + fmt::Debug {
    /// Short name used in rejection logs.
    fn name(&self) -> &'static str;

    /// Whether the order may proceed to processing.
    fn allows(&self, order: &Order, ctx: &FilterContext) -> bool;
}

/// Evaluates `filters` against an order, logging the first rejection.
pub fn admits(filters: &[Arc<dyn OrderFilter>], order: &Order, ctx: &FilterContext) -> bool {
    for filter in filters {
        if !filter.allows(order, ctx) {
            debug!(
                order = %ctx.order_id,
                filter = filter.name(),
                "Order rejected by admission filter"
            );
            return false;
        }
    }
    true
}

/// Rejects everything. Appended automatically to destinations marked
/// disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisableFulfill;

impl OrderFilter for DisableFulfill {
    fn name(&self) -> &'static str {
        "disable_fulfill"
    }

    fn allows(&self, _order: &Order, _ctx: &FilterContext) -> bool {
        false
    }
}

/// Admits only orders whose computed id is in a configured whitelist.
#[derive(Debug, Clone)]
pub struct WhitelistOrderId {
    ids: HashSet<OrderId>,
}

impl WhitelistOrderId {
    /// Builds the filter from the whitelisted ids.
    pub fn new(ids: impl IntoIterator<Item = OrderId>) -> Self {
        Self { ids: ids.into_iter().collect() }
    }
}

impl OrderFilter for WhitelistOrderId {
    fn name(&self) -> &'static str {
        "whitelist_order_id"
    }

    fn allows(&self, order: &Order, _ctx: &FilterContext) -> bool {
        self.ids.contains(&order.calculate_id())
    }
}

/// Admits only orders taking one of a configured set of tokens. Comparison
/// is byte equality on the address.
#[derive(Debug, Clone)]
pub struct ApprovedTakeToken {
    tokens: Vec<Address>,
}

impl ApprovedTakeToken {
    /// Builds the filter from the approved token addresses.
    pub fn new(tokens: impl IntoIterator<Item = Address>) -> Self {
        Self { tokens: tokens.into_iter().collect() }
    }
}

impl OrderFilter for ApprovedTakeToken {
    fn name(&self) -> &'static str {
        "approved_take_token"
    }

    fn allows(&self, order: &Order, _ctx: &FilterContext) -> bool {
        self.tokens.contains(&order.take.token)
    }
}
