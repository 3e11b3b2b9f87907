//! Shared data model of the taker.

mod bucket;
pub use bucket::{TokensBucket, find_covering_bucket};

mod order;
pub use order::{
    GiveOrderState, Order, OrderEvent, OrderEventStatus, OrderId, TakeOrderState, TokenAmount,
};
