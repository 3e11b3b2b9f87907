//! Order feed ingress interface.
//!
//! The transport (WebSocket subscription, authentication, reconnects) lives
//! outside this crate. The feed contract is push-style: once subscribed, the
//! feed delivers [`OrderEvent`]s into the provided channel, gating each
//! order by the configured confirmation thresholds before delivery.

use crate::{config::ConfirmationRange, hooks::HookSender, types::OrderEvent};
use alloy::primitives::{Address, ChainId};
use async_trait::async_trait;
use std::{collections::HashMap, fmt};
use tokio::sync::mpsc;

/// Errors surfaced by order feeds.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The feed could not be reached.
    #[error("feed connection failed: {0}")]
    Connection(String),
    /// The feed ended and will deliver no further events.
    #[error("feed closed")]
    Closed,
}

/// Everything a feed needs to start delivering events.
#[derive(Debug)]
pub struct FeedInit {
    /// Unlock authority address per chain, identifying this taker to the
    /// feed.
    pub unlock_authorities: Vec<(ChainId, Address)>,
    /// Confirmation thresholds the feed applies before delivering an order,
    /// keyed by source chain.
    pub confirmation_thresholds: HashMap<ChainId, Vec<ConfirmationRange>>,
    /// Sink for feed-level lifecycle notifications.
    pub hooks: HookSender,
}

/// A push source of order events.
#[async_trait]
pub trait OrderFeed: Send + Sync + fmt::Debug {
    /// Connects and delivers events into `sink` until the feed ends. Events
    /// must arrive in feed order; delivery of an order implies its
    /// confirmation threshold was met.
    async fn subscribe(
        &self,
        init: FeedInit,
        sink: mpsc::UnboundedSender<OrderEvent>,
    ) -> Result<(), FeedError>;
}
