//! USD price sources.

use alloy::primitives::{Address, ChainId};
use async_trait::async_trait;
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tracing::{trace, warn};

/// Errors surfaced by price sources.
#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    /// The source has no price for the token.
    #[error("no price for token {token} on chain {chain_id}")]
    Missing {
        /// Chain of the unpriced token.
        chain_id: ChainId,
        /// The unpriced token.
        token: Address,
    },
    /// The upstream fetch failed.
    #[error("price fetch failed: {0}")]
    Fetch(String),
}

/// USD price per smallest token unit, keyed by `(chain, token)`. The zero
/// address prices the chain's native currency. Implementations must be safe
/// for concurrent calls.
#[async_trait]
pub trait PriceService: Send + Sync + fmt::Debug {
    /// Current USD price of one smallest unit of `token` on `chain_id`.
    async fn get_price(&self, chain_id: ChainId, token: Address) -> Result<f64, PriceError>;
}

/// Fixed-rate price source for tests and dry runs.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPriceService {
    rate: f64,
}

impl ConstantPriceService {
    /// Returns a source quoting `rate` for every token.
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

#[async_trait]
impl PriceService for ConstantPriceService {
    async fn get_price(&self, _chain_id: ChainId, _token: Address) -> Result<f64, PriceError> {
        Ok(self.rate)
    }
}

/// Messages handled by the cache task.
#[derive(Debug)]
enum CacheMessage {
    Lookup { chain_id: ChainId, token: Address, tx: oneshot::Sender<Result<f64, PriceError>> },
}

/// A price tick taken at a certain timestamp.
#[derive(Debug, Clone, Copy)]
struct PriceTick {
    rate: f64,
    timestamp: Instant,
}

/// TTL cache in front of another price source. Lookups hitting an expired or
/// missing entry fetch from the inner source and refresh the cache; the
/// registry itself lives on a dedicated task so concurrent callers never
/// contend on a lock.
#[derive(Debug)]
pub struct CachedPriceService {
    tx: mpsc::UnboundedSender<CacheMessage>,
}

impl CachedPriceService {
    /// Wraps `inner` with a cache whose entries expire after `ttl`.
    pub fn new(inner: Arc<dyn PriceService>, ttl: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut registry: HashMap<(ChainId, Address), PriceTick> = HashMap::new();
            while let Some(CacheMessage::Lookup { chain_id, token, tx }) = rx.recv().await {
                let key = (chain_id, token);
                let cached = registry
                    .get(&key)
                    .filter(|tick| tick.timestamp.elapsed() <= ttl)
                    .map(|tick| tick.rate);

                let result = match cached {
                    Some(rate) => {
                        trace!(chain_id, %token, rate, "Price cache hit");
                        Ok(rate)
                    }
                    None => match inner.get_price(chain_id, token).await {
                        Ok(rate) => {
                            registry
                                .insert(key, PriceTick { rate, timestamp: Instant::now() });
                            Ok(rate)
                        }
                        Err(err) => {
                            warn!(chain_id, %token, %err, "Price refresh failed");
                            Err(err)
                        }
                    },
                };
                let _ = tx.send(result);
            }
        });

        Self { tx }
    }
}

#[async_trait]
impl PriceService for CachedPriceService {
    async fn get_price(&self, chain_id: ChainId, token: Address) -> Result<f64, PriceError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(CacheMessage::Lookup { chain_id, token, tx })
            .map_err(|_| PriceError::Fetch("price cache task stopped".into()))?;
        rx.await.map_err(|_| PriceError::Fetch("price cache task stopped".into()))?
    }
}
