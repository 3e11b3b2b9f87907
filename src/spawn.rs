//! Taker bootstrap and wiring.
//!
//! [`try_spawn`] validates the configuration, runs the per-chain bootstrap
//! (lookup tables, reserve allowances), spawns a processor pipeline per
//! destination chain and wires the feed into the executor.

use crate::{
    chains::{ChainFamily, Chains, ConfiguredChain},
    client::{ChainAdapter, ChainClient, FulfillPayload},
    config::{PolicyKind, TakerConfig},
    executor::Executor,
    feed::{FeedError, FeedInit, OrderFeed},
    filters::{DisableFulfill, OrderFilter},
    hooks::HookSender,
    price::{CachedPriceService, PriceService},
    processor::{
        BatchUnlocker, MempoolService, OrderProcessor, Policy, ProcessorHandle, StrictPolicy,
        UniversalPolicy, UnlockTarget,
    },
    swap::SwapConnector,
};
use alloy::primitives::{Address, ChainId};
use eyre::{OptionExt, WrapErr};
use futures_util::future::try_join_all;
use std::{collections::HashMap, sync::Arc};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::info;

/// Externally supplied services of one chain.
#[derive(Debug, Clone)]
pub struct ChainServices {
    /// Signing adapter owning the taker key of the chain.
    pub adapter: Arc<dyn ChainAdapter>,
    /// Protocol client of the chain.
    pub client: Arc<dyn ChainClient>,
    /// Address derived from the chain's unlock authority key.
    pub unlock_authority: Address,
}

/// Everything the taker core does not implement itself.
#[derive(Debug)]
pub struct TakerServices {
    /// Order feed ingress.
    pub feed: Arc<dyn OrderFeed>,
    /// USD price source. Wrapped in a TTL cache at spawn.
    pub prices: Arc<dyn PriceService>,
    /// Swap connector for reserve-to-take conversions.
    pub swap: Arc<dyn SwapConnector>,
    /// Per-chain adapters and clients, one entry per configured chain.
    pub chains: HashMap<ChainId, ChainServices>,
    /// Hooks sink.
    pub hooks: HookSender,
}

/// Handle over the spawned taker.
#[derive(Debug)]
pub struct TakerHandle {
    executor: JoinHandle<()>,
    feed: JoinHandle<Result<(), FeedError>>,
}

impl TakerHandle {
    /// Waits for the taker to finish: the feed ending and the executor
    /// draining its channel.
    pub async fn wait(self) -> eyre::Result<()> {
        self.feed.await.wrap_err("feed task panicked")??;
        self.executor.await.wrap_err("executor task panicked")?;
        Ok(())
    }
}

/// Validates `config`, bootstraps every chain and spawns the taker.
pub async fn try_spawn(config: TakerConfig, services: TakerServices) -> eyre::Result<TakerHandle> {
    config.validate()?;

    let prices: Arc<dyn PriceService> =
        Arc::new(CachedPriceService::new(services.prices.clone(), config.rate_ttl));
    let buckets = Arc::new(config.buckets.clone());

    let clients: Arc<HashMap<ChainId, Arc<dyn ChainClient>>> = Arc::new(
        services.chains.iter().map(|(chain, svc)| (*chain, svc.client.clone())).collect(),
    );
    let unlock_targets: HashMap<ChainId, UnlockTarget> = config
        .chains
        .iter()
        .map(|entry| {
            (
                entry.chain,
                UnlockTarget { beneficiary: entry.beneficiary, family: entry.family() },
            )
        })
        .collect();

    // chain bootstrap: lookup tables on Solana, reserve allowances elsewhere
    for entry in &config.chains {
        let svc = services
            .chains
            .get(&entry.chain)
            .ok_or_eyre(format!("no services wired for chain {}", entry.chain))?;

        match entry.family() {
            ChainFamily::Svm => {
                svc.client
                    .initialize_lookup_tables()
                    .await
                    .wrap_err_with(|| format!("lookup tables on chain {}", entry.chain))?;
            }
            ChainFamily::Evm => {
                let spenders: Vec<Address> =
                    entry.crosschain_forwarder.into_iter().chain(entry.dst_pmm).collect();
                let approvals = config.buckets.iter().flat_map(|bucket| {
                    bucket.tokens_on(entry.chain).iter().flat_map(|token| {
                        spenders
                            .iter()
                            .map(move |spender| svc.adapter.ensure_allowance(*token, *spender))
                    })
                });
                try_join_all(approvals)
                    .await
                    .map_err(|err| eyre::eyre!("allowances on chain {}: {err}", entry.chain))?;
            }
        }
    }

    let mut chains = Chains::default();
    for entry in &config.chains {
        let svc = &services.chains[&entry.chain];
        let kind = config.policy_for(entry);
        let (handle, rx) = ProcessorHandle::new_pair();

        // strict unlocks are immediate, so its batches never accumulate
        let batch_size = match kind {
            PolicyKind::UniversalProcessor => config.universal.batch_unlock_size,
            PolicyKind::StrictProcessor => 1,
        };
        let unlocker = BatchUnlocker::spawn(
            entry.chain,
            batch_size,
            svc.client.clone(),
            svc.adapter.clone(),
            svc.unlock_authority,
            unlock_targets.clone(),
            services.hooks.clone(),
        );

        let fulfill_payload = match entry.family() {
            ChainFamily::Evm => FulfillPayload::Evm { unlock_authority: svc.unlock_authority },
            ChainFamily::Svm => FulfillPayload::Svm { wallet: svc.adapter.address() },
        };

        let (policy, mempool) = match kind {
            PolicyKind::UniversalProcessor => {
                let mempool = MempoolService::spawn(
                    entry.chain,
                    config.universal.mempool_interval,
                    config.mempool_capacity,
                    handle.clone(),
                );
                let policy = Policy::Universal(Arc::new(UniversalPolicy {
                    take_chain_id: entry.chain,
                    min_profitability_bps: config.universal.min_profitability_bps,
                    batch_unlock_size: config.universal.batch_unlock_size,
                    buckets: buckets.clone(),
                    prices: prices.clone(),
                    swap: services.swap.clone(),
                    clients: clients.clone(),
                    adapter: svc.adapter.clone(),
                    fulfill_payload,
                }));
                (policy, Some(mempool))
            }
            PolicyKind::StrictProcessor => {
                let policy = Policy::Strict(Arc::new(StrictPolicy {
                    take_chain_id: entry.chain,
                    approved_take_tokens: entry.approved_take_tokens.clone(),
                    clients: clients.clone(),
                    adapter: svc.adapter.clone(),
                    fulfill_payload,
                }));
                (policy, None)
            }
        };

        OrderProcessor::new(entry.chain, policy, rx, mempool, unlocker, services.hooks.clone())
            .spawn();

        let mut dst_filters: Vec<Arc<dyn OrderFilter>> =
            entry.dst_filters.iter().map(|filter| filter.build()).collect();
        if entry.disabled {
            dst_filters.push(Arc::new(DisableFulfill));
        }
        chains.insert(ConfiguredChain {
            chain_id: entry.chain,
            family: entry.family(),
            processor: handle,
            src_filters: entry.src_filters.iter().map(|filter| filter.build()).collect(),
            dst_filters,
        });

        info!(chain_id = entry.chain, policy = ?kind, disabled = entry.disabled, "Chain ready");
    }

    let global_filters: Vec<Arc<dyn OrderFilter>> =
        config.filters.iter().map(|filter| filter.build()).collect();
    let executor = Executor::new(chains, global_filters);

    let init = FeedInit {
        unlock_authorities: config
            .chains
            .iter()
            .map(|entry| (entry.chain, services.chains[&entry.chain].unlock_authority))
            .collect(),
        confirmation_thresholds: config
            .chains
            .iter()
            .map(|entry| (entry.chain, entry.constraints.confirmation_ranges()))
            .collect(),
        hooks: services.hooks.clone(),
    };
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();
    let feed = services.feed.clone();
    let feed_task = tokio::spawn(async move { feed.subscribe(init, feed_tx).await });
    let executor_task = executor.spawn(feed_rx);

    info!(chains = config.chains.len(), "Taker started");
    Ok(TakerHandle { executor: executor_task, feed: feed_task })
}
