use crate::{
    chains::ChainFamily,
    client::{ChainAdapter, ChainClient, ClientError, TxHash, UnlockPayload},
    hooks::{HookEvent, HookSender},
    types::{Order, OrderId},
};
use alloy::primitives::{Address, ChainId, U256};
use metrics::counter;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Errors raised while submitting a batched unlock. Always retryable: the
/// batch is retained and resubmitted on the next trigger.
#[derive(Debug, thiserror::Error)]
pub enum UnlockError {
    /// Building or broadcasting the unlock transaction failed.
    #[error("unlock send failed: {0}")]
    Send(#[from] ClientError),
}

/// Give-chain parameters of an unlock.
#[derive(Debug, Clone, Copy)]
pub struct UnlockTarget {
    /// Address receiving the released funds on the give chain.
    pub beneficiary: Address,
    /// Family of the give chain.
    pub family: ChainFamily,
}

/// A fulfilled order waiting for its unlock.
#[derive(Debug, Clone)]
struct UnlockEntry {
    order_id: OrderId,
    order: Order,
    /// Claim and settle rewards, passed through when the give chain is
    /// Solana.
    reward_amounts: [U256; 2],
}

/// Messages accepted by the [`BatchUnlocker`].
#[derive(Debug)]
pub enum UnlockerMessage {
    /// Queue a fulfilled order for unlocking.
    UnlockOrder {
        /// The fulfilled order's id.
        order_id: OrderId,
        /// The fulfilled order.
        order: Box<Order>,
        /// Give-side rewards from the fee computation.
        reward_amounts: [U256; 2],
    },
}

/// Handle to communicate with the [`BatchUnlocker`].
#[derive(Debug, Clone)]
pub struct BatchUnlockerHandle {
    tx: mpsc::UnboundedSender<UnlockerMessage>,
}

impl BatchUnlockerHandle {
    /// Queues a fulfilled order for unlocking.
    pub fn unlock_order(&self, order_id: OrderId, order: Order, reward_amounts: [U256; 2]) {
        let _ = self.tx.send(UnlockerMessage::UnlockOrder {
            order_id,
            order: Box::new(order),
            reward_amounts,
        });
    }
}

/// Accumulates fulfilled orders per give chain and flushes one unlock
/// transaction per full batch.
///
/// Amortizing the unlock across `batch_size` orders is what preserves the
/// margin the protocol reserves for settlement. Solana give chains do not
/// participate in batching and flush immediately.
#[derive(Debug)]
pub struct BatchUnlocker {
    take_chain_id: ChainId,
    batch_size: usize,
    rx: mpsc::UnboundedReceiver<UnlockerMessage>,
    client: Arc<dyn ChainClient>,
    adapter: Arc<dyn ChainAdapter>,
    /// Unlock authority on the take chain, baked into EVM unlock payloads.
    unlock_authority: Address,
    /// Beneficiary and family per give chain.
    targets: HashMap<ChainId, UnlockTarget>,
    batches: HashMap<ChainId, Vec<UnlockEntry>>,
    hooks: HookSender,
}

impl BatchUnlocker {
    /// Creates an unlocker for one destination chain and spawns it,
    /// returning its handle.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        take_chain_id: ChainId,
        batch_size: usize,
        client: Arc<dyn ChainClient>,
        adapter: Arc<dyn ChainAdapter>,
        unlock_authority: Address,
        targets: HashMap<ChainId, UnlockTarget>,
        hooks: HookSender,
    ) -> BatchUnlockerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = Self {
            take_chain_id,
            batch_size,
            rx,
            client,
            adapter,
            unlock_authority,
            targets,
            batches: HashMap::new(),
            hooks,
        };
        tokio::spawn(this.run());
        BatchUnlockerHandle { tx }
    }

    async fn run(mut self) {
        while let Some(UnlockerMessage::UnlockOrder { order_id, order, reward_amounts }) =
            self.rx.recv().await
        {
            let give_chain = order.give.chain_id;
            self.batches.entry(give_chain).or_default().push(UnlockEntry {
                order_id,
                order: *order,
                reward_amounts,
            });
            self.try_flush(give_chain).await;
        }
    }

    /// Threshold at which a give chain's batch is flushed. Solana unlocks
    /// cannot be batched, so they go out one by one.
    fn flush_threshold(&self, target: &UnlockTarget) -> usize {
        match target.family {
            ChainFamily::Svm => 1,
            ChainFamily::Evm => self.batch_size,
        }
    }

    async fn try_flush(&mut self, give_chain: ChainId) {
        let Some(target) = self.targets.get(&give_chain).copied() else {
            warn!(
                chain_id = self.take_chain_id,
                give_chain, "No unlock target for give chain, dropping batch"
            );
            self.batches.remove(&give_chain);
            return;
        };
        let threshold = self.flush_threshold(&target);

        while self.batches.get(&give_chain).is_some_and(|batch| batch.len() >= threshold) {
            let drained: Vec<UnlockEntry> = {
                let batch = self.batches.get_mut(&give_chain).expect("checked above");
                batch.drain(..threshold).collect()
            };

            match self.submit(give_chain, target, &drained).await {
                Ok(tx_hash) => {
                    let order_ids: Vec<OrderId> =
                        drained.iter().map(|entry| entry.order_id).collect();
                    info!(
                        chain_id = self.take_chain_id,
                        give_chain,
                        orders = order_ids.len(),
                        tx_hash = %tx_hash,
                        "Batch unlock submitted"
                    );
                    counter!("taker_unlock_batches_sent").increment(1);
                    self.hooks.emit(HookEvent::BatchUnlockSent {
                        take_chain: self.take_chain_id,
                        give_chain,
                        order_ids,
                        tx_hash,
                    });
                }
                Err(err) => {
                    warn!(
                        chain_id = self.take_chain_id,
                        give_chain,
                        orders = drained.len(),
                        %err,
                        "Batch unlock failed, retaining batch"
                    );
                    counter!("taker_unlock_batches_failed").increment(1);
                    // restore the drained entries ahead of any newer ones
                    let batch = self.batches.entry(give_chain).or_default();
                    for entry in drained.into_iter().rev() {
                        batch.insert(0, entry);
                    }
                    return;
                }
            }
        }
    }

    async fn submit(
        &self,
        give_chain: ChainId,
        target: UnlockTarget,
        entries: &[UnlockEntry],
    ) -> Result<TxHash, UnlockError> {
        let execution_fee = self
            .client
            .get_amount_to_send(self.take_chain_id, give_chain, U256::ZERO)
            .await?;

        let payload = match target.family {
            ChainFamily::Evm => UnlockPayload::Evm { unlock_authority: self.unlock_authority },
            ChainFamily::Svm => UnlockPayload::Svm {
                wallet: self.adapter.address(),
                // unbatched by construction, so the single entry's rewards
                // apply
                reward_amounts: entries
                    .first()
                    .map(|entry| entry.reward_amounts)
                    .unwrap_or_default(),
            },
        };

        let orders: Vec<(OrderId, Order)> =
            entries.iter().map(|entry| (entry.order_id, entry.order.clone())).collect();
        let tx = self
            .client
            .send_unlock_order(&orders, target.beneficiary, execution_fee, payload)
            .await?;
        Ok(self.adapter.send_transaction(tx).await?)
    }
}
