//! Shared test doubles: mock chains, price sources, swap connectors and a
//! fully wired single-destination processor harness.

use crate::{
    chains::ChainFamily,
    client::{
        ChainAdapter, ChainClient, ChainTransaction, ClientError, FlowCost, FulfillPayload,
        SwapParams, TxHash, UnlockPayload,
    },
    config::{
        ChainEntry, Constraints, PolicyKind, TakerConfig, ThresholdPoint, UniversalParams,
    },
    constants::{DEFAULT_BATCH_UNLOCK_SIZE, SOLANA_CHAIN_ID},
    feed::{FeedError, FeedInit, OrderFeed},
    hooks::{HookEvent, HookSender},
    price::{PriceError, PriceService},
    processor::{
        BatchUnlocker, MempoolService, OrderProcessor, Policy, ProcessorHandle, StrictPolicy,
        UniversalPolicy, UnlockTarget,
    },
    swap::{SwapConnector, SwapError, SwapEstimate},
    types::{
        GiveOrderState, Order, OrderEvent, OrderEventStatus, OrderId, TakeOrderState,
        TokenAmount, TokensBucket,
    },
};
use alloy::primitives::{Address, B256, ChainId, U256, keccak256};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::{Mutex as AsyncMutex, Semaphore, mpsc};

/// Give chain used by the canned test order.
pub const GIVE_CHAIN: ChainId = 42161;
/// Take chain used by the canned test order.
pub const TAKE_CHAIN: ChainId = 137;
/// Give-side reserve token of the canned test order.
pub const TOKEN_GIVE: Address = Address::repeat_byte(0xaa);
/// Take-side token of the canned test order.
pub const TOKEN_TAKE: Address = Address::repeat_byte(0xbb);

/// An Arbitrum-to-Polygon order with a 50 bps spread: give 10000 units,
/// take 9950. With unit prices, profitable under the default 4 bps floor.
pub fn test_order(nonce: u64) -> Order {
    test_order_between(GIVE_CHAIN, TAKE_CHAIN, nonce)
}

/// Same shape as [`test_order`] with an explicit route.
pub fn test_order_between(give_chain: ChainId, take_chain: ChainId, nonce: u64) -> Order {
    Order {
        give: TokenAmount { chain_id: give_chain, token: TOKEN_GIVE, amount: U256::from(10_000u64) },
        take: TokenAmount { chain_id: take_chain, token: TOKEN_TAKE, amount: U256::from(9_950u64) },
        receiver: Address::repeat_byte(0x11),
        give_patch_authority: Address::repeat_byte(0x22),
        order_authority_dst: Address::repeat_byte(0x33),
        allowed_taker: None,
        nonce,
    }
}

/// Wraps an order into a feed event of the given status.
pub fn test_event(status: OrderEventStatus, order: Order) -> OrderEvent {
    OrderEvent {
        order_id: order.calculate_id(),
        status,
        order: Some(order),
        block_confirmations: Some(12),
    }
}

/// A bucket covering the canned test route.
pub fn test_bucket() -> TokensBucket {
    [(GIVE_CHAIN, vec![TOKEN_GIVE]), (TAKE_CHAIN, vec![TOKEN_TAKE])].into_iter().collect()
}

/// A two-chain configuration that passes validation.
pub fn test_config() -> TakerConfig {
    let entry = |chain: ChainId| ChainEntry {
        chain,
        chain_rpc: "http://localhost:8545".parse().unwrap(),
        beneficiary: Address::repeat_byte(0xbe),
        taker_private_key: "test-taker-key".into(),
        unlock_authority_private_key: "test-unlock-key".into(),
        disabled: false,
        order_processor: None,
        approved_take_tokens: vec![TOKEN_TAKE],
        dst_filters: vec![],
        src_filters: vec![],
        constraints: Constraints::default(),
        crosschain_forwarder: Some(Address::repeat_byte(0xf0)),
        dst_pmm: Some(Address::repeat_byte(0xf1)),
    };

    let mut polygon = entry(TAKE_CHAIN);
    polygon.constraints.required_confirmations_thresholds = vec![
        ThresholdPoint { threshold_amount_in_usd: 100.0, min_block_confirmations: 12 },
        ThresholdPoint { threshold_amount_in_usd: 1000.0, min_block_confirmations: 64 },
    ];

    TakerConfig {
        order_feed: None,
        buckets: vec![test_bucket()],
        order_processor: PolicyKind::UniversalProcessor,
        universal: UniversalParams::default(),
        filters: vec![],
        rate_ttl: Duration::from_secs(300),
        mempool_capacity: 1024,
        chains: vec![entry(GIVE_CHAIN), polygon],
    }
}

/// Polls `cond` until it holds, panicking after a bounded wait. Under a
/// paused runtime the sleeps auto-advance, so even multi-minute virtual
/// waits resolve instantly.
pub async fn wait_until(cond: impl Fn() -> bool) {
    for _ in 0..10_000 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within the wait bound");
}

/// A price source with per-token overrides over a uniform default.
#[derive(Debug, Clone)]
pub struct MockPriceService {
    default_rate: f64,
    overrides: Arc<Mutex<HashMap<(ChainId, Address), f64>>>,
}

impl MockPriceService {
    /// Quotes `rate` for every token until overridden.
    pub fn uniform(rate: f64) -> Self {
        Self { default_rate: rate, overrides: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Overrides the price of one token.
    pub fn set_price(&self, chain_id: ChainId, token: Address, rate: f64) {
        self.overrides.lock().unwrap().insert((chain_id, token), rate);
    }
}

#[async_trait]
impl PriceService for MockPriceService {
    async fn get_price(&self, chain_id: ChainId, token: Address) -> Result<f64, PriceError> {
        let rate = self
            .overrides
            .lock()
            .unwrap()
            .get(&(chain_id, token))
            .copied()
            .unwrap_or(self.default_rate);
        Ok(rate)
    }
}

/// A swap connector quoting 1:1 plus a fixed slippage.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockSwapConnector {
    slippage_bps: u32,
}

impl MockSwapConnector {
    /// Quotes with the given slippage.
    pub fn with_slippage(slippage_bps: u32) -> Self {
        Self { slippage_bps }
    }
}

#[async_trait]
impl SwapConnector for MockSwapConnector {
    async fn estimate_input_amount(
        &self,
        _chain_id: ChainId,
        _from_token: Address,
        _to_token: Address,
        to_amount: U256,
    ) -> Result<SwapEstimate, SwapError> {
        let input_amount =
            to_amount + to_amount * U256::from(self.slippage_bps) / U256::from(10_000);
        Ok(SwapEstimate { input_amount, slippage_bps: self.slippage_bps })
    }
}

/// An unlock observed by a [`MockChain`], recorded when the unlock
/// transaction is successfully sent.
#[derive(Debug, Clone)]
pub struct UnlockRecord {
    /// Orders carried by the unlock, in batch order.
    pub order_ids: Vec<OrderId>,
    /// Beneficiary the unlock targets.
    pub beneficiary: Address,
    /// Execution fee attached to the unlock.
    pub execution_fee: U256,
    /// Rewards carried by a Solana unlock payload.
    pub reward_amounts: Option<[U256; 2]>,
}

#[derive(Debug, Default)]
struct MockChainState {
    take_status: HashMap<OrderId, TakeOrderState>,
    give_overrides: HashMap<OrderId, Option<GiveOrderState>>,
    balances: HashMap<Address, U256>,
    flow_cost: FlowCost,
    fulfilled: Vec<OrderId>,
    built_unlocks: HashMap<u64, UnlockRecord>,
    unlocks: Vec<UnlockRecord>,
    next_unlock_seq: u64,
    approvals: Vec<(Address, Address)>,
    lookup_tables_initialized: bool,
    fail_sends: bool,
    send_attempts: usize,
    fulfill_visible_on_send: bool,
    concurrent: usize,
    max_concurrent: usize,
    gate: Option<Arc<Semaphore>>,
    held: usize,
}

/// A chain client and adapter in one: orders flip to fulfilled when their
/// fulfill transaction is sent, unlocks are recorded, and the fulfillment
/// pipeline's calls are concurrency-tracked so tests can assert the
/// one-in-flight invariant.
#[derive(Debug, Clone)]
pub struct MockChain {
    chain_id: ChainId,
    state: Arc<Mutex<MockChainState>>,
}

const MOCK_EXECUTION_FEE: u64 = 1_000;

impl MockChain {
    /// A mock chain with unlimited balances where fulfillments become
    /// visible the moment they are sent.
    pub fn new(chain_id: ChainId) -> Self {
        let state = MockChainState { fulfill_visible_on_send: true, ..Default::default() };
        Self { chain_id, state: Arc::new(Mutex::new(state)) }
    }

    /// Number of fulfill transactions sent.
    pub fn fulfill_count(&self) -> usize {
        self.state.lock().unwrap().fulfilled.len()
    }

    /// Fulfilled order ids in send order.
    pub fn fulfilled_order_ids(&self) -> Vec<OrderId> {
        self.state.lock().unwrap().fulfilled.clone()
    }

    /// Unlocks sent so far.
    pub fn unlocks(&self) -> Vec<UnlockRecord> {
        self.state.lock().unwrap().unlocks.clone()
    }

    /// Spender approvals granted so far.
    pub fn approvals(&self) -> Vec<(Address, Address)> {
        self.state.lock().unwrap().approvals.clone()
    }

    /// Whether the lookup-table bootstrap ran.
    pub fn lookup_tables_initialized(&self) -> bool {
        self.state.lock().unwrap().lookup_tables_initialized
    }

    /// Highest number of fulfillment-pipeline calls ever in flight at once.
    pub fn max_concurrent_calls(&self) -> usize {
        self.state.lock().unwrap().max_concurrent
    }

    /// Total transaction send attempts, failed ones included.
    pub fn send_attempts(&self) -> usize {
        self.state.lock().unwrap().send_attempts
    }

    /// Number of calls parked at the processing gate so far.
    pub fn held_calls(&self) -> usize {
        self.state.lock().unwrap().held
    }

    /// Makes take-status queries park until [`Self::release_processing`].
    pub fn hold_processing(&self) {
        self.state.lock().unwrap().gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Releases every call parked by [`Self::hold_processing`].
    pub fn release_processing(&self) {
        if let Some(gate) = self.state.lock().unwrap().gate.take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Makes every transaction send fail (or succeed again).
    pub fn fail_sends(&self, fail: bool) {
        self.state.lock().unwrap().fail_sends = fail;
    }

    /// Pins the take-side status of an order.
    pub fn set_take_status(&self, order_id: OrderId, status: TakeOrderState) {
        self.state.lock().unwrap().take_status.insert(order_id, status);
    }

    /// Makes the give side report no record for an order.
    pub fn clear_give_status(&self, order_id: OrderId) {
        self.state.lock().unwrap().give_overrides.insert(order_id, None);
    }

    /// Overrides the balance of one token.
    pub fn set_balance(&self, token: Address, amount: U256) {
        self.state.lock().unwrap().balances.insert(token, amount);
    }

    /// Overrides the flow cost returned to the estimator.
    pub fn set_flow_cost(&self, cost: FlowCost) {
        self.state.lock().unwrap().flow_cost = cost;
    }

    /// Controls whether sent fulfillments become visible to status polls.
    pub fn set_fulfill_visible_on_send(&self, visible: bool) {
        self.state.lock().unwrap().fulfill_visible_on_send = visible;
    }

    fn enter(&self) {
        let mut state = self.state.lock().unwrap();
        state.concurrent += 1;
        state.max_concurrent = state.max_concurrent.max(state.concurrent);
    }

    fn exit(&self) {
        self.state.lock().unwrap().concurrent -= 1;
    }

    /// Widens the call's overlap window so concurrent pipeline activity is
    /// observable by the tracker.
    async fn traced<T>(&self, result: T) -> T {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.exit();
        result
    }

    fn fulfill_tx(&self, order_id: OrderId) -> ChainTransaction {
        let mut data = vec![0x01];
        data.extend_from_slice(order_id.0.as_slice());
        ChainTransaction { chain_id: self.chain_id, data: data.into() }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_take_order_status(
        &self,
        order_id: OrderId,
    ) -> Result<Option<TakeOrderState>, ClientError> {
        self.enter();
        let gate = {
            let mut state = self.state.lock().unwrap();
            if state.gate.is_some() {
                state.held += 1;
            }
            state.gate.clone()
        };
        if let Some(gate) = gate {
            gate.acquire().await.expect("gate never closes").forget();
        }
        let status = self.state.lock().unwrap().take_status.get(&order_id).copied();
        self.traced(Ok(status)).await
    }

    async fn get_give_order_status(
        &self,
        order_id: OrderId,
    ) -> Result<Option<GiveOrderState>, ClientError> {
        self.enter();
        let status = self
            .state
            .lock()
            .unwrap()
            .give_overrides
            .get(&order_id)
            .copied()
            .unwrap_or(Some(GiveOrderState::Created));
        self.traced(Ok(status)).await
    }

    async fn get_amount_to_send(
        &self,
        _take_chain: ChainId,
        _give_chain: ChainId,
        fee_total: U256,
    ) -> Result<U256, ClientError> {
        Ok(U256::from(MOCK_EXECUTION_FEE) + fee_total)
    }

    async fn get_taker_flow_cost(
        &self,
        _order: &Order,
        _give_native_price: f64,
        _take_native_price: f64,
    ) -> Result<FlowCost, ClientError> {
        self.enter();
        let cost = self.state.lock().unwrap().flow_cost;
        self.traced(Ok(cost)).await
    }

    async fn preswap_and_fulfill_order(
        &self,
        _order: &Order,
        order_id: OrderId,
        _reserve_dst_token: Address,
        _swap: SwapParams,
        _payload: FulfillPayload,
    ) -> Result<ChainTransaction, ClientError> {
        self.enter();
        self.traced(Ok(self.fulfill_tx(order_id))).await
    }

    async fn fulfill_order(
        &self,
        _order: &Order,
        order_id: OrderId,
        _payload: FulfillPayload,
    ) -> Result<ChainTransaction, ClientError> {
        self.enter();
        self.traced(Ok(self.fulfill_tx(order_id))).await
    }

    async fn send_unlock_order(
        &self,
        orders: &[(OrderId, Order)],
        beneficiary: Address,
        execution_fee: U256,
        payload: UnlockPayload,
    ) -> Result<ChainTransaction, ClientError> {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_unlock_seq;
        state.next_unlock_seq += 1;
        state.built_unlocks.insert(
            seq,
            UnlockRecord {
                order_ids: orders.iter().map(|(id, _)| *id).collect(),
                beneficiary,
                execution_fee,
                reward_amounts: match payload {
                    UnlockPayload::Svm { reward_amounts, .. } => Some(reward_amounts),
                    UnlockPayload::Evm { .. } => None,
                },
            },
        );

        let mut data = vec![0x02];
        data.extend_from_slice(&seq.to_be_bytes());
        Ok(ChainTransaction { chain_id: self.chain_id, data: data.into() })
    }

    async fn initialize_lookup_tables(&self) -> Result<(), ClientError> {
        self.state.lock().unwrap().lookup_tables_initialized = true;
        Ok(())
    }
}

#[async_trait]
impl ChainAdapter for MockChain {
    fn address(&self) -> Address {
        Address::left_padding_from(&self.chain_id.to_be_bytes())
    }

    async fn get_balance(&self, token: Address) -> Result<U256, ClientError> {
        self.enter();
        let balance =
            self.state.lock().unwrap().balances.get(&token).copied().unwrap_or(U256::MAX);
        self.traced(Ok(balance)).await
    }

    async fn send_transaction(&self, tx: ChainTransaction) -> Result<TxHash, ClientError> {
        let hash = keccak256(&tx.data);
        match tx.data.first().copied() {
            Some(0x01) => {
                self.enter();
                let result = {
                    let mut state = self.state.lock().unwrap();
                    state.send_attempts += 1;
                    if state.fail_sends {
                        Err(ClientError::Rejected("mock send failure".into()))
                    } else {
                        let order_id = OrderId(B256::from_slice(&tx.data[1..33]));
                        state.fulfilled.push(order_id);
                        if state.fulfill_visible_on_send {
                            state.take_status.insert(order_id, TakeOrderState::Fulfilled);
                        }
                        Ok(hash)
                    }
                };
                self.traced(result).await
            }
            Some(0x02) => {
                let mut state = self.state.lock().unwrap();
                state.send_attempts += 1;
                if state.fail_sends {
                    return Err(ClientError::Rejected("mock send failure".into()));
                }
                let seq = u64::from_be_bytes(tx.data[1..9].try_into().unwrap());
                if let Some(record) = state.built_unlocks.remove(&seq) {
                    state.unlocks.push(record);
                }
                Ok(hash)
            }
            _ => Err(ClientError::Rejected("unknown mock transaction".into())),
        }
    }

    async fn ensure_allowance(
        &self,
        token: Address,
        spender: Address,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock().unwrap();
        if !state.approvals.contains(&(token, spender)) {
            state.approvals.push((token, spender));
        }
        Ok(())
    }
}

/// A feed that replays a canned event list and ends.
#[derive(Debug, Default)]
pub struct MockFeed {
    events: Mutex<Vec<OrderEvent>>,
}

impl MockFeed {
    /// A feed that will deliver `events` in order.
    pub fn new(events: Vec<OrderEvent>) -> Self {
        Self { events: Mutex::new(events) }
    }
}

#[async_trait]
impl OrderFeed for MockFeed {
    async fn subscribe(
        &self,
        _init: FeedInit,
        sink: mpsc::UnboundedSender<OrderEvent>,
    ) -> Result<(), FeedError> {
        for event in self.events.lock().unwrap().drain(..) {
            let _ = sink.send(event);
        }
        Ok(())
    }
}

/// Unlock authority baked into the harness policies.
pub const TEST_UNLOCK_AUTHORITY: Address = Address::repeat_byte(0x77);

/// A fully wired single-destination processor: mock take and give chains,
/// a mempool, a batch unlocker and a hooks channel.
pub struct TestProcessor {
    /// Destination-chain mock, also serving as the adapter.
    pub take_chain: MockChain,
    /// Source-chain mock.
    pub give_chain: MockChain,
    /// Price source shared with the policy.
    pub prices: MockPriceService,
    /// Handle into the processor under test.
    pub handle: ProcessorHandle,
    hooks_rx: AsyncMutex<mpsc::UnboundedReceiver<HookEvent>>,
}

impl TestProcessor {
    /// A universal-policy processor with default parameters.
    pub async fn universal() -> Self {
        Self::build(PolicyKind::UniversalProcessor, DEFAULT_BATCH_UNLOCK_SIZE).await
    }

    /// A universal-policy processor with a custom unlock batch size.
    pub async fn universal_with_batch_size(batch_size: usize) -> Self {
        Self::build(PolicyKind::UniversalProcessor, batch_size).await
    }

    /// A strict-policy processor approving [`TOKEN_TAKE`].
    pub async fn strict() -> Self {
        Self::build(PolicyKind::StrictProcessor, 1).await
    }

    async fn build(kind: PolicyKind, batch_size: usize) -> Self {
        let take_chain = MockChain::new(TAKE_CHAIN);
        let give_chain = MockChain::new(GIVE_CHAIN);
        let prices = MockPriceService::uniform(1.0);
        let swap = MockSwapConnector::default();
        let (hooks, hooks_rx) = HookSender::new();
        let (handle, rx) = ProcessorHandle::new_pair();

        let clients: Arc<HashMap<ChainId, Arc<dyn ChainClient>>> = Arc::new(
            [
                (TAKE_CHAIN, Arc::new(take_chain.clone()) as Arc<dyn ChainClient>),
                (GIVE_CHAIN, Arc::new(give_chain.clone()) as Arc<dyn ChainClient>),
            ]
            .into_iter()
            .collect(),
        );
        let adapter: Arc<dyn ChainAdapter> = Arc::new(take_chain.clone());
        let targets: HashMap<ChainId, UnlockTarget> = [
            (
                GIVE_CHAIN,
                UnlockTarget { beneficiary: Address::repeat_byte(0xbe), family: ChainFamily::Evm },
            ),
            (
                SOLANA_CHAIN_ID,
                UnlockTarget { beneficiary: Address::repeat_byte(0xbf), family: ChainFamily::Svm },
            ),
        ]
        .into_iter()
        .collect();

        let unlocker = BatchUnlocker::spawn(
            TAKE_CHAIN,
            batch_size,
            Arc::new(take_chain.clone()),
            adapter.clone(),
            TEST_UNLOCK_AUTHORITY,
            targets,
            hooks.clone(),
        );

        let fulfill_payload = FulfillPayload::Evm { unlock_authority: TEST_UNLOCK_AUTHORITY };
        let (policy, mempool) = match kind {
            PolicyKind::UniversalProcessor => {
                let mempool = MempoolService::spawn(
                    TAKE_CHAIN,
                    Duration::from_secs(60),
                    1024,
                    handle.clone(),
                );
                let policy = Policy::Universal(Arc::new(UniversalPolicy {
                    take_chain_id: TAKE_CHAIN,
                    min_profitability_bps: 4,
                    batch_unlock_size: batch_size,
                    buckets: Arc::new(vec![test_bucket()]),
                    prices: Arc::new(prices.clone()),
                    swap: Arc::new(swap),
                    clients,
                    adapter,
                    fulfill_payload,
                }));
                (policy, Some(mempool))
            }
            PolicyKind::StrictProcessor => {
                let policy = Policy::Strict(Arc::new(StrictPolicy {
                    take_chain_id: TAKE_CHAIN,
                    approved_take_tokens: vec![TOKEN_TAKE],
                    clients,
                    adapter,
                    fulfill_payload,
                }));
                (policy, None)
            }
        };

        OrderProcessor::new(TAKE_CHAIN, policy, rx, mempool, unlocker, hooks).spawn();

        Self {
            take_chain,
            give_chain,
            prices,
            handle,
            hooks_rx: AsyncMutex::new(hooks_rx),
        }
    }

    /// Submits an event to the processor.
    pub fn send(&self, event: OrderEvent) {
        self.handle.process(event);
    }

    /// Receives the next hook event.
    pub async fn recv_hook(&self) -> HookEvent {
        self.hooks_rx.lock().await.recv().await.expect("hooks channel open")
    }

    /// Waits for the order to be dropped, returning the reason.
    pub async fn wait_dropped(&self, order_id: OrderId) -> String {
        loop {
            if let HookEvent::OrderDropped { order_id: dropped, reason, .. } =
                self.recv_hook().await
                && dropped == order_id
            {
                return reason;
            }
        }
    }

    /// Waits for the order to be postponed to the mempool, returning the
    /// reason.
    pub async fn wait_postponed(&self, order_id: OrderId) -> String {
        loop {
            if let HookEvent::OrderPostponed { order_id: postponed, reason, .. } =
                self.recv_hook().await
                && postponed == order_id
            {
                return reason;
            }
        }
    }
}
