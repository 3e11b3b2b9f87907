use alloy::primitives::{Address, B256, ChainId, U256, keccak256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of an order: the 32-byte hash of its canonical
/// encoding. Deterministic, so independently computed ids always agree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub B256);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Debug for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderId({})", self.0)
    }
}

impl From<B256> for OrderId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

/// An amount of a specific token on a specific chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    /// Chain the token lives on.
    pub chain_id: ChainId,
    /// Token address. The zero address denotes the chain's native currency.
    pub token: Address,
    /// Amount in the token's smallest unit.
    pub amount: U256,
}

/// A user-signed cross-chain swap request: lock `give` on the source chain,
/// deliver `take` on the destination chain.
///
/// Fields beyond `give`/`take` are opaque metadata carried through to the
/// chain client unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Funds locked by the maker on the source chain.
    pub give: TokenAmount,
    /// What the maker wants delivered on the destination chain.
    pub take: TokenAmount,
    /// Recipient of the take amount on the destination chain.
    pub receiver: Address,
    /// Authority allowed to patch the give offer.
    pub give_patch_authority: Address,
    /// Authority controlling the order on the destination chain.
    pub order_authority_dst: Address,
    /// Restricts who may take the order. `None` leaves it open to any taker.
    pub allowed_taker: Option<Address>,
    /// Maker nonce disambiguating otherwise identical orders.
    pub nonce: u64,
}

impl Order {
    /// Computes the content hash identifying this order.
    pub fn calculate_id(&self) -> OrderId {
        let mut buf = Vec::with_capacity(232);
        encode_token_amount(&mut buf, &self.give);
        encode_token_amount(&mut buf, &self.take);
        buf.extend_from_slice(self.receiver.as_slice());
        buf.extend_from_slice(self.give_patch_authority.as_slice());
        buf.extend_from_slice(self.order_authority_dst.as_slice());
        buf.extend_from_slice(self.allowed_taker.unwrap_or(Address::ZERO).as_slice());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        OrderId(keccak256(&buf))
    }
}

fn encode_token_amount(buf: &mut Vec<u8>, side: &TokenAmount) {
    buf.extend_from_slice(&side.chain_id.to_be_bytes());
    buf.extend_from_slice(side.token.as_slice());
    buf.extend_from_slice(&side.amount.to_be_bytes::<32>());
}

/// Status carried by a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderEventStatus {
    /// A live order open for fulfillment.
    Created,
    /// Historical replay of an order that was live before the feed
    /// connected.
    ArchivalCreated,
    /// An order this operator fulfilled earlier and must still unlock.
    Fulfilled,
    /// Historical replay of a fulfillment by this operator.
    ArchivalFulfilled,
    /// The maker cancelled the order.
    Cancelled,
    /// Any status the taker does not act on.
    Other,
}

impl OrderEventStatus {
    /// Whether this status announces a new order subject to admission
    /// filters.
    pub fn is_created(self) -> bool {
        matches!(self, Self::Created | Self::ArchivalCreated)
    }
}

/// A single event from the order feed.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    /// Identifier of the order the event concerns.
    pub order_id: OrderId,
    /// What happened.
    pub status: OrderEventStatus,
    /// The order payload, when the feed has it.
    pub order: Option<Order>,
    /// Source-chain confirmations observed by the feed at emission time.
    pub block_confirmations: Option<u64>,
}

/// Take-side state of an order as reported by the destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeOrderState {
    /// Nothing recorded for the order yet.
    NotSet,
    /// The order was fulfilled.
    Fulfilled,
    /// The order was fulfilled and its unlock was already sent.
    SentUnlock,
}

/// Give-side state of an order as reported by the source chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveOrderState {
    /// The maker's funds are locked and the order is live.
    Created,
    /// The locked funds were claimed by a taker.
    Fulfilled,
    /// The maker cancelled and reclaimed the locked funds.
    Cancelled,
}
