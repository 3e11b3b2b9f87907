//! Chain adapter and chain client interfaces.
//!
//! Concrete RPC adapters, transaction encoders and keypair handling live
//! outside this crate; the taker core only depends on the contracts below.

use crate::types::{GiveOrderState, Order, OrderId, TakeOrderState};
use alloy::primitives::{Address, B256, Bytes, ChainId, U256};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Hash of a submitted transaction.
pub type TxHash = B256;

/// Errors surfaced by chain adapters and chain clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying RPC call failed.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The chain rejected the transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The client cannot encode a transaction for this token.
    #[error("unsupported token {0}")]
    UnsupportedToken(Address),
}

/// An unsigned, chain-encoded transaction produced by a chain client. The
/// payload is opaque to the core; only the owning chain's adapter can sign
/// and submit it.
#[derive(Debug, Clone)]
pub struct ChainTransaction {
    /// Chain the transaction is bound to.
    pub chain_id: ChainId,
    /// Chain-encoded transaction payload.
    pub data: Bytes,
}

/// Chain-family-specific context for building fulfill transactions.
#[derive(Debug, Clone)]
pub enum FulfillPayload {
    /// EVM context: the authority that will later claim the unlock.
    Evm {
        /// Address authorized to unlock on behalf of the taker.
        unlock_authority: Address,
    },
    /// Solana context: the taker wallet owning the reserve token accounts.
    Svm {
        /// Taker wallet public key.
        wallet: Address,
    },
}

/// Chain-family-specific context for building unlock transactions.
#[derive(Debug, Clone)]
pub enum UnlockPayload {
    /// EVM context.
    Evm {
        /// Address authorized to unlock on behalf of the taker.
        unlock_authority: Address,
    },
    /// Solana context, carrying the claim and settle rewards the unlock
    /// relay pays out on the give side.
    Svm {
        /// Taker wallet public key.
        wallet: Address,
        /// Claim and settle reward amounts, in give-chain native units.
        reward_amounts: [U256; 2],
    },
}

/// Swap parameters handed to the combined pre-swap + fulfill builder.
#[derive(Debug, Clone, Copy)]
pub struct SwapParams {
    /// Slippage allowance for the reserve-to-take swap, in basis points.
    pub slippage_bps: u32,
    /// The client's internal slippage buffer. The estimator already prices
    /// slippage into the reserve amount, so callers set this to zero.
    pub internal_buffer_bps: u32,
}

/// Taker-side cost of the fulfill + unlock flow for one order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowCost {
    /// Cost on the take chain, in take-chain native units.
    pub take_native: U256,
    /// Cost of executing the unlock relay on the give chain, in give-chain
    /// native units.
    pub give_native: U256,
    /// Claim and settle rewards paid on a Solana give chain. Zero for other
    /// families.
    pub reward_amounts: [U256; 2],
}

/// Chain-scoped signing adapter: submits transactions, reports balances and
/// owns the taker's key material for its chain.
#[async_trait]
pub trait ChainAdapter: Send + Sync + fmt::Debug {
    /// Address the adapter signs and pays with.
    fn address(&self) -> Address;

    /// Balance of `token` held by the adapter's address. The zero address
    /// queries the native balance.
    async fn get_balance(&self, token: Address) -> Result<U256, ClientError>;

    /// Signs and broadcasts a transaction built by this chain's client.
    async fn send_transaction(&self, tx: ChainTransaction) -> Result<TxHash, ClientError>;

    /// Grants `spender` an allowance over `token` unless one is already in
    /// place.
    async fn ensure_allowance(&self, token: Address, spender: Address) -> Result<(), ClientError>;
}

/// Protocol operations of a single chain: order state queries and
/// transaction builders for fulfillment and unlock.
#[async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    /// Take-side state of an order on this chain. `None` when the chain has
    /// no record either way.
    async fn get_take_order_status(
        &self,
        order_id: OrderId,
    ) -> Result<Option<TakeOrderState>, ClientError>;

    /// Give-side state of an order on this chain.
    async fn get_give_order_status(
        &self,
        order_id: OrderId,
    ) -> Result<Option<GiveOrderState>, ClientError>;

    /// Native amount to attach to an unlock so the relay can execute it on
    /// the give chain, on top of `fee_total` already accounted for.
    async fn get_amount_to_send(
        &self,
        take_chain: ChainId,
        give_chain: ChainId,
        fee_total: U256,
    ) -> Result<U256, ClientError>;

    /// Full taker-side cost of fulfilling and unlocking `order`, priced with
    /// the given native-currency USD rates.
    async fn get_taker_flow_cost(
        &self,
        order: &Order,
        give_native_price: f64,
        take_native_price: f64,
    ) -> Result<FlowCost, ClientError>;

    /// Builds a transaction that swaps `reserve_dst_token` into the take
    /// token and fulfills the order in one go.
    async fn preswap_and_fulfill_order(
        &self,
        order: &Order,
        order_id: OrderId,
        reserve_dst_token: Address,
        swap: SwapParams,
        payload: FulfillPayload,
    ) -> Result<ChainTransaction, ClientError>;

    /// Builds a plain fulfill for orders whose take token is already held in
    /// reserve.
    async fn fulfill_order(
        &self,
        order: &Order,
        order_id: OrderId,
        payload: FulfillPayload,
    ) -> Result<ChainTransaction, ClientError>;

    /// Builds a single unlock transaction releasing the give-side funds of
    /// `orders` to `beneficiary` on their shared give chain.
    async fn send_unlock_order(
        &self,
        orders: &[(OrderId, Order)],
        beneficiary: Address,
        execution_fee: U256,
        payload: UnlockPayload,
    ) -> Result<ChainTransaction, ClientError>;

    /// One-time chain bootstrap before orders are accepted. Solana clients
    /// initialize their address-lookup tables here; other families have
    /// nothing to do.
    async fn initialize_lookup_tables(&self) -> Result<(), ClientError> {
        Ok(())
    }
}
