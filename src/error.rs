//! Per-order error taxonomy.

use crate::{client::ClientError, estimation::EstimationError};
use alloy::primitives::{Address, U256};
use thiserror::Error;

/// How the processor reacts to a failed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Drop the order. It will not be reconsidered.
    Fatal,
    /// Defer the order to the mempool for periodic retry.
    Retry,
}

/// Everything that can go wrong while processing a single order. No variant
/// ever terminates the processor or the executor; each failure is confined
/// to the order it concerns.
#[derive(Debug, Error)]
pub enum OrderError {
    /// No token bucket spans both the give and the take chain.
    #[error("no reserve bucket covers the order route")]
    NoReserveCoverage,
    /// The destination chain already shows the order fulfilled.
    #[error("order already fulfilled on the take chain")]
    AlreadyFulfilled,
    /// The source chain does not show the order in `Created` state.
    #[error("order is not live on the give chain")]
    NotCreatedOnSource,
    /// The order's margin does not clear the configured minimum.
    #[error("margin {margin_bps} bps below required {required_bps} bps")]
    Unprofitable {
        /// Estimated margin of the order.
        margin_bps: i64,
        /// Configured minimum margin.
        required_bps: u32,
    },
    /// The operator does not hold enough reserve on the destination chain.
    #[error("reserve balance {balance} below required {required}")]
    InsufficientReserve {
        /// Current reserve token balance.
        balance: U256,
        /// Reserve amount the fulfillment needs.
        required: U256,
    },
    /// Broadcasting the fulfill transaction failed.
    #[error("fulfill send failed: {0}")]
    FulfillSendFailed(#[source] ClientError),
    /// The submitted fulfillment never became visible on chain within the
    /// poll bound. Operator intervention is needed.
    #[error("fulfillment not observed after {0} status polls")]
    FulfillmentNotObserved(usize),
    /// Strict policy: the take token is not in the approved set.
    #[error("take token {0} is not approved")]
    TakeTokenNotApproved(Address),
    /// A transient failure talking to an external service.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl OrderError {
    /// The retry classification of this error.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Unprofitable { .. }
            | Self::InsufficientReserve { .. }
            | Self::FulfillSendFailed(_)
            | Self::Transient(_) => Disposition::Retry,
            Self::NoReserveCoverage
            | Self::AlreadyFulfilled
            | Self::NotCreatedOnSource
            | Self::FulfillmentNotObserved(_)
            | Self::TakeTokenNotApproved(_) => Disposition::Fatal,
        }
    }
}

impl From<ClientError> for OrderError {
    fn from(err: ClientError) -> Self {
        Self::Transient(err.to_string())
    }
}

impl From<EstimationError> for OrderError {
    fn from(err: EstimationError) -> Self {
        match err {
            EstimationError::NoReserveCoverage => Self::NoReserveCoverage,
            err => Self::Transient(err.to_string()),
        }
    }
}
