//! # Taker
//!
//! Cross-chain order taker for a decentralized limit-order bridging
//! protocol. The taker subscribes to a feed of cross-chain swap orders,
//! fulfills the profitable ones on their destination chains out of the
//! operator's reserves, and batches the cross-chain unlocks that release
//! the makers' locked funds to the operator's beneficiary.

pub mod chains;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod estimation;
pub mod executor;
pub mod feed;
pub mod filters;
pub mod hooks;
pub mod price;
pub mod processor;
pub mod spawn;
pub mod swap;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
