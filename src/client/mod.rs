//! Per-wallet session against the reward service and chain
//!
//! A session wraps one wallet's signing key and (optionally) one proxy.
//! All remote state is reconstructed per run; nothing is persisted here.

pub mod api;
pub mod chain;
pub mod session;

pub use chain::{wei_to_eth, ChainClient};
pub use session::{MiningState, SessionClient, MINING_WINDOW_SECS};
