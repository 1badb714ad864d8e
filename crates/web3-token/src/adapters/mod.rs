//! # Adapters Layer
//!
//! Concrete implementations of the outbound ports.

pub mod ecdsa;

pub use ecdsa::{EthereumRecovery, LocalWallet};
