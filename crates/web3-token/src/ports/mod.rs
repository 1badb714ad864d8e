//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that host applications call
//! - **Outbound (Driven)**: Capabilities the host supplies (signing, recovery, time)

pub mod inbound;
pub mod outbound;
