//! # Outbound Ports (Driven Ports / SPI)
//!
//! Capabilities this library consumes but does not implement itself:
//! signing a message, recovering a signer from a signature, and reading
//! the clock.

use crate::domain::address::Address;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

// =============================================================================
// Signer
// =============================================================================

/// Error from a signer capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    /// The signer (or its user) declined to sign
    #[error("Signing rejected: {reason}")]
    Rejected { reason: String },

    /// The signer could not be reached or failed internally
    #[error("Signer unavailable: {0}")]
    Unavailable(String),

    /// Private key material is not a valid secp256k1 scalar
    #[error("Invalid signing key")]
    InvalidKey,
}

/// Signs the canonical message text.
///
/// This is the only suspension point of token signing; implementations may
/// prompt a wallet, call hardware, or go over the network. No timeout is
/// imposed here.
#[async_trait::async_trait]
pub trait MessageSigner: Send + Sync {
    /// Sign `message` and return the signature in the scheme's text form.
    async fn sign_message(&self, message: &str) -> Result<String, SignerError>;
}

// =============================================================================
// Signer Recovery
// =============================================================================

/// Error from a signature recovery primitive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecoveryError {
    /// The signature format is invalid (wrong length, invalid encoding)
    #[error("Invalid signature format")]
    InvalidFormat,

    /// Invalid recovery ID (v must be 0, 1, 27, or 28)
    #[error("Invalid recovery ID: {0}")]
    InvalidRecoveryId(u8),

    /// Signature has high S value (EIP-2 malleability protection)
    #[error("Malleable signature (high S value)")]
    MalleableSignature,

    /// Failed to recover public key from signature
    #[error("Failed to recover public key")]
    RecoveryFailed,
}

/// Recovers the signing identity from a message and its signature.
///
/// Must be pure and deterministic.
pub trait AddressRecovery: Send + Sync {
    fn recover_address(&self, message: &str, signature: &str) -> Result<Address, RecoveryError>;
}

// =============================================================================
// Time
// =============================================================================

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven time source for tests and replays.
#[derive(Debug)]
pub struct ManualTimeSource {
    millis: AtomicI64,
}

impl ManualTimeSource {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(initial.timestamp_millis()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    pub fn set(&self, time: DateTime<Utc>) {
        self.millis.store(time.timestamp_millis(), Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}
