//! # Web3 Token
//!
//! Self-contained, signature-based bearer tokens for Ethereum accounts.
//!
//! A token carries a canonical, human-readable message (domain, statement,
//! URI, chain id, issuance and expiry times, optional nonce and request id)
//! together with a signature over that exact text. Verifying a token
//! recovers the signer address from the signature, so no server-side
//! session state is needed.
//!
//! ## Architecture
//!
//! This crate follows hexagonal architecture:
//! - **Domain Layer** (`domain/`): Message grammar, validation, envelope coding
//! - **Ports Layer** (`ports/`): Signer, recovery and clock traits
//! - **Adapters Layer** (`adapters/`): secp256k1 recovery and a local wallet
//! - **Service Layer** (`service.rs`): Wires domain logic to ports
//!
//! ## Security Notes
//!
//! - **Malleability Prevention (EIP-2)**: Signatures with high S values are rejected
//! - **Canonical Form**: A body that does not re-render byte-for-byte is rejected
//! - **Replay**: Tokens are bearer credentials until they expire; callers
//!   wanting single use must track `nonce`/`request_id` themselves
//!
//! ## Example
//!
//! ```no_run
//! use web3_token::{LocalWallet, SignParameters, VerifyOptions};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let wallet = LocalWallet::random();
//! let params = SignParameters::default()
//!     .with_domain("example.com")
//!     .with_expires_in("1d");
//!
//! let token = web3_token::sign(&wallet, params).await?;
//! let verified = web3_token::verify(&token, &VerifyOptions::default().with_domain("example.com"))?;
//! assert_eq!(verified.address, wallet.address());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::{EthereumRecovery, LocalWallet};
pub use domain::address::{Address, ParseAddressError};
pub use domain::config::{TokenConfig, VerifyOptions};
pub use domain::duration::parse_duration;
pub use domain::entities::{
    DecryptedToken, MessageBody, SignParameters, VerificationResult, TOKEN_VERSION,
};
pub use domain::errors::{ValidationError, VerificationError};
pub use ports::inbound::Web3TokenApi;
pub use ports::outbound::{
    AddressRecovery, ManualTimeSource, MessageSigner, RecoveryError, SignerError,
    SystemTimeSource, TimeSource,
};
pub use service::Web3TokenService;

fn default_service() -> Web3TokenService<EthereumRecovery> {
    Web3TokenService::with_defaults(EthereumRecovery)
}

/// Sign a token with the Ethereum recovery scheme, the system clock and
/// default configuration.
///
/// `params` accepts a full [`SignParameters`] or an `expires_in` shorthand
/// such as `"1d"`.
pub async fn sign(
    signer: &dyn MessageSigner,
    params: impl Into<SignParameters>,
) -> Result<String, ValidationError> {
    default_service().sign(signer, params.into()).await
}

/// Verify a token with the Ethereum recovery scheme and the system clock.
pub fn verify(token: &str, opts: &VerifyOptions) -> Result<VerificationResult, VerificationError> {
    default_service().verify(token, opts)
}

/// Decode a token and recover its signer without time or constraint checks.
pub fn decrypt(token: &str) -> Result<DecryptedToken, VerificationError> {
    default_service().decrypt(token)
}
