//! # Inbound Ports (Driving Ports / API)
//!
//! The public API host applications use to issue and check tokens.

use crate::domain::config::VerifyOptions;
use crate::domain::entities::{DecryptedToken, SignParameters, VerificationResult};
use crate::domain::errors::{ValidationError, VerificationError};
use crate::ports::outbound::MessageSigner;

/// Primary token API.
///
/// Calls are independent and stateless apart from reading the clock, so
/// implementations are shared freely across tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait Web3TokenApi: Send + Sync {
    /// Build the canonical message, have `signer` sign it, and return the
    /// opaque token string.
    ///
    /// # Errors
    /// * Parameter problems are reported before `signer` is called
    /// * Signer failures and unusable signer output are reported after
    async fn sign(
        &self,
        signer: &dyn MessageSigner,
        params: SignParameters,
    ) -> Result<String, ValidationError>;

    /// Decode a token, recover its signer and enforce the time window and
    /// any constraints in `opts`.
    ///
    /// Steps run in order and the first failure is returned: decode,
    /// recover signer, reparse body, time window, constraints.
    fn verify(
        &self,
        token: &str,
        opts: &VerifyOptions,
    ) -> Result<VerificationResult, VerificationError>;

    /// Decode a token and recover its signer without time-window or
    /// constraint checks.
    fn decrypt(&self, token: &str) -> Result<DecryptedToken, VerificationError>;
}
