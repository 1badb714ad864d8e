//! # Token Errors
//!
//! Error types for token signing and verification.
//!
//! Signing fails with [`ValidationError`], verification with
//! [`VerificationError`]. Both carry a stable reason string so callers
//! can branch (e.g. expired vs. invalid signature).

use thiserror::Error;

/// Errors raised while building or signing a token.
///
/// Everything except [`ValidationError::Signer`],
/// [`ValidationError::InvalidSignerOutput`] and [`ValidationError::Encoding`]
/// is detected before the signer is invoked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A string parameter contains a line feed
    #[error("{field} cannot contain LF")]
    LineFeed { field: &'static str },

    /// Domain is empty or not a DNS host name
    #[error("invalid domain")]
    InvalidDomain,

    /// URI is not an absolute URL with an authority
    #[error("invalid uri")]
    InvalidUri,

    /// Chain id supplied as something other than a non-negative integer
    #[error("chain_id must be a non-negative int")]
    InvalidChainId,

    /// Statement would be read back as the domain header line
    #[error("statement cannot read as a domain header")]
    AmbiguousStatement,

    /// Timestamp cannot be represented in the canonical format
    #[error("{field} must be a valid timestamp")]
    InvalidTimestamp { field: &'static str },

    /// Relative duration string could not be parsed
    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    /// Untyped parameter input failed to deserialize
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Envelope could not be serialized
    #[error("token encoding failed: {0}")]
    Encoding(String),

    /// The signer capability failed
    #[error("signer failed: {0}")]
    Signer(String),

    /// The signer returned something that is not a usable signature string
    #[error("signer must return a non-empty signature string")]
    InvalidSignerOutput,
}

/// Errors raised while decoding or verifying a token.
///
/// Verification is a linear pipeline; the first violated rule wins.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    /// Envelope is not valid base64 / JSON or lacks a field
    #[error("malformed token")]
    MalformedToken,

    /// Signer identity could not be recovered from the signature
    #[error("invalid signature")]
    InvalidSignature,

    /// Signed text does not follow the canonical grammar
    #[error("malformed body: {0}")]
    MalformedBody(String),

    /// Body carries a token version this library does not understand
    #[error("unsupported token version: {0}")]
    UnsupportedVersion(String),

    /// Current time is at or past the expiration time
    #[error("token expired")]
    Expired,

    /// Current time is before the issued-at or not-before time
    #[error("token not yet valid")]
    NotYetValid,

    /// A caller-supplied constraint does not match the token
    #[error("{field} mismatch")]
    Mismatch { field: &'static str },
}

impl VerificationError {
    pub(crate) fn malformed_body(reason: impl Into<String>) -> Self {
        Self::MalformedBody(reason.into())
    }
}
