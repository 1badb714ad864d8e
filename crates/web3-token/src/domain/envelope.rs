//! # Token Envelope
//!
//! The transportable token: standard base64 of the JSON object
//! `{"signature": ..., "body": ...}`. The result is printable ASCII with no
//! whitespace, safe for header-like transports.

use super::errors::{ValidationError, VerificationError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Signature plus the exact canonical text it covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub signature: String,
    pub body: String,
}

impl Envelope {
    pub fn new(signature: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            body: body.into(),
        }
    }

    /// Serialize into the opaque token string.
    pub fn encode(&self) -> Result<String, ValidationError> {
        let json =
            serde_json::to_vec(self).map_err(|e| ValidationError::Encoding(e.to_string()))?;
        Ok(BASE64.encode(json))
    }

    /// Recover the envelope from a token string.
    ///
    /// Surrounding whitespace is ignored; anything else that is not base64
    /// of a JSON object with string `signature` and `body` fields is a
    /// [`VerificationError::MalformedToken`]. Extra JSON fields are ignored.
    pub fn decode(token: &str) -> Result<Self, VerificationError> {
        let bytes = BASE64
            .decode(token.trim())
            .map_err(|_| VerificationError::MalformedToken)?;
        serde_json::from_slice(&bytes).map_err(|_| VerificationError::MalformedToken)
    }
}
