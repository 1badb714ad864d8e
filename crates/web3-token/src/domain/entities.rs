//! # Domain Entities
//!
//! Core data structures for building and verifying sign-in tokens.

use super::address::Address;
use super::errors::ValidationError;
use super::validation::ensure_no_line_feed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token version written into every message body.
pub const TOKEN_VERSION: &str = "2";

/// Largest generated nonce value (inclusive).
pub const MAX_NONCE: u32 = 99_999_999;

/// Names of the string-valued parameters, in validation order.
const STRING_FIELDS: [&str; 5] = ["domain", "uri", "statement", "expires_in", "request_id"];

// =============================================================================
// Sign Parameters
// =============================================================================

/// Caller input for building a token.
///
/// `expiration_time` takes precedence over `expires_in`; when neither is
/// given the token lives for one day. A bare string converts into
/// parameters carrying only `expires_in`:
///
/// ```
/// use web3_token::SignParameters;
///
/// let params = SignParameters::from("2h");
/// assert_eq!(params.expires_in.as_deref(), Some("2h"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignParameters {
    /// Host requesting the sign-in, e.g. `example.com`
    pub domain: Option<String>,
    /// Absolute URL of the resource being signed into
    pub uri: Option<String>,
    /// Human-readable statement shown to the signer
    pub statement: Option<String>,
    /// Chain id; `Some(0)` is rendered as chain zero
    pub chain_id: Option<u64>,
    /// Absolute expiration time
    pub expiration_time: Option<DateTime<Utc>>,
    /// Relative lifetime such as `"1d"` or `"30m"`
    pub expires_in: Option<String>,
    /// Time before which the token is not valid
    pub not_before: Option<DateTime<Utc>>,
    /// Request a random informational nonce
    pub nonce: bool,
    /// Opaque request identifier
    pub request_id: Option<String>,
}

impl SignParameters {
    /// Parse parameters from untyped JSON input.
    ///
    /// The line-feed rule runs over every string field first. Field-level
    /// type errors then map to the matching validation error;
    /// anything else is [`ValidationError::InvalidParameters`].
    pub fn from_json(input: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value = serde_json::from_str(input)
            .map_err(|e| ValidationError::InvalidParameters(e.to_string()))?;

        for field in STRING_FIELDS {
            if let Some(text) = value.get(field).and_then(serde_json::Value::as_str) {
                ensure_no_line_feed(field, text)?;
            }
        }

        if let Some(chain_id) = value.get("chain_id") {
            if !chain_id.is_null() && !chain_id.is_u64() {
                return Err(ValidationError::InvalidChainId);
            }
        }

        for field in ["expiration_time", "not_before"] {
            if let Some(timestamp) = value.get(field).filter(|v| !v.is_null()) {
                let parses = timestamp
                    .as_str()
                    .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
                if !parses {
                    return Err(ValidationError::InvalidTimestamp { field });
                }
            }
        }

        serde_json::from_value(value).map_err(|e| ValidationError::InvalidParameters(e.to_string()))
    }

    /// All string-valued fields, by name, for the line-feed rule.
    pub(crate) fn string_fields(&self) -> [(&'static str, Option<&str>); 5] {
        let [domain, uri, statement, expires_in, request_id] = STRING_FIELDS;
        [
            (domain, self.domain.as_deref()),
            (uri, self.uri.as_deref()),
            (statement, self.statement.as_deref()),
            (expires_in, self.expires_in.as_deref()),
            (request_id, self.request_id.as_deref()),
        ]
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_expiration_time(mut self, expiration_time: DateTime<Utc>) -> Self {
        self.expiration_time = Some(expiration_time);
        self
    }

    pub fn with_expires_in(mut self, expires_in: impl Into<String>) -> Self {
        self.expires_in = Some(expires_in.into());
        self
    }

    pub fn with_not_before(mut self, not_before: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self
    }

    pub fn with_nonce(mut self) -> Self {
        self.nonce = true;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl From<&str> for SignParameters {
    fn from(expires_in: &str) -> Self {
        Self::default().with_expires_in(expires_in)
    }
}

impl From<String> for SignParameters {
    fn from(expires_in: String) -> Self {
        Self::default().with_expires_in(expires_in)
    }
}

// =============================================================================
// Message Body
// =============================================================================

/// Canonical, fully derived token body.
///
/// Built once from [`SignParameters`], rendered to the signed text, and
/// reconstructed from that text on verification. Timestamps carry
/// millisecond precision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub version: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
    pub not_before: Option<DateTime<Utc>>,
    pub chain_id: Option<u64>,
    pub nonce: Option<u32>,
    pub request_id: Option<String>,
    pub domain: Option<String>,
    pub statement: Option<String>,
    pub uri: Option<String>,
}

// =============================================================================
// Verification Output
// =============================================================================

/// Successful verification: who signed, and what they signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub address: Address,
    pub body: MessageBody,
}

/// Decoded token without time-window or constraint checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecryptedToken {
    pub version: String,
    pub address: Address,
    pub body: MessageBody,
}
