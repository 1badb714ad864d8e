//! Token configuration and verification options
//!
//! # Example
//!
//! ```
//! use web3_token::domain::config::{TokenConfig, VerifyOptions};
//!
//! let config = TokenConfig::default()
//!     .with_default_expires_in("12h")
//!     .with_ambient_uri("https://example.com/login");
//! config.validate().expect("valid config");
//!
//! let opts = VerifyOptions::default().with_domain("example.com");
//! ```

use super::address::Address;
use super::duration::{parse_duration, DEFAULT_EXPIRES_IN};
use super::errors::ValidationError;
use super::validation::{ensure_no_line_feed, validate_uri};
use serde::{Deserialize, Serialize};
use std::env;

/// Host-level settings for building and verifying tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime used when the caller gives neither `expiration_time` nor `expires_in`
    pub default_expires_in: String,
    /// URI of the host's page context, used when the caller supplies no `uri`
    pub ambient_uri: Option<String>,
    /// Tolerance applied to every time-window comparison (milliseconds)
    pub clock_tolerance_ms: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            default_expires_in: DEFAULT_EXPIRES_IN.to_string(),
            ambient_uri: None,
            clock_tolerance_ms: 0,
        }
    }
}

impl TokenConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WEB3_TOKEN_EXPIRES_IN`: default lifetime (default: 1d)
    /// - `WEB3_TOKEN_AMBIENT_URI`: ambient page URI (default: none)
    /// - `WEB3_TOKEN_CLOCK_TOLERANCE_MS`: verification clock tolerance (default: 0)
    ///
    /// The result is not validated; call [`TokenConfig::validate`].
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_expires_in: env::var("WEB3_TOKEN_EXPIRES_IN")
                .unwrap_or(defaults.default_expires_in),

            ambient_uri: env::var("WEB3_TOKEN_AMBIENT_URI")
                .ok()
                .filter(|v| !v.is_empty()),

            clock_tolerance_ms: env::var("WEB3_TOKEN_CLOCK_TOLERANCE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.clock_tolerance_ms),
        }
    }

    /// Check that the default lifetime parses and the ambient URI is usable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_no_line_feed("expires_in", &self.default_expires_in)?;
        parse_duration(&self.default_expires_in)?;

        if let Some(uri) = self.ambient_uri.as_deref() {
            ensure_no_line_feed("uri", uri)?;
            validate_uri(uri)?;
        }

        Ok(())
    }

    pub fn with_default_expires_in(mut self, expires_in: impl Into<String>) -> Self {
        self.default_expires_in = expires_in.into();
        self
    }

    pub fn with_ambient_uri(mut self, uri: impl Into<String>) -> Self {
        self.ambient_uri = Some(uri.into());
        self
    }

    pub fn with_clock_tolerance_ms(mut self, tolerance_ms: u64) -> Self {
        self.clock_tolerance_ms = tolerance_ms;
        self
    }
}

/// Expected values a verified token must carry.
///
/// Every supplied field must equal the reconstructed field exactly;
/// absent fields are not checked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyOptions {
    pub domain: Option<String>,
    pub statement: Option<String>,
    pub uri: Option<String>,
    pub chain_id: Option<u64>,
    pub request_id: Option<String>,
    /// Expected signer
    pub address: Option<Address>,
}

impl VerifyOptions {
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }
}
