//! # Parameter Validation
//!
//! Rules applied to sign-in parameters before any field is derived.
//!
//! - No string field may contain a line feed (checked first, for every field)
//! - Domain must be a DNS host name (RFC 1035 labels)
//! - URI must be an absolute URL with an authority
//! - Timestamps must be renderable as `YYYY-MM-DDTHH:MM:SS.mmmZ`

use super::entities::SignParameters;
use super::errors::ValidationError;
use chrono::{DateTime, Datelike, Utc};
use url::Url;

/// Maximum host name length (RFC 1035)
pub const MAX_DOMAIN_LENGTH: usize = 253;

/// Maximum label length (RFC 1035)
pub const MAX_LABEL_LENGTH: usize = 63;

/// Validate a full parameter set.
///
/// The line-feed rule runs over every string field before any other rule.
pub fn validate_params(params: &SignParameters) -> Result<(), ValidationError> {
    for (field, value) in params.string_fields() {
        if let Some(value) = value {
            ensure_no_line_feed(field, value)?;
        }
    }

    if let Some(domain) = params.domain.as_deref() {
        validate_domain(domain)?;
    }

    if let Some(uri) = params.uri.as_deref() {
        validate_uri(uri)?;
    }

    if let Some(expiration_time) = params.expiration_time.as_ref() {
        validate_timestamp("expiration_time", expiration_time)?;
    }

    if let Some(not_before) = params.not_before.as_ref() {
        validate_timestamp("not_before", not_before)?;
    }

    Ok(())
}

/// Reject values that would break the line-based canonical text.
pub fn ensure_no_line_feed(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.contains('\n') {
        return Err(ValidationError::LineFeed { field });
    }
    Ok(())
}

/// Validate a DNS host name.
///
/// Labels are 1-63 characters of ASCII alphanumerics and hyphens, never
/// starting or ending with a hyphen. The whole name is at most 253
/// characters. A single trailing dot is not accepted.
///
/// ```
/// use web3_token::domain::validation::validate_domain;
///
/// assert!(validate_domain("example.com").is_ok());
/// assert!(validate_domain("login.my-app.io").is_ok());
/// assert!(validate_domain("not a domain!").is_err());
/// assert!(validate_domain("-bad.com").is_err());
/// ```
pub fn validate_domain(domain: &str) -> Result<(), ValidationError> {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LENGTH {
        return Err(ValidationError::InvalidDomain);
    }

    if domain.split('.').all(is_valid_label) {
        Ok(())
    } else {
        Err(ValidationError::InvalidDomain)
    }
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
        return false;
    }
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }
    label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

/// Validate an absolute URL with scheme and authority.
pub fn validate_uri(uri: &str) -> Result<(), ValidationError> {
    match Url::parse(uri) {
        Ok(parsed) if parsed.has_host() => Ok(()),
        _ => Err(ValidationError::InvalidUri),
    }
}

/// Timestamps must fall in years 0000-9999 to have a four-digit ISO-8601 form.
pub fn validate_timestamp(
    field: &'static str,
    timestamp: &DateTime<Utc>,
) -> Result<(), ValidationError> {
    if (0..=9999).contains(&timestamp.year()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidTimestamp { field })
    }
}
