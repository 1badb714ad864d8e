//! # Canonical Message
//!
//! Builds a [`MessageBody`] from [`SignParameters`], renders it into the
//! exact text that gets signed, and parses that text back.
//!
//! ## Format
//!
//! ```text
//! example.com wants you to sign in with your Ethereum account.
//!
//! I accept the Terms of Service
//!
//! URI: https://example.com/login
//! Web3 Token Version: 2
//! Chain ID: 1
//! Nonce: 8493021
//! Issued At: 2024-05-01T12:00:00.000Z
//! Expiration Time: 2024-05-02T12:00:00.000Z
//! Not Before: 2024-05-01T13:00:00.000Z
//! Request ID: req-42
//! ```
//!
//! The domain header and statement are optional, each followed by one blank
//! line. Labelled lines appear in the fixed order above and are omitted when
//! the field is absent; `Issued At` and `Expiration Time` are always present.
//! Lines are joined with LF, without a trailing LF.

use super::config::TokenConfig;
use super::duration::parse_duration;
use super::entities::{MessageBody, SignParameters, MAX_NONCE, TOKEN_VERSION};
use super::errors::{ValidationError, VerificationError};
use super::validation::{validate_domain, validate_params, validate_timestamp};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rand::Rng;

/// Suffix of the first line when a domain is present.
pub const DOMAIN_HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account.";

pub const LABEL_URI: &str = "URI";
pub const LABEL_VERSION: &str = "Web3 Token Version";
pub const LABEL_CHAIN_ID: &str = "Chain ID";
pub const LABEL_NONCE: &str = "Nonce";
pub const LABEL_ISSUED_AT: &str = "Issued At";
pub const LABEL_EXPIRATION_TIME: &str = "Expiration Time";
pub const LABEL_NOT_BEFORE: &str = "Not Before";
pub const LABEL_REQUEST_ID: &str = "Request ID";

// =============================================================================
// BUILD
// =============================================================================

/// Build a message body at the current system time with default settings.
pub fn build(params: &SignParameters) -> Result<MessageBody, ValidationError> {
    build_at(params, Utc::now(), &TokenConfig::default())
}

/// Build a message body as of `now`.
///
/// Validation runs before any field is derived. `now` and every supplied
/// timestamp are truncated to milliseconds.
pub fn build_at(
    params: &SignParameters,
    now: DateTime<Utc>,
    config: &TokenConfig,
) -> Result<MessageBody, ValidationError> {
    validate_params(params)?;

    // The preamble grammar cannot tell such a statement from a domain header.
    if params
        .statement
        .as_deref()
        .is_some_and(|statement| domain_from_header(statement).is_some())
    {
        return Err(ValidationError::AmbiguousStatement);
    }

    let issued_at = now.trunc_subsecs(3);
    validate_timestamp("issued_at", &issued_at)?;

    let expiration_time = match (&params.expiration_time, params.expires_in.as_deref()) {
        (Some(expiration_time), _) => expiration_time.trunc_subsecs(3),
        (None, Some(expires_in)) => offset(issued_at, expires_in)?,
        (None, None) => offset(issued_at, &config.default_expires_in)?,
    };

    let nonce = params
        .nonce
        .then(|| rand::thread_rng().gen_range(0..=MAX_NONCE));

    Ok(MessageBody {
        version: TOKEN_VERSION.to_string(),
        issued_at,
        expiration_time,
        not_before: params.not_before.map(|t| t.trunc_subsecs(3)),
        chain_id: params.chain_id,
        nonce,
        request_id: non_empty(params.request_id.as_deref()),
        domain: non_empty(params.domain.as_deref()),
        statement: non_empty(params.statement.as_deref()),
        uri: non_empty(params.uri.as_deref()).or_else(|| config.ambient_uri.clone()),
    })
}

fn offset(issued_at: DateTime<Utc>, expires_in: &str) -> Result<DateTime<Utc>, ValidationError> {
    let lifetime = parse_duration(expires_in)?;
    let expiration_time = issued_at
        .checked_add_signed(lifetime)
        .ok_or_else(|| ValidationError::InvalidDuration(expires_in.to_string()))?;
    validate_timestamp("expiration_time", &expiration_time)?;
    Ok(expiration_time)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

// =============================================================================
// RENDER
// =============================================================================

/// ISO-8601 with milliseconds and `Z`, e.g. `2024-05-01T12:00:00.000Z`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render the canonical text that is signed.
pub fn render(body: &MessageBody) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(domain) = &body.domain {
        lines.push(format!("{domain}{DOMAIN_HEADER_SUFFIX}"));
        lines.push(String::new());
    }

    if let Some(statement) = &body.statement {
        lines.push(statement.clone());
        lines.push(String::new());
    }

    let labelled = [
        (LABEL_URI, body.uri.clone()),
        (LABEL_VERSION, Some(body.version.clone())),
        (LABEL_CHAIN_ID, body.chain_id.map(|v| v.to_string())),
        (LABEL_NONCE, body.nonce.map(|v| v.to_string())),
        (LABEL_ISSUED_AT, Some(format_timestamp(&body.issued_at))),
        (LABEL_EXPIRATION_TIME, Some(format_timestamp(&body.expiration_time))),
        (LABEL_NOT_BEFORE, body.not_before.as_ref().map(format_timestamp)),
        (LABEL_REQUEST_ID, body.request_id.clone()),
    ];

    for (label, value) in labelled {
        if let Some(value) = value {
            lines.push(format!("{label}: {value}"));
        }
    }

    lines.join("\n")
}

// =============================================================================
// PARSE
// =============================================================================

/// Labelled values collected while parsing, one slot per label.
#[derive(Default)]
struct LabelledFields<'a> {
    uri: Option<&'a str>,
    version: Option<&'a str>,
    chain_id: Option<&'a str>,
    nonce: Option<&'a str>,
    issued_at: Option<&'a str>,
    expiration_time: Option<&'a str>,
    not_before: Option<&'a str>,
    request_id: Option<&'a str>,
}

impl<'a> LabelledFields<'a> {
    fn insert(&mut self, label: &str, value: &'a str) -> Result<(), VerificationError> {
        let slot = match label {
            LABEL_URI => &mut self.uri,
            LABEL_VERSION => &mut self.version,
            LABEL_CHAIN_ID => &mut self.chain_id,
            LABEL_NONCE => &mut self.nonce,
            LABEL_ISSUED_AT => &mut self.issued_at,
            LABEL_EXPIRATION_TIME => &mut self.expiration_time,
            LABEL_NOT_BEFORE => &mut self.not_before,
            LABEL_REQUEST_ID => &mut self.request_id,
            other => {
                return Err(VerificationError::malformed_body(format!(
                    "unknown label {other:?}"
                )))
            }
        };
        if slot.is_some() {
            return Err(VerificationError::malformed_body(format!(
                "duplicate label {label:?}"
            )));
        }
        *slot = Some(value);
        Ok(())
    }
}

/// Reconstruct a [`MessageBody`] from canonical text.
///
/// The text must be exactly what [`render`] produces for the reconstructed
/// body: unknown, duplicate or reordered labels and non-canonical timestamp
/// spellings are rejected.
pub fn parse(text: &str) -> Result<MessageBody, VerificationError> {
    let lines: Vec<&str> = text.split('\n').collect();

    // Labelled lines are the final block; everything before the last blank
    // line is the optional header/statement preamble.
    let fields_start = lines
        .iter()
        .rposition(|line| line.is_empty())
        .map_or(0, |i| i + 1);
    let (domain, statement) = parse_preamble(&lines[..fields_start])?;

    let mut fields = LabelledFields::default();
    for line in &lines[fields_start..] {
        let (label, value) = line
            .split_once(": ")
            .ok_or_else(|| VerificationError::malformed_body(format!("unlabelled line {line:?}")))?;
        fields.insert(label, value)?;
    }

    let version = fields
        .version
        .ok_or_else(|| VerificationError::malformed_body("missing Web3 Token Version"))?;
    if version != TOKEN_VERSION {
        return Err(VerificationError::UnsupportedVersion(version.to_string()));
    }

    let issued_at = fields
        .issued_at
        .ok_or_else(|| VerificationError::malformed_body("missing Issued At"))
        .and_then(|v| parse_timestamp(LABEL_ISSUED_AT, v))?;
    let expiration_time = fields
        .expiration_time
        .ok_or_else(|| VerificationError::malformed_body("missing Expiration Time"))
        .and_then(|v| parse_timestamp(LABEL_EXPIRATION_TIME, v))?;
    let not_before = fields
        .not_before
        .map(|v| parse_timestamp(LABEL_NOT_BEFORE, v))
        .transpose()?;

    let chain_id = fields
        .chain_id
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| VerificationError::malformed_body("invalid Chain ID"))
        })
        .transpose()?;
    let nonce = fields
        .nonce
        .map(|v| match v.parse::<u32>() {
            Ok(n) if n <= MAX_NONCE => Ok(n),
            _ => Err(VerificationError::malformed_body("invalid Nonce")),
        })
        .transpose()?;

    let body = MessageBody {
        version: version.to_string(),
        issued_at,
        expiration_time,
        not_before,
        chain_id,
        nonce,
        request_id: fields.request_id.map(str::to_string),
        domain,
        statement,
        uri: fields.uri.map(str::to_string),
    };

    if render(&body) != text {
        return Err(VerificationError::malformed_body("not in canonical form"));
    }

    Ok(body)
}

/// Preamble is zero, one or two `(line, blank)` pairs: an optional domain
/// header followed by an optional statement.
fn parse_preamble(
    lines: &[&str],
) -> Result<(Option<String>, Option<String>), VerificationError> {
    let malformed = || VerificationError::malformed_body("invalid header section");

    if lines.len() % 2 != 0 || lines.len() > 4 {
        return Err(malformed());
    }
    let mut sections = Vec::with_capacity(2);
    for pair in lines.chunks(2) {
        if pair[0].is_empty() || !pair[1].is_empty() {
            return Err(malformed());
        }
        sections.push(pair[0]);
    }

    match sections.as_slice() {
        [] => Ok((None, None)),
        [only] => match domain_from_header(only) {
            Some(domain) => Ok((Some(domain), None)),
            None => Ok((None, Some((*only).to_string()))),
        },
        [header, statement] => {
            let domain = domain_from_header(header).ok_or_else(malformed)?;
            Ok((Some(domain), Some((*statement).to_string())))
        }
        _ => Err(malformed()),
    }
}

fn domain_from_header(line: &str) -> Option<String> {
    line.strip_suffix(DOMAIN_HEADER_SUFFIX)
        .filter(|domain| validate_domain(domain).is_ok())
        .map(str::to_string)
}

fn parse_timestamp(label: &str, value: &str) -> Result<DateTime<Utc>, VerificationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| VerificationError::malformed_body(format!("invalid {label}")))
}
