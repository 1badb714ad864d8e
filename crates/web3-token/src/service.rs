//! # Web3 Token Service
//!
//! Application service layer that implements the `Web3TokenApi` trait.
//!
//! ## Architecture
//!
//! This is the hexagonal "application service" that:
//! - Implements the inbound port (`Web3TokenApi`)
//! - Uses the outbound ports (`MessageSigner`, `AddressRecovery`, `TimeSource`)
//! - Delegates message building, rendering, parsing and envelope coding to
//!   the domain layer

use crate::domain::address::Address;
use crate::domain::config::{TokenConfig, VerifyOptions};
use crate::domain::entities::{DecryptedToken, MessageBody, SignParameters, VerificationResult};
use crate::domain::envelope::Envelope;
use crate::domain::errors::{ValidationError, VerificationError};
use crate::domain::message;
use crate::ports::inbound::Web3TokenApi;
use crate::ports::outbound::{AddressRecovery, MessageSigner, SystemTimeSource, TimeSource};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

/// Web3 Token Service.
///
/// Holds no per-call state; one instance serves concurrent `sign`/`verify`
/// calls without coordination.
pub struct Web3TokenService<R: AddressRecovery, T: TimeSource = SystemTimeSource> {
    recovery: R,
    time_source: T,
    config: TokenConfig,
}

impl<R: AddressRecovery> Web3TokenService<R, SystemTimeSource> {
    /// Create a service reading the system clock.
    ///
    /// # Arguments
    /// * `recovery` - Signature recovery primitive matching the signers in use
    /// * `config` - Host configuration (validated here)
    pub fn new(recovery: R, config: TokenConfig) -> Result<Self, ValidationError> {
        Self::with_time_source(recovery, SystemTimeSource, config)
    }

    /// Create a service with the system clock and [`TokenConfig::default`].
    pub fn with_defaults(recovery: R) -> Self {
        Self {
            recovery,
            time_source: SystemTimeSource,
            config: TokenConfig::default(),
        }
    }
}

impl<R: AddressRecovery, T: TimeSource> Web3TokenService<R, T> {
    /// Create a service with an explicit time source.
    pub fn with_time_source(
        recovery: R,
        time_source: T,
        config: TokenConfig,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            recovery,
            time_source,
            config,
        })
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn time_source(&self) -> &T {
        &self.time_source
    }

    /// Build the message body that [`Web3TokenApi::sign`] would sign now.
    pub fn build_body(&self, params: &SignParameters) -> Result<MessageBody, ValidationError> {
        message::build_at(params, self.time_source.now(), &self.config)
    }

    /// Decode, recover and reparse: the shared front half of `verify` and
    /// `decrypt`.
    fn open(&self, token: &str) -> Result<(Address, MessageBody), VerificationError> {
        let envelope = Envelope::decode(token)?;

        let address = self
            .recovery
            .recover_address(&envelope.body, &envelope.signature)
            .map_err(|e| {
                debug!(error = %e, "Signature recovery failed");
                VerificationError::InvalidSignature
            })?;

        let body = message::parse(&envelope.body)?;

        Ok((address, body))
    }

    fn check_time_window(
        &self,
        body: &MessageBody,
        now: DateTime<Utc>,
    ) -> Result<(), VerificationError> {
        let tolerance = i64::try_from(self.config.clock_tolerance_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX);
        let earliest = now.checked_add_signed(tolerance).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let latest = now.checked_sub_signed(tolerance).unwrap_or(DateTime::<Utc>::MIN_UTC);

        if latest >= body.expiration_time {
            return Err(VerificationError::Expired);
        }
        if earliest < body.issued_at {
            return Err(VerificationError::NotYetValid);
        }
        if let Some(not_before) = body.not_before {
            if earliest < not_before {
                return Err(VerificationError::NotYetValid);
            }
        }
        Ok(())
    }
}

/// Reject any supplied constraint that the token does not satisfy exactly.
fn check_constraints(
    address: &Address,
    body: &MessageBody,
    opts: &VerifyOptions,
) -> Result<(), VerificationError> {
    fn require<V: PartialEq + ?Sized>(
        field: &'static str,
        expected: Option<&V>,
        actual: Option<&V>,
    ) -> Result<(), VerificationError> {
        match expected {
            Some(expected) if actual != Some(expected) => {
                Err(VerificationError::Mismatch { field })
            }
            _ => Ok(()),
        }
    }

    require("domain", opts.domain.as_deref(), body.domain.as_deref())?;
    require("statement", opts.statement.as_deref(), body.statement.as_deref())?;
    require("uri", opts.uri.as_deref(), body.uri.as_deref())?;
    require("chain_id", opts.chain_id.as_ref(), body.chain_id.as_ref())?;
    require("request_id", opts.request_id.as_deref(), body.request_id.as_deref())?;
    require("address", opts.address.as_ref(), Some(address))?;
    Ok(())
}

/// A signature must be non-empty printable ASCII without whitespace so the
/// token stays transport-safe.
fn is_usable_signature(signature: &str) -> bool {
    !signature.is_empty() && signature.bytes().all(|b| b.is_ascii_graphic())
}

#[async_trait::async_trait]
impl<R: AddressRecovery, T: TimeSource> Web3TokenApi for Web3TokenService<R, T> {
    async fn sign(
        &self,
        signer: &dyn MessageSigner,
        params: SignParameters,
    ) -> Result<String, ValidationError> {
        let body = self.build_body(&params)?;
        let text = message::render(&body);

        let signature = signer.sign_message(&text).await.map_err(|e| {
            warn!(error = %e, "Signer failed");
            ValidationError::Signer(e.to_string())
        })?;

        if !is_usable_signature(&signature) {
            warn!(len = signature.len(), "Signer returned an unusable signature");
            return Err(ValidationError::InvalidSignerOutput);
        }

        let token = Envelope::new(signature, text).encode()?;

        debug!(
            domain = body.domain.as_deref().unwrap_or_default(),
            expires_at = %message::format_timestamp(&body.expiration_time),
            "Token signed"
        );

        Ok(token)
    }

    fn verify(
        &self,
        token: &str,
        opts: &VerifyOptions,
    ) -> Result<VerificationResult, VerificationError> {
        let result = self.open(token).and_then(|(address, body)| {
            self.check_time_window(&body, self.time_source.now())?;
            check_constraints(&address, &body, opts)?;
            Ok(VerificationResult { address, body })
        });

        match &result {
            Ok(verified) => debug!(address = %verified.address, "Token verified"),
            Err(e) => warn!(reason = %e, "Token rejected"),
        }

        result
    }

    fn decrypt(&self, token: &str) -> Result<DecryptedToken, VerificationError> {
        let (address, body) = self.open(token)?;
        Ok(DecryptedToken {
            version: body.version.clone(),
            address,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ecdsa::{EthereumRecovery, LocalWallet};
    use crate::ports::outbound::{ManualTimeSource, SignerError};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn service() -> Web3TokenService<EthereumRecovery, ManualTimeSource> {
        Web3TokenService::with_time_source(
            EthereumRecovery,
            ManualTimeSource::new(start()),
            TokenConfig::default(),
        )
        .unwrap()
    }

    /// Signer returning a fixed string, for contract-violation tests.
    struct FixedSigner(&'static str);

    #[async_trait::async_trait]
    impl MessageSigner for FixedSigner {
        async fn sign_message(&self, _message: &str) -> Result<String, SignerError> {
            Ok(self.0.to_string())
        }
    }

    struct RejectingSigner;

    #[async_trait::async_trait]
    impl MessageSigner for RejectingSigner {
        async fn sign_message(&self, _message: &str) -> Result<String, SignerError> {
            Err(SignerError::Rejected {
                reason: "user denied".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_sign_verify_round_trip() {
        let service = service();
        let wallet = LocalWallet::random();

        let token = service.sign(&wallet, "1d".into()).await.unwrap();
        let verified = service.verify(&token, &VerifyOptions::default()).unwrap();

        assert_eq!(verified.address, wallet.address());
        assert_eq!(verified.body.issued_at, start());
        assert_eq!(verified.body.expiration_time, start() + Duration::days(1));
    }

    #[tokio::test]
    async fn test_invalid_params_never_reach_signer() {
        let service = service();
        let params = SignParameters::default().with_statement("a\nb");
        let result = service.sign(&RejectingSigner, params).await;
        assert_eq!(result, Err(ValidationError::LineFeed { field: "statement" }));
    }

    #[tokio::test]
    async fn test_signer_failure_propagates() {
        let result = service()
            .sign(&RejectingSigner, SignParameters::default())
            .await;
        assert!(matches!(result, Err(ValidationError::Signer(msg)) if msg.contains("user denied")));
    }

    #[tokio::test]
    async fn test_unusable_signer_output() {
        for output in ["", "0x12 34", "sig\n"] {
            let result = service()
                .sign(&FixedSigner(output), SignParameters::default())
                .await;
            assert_eq!(result, Err(ValidationError::InvalidSignerOutput));
        }
    }

    #[tokio::test]
    async fn test_garbage_signature_is_invalid_signature() {
        let service = service();
        let token = service
            .sign(&FixedSigner("0xdeadbeef"), SignParameters::default())
            .await
            .unwrap();
        assert_eq!(
            service.verify(&token, &VerifyOptions::default()),
            Err(VerificationError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let service = service();
        let wallet = LocalWallet::random();
        let token = service.sign(&wallet, "1s".into()).await.unwrap();

        service.time_source().advance(Duration::milliseconds(999));
        assert!(service.verify(&token, &VerifyOptions::default()).is_ok());

        service.time_source().advance(Duration::milliseconds(1));
        assert_eq!(
            service.verify(&token, &VerifyOptions::default()),
            Err(VerificationError::Expired)
        );
    }

    #[tokio::test]
    async fn test_issued_in_future_is_not_yet_valid() {
        let service = service();
        let wallet = LocalWallet::random();
        let token = service.sign(&wallet, "1d".into()).await.unwrap();

        service.time_source().set(start() - Duration::milliseconds(1));
        assert_eq!(
            service.verify(&token, &VerifyOptions::default()),
            Err(VerificationError::NotYetValid)
        );
    }

    #[tokio::test]
    async fn test_clock_tolerance() {
        let service = Web3TokenService::with_time_source(
            EthereumRecovery,
            ManualTimeSource::new(start()),
            TokenConfig::default().with_clock_tolerance_ms(5_000),
        )
        .unwrap();
        let wallet = LocalWallet::random();
        let token = service.sign(&wallet, "1m".into()).await.unwrap();

        service.time_source().set(start() - Duration::seconds(3));
        assert!(service.verify(&token, &VerifyOptions::default()).is_ok());

        service.time_source().set(start() + Duration::seconds(63));
        assert!(service.verify(&token, &VerifyOptions::default()).is_ok());

        service.time_source().set(start() + Duration::seconds(65));
        assert_eq!(
            service.verify(&token, &VerifyOptions::default()),
            Err(VerificationError::Expired)
        );
    }

    #[tokio::test]
    async fn test_constraint_mismatches() {
        let service = service();
        let wallet = LocalWallet::random();
        let params = SignParameters::default()
            .with_domain("example.com")
            .with_statement("hello")
            .with_uri("https://example.com/login")
            .with_chain_id(1)
            .with_request_id("r1");
        let token = service.sign(&wallet, params).await.unwrap();

        let matching = VerifyOptions::default()
            .with_domain("example.com")
            .with_statement("hello")
            .with_uri("https://example.com/login")
            .with_chain_id(1)
            .with_request_id("r1")
            .with_address(wallet.address());
        assert!(service.verify(&token, &matching).is_ok());

        let cases = [
            ("domain", VerifyOptions::default().with_domain("other.com")),
            ("statement", VerifyOptions::default().with_statement("bye")),
            ("uri", VerifyOptions::default().with_uri("https://other.com")),
            ("chain_id", VerifyOptions::default().with_chain_id(5)),
            ("request_id", VerifyOptions::default().with_request_id("r2")),
            (
                "address",
                VerifyOptions::default().with_address(LocalWallet::random().address()),
            ),
        ];
        for (field, opts) in cases {
            assert_eq!(
                service.verify(&token, &opts),
                Err(VerificationError::Mismatch { field })
            );
        }
    }

    #[tokio::test]
    async fn test_expected_field_absent_from_token_is_mismatch() {
        let service = service();
        let wallet = LocalWallet::random();
        let token = service.sign(&wallet, SignParameters::default()).await.unwrap();

        assert_eq!(
            service.verify(&token, &VerifyOptions::default().with_domain("example.com")),
            Err(VerificationError::Mismatch { field: "domain" })
        );
    }

    #[tokio::test]
    async fn test_decrypt_skips_time_checks() {
        let service = service();
        let wallet = LocalWallet::random();
        let token = service.sign(&wallet, "1ms".into()).await.unwrap();

        service.time_source().advance(Duration::days(30));
        assert_eq!(
            service.verify(&token, &VerifyOptions::default()),
            Err(VerificationError::Expired)
        );

        let decrypted = service.decrypt(&token).unwrap();
        assert_eq!(decrypted.version, "2");
        assert_eq!(decrypted.address, wallet.address());
        assert_eq!(decrypted.body.issued_at, start());
    }

    #[test]
    fn test_default_config_is_valid() {
        let service = Web3TokenService::with_defaults(EthereumRecovery);
        assert!(service.config().validate().is_ok());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Web3TokenService::new(
            EthereumRecovery,
            TokenConfig::default().with_default_expires_in("never"),
        );
        assert!(matches!(result, Err(ValidationError::InvalidDuration(_))));
    }
}
