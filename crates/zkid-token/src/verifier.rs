//! # Token Verification
//!
//! `Received → ChecksumPrecheck → Decrypt → SchemaValidate → VersionCheck →
//! ExpiryCheck → SignatureRecompute → NonceCheckAndMark → Accepted`.
//!
//! Every call returns a [`VerificationOutcome`]; no stage panics or leaks
//! an internal error to the caller.
//!
//! ## Security Invariant
//!
//! The nonce is marked only after the signature verifies, so an attacker
//! cannot burn a legitimate nonce with a forged token. Any ledger failure is
//! reported as `REPLAY_ATTACK`: the verifier fails closed.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use zkid_core::Timestamp;
use zkid_crypto::{checksum_matches, MacTag, PayloadMac, TokenCipher};
use zkid_ledger::{LedgerKey, MarkOutcome, NonceLedger};

use crate::config::{TokenConfig, MAX_TOKEN_LEN};
use crate::error::{TokenError, TokenErrorCode};
use crate::link::parse_deep_link;
use crate::payload::{SecureTokenPayload, SUPPORTED_VERSIONS};

/// Result of one verification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<TokenErrorCode>,
    pub message: String,
    /// Seconds until `expiresAt`, never negative.
    pub time_to_expiry_seconds: i64,
    pub issuer_verified: bool,
    pub nonce_checked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<SecureTokenPayload>,
}

impl VerificationOutcome {
    fn accepted(payload: SecureTokenPayload, now: Timestamp) -> Self {
        Self {
            success: true,
            error_code: None,
            message: "Token verified.".into(),
            time_to_expiry_seconds: now.seconds_until(&payload.expires_at).max(0),
            issuer_verified: true,
            nonce_checked: true,
            payload: Some(payload),
        }
    }

    fn rejected(code: TokenErrorCode) -> Self {
        Self {
            success: false,
            error_code: Some(code),
            message: code.user_message().into(),
            time_to_expiry_seconds: 0,
            issuer_verified: false,
            nonce_checked: false,
            payload: None,
        }
    }
}

/// Internal rejection carrying the stage that produced it.
struct Rejection {
    code: TokenErrorCode,
    reason: String,
    issuer_verified: bool,
    time_to_expiry_seconds: i64,
}

impl Rejection {
    fn new(code: TokenErrorCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            issuer_verified: false,
            time_to_expiry_seconds: 0,
        }
    }

    fn format(reason: impl Into<String>) -> Self {
        Self::new(TokenErrorCode::InvalidFormat, reason)
    }
}

pub struct TokenVerifier<L> {
    mac: PayloadMac,
    cipher: TokenCipher,
    max_ttl: Duration,
    clock_skew: Duration,
    ledger: L,
}

impl<L: NonceLedger> TokenVerifier<L> {
    pub fn new(config: &TokenConfig, ledger: L) -> Result<Self, TokenError> {
        let (mac, cipher) = config.primitives()?;
        Ok(Self {
            mac,
            cipher,
            max_ttl: config.max_ttl,
            clock_skew: config.clock_skew,
            ledger,
        })
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Verify a token, consuming its nonce on success.
    pub fn verify(&self, token: &str, checksum: Option<&str>) -> VerificationOutcome {
        self.verify_at(token, checksum, Timestamp::now())
    }

    /// Verify the token carried by a deep link.
    pub fn verify_deep_link(&self, link: &str) -> VerificationOutcome {
        match parse_deep_link(link) {
            Ok(parsed) => self.verify(&parsed.token, parsed.checksum.as_deref()),
            Err(e) => {
                tracing::info!(error = %e, "token rejected: unreadable deep link");
                VerificationOutcome::rejected(TokenErrorCode::InvalidFormat)
            }
        }
    }

    pub fn verify_at(&self, token: &str, checksum: Option<&str>, now: Timestamp) -> VerificationOutcome {
        match self.run(token, checksum, now) {
            Ok(payload) => {
                tracing::debug!(issuer = %payload.issuer.id, nonce = %payload.nonce, "token accepted");
                VerificationOutcome::accepted(payload, now)
            }
            Err(rejection) => {
                tracing::info!(code = %rejection.code, reason = %rejection.reason, "token rejected");
                let mut outcome = VerificationOutcome::rejected(rejection.code);
                outcome.issuer_verified = rejection.issuer_verified;
                outcome.time_to_expiry_seconds = rejection.time_to_expiry_seconds;
                outcome
            }
        }
    }

    fn run(&self, token: &str, checksum: Option<&str>, now: Timestamp) -> Result<SecureTokenPayload, Rejection> {
        // ChecksumPrecheck
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(Rejection::format(format!("token length {} out of range", token.len())));
        }
        let sealed = STANDARD
            .decode(token.trim())
            .map_err(|e| Rejection::format(format!("base64: {e}")))?;
        if let Some(claimed) = checksum {
            if !checksum_matches(&sealed, claimed) {
                return Err(Rejection::format("checksum mismatch"));
            }
        }

        // Decrypt
        let plaintext = self
            .cipher
            .open(&sealed)
            .map_err(|e| Rejection::format(format!("decrypt: {e}")))?;

        // SchemaValidate
        let payload: SecureTokenPayload =
            serde_json::from_slice(&plaintext).map_err(|e| Rejection::format(format!("schema: {e}")))?;
        payload.validate_schema().map_err(Rejection::format)?;
        let lifetime = payload.issued_at.seconds_until(&payload.expires_at);
        let allowed = self.max_ttl.saturating_add(self.clock_skew).as_secs();
        if u64::try_from(lifetime).map_or(true, |l| l > allowed) {
            return Err(Rejection::format(format!("lifetime {lifetime}s exceeds {allowed}s")));
        }
        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);
        if now.seconds_until(&payload.issued_at) > skew {
            return Err(Rejection::format("issuedAt is in the future"));
        }

        // VersionCheck
        if !SUPPORTED_VERSIONS.contains(&payload.version) {
            return Err(Rejection::new(
                TokenErrorCode::UnsupportedVersion,
                format!("version {}", payload.version),
            ));
        }

        // ExpiryCheck
        if payload.expires_at <= now {
            return Err(Rejection::new(TokenErrorCode::Expired, format!("expired at {}", payload.expires_at)));
        }

        // SignatureRecompute
        let tag = MacTag::from_hex(&payload.signature)
            .map_err(|e| Rejection::new(TokenErrorCode::InvalidSignature, e.to_string()))?;
        let signed = payload
            .signing_bytes()
            .map_err(|e| Rejection::new(TokenErrorCode::InvalidSignature, e.to_string()))?;
        if !self.mac.verify(&signed, &tag) {
            return Err(Rejection::new(TokenErrorCode::InvalidSignature, "mac mismatch"));
        }

        // NonceCheckAndMark
        let remaining = now.seconds_until(&payload.expires_at).max(0);
        let replay = |reason: String| Rejection {
            code: TokenErrorCode::ReplayAttack,
            reason,
            issuer_verified: true,
            time_to_expiry_seconds: remaining,
        };
        let key = LedgerKey::nonce(&payload.nonce).map_err(|e| replay(e.to_string()))?;
        // The record must outlive the token on this clock.
        let nonce_ttl = Duration::from_secs(remaining.unsigned_abs()).saturating_add(self.clock_skew);
        match self.ledger.check_and_mark_at(&key, Some(nonce_ttl), now) {
            Ok(MarkOutcome::Fresh(_)) => Ok(payload),
            Ok(MarkOutcome::Replayed { first_seen_at }) => Err(replay(match first_seen_at {
                Some(t) => format!("nonce first seen at {t}"),
                None => "nonce already recorded".into(),
            })),
            Err(e) => {
                tracing::error!(error = %e, "nonce ledger unavailable");
                Err(replay(format!("ledger: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;
    use url::Url;
    use zkid_crypto::MasterSecret;
    use zkid_ledger::{FsNonceLedger, LedgerError, MemoryNonceLedger};

    use super::*;
    use crate::issuer::{IssuedToken, TokenIssuer, TokenRequest};
    use crate::payload::tests::sample;
    use crate::payload::{ClaimPayload, Issuer, VerificationRequest};

    fn config() -> TokenConfig {
        let secret = MasterSecret::from_bytes(vec![7u8; 32]).unwrap();
        TokenConfig::new(secret, Url::parse("https://verify.example.org").unwrap())
    }

    fn t0() -> Timestamp {
        Timestamp::parse("2026-03-01T12:00:00Z").unwrap()
    }

    fn request() -> TokenRequest {
        TokenRequest::new(
            Issuer {
                id: "clinic-7".into(),
                name: "North Clinic".into(),
                domain: Some("clinic.example".into()),
            },
            ClaimPayload::VerificationRequest(VerificationRequest {
                requested_claims: vec!["age_over_18".into()],
                purpose: Some("entry".into()),
                callback_url: None,
            }),
            Duration::from_secs(300),
        )
    }

    fn setup() -> (TokenIssuer, TokenVerifier<MemoryNonceLedger>, IssuedToken) {
        let issuer = TokenIssuer::new(&config()).unwrap();
        let verifier = TokenVerifier::new(&config(), MemoryNonceLedger::new()).unwrap();
        let issued = issuer.generate_at(request(), t0()).unwrap();
        (issuer, verifier, issued)
    }

    fn later(secs: u64) -> Timestamp {
        t0().checked_add(Duration::from_secs(secs)).unwrap()
    }

    #[test]
    fn issued_token_round_trips() {
        let (_, verifier, issued) = setup();
        let outcome = verifier.verify_at(&issued.token, Some(&issued.checksum), later(10));
        assert!(outcome.success, "{outcome:?}");
        assert_eq!(outcome.time_to_expiry_seconds, 290);
        assert!(outcome.issuer_verified && outcome.nonce_checked);
        let payload = outcome.payload.unwrap();
        assert_eq!(payload.issuer.id, "clinic-7");
        assert_eq!(payload.nonce, issued.nonce);
        assert_eq!(payload.payload, request().payload);
    }

    #[test]
    fn checksum_is_optional_but_checked_when_given() {
        let (_, verifier, issued) = setup();
        let bad = verifier.verify_at(&issued.token, Some("0000000000000000"), later(1));
        assert_eq!(bad.error_code, Some(TokenErrorCode::InvalidFormat));
        assert!(verifier.verify_at(&issued.token, None, later(1)).success);
    }

    #[test]
    fn second_presentation_is_a_replay() {
        let (_, verifier, issued) = setup();
        assert!(verifier.verify_at(&issued.token, None, later(1)).success);
        let again = verifier.verify_at(&issued.token, None, later(2));
        assert_eq!(again.error_code, Some(TokenErrorCode::ReplayAttack));
        assert!(again.issuer_verified);
        assert_eq!(again.message, TokenErrorCode::ReplayAttack.user_message());
    }

    #[test]
    fn replay_just_before_expiry_is_caught_when_first_check_ran_on_a_lagging_clock() {
        let issuer = TokenIssuer::new(&config()).unwrap();
        let verifier = TokenVerifier::new(&config(), MemoryNonceLedger::new()).unwrap();
        let mut long = request();
        long.ttl = crate::config::DEFAULT_MAX_TTL;
        let issued = issuer.generate_at(long, t0()).unwrap();

        let lagging = t0().checked_sub(Duration::from_secs(30)).unwrap();
        let first = verifier.verify_at(&issued.token, None, lagging);
        assert!(first.success, "{first:?}");

        let replay = verifier.verify_at(&issued.token, None, later(880));
        assert_eq!(replay.error_code, Some(TokenErrorCode::ReplayAttack));
        assert_eq!(replay.time_to_expiry_seconds, 20);
    }

    #[test]
    fn expired_token_is_rejected_without_consuming_nonce() {
        let (_, verifier, issued) = setup();
        let outcome = verifier.verify_at(&issued.token, None, later(300));
        assert_eq!(outcome.error_code, Some(TokenErrorCode::Expired));
        assert!(!outcome.nonce_checked);
        assert!(verifier.ledger().is_empty());
    }

    #[test]
    fn token_from_the_future_is_malformed() {
        let (_, verifier, issued) = setup();
        let before = t0().checked_sub(Duration::from_secs(120)).unwrap();
        let outcome = verifier.verify_at(&issued.token, None, before);
        assert_eq!(outcome.error_code, Some(TokenErrorCode::InvalidFormat));
    }

    #[test]
    fn wrong_secret_cannot_open() {
        let (_, _, issued) = setup();
        let other = TokenConfig::new(
            MasterSecret::from_bytes(vec![8u8; 32]).unwrap(),
            Url::parse("https://verify.example.org").unwrap(),
        );
        let verifier = TokenVerifier::new(&other, MemoryNonceLedger::new()).unwrap();
        let outcome = verifier.verify_at(&issued.token, Some(&issued.checksum), later(1));
        assert_eq!(outcome.error_code, Some(TokenErrorCode::InvalidFormat));
    }

    #[test]
    fn every_flipped_byte_is_rejected() {
        let (_, verifier, issued) = setup();
        let sealed = STANDARD.decode(&issued.token).unwrap();
        for i in 0..sealed.len() {
            let mut tampered = sealed.clone();
            tampered[i] ^= 0x01;
            let token = STANDARD.encode(&tampered);
            let outcome = verifier.verify_at(&token, None, later(1));
            assert!(
                matches!(
                    outcome.error_code,
                    Some(TokenErrorCode::InvalidFormat | TokenErrorCode::InvalidSignature)
                ),
                "byte {i}: {outcome:?}"
            );
        }
        assert!(verifier.ledger().is_empty());
    }

    #[test]
    fn forged_signature_is_rejected_after_decrypt() {
        let issuer = TokenIssuer::new(&config()).unwrap();
        let verifier = TokenVerifier::new(&config(), MemoryNonceLedger::new()).unwrap();
        let mut payload = sample();
        payload.signature = "00".repeat(32);
        let now = Timestamp::parse("2026-01-01T00:01:00Z").unwrap();
        let (token, checksum) = issuer.seal_raw(&payload);
        let outcome = verifier.verify_at(&token, Some(&checksum), now);
        assert_eq!(outcome.error_code, Some(TokenErrorCode::InvalidSignature));
        assert!(verifier.ledger().is_empty());
    }

    #[test]
    fn unknown_version_is_reported_before_expiry() {
        let issuer = TokenIssuer::new(&config()).unwrap();
        let verifier = TokenVerifier::new(&config(), MemoryNonceLedger::new()).unwrap();
        let mut payload = sample();
        payload.version = 2;
        let (token, _) = issuer.seal_raw(&payload);
        let far_future = Timestamp::parse("2030-01-01T00:00:00Z").unwrap();
        let outcome = verifier.verify_at(&token, None, far_future);
        assert_eq!(outcome.error_code, Some(TokenErrorCode::UnsupportedVersion));
    }

    #[test]
    fn overlong_lifetime_is_malformed() {
        let issuer = TokenIssuer::new(&config()).unwrap();
        let verifier = TokenVerifier::new(&config(), MemoryNonceLedger::new()).unwrap();
        let mut payload = sample();
        payload.expires_at = Timestamp::parse("2026-01-02T00:00:00Z").unwrap();
        let (token, _) = issuer.seal_raw(&payload);
        let now = Timestamp::parse("2026-01-01T00:01:00Z").unwrap();
        assert_eq!(
            verifier.verify_at(&token, None, now).error_code,
            Some(TokenErrorCode::InvalidFormat)
        );
    }

    #[test]
    fn garbage_input_is_malformed() {
        let (_, verifier, _) = setup();
        for token in ["", "not base64!!", "AAAA", &"A".repeat(MAX_TOKEN_LEN + 4)] {
            assert_eq!(
                verifier.verify_at(token, None, later(1)).error_code,
                Some(TokenErrorCode::InvalidFormat)
            );
        }
    }

    #[test]
    fn request_validation() {
        let issuer = TokenIssuer::new(&config()).unwrap();

        let mut zero_ttl = request();
        zero_ttl.ttl = Duration::ZERO;
        assert!(matches!(issuer.generate(zero_ttl), Err(TokenError::InvalidClaim(_))));

        let mut too_long = request();
        too_long.ttl = Duration::from_secs(16 * 60);
        assert!(matches!(issuer.generate(too_long), Err(TokenError::InvalidClaim(_))));

        let mut nameless = request();
        nameless.issuer.id = String::new();
        assert!(matches!(issuer.generate(nameless), Err(TokenError::InvalidClaim(_))));

        let mut mismatched = request();
        mismatched.token_type = crate::payload::TokenType::ProofPresentation;
        assert!(matches!(issuer.generate(mismatched), Err(TokenError::InvalidClaim(_))));

        let mut floats = request();
        floats.metadata = Some(BTreeMap::from([("score".to_string(), serde_json::json!(0.5))]));
        assert!(matches!(issuer.generate(floats), Err(TokenError::Canonicalization(_))));
    }

    #[test]
    fn metadata_is_signed_and_returned() {
        let issuer = TokenIssuer::new(&config()).unwrap();
        let verifier = TokenVerifier::new(&config(), MemoryNonceLedger::new()).unwrap();
        let mut req = request();
        req.metadata = Some(BTreeMap::from([("lane".to_string(), serde_json::json!(3))]));
        let issued = issuer.generate_at(req, t0()).unwrap();
        let outcome = verifier.verify_at(&issued.token, None, later(5));
        let metadata = outcome.payload.unwrap().metadata.unwrap();
        assert_eq!(metadata["lane"], serde_json::json!(3));
    }

    #[test]
    fn deep_link_verifies() {
        let (_, verifier, issued) = setup();
        assert!(issued.deep_link.starts_with("https://verify.example.org/verify/"));
        let parsed = parse_deep_link(&issued.deep_link).unwrap();
        let outcome = verifier.verify_at(&parsed.token, parsed.checksum.as_deref(), later(1));
        assert!(outcome.success);
        assert_eq!(
            verifier.verify_deep_link("https://verify.example.org/elsewhere").error_code,
            Some(TokenErrorCode::InvalidFormat)
        );
    }

    #[test]
    fn concurrent_presentations_accept_once() {
        let issuer = TokenIssuer::new(&config()).unwrap();
        let verifier = TokenVerifier::new(&config(), MemoryNonceLedger::new()).unwrap();
        let issued = issuer.generate(request()).unwrap();
        let accepted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| verifier.verify(&issued.token, Some(&issued.checksum)).success))
                .collect();
            handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum()
        });
        assert_eq!(accepted, 1);
    }

    #[test]
    fn replay_survives_restart_with_fs_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = TokenIssuer::new(&config()).unwrap();
        let issued = issuer.generate_at(request(), t0()).unwrap();
        {
            let verifier = TokenVerifier::new(&config(), FsNonceLedger::open(dir.path()).unwrap()).unwrap();
            assert!(verifier.verify_at(&issued.token, None, later(1)).success);
        }
        let verifier = TokenVerifier::new(&config(), FsNonceLedger::open(dir.path()).unwrap()).unwrap();
        assert_eq!(
            verifier.verify_at(&issued.token, None, later(2)).error_code,
            Some(TokenErrorCode::ReplayAttack)
        );
    }

    struct BrokenLedger;

    impl NonceLedger for BrokenLedger {
        fn check_and_mark_at(
            &self,
            _key: &LedgerKey,
            _ttl: Option<Duration>,
            _now: Timestamp,
        ) -> Result<MarkOutcome, LedgerError> {
            Err(LedgerError::Corrupt {
                path: "ledger".into(),
                reason: "disk gone".into(),
            })
        }

        fn purge_expired(&self, _now: Timestamp) -> Result<usize, LedgerError> {
            Ok(0)
        }
    }

    #[test]
    fn ledger_failure_fails_closed() {
        let issuer = TokenIssuer::new(&config()).unwrap();
        let verifier = TokenVerifier::new(&config(), Arc::new(BrokenLedger)).unwrap();
        let issued = issuer.generate_at(request(), t0()).unwrap();
        let outcome = verifier.verify_at(&issued.token, None, later(1));
        assert_eq!(outcome.error_code, Some(TokenErrorCode::ReplayAttack));
        assert!(!outcome.nonce_checked);
    }

    #[test]
    fn outcome_wire_shape() {
        let outcome = VerificationOutcome::rejected(TokenErrorCode::Expired);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["errorCode"], "EXPIRED");
        assert_eq!(json["timeToExpirySeconds"], 0);
        assert!(json.get("payload").is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn arbitrary_tokens_never_verify(token in "[A-Za-z0-9+/=]{0,256}") {
            let (_, verifier, _) = setup();
            let outcome = verifier.verify_at(&token, None, later(1));
            prop_assert!(!outcome.success);
            prop_assert_eq!(outcome.error_code, Some(TokenErrorCode::InvalidFormat));
        }
    }
}
