//! # Redemption
//!
//! A relying party redeems a presentation token in three steps:
//!
//! 1. Token verification (checksum, decrypt, schema, version, expiry,
//!    signature, nonce). Consumes the token nonce.
//! 2. Proof verification on the worker pool, plus a freshness check of the
//!    age proof's `current_timestamp` against the token's lifetime.
//! 3. Nullifier one-time check for circuits that expose one. Never expires.
//!
//! A step runs only if the previous one accepted. Every call yields a
//! [`RedemptionOutcome`].
//!
//! The nonce is marked in step 1 and is never released. A token whose proof
//! is later rejected, or whose redemption ends `Unavailable` because a worker
//! or the ledger failed in step 2 or 3, is spent all the same: presenting it
//! again yields `REPLAY_ATTACK`, and the holder has to present a new token.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zkid_core::{CircuitId, Timestamp};
use zkid_ledger::{LedgerKey, MarkOutcome, NonceLedger};
use zkid_token::{ProofPresentation, SecureTokenPayload, TokenVerifier, VerificationOutcome};
use zkid_zkp::circuits::descriptor;
use zkid_zkp::{ProofReport, VerifiedClaim, Verifier};

use crate::error::PoolError;
use crate::pool::WorkerPool;

const DEFAULT_MAX_PROOF_AGE_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedeemConfig {
    /// How long before the token's `issuedAt` an age proof may have been made.
    pub max_proof_age_secs: u64,
}

impl Default for RedeemConfig {
    fn default() -> Self {
        Self {
            max_proof_age_secs: DEFAULT_MAX_PROOF_AGE_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeemStatus {
    Accepted,
    TokenRejected,
    /// The token is valid but carries no proof.
    NotAPresentation,
    ProofRejected,
    /// The proof's timestamp lies outside the token's window.
    StaleProof,
    NullifierReused,
    /// A worker or the ledger failed; nothing was accepted. The token nonce
    /// stays consumed if step 1 already ran.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionOutcome {
    pub status: RedeemStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<VerificationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<VerifiedClaim>,
}

impl RedemptionOutcome {
    pub fn is_accepted(&self) -> bool {
        self.status == RedeemStatus::Accepted
    }

    fn stop(status: RedeemStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            token: None,
            proof: None,
            claim: None,
        }
    }

    fn unavailable(e: PoolError) -> Self {
        Self::stop(RedeemStatus::Unavailable, e.to_string())
    }
}

pub struct Redeemer<L> {
    tokens: Arc<TokenVerifier<L>>,
    proofs: Arc<Verifier>,
    pool: WorkerPool,
    max_proof_age: Duration,
}

impl<L: NonceLedger + 'static> Redeemer<L> {
    pub fn new(tokens: TokenVerifier<L>, proofs: Verifier, pool: WorkerPool, config: &RedeemConfig) -> Self {
        Self {
            tokens: Arc::new(tokens),
            proofs: Arc::new(proofs),
            pool,
            max_proof_age: Duration::from_secs(config.max_proof_age_secs),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub async fn redeem(&self, token: String, checksum: Option<String>) -> RedemptionOutcome {
        let outcome = self.redeem_inner(token, checksum).await;
        tracing::info!(status = ?outcome.status, message = %outcome.message, "redemption finished");
        outcome
    }

    /// Redeem every item concurrently through the pool. Output order matches
    /// input order.
    pub async fn redeem_batch(self: &Arc<Self>, items: Vec<(String, Option<String>)>) -> Vec<RedemptionOutcome> {
        let mut set = tokio::task::JoinSet::new();
        let count = items.len();
        for (index, (token, checksum)) in items.into_iter().enumerate() {
            let this = Arc::clone(self);
            set.spawn(async move { (index, this.redeem(token, checksum).await) });
        }
        let mut results: Vec<Option<RedemptionOutcome>> = (0..count).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => results[index] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "redemption task failed"),
            }
        }
        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| RedemptionOutcome::unavailable(PoolError::Panicked)))
            .collect()
    }

    async fn redeem_inner(&self, token: String, checksum: Option<String>) -> RedemptionOutcome {
        let now = Timestamp::now();

        let tokens = Arc::clone(&self.tokens);
        let verified = match self
            .pool
            .run(move || tokens.verify_at(&token, checksum.as_deref(), now))
            .await
        {
            Ok(v) => v,
            Err(e) => return RedemptionOutcome::unavailable(e),
        };
        if !verified.success {
            let mut outcome = RedemptionOutcome::stop(RedeemStatus::TokenRejected, verified.message.clone());
            outcome.token = Some(verified);
            return outcome;
        }
        let Some((payload, presentation)) = verified
            .payload
            .as_ref()
            .and_then(|p| p.presentation().map(|pres| (p.clone(), pres.clone())))
        else {
            let mut outcome = RedemptionOutcome::stop(RedeemStatus::NotAPresentation, "token carries no proof");
            outcome.token = Some(verified);
            return outcome;
        };

        let mut outcome = self.check_presentation(&payload, presentation, now).await;
        outcome.token = Some(verified);
        outcome
    }

    async fn check_presentation(
        &self,
        payload: &SecureTokenPayload,
        presentation: ProofPresentation,
        now: Timestamp,
    ) -> RedemptionOutcome {
        let proofs = Arc::clone(&self.proofs);
        let claimed_nullifier = presentation.nullifier_hash.clone();
        let proof_outcome = match self
            .pool
            .run(move || {
                proofs.verify_proof(
                    &presentation.claim_type,
                    &presentation.proof,
                    &presentation.public_signals,
                )
            })
            .await
        {
            Ok(o) => o,
            Err(e) => return RedemptionOutcome::unavailable(e),
        };
        let report = proof_outcome.report();
        let claim = match proof_outcome.check() {
            Ok(claim) => claim,
            Err(e) => {
                let mut outcome = RedemptionOutcome::stop(RedeemStatus::ProofRejected, e.to_string());
                outcome.proof = Some(report);
                return outcome;
            }
        };

        let mut outcome = match self.check_claim(payload, &claim, claimed_nullifier.as_deref(), now).await {
            Some(rejection) => rejection,
            None => RedemptionOutcome::stop(RedeemStatus::Accepted, format!("{} accepted", claim.claim_type)),
        };
        outcome.proof = Some(report);
        outcome.claim = Some(claim);
        outcome
    }

    /// Post-pairing checks. `None` means accepted.
    async fn check_claim(
        &self,
        payload: &SecureTokenPayload,
        claim: &VerifiedClaim,
        claimed_nullifier: Option<&str>,
        now: Timestamp,
    ) -> Option<RedemptionOutcome> {
        if claim.circuit_id == CircuitId::AgeVerification {
            if let Err(reason) = proof_time_in_window(claim, payload, self.max_proof_age) {
                return Some(RedemptionOutcome::stop(RedeemStatus::StaleProof, reason));
            }
        }

        if claimed_nullifier.is_some() && claimed_nullifier != claim.nullifier_hash.as_deref() {
            return Some(RedemptionOutcome::stop(
                RedeemStatus::ProofRejected,
                "nullifierHash does not match the proof",
            ));
        }
        let Some(nullifier) = claim.nullifier_hash.as_deref() else {
            return None;
        };
        let key = match LedgerKey::nullifier(nullifier) {
            Ok(k) => k,
            Err(e) => return Some(RedemptionOutcome::stop(RedeemStatus::ProofRejected, e.to_string())),
        };
        let tokens = Arc::clone(&self.tokens);
        let marked = self
            .pool
            .run(move || tokens.ledger().check_and_mark_at(&key, None, now))
            .await;
        match marked {
            Ok(Ok(MarkOutcome::Fresh(_))) => None,
            Ok(Ok(MarkOutcome::Replayed { .. })) => Some(RedemptionOutcome::stop(
                RedeemStatus::NullifierReused,
                "this credential has already been redeemed",
            )),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "nullifier ledger unavailable");
                Some(RedemptionOutcome::stop(RedeemStatus::Unavailable, e.to_string()))
            }
            Err(e) => Some(RedemptionOutcome::unavailable(e)),
        }
    }
}

/// The proof's `current_timestamp` must fall in
/// `[issuedAt - max_proof_age, expiresAt]`.
fn proof_time_in_window(
    claim: &VerifiedClaim,
    payload: &SecureTokenPayload,
    max_proof_age: Duration,
) -> Result<(), String> {
    let index = descriptor(claim.circuit_id)
        .public_signals
        .iter()
        .position(|s| *s == "current_timestamp")
        .ok_or("circuit has no current_timestamp signal")?;
    let proved_at = claim
        .public_signals
        .get(index)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| Timestamp::from_epoch_secs(secs).ok())
        .ok_or("current_timestamp is not a valid time")?;
    let earliest = payload
        .issued_at
        .checked_sub(max_proof_age)
        .ok_or("issuedAt out of range")?;
    if proved_at < earliest || proved_at > payload.expires_at {
        return Err(format!(
            "proof made at {proved_at}, outside {earliest}..={}",
            payload.expires_at
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use url::Url;
    use zkid_core::ClaimType;
    use zkid_crypto::MasterSecret;
    use zkid_ledger::MemoryNonceLedger;
    use zkid_token::{ClaimPayload, Issuer, TokenConfig, TokenErrorCode, TokenIssuer, TokenRequest, VerificationRequest};
    use zkid_zkp::circuits::{citizen_leaf, MerkleTree};
    use zkid_zkp::field::hash_to_field;
    use zkid_zkp::{ProofPolicy, ProofRequest, Prover, VerifyErrorCode};

    use super::*;
    use crate::pool::PoolConfig;
    use crate::present::Presenter;

    const TTL: Duration = Duration::from_secs(120);

    fn token_config() -> TokenConfig {
        TokenConfig::new(
            MasterSecret::from_bytes(vec![42u8; 32]).unwrap(),
            Url::parse("https://verify.example.org").unwrap(),
        )
    }

    fn pool() -> WorkerPool {
        WorkerPool::new(&PoolConfig {
            workers: Some(4),
            queue_timeout: Duration::from_secs(10),
        })
        .unwrap()
    }

    fn presenter() -> Presenter {
        Presenter::new(
            Prover::with_keys(HashMap::new(), ProofPolicy::development()),
            TokenIssuer::new(&token_config()).unwrap(),
            pool(),
        )
    }

    fn redeemer() -> Arc<Redeemer<MemoryNonceLedger>> {
        Arc::new(Redeemer::new(
            TokenVerifier::new(&token_config(), MemoryNonceLedger::new()).unwrap(),
            Verifier::with_keys(HashMap::new(), ProofPolicy::development()),
            pool(),
            &RedeemConfig::default(),
        ))
    }

    fn issuer() -> Issuer {
        Issuer {
            id: "holder-wallet".into(),
            name: "Holder Wallet".into(),
            domain: None,
        }
    }

    fn now_secs() -> i64 {
        Timestamp::now().epoch_secs()
    }

    async fn age_token(claim: ClaimType, threshold: u64, proved_at: i64, birth: &str) -> zkid_token::IssuedToken {
        presenter()
            .present(claim, ProofRequest::age(threshold, proved_at, birth), issuer(), TTL)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn adult_is_accepted_once() {
        let redeemer = redeemer();
        let token = age_token(ClaimType::AgeOver18, 18, now_secs(), "2000-01-01").await;

        let first = redeemer.redeem(token.token.clone(), Some(token.checksum.clone())).await;
        assert!(first.is_accepted(), "{first:?}");
        assert_eq!(first.claim.unwrap().claim_type, ClaimType::AgeOver18);

        let second = redeemer.redeem(token.token, Some(token.checksum)).await;
        assert_eq!(second.status, RedeemStatus::TokenRejected);
        assert_eq!(second.token.unwrap().error_code, Some(TokenErrorCode::ReplayAttack));
    }

    #[tokio::test]
    async fn minor_is_rejected() {
        let token = age_token(ClaimType::AgeOver18, 18, now_secs(), "2020-01-01").await;
        let outcome = redeemer().redeem(token.token, None).await;
        assert_eq!(outcome.status, RedeemStatus::ProofRejected);
        assert_eq!(outcome.proof.unwrap().error_code, Some(VerifyErrorCode::ClaimNotSatisfied));
    }

    #[tokio::test]
    async fn token_with_rejected_proof_is_spent() {
        let redeemer = redeemer();
        let token = age_token(ClaimType::AgeOver18, 18, now_secs(), "2020-01-01").await;
        let first = redeemer.redeem(token.token.clone(), None).await;
        assert_eq!(first.status, RedeemStatus::ProofRejected);

        let again = redeemer.redeem(token.token, None).await;
        assert_eq!(again.status, RedeemStatus::TokenRejected);
        assert_eq!(again.token.unwrap().error_code, Some(TokenErrorCode::ReplayAttack));
        assert!(again.proof.is_none());
    }

    #[tokio::test]
    async fn old_proof_in_new_token_is_stale() {
        let token = age_token(ClaimType::AgeOver18, 18, now_secs() - 3600, "2000-01-01").await;
        let outcome = redeemer().redeem(token.token, None).await;
        assert_eq!(outcome.status, RedeemStatus::StaleProof);
    }

    #[tokio::test]
    async fn citizen_nullifier_is_single_use() {
        let citizen = hash_to_field(b"citizen-0042");
        let registry = MerkleTree::new(&[
            citizen_leaf(&hash_to_field(b"citizen-0001"), 1),
            citizen_leaf(&citizen, 3),
        ])
        .unwrap();
        let request = ProofRequest::citizenship(&registry, 1, &citizen, 3, 3).unwrap();
        let presenter = presenter();
        let first = presenter
            .present(ClaimType::Citizenship, request.clone(), issuer(), TTL)
            .await
            .unwrap();
        let second = presenter
            .present(ClaimType::Citizenship, request, issuer(), TTL)
            .await
            .unwrap();
        assert_ne!(first.nonce, second.nonce);

        let redeemer = redeemer();
        let accepted = redeemer.redeem(first.token, None).await;
        assert!(accepted.is_accepted(), "{accepted:?}");
        assert!(accepted.claim.unwrap().nullifier_hash.is_some());

        let reused = redeemer.redeem(second.token, None).await;
        assert_eq!(reused.status, RedeemStatus::NullifierReused);
        assert!(reused.token.unwrap().success);
    }

    #[tokio::test]
    async fn request_tokens_carry_no_proof() {
        let issued = TokenIssuer::new(&token_config())
            .unwrap()
            .generate(TokenRequest::new(
                issuer(),
                ClaimPayload::VerificationRequest(VerificationRequest {
                    requested_claims: vec!["citizenship".into()],
                    purpose: None,
                    callback_url: None,
                }),
                TTL,
            ))
            .unwrap();
        let outcome = redeemer().redeem(issued.token, Some(issued.checksum)).await;
        assert_eq!(outcome.status, RedeemStatus::NotAPresentation);
    }

    #[tokio::test]
    async fn garbage_is_a_token_rejection() {
        let outcome = redeemer().redeem("AAAA".into(), None).await;
        assert_eq!(outcome.status, RedeemStatus::TokenRejected);
        assert!(outcome.proof.is_none());
    }

    #[tokio::test]
    async fn concurrent_redemptions_accept_exactly_one() {
        let token = age_token(ClaimType::AgeOver21, 21, now_secs(), "1990-06-15").await;
        let items = vec![(token.token, Some(token.checksum)); 12];
        let outcomes = redeemer().redeem_batch(items).await;
        assert_eq!(outcomes.len(), 12);
        assert_eq!(outcomes.iter().filter(|o| o.is_accepted()).count(), 1);
        assert!(outcomes
            .iter()
            .filter(|o| !o.is_accepted())
            .all(|o| o.token.as_ref().and_then(|t| t.error_code) == Some(TokenErrorCode::ReplayAttack)));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let claims = [
            (ClaimType::AgeOver16, 16),
            (ClaimType::AgeOver21, 21),
            (ClaimType::AgeOver18, 18),
            (ClaimType::AgeOver16, 16),
        ];
        let mut items = Vec::new();
        for (claim, threshold) in claims {
            let t = age_token(claim, threshold, now_secs(), "1980-02-29").await;
            items.push((t.token, None));
        }
        let outcomes = redeemer().redeem_batch(items).await;
        let got: Vec<ClaimType> = outcomes.into_iter().map(|o| o.claim.unwrap().claim_type).collect();
        assert_eq!(got, claims.map(|(c, _)| c).to_vec());
    }

    #[tokio::test]
    async fn presenter_rejects_mismatched_claim() {
        let err = presenter()
            .present(ClaimType::Citizenship, ProofRequest::age(18, now_secs(), "2000-01-01"), issuer(), TTL)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::PresentError::ClaimMismatch { .. }));
    }

    #[tokio::test]
    async fn production_presenter_without_keys_fails() {
        let presenter = Presenter::new(
            Prover::with_keys(HashMap::new(), ProofPolicy::production()),
            TokenIssuer::new(&token_config()).unwrap(),
            pool(),
        );
        let err = presenter
            .present(ClaimType::AgeOver18, ProofRequest::age(18, now_secs(), "2000-01-01"), issuer(), TTL)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::PresentError::Prove(zkid_zkp::ProveError::ArtifactsUnavailable(_))
        ));
    }
}
