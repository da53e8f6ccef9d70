//! Holder side: prove a claim on the worker pool and wrap the proof in a
//! presentation token.

use std::sync::Arc;
use std::time::Duration;

use zkid_core::ClaimType;
use zkid_token::{ClaimPayload, IssuedToken, Issuer, ProofPresentation, TokenIssuer, TokenRequest};
use zkid_zkp::{GeneratedProof, ProofRequest, Prover};

use crate::error::PresentError;
use crate::pool::WorkerPool;

pub struct Presenter {
    prover: Arc<Prover>,
    issuer: TokenIssuer,
    pool: WorkerPool,
}

impl Presenter {
    pub fn new(prover: Prover, issuer: TokenIssuer, pool: WorkerPool) -> Self {
        Self {
            prover: Arc::new(prover),
            issuer,
            pool,
        }
    }

    /// Prove `request`, falling back to a mock proof only where the prover's
    /// policy allows it.
    pub async fn prove(&self, request: ProofRequest) -> Result<GeneratedProof, PresentError> {
        let prover = Arc::clone(&self.prover);
        Ok(self.pool.run(move || prover.generate_with_fallback(request)).await??)
    }

    pub async fn present(
        &self,
        claim: ClaimType,
        request: ProofRequest,
        issuer: Issuer,
        ttl: Duration,
    ) -> Result<IssuedToken, PresentError> {
        if claim.circuit() != request.circuit_id() {
            return Err(PresentError::ClaimMismatch {
                claim: claim.to_string(),
                circuit: request.circuit_id().to_string(),
            });
        }
        let proof = self.prove(request).await?;
        let payload = ClaimPayload::ProofPresentation(ProofPresentation {
            claim_type: claim.to_string(),
            proof: proof.proof,
            public_signals: proof.public_signals,
            nullifier_hash: proof.nullifier_hash,
        });
        let issued = self.issuer.generate(TokenRequest::new(issuer, payload, ttl))?;
        tracing::info!(claim = %claim, expires_at = %issued.expires_at, "presentation token issued");
        Ok(issued)
    }
}
