//! Proof lifecycle orchestration.
//!
//! Each request moves through `Received → Validated → BackendSelected → Proving` and
//! terminates as `Finalized` or `Rejected`. Terminal states are immutable: the request
//! value is consumed and never re-processed. Validation failures reject before any
//! backend is touched; for votes, the nullifier is reserved only after proof generation
//! succeeds, so a failed or timed-out proof never burns a nullifier, and everything after
//! a successful reservation is infallible packaging.

use crate::db::{self, Reservation};
use crate::errors::ProofError;
use crate::models::{ProveAgeRequest, ProveAgeResponse, ProveVoteRequest, ProveVoteResponse};
use crate::prover;
use crate::state::AppState;
use ark_bn254::Fr;
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;
use zk_proofs::commitment::fr_from_decimal;
use zk_proofs::constants::{DEFAULT_MIN_AGE, MAX_AGE};
use zk_proofs::groth16::ZkError;
use zk_proofs::types::{CircuitKind, EligibilityClaim, FrHex, VoteClaim};

pub const DEFAULT_PROVING_TIMEOUT_MS: u64 = 30_000;
pub const MAX_PROVING_TIMEOUT_MS: u64 = 120_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Received,
    Validated,
    BackendSelected,
    Proving,
    Finalized,
    Rejected,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Finalized | Stage::Rejected)
    }
}

/// Per-request state machine; transitions are logged under the request id.
struct Lifecycle {
    request_id: Uuid,
    stage: Stage,
}

impl Lifecycle {
    fn begin(kind: CircuitKind) -> Self {
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, %kind, "proof request received");
        Self { request_id, stage: Stage::Received }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(!self.stage.is_terminal(), "terminal stages are immutable");
        self.stage = next;
        tracing::debug!(request_id = %self.request_id, stage = ?next, "proof request advanced");
    }

    fn reject(&mut self, err: &ProofError) {
        debug_assert!(!self.stage.is_terminal(), "terminal stages are immutable");
        self.stage = Stage::Rejected;
        tracing::info!(request_id = %self.request_id, %err, "proof request rejected");
    }
}

fn proving_timeout(requested_ms: Option<u64>) -> Duration {
    Duration::from_millis(requested_ms.unwrap_or(DEFAULT_PROVING_TIMEOUT_MS).min(MAX_PROVING_TIMEOUT_MS))
}

fn parse_scalar(field: &str, value: &str) -> Result<Fr, ProofError> {
    fr_from_decimal(value).map_err(|e| match e {
        ZkError::InvalidScalar => ProofError::InvalidInput(format!(
            "{field} must be a non-empty decimal numeric string"
        )),
        ZkError::InputOutOfRange => ProofError::InputOutOfRange,
        other => ProofError::InvalidInput(other.to_string()),
    })
}

fn validate_age(req: &ProveAgeRequest) -> Result<EligibilityClaim, ProofError> {
    let min_age = req.min_age.unwrap_or(DEFAULT_MIN_AGE);
    if req.age > MAX_AGE {
        return Err(ProofError::InvalidInput(format!("age must be at most {MAX_AGE}")));
    }
    if min_age > MAX_AGE {
        return Err(ProofError::InvalidInput(format!("min_age must be at most {MAX_AGE}")));
    }
    let secret = parse_scalar("secret", &req.secret)?;

    Ok(EligibilityClaim { age: req.age, secret, min_age })
}

fn validate_vote(state: &AppState, req: &ProveVoteRequest) -> Result<VoteClaim, ProofError> {
    let poll = state.poll(req.poll_id).ok_or(ProofError::PollNotFound(req.poll_id))?;
    if !poll.has_candidate(req.candidate_id) {
        return Err(ProofError::InvalidInput(format!(
            "candidate {} is not in poll {}",
            req.candidate_id, req.poll_id
        )));
    }
    let voter_secret = parse_scalar("voter_secret", &req.voter_secret)?;
    let nullifier_seed = parse_scalar("nullifier_seed", &req.nullifier_seed)?;

    Ok(VoteClaim {
        candidate_id: req.candidate_id,
        voter_secret,
        nullifier_seed,
        poll_id: req.poll_id,
    })
}

/// Drive an age-eligibility request to a terminal state.
///
/// `is_eligible = false` finalizes; ineligibility is itself provable and recorded.
pub async fn run_age_request(
    state: &AppState,
    req: ProveAgeRequest,
) -> Result<ProveAgeResponse, ProofError> {
    let mut lc = Lifecycle::begin(CircuitKind::Age);

    let claim = match validate_age(&req) {
        Ok(claim) => claim,
        Err(e) => {
            lc.reject(&e);
            return Err(e);
        }
    };
    lc.advance(Stage::Validated);

    let backend = prover::select_backend(state, CircuitKind::Age).await;
    lc.advance(Stage::BackendSelected);

    let timeout = proving_timeout(req.timeout_ms);
    lc.advance(Stage::Proving);
    let generated = match tokio::time::timeout(
        timeout,
        prover::generate_eligibility_proof(state, &backend, claim),
    )
    .await
    {
        Ok(Ok(generated)) => generated,
        Ok(Err(e)) => {
            lc.reject(&e);
            return Err(e);
        }
        Err(_) => {
            let e = ProofError::ProofGenerationFailed(format!(
                "proving timed out after {}ms",
                timeout.as_millis()
            ));
            lc.reject(&e);
            return Err(e);
        }
    };

    let response = ProveAgeResponse {
        request_id: lc.request_id,
        mode: generated.mode,
        proof_b64: generated.proof_b64,
        is_eligible: generated.signals.is_eligible,
        public_signals: generated.signals.to_wire(),
        generated_at: Utc::now(),
    };
    lc.advance(Stage::Finalized);
    tracing::info!(
        request_id = %lc.request_id,
        mode = ?response.mode,
        is_eligible = response.is_eligible,
        "eligibility proof finalized"
    );

    Ok(response)
}

/// Drive a vote request to a terminal state.
///
/// Reservation and artifact bookkeeping happen in one registry transaction after proving
/// succeeds; a duplicate nullifier rejects the request and discards the computed proof.
pub async fn run_vote_request(
    state: &AppState,
    req: ProveVoteRequest,
) -> Result<ProveVoteResponse, ProofError> {
    let mut lc = Lifecycle::begin(CircuitKind::Vote);

    let claim = match validate_vote(state, &req) {
        Ok(claim) => claim,
        Err(e) => {
            lc.reject(&e);
            return Err(e);
        }
    };
    lc.advance(Stage::Validated);

    let backend = prover::select_backend(state, CircuitKind::Vote).await;
    lc.advance(Stage::BackendSelected);

    let timeout = proving_timeout(req.timeout_ms);
    lc.advance(Stage::Proving);
    let generated = match tokio::time::timeout(
        timeout,
        prover::generate_vote_proof(state, &backend, claim),
    )
    .await
    {
        Ok(Ok(generated)) => generated,
        Ok(Err(e)) => {
            lc.reject(&e);
            return Err(e);
        }
        Err(_) => {
            let e = ProofError::ProofGenerationFailed(format!(
                "proving timed out after {}ms",
                timeout.as_millis()
            ));
            lc.reject(&e);
            return Err(e);
        }
    };

    let commitment_hex = FrHex::from_fr(&generated.signals.commitment).hex;
    let nullifier_hex = FrHex::from_fr(&generated.signals.nullifier_hash).hex;

    let reservation = db::finalize_vote(
        &state.db,
        lc.request_id,
        req.poll_id,
        &commitment_hex,
        &nullifier_hex,
        generated.mode,
    )
    .await
    .map_err(|_| ProofError::Internal)?;

    if reservation == Reservation::AlreadyUsed {
        // The proof is discarded; it never surfaces as final.
        let e = ProofError::DuplicateVote;
        lc.reject(&e);
        return Err(e);
    }

    let response = ProveVoteResponse {
        request_id: lc.request_id,
        mode: generated.mode,
        proof_b64: generated.proof_b64,
        public_signals: generated.signals.to_wire(),
        generated_at: Utc::now(),
    };
    lc.advance(Stage::Finalized);
    tracing::info!(
        request_id = %lc.request_id,
        poll_id = req.poll_id,
        mode = ?response.mode,
        "vote proof finalized"
    );

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::default_polls;
    use crate::state::test_support::unprovisioned_state;
    use zk_proofs::commitment::nullifier_hash;
    use zk_proofs::types::ProofMode;

    fn age_request(age: u8, secret: &str) -> ProveAgeRequest {
        ProveAgeRequest {
            age,
            secret: secret.to_string(),
            min_age: Some(18),
            timeout_ms: None,
        }
    }

    fn vote_request(candidate_id: u64, nullifier_seed: &str) -> ProveVoteRequest {
        ProveVoteRequest {
            poll_id: 1,
            candidate_id,
            voter_secret: "98765".to_string(),
            nullifier_seed: nullifier_seed.to_string(),
            timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn eligible_age_finalizes_with_stable_commitment() {
        let state = unprovisioned_state().await;

        let first = run_age_request(&state, age_request(25, "12345")).await.unwrap();
        let second = run_age_request(&state, age_request(25, "12345")).await.unwrap();

        assert!(first.is_eligible);
        assert_eq!(first.public_signals.commitment, second.public_signals.commitment);
        assert_ne!(first.request_id, second.request_id);
    }

    #[tokio::test]
    async fn underage_request_finalizes_rather_than_rejects() {
        let state = unprovisioned_state().await;

        let response = run_age_request(&state, age_request(16, "12345")).await.unwrap();
        assert!(!response.is_eligible);
        assert!(!response.public_signals.is_eligible);
    }

    #[tokio::test]
    async fn invalid_inputs_reject_before_any_backend() {
        let state = unprovisioned_state().await;

        for (age, secret) in [(200u8, "12345"), (25, ""), (25, "not-a-number"), (25, "12.5")] {
            let err = run_age_request(&state, age_request(age, secret)).await.unwrap_err();
            assert!(matches!(err, ProofError::InvalidInput(_)), "{age}/{secret:?}: {err}");
        }

        let oversized = "3".repeat(64);
        let err = run_age_request(&state, age_request(25, &oversized)).await.unwrap_err();
        assert!(matches!(err, ProofError::InputOutOfRange));
    }

    #[tokio::test]
    async fn unprovisioned_backend_tags_simulation() {
        let state = unprovisioned_state().await;

        let response = run_age_request(&state, age_request(25, "12345")).await.unwrap();
        assert_eq!(response.mode, ProofMode::Simulation);
    }

    #[tokio::test]
    async fn duplicate_vote_is_rejected_deterministically() {
        let state = unprovisioned_state().await;

        let first = run_vote_request(&state, vote_request(1, "54321")).await.unwrap();
        assert_eq!(first.public_signals.poll_id, 1);

        // Same nullifier seed, even for a different candidate: terminal rejection.
        let second = run_vote_request(&state, vote_request(2, "54321")).await.unwrap_err();
        assert!(matches!(second, ProofError::DuplicateVote));

        // Retrying must fail again, not flap.
        let third = run_vote_request(&state, vote_request(1, "54321")).await.unwrap_err();
        assert!(matches!(third, ProofError::DuplicateVote));

        let expected = FrHex::from_fr(&nullifier_hash(Fr::from(54321u64), 1)).hex;
        assert!(db::is_reserved(&state.db, 1, &expected).await.unwrap());
        assert_eq!(db::count_votes(&state.db, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn vote_validation_checks_poll_configuration() {
        let state = unprovisioned_state().await;

        let mut req = vote_request(1, "777");
        req.poll_id = 99;
        assert!(matches!(
            run_vote_request(&state, req).await.unwrap_err(),
            ProofError::PollNotFound(99)
        ));

        let req = vote_request(42, "777");
        assert!(matches!(
            run_vote_request(&state, req).await.unwrap_err(),
            ProofError::InvalidInput(_)
        ));

        // Neither attempt may have consumed a nullifier.
        assert_eq!(db::count_nullifiers(&state.db, 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn timed_out_proving_reserves_nothing() {
        // Provision the vote circuit for real so the request takes the circuit path,
        // then force an immediate timeout.
        let keys_dir = std::env::temp_dir().join(format!("zkvote-test-{}", Uuid::new_v4()));
        let db = crate::db::test_db().await;
        let polls = default_polls().into_iter().map(|p| (p.poll_id, p)).collect();
        let state = AppState::new(db.clone(), keys_dir, polls);
        state.provision_keys(CircuitKind::Vote).await.unwrap();

        let mut req = vote_request(1, "11111");
        req.timeout_ms = Some(0);

        let err = run_vote_request(&state, req).await.unwrap_err();
        assert!(matches!(err, ProofError::ProofGenerationFailed(_)));

        let expected = FrHex::from_fr(&nullifier_hash(Fr::from(11111u64), 1)).hex;
        assert!(!db::is_reserved(&db, 1, &expected).await.unwrap());
        assert_eq!(db::count_votes(&db, 1).await.unwrap(), 0);
    }
}
