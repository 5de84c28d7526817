//! Verification service: replays submitted proofs against the circuit backend and, for
//! votes, against the nullifier registry.
//!
//! Verdicts are three-valued. `Inconclusive` covers everything the backend cannot attest:
//! simulation-tagged artifacts and an unreachable or unprovisioned circuit backend.
//! Callers must not treat `Inconclusive` as `Valid`. A vote whose nullifier is absent
//! from the registry is `Invalid` regardless of the pairing check: verification confirms
//! the specific vote that was finalized, not a recomputed replay.

use crate::db;
use crate::errors::ProofError;
use crate::models::{VerifyAgeRequest, VerifyResponse, VerifyVoteRequest};
use crate::prover;
use crate::state::AppState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use zk_proofs::types::FrHex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    Invalid,
    Inconclusive,
}

pub async fn verify_age(
    state: &AppState,
    req: VerifyAgeRequest,
) -> Result<VerifyResponse, ProofError> {
    let signals = req
        .public_signals
        .to_signals()
        .map_err(ProofError::InvalidInput)?;

    let verdict = match prover::verify_eligibility(state, req.mode, &req.proof_b64, &signals).await
    {
        Ok(true) => Verdict::Valid,
        Ok(false) => Verdict::Invalid,
        Err(
            ProofError::NotVerifiable
            | ProofError::BackendUnavailable
            | ProofError::CircuitNotProvisioned,
        ) => Verdict::Inconclusive,
        Err(e) => return Err(e),
    };

    Ok(VerifyResponse { verdict, mode: req.mode, checked_at: Utc::now() })
}

pub async fn verify_vote(
    state: &AppState,
    req: VerifyVoteRequest,
) -> Result<VerifyResponse, ProofError> {
    let signals = req
        .public_signals
        .to_signals()
        .map_err(ProofError::InvalidInput)?;

    // Registry check first: only the finalized vote for this nullifier can verify.
    let nullifier_hex = FrHex::from_fr(&signals.nullifier_hash).hex;
    let registered = db::is_reserved(&state.db, signals.poll_id, &nullifier_hex)
        .await
        .map_err(|_| ProofError::Internal)?;

    if !registered {
        return Ok(VerifyResponse {
            verdict: Verdict::Invalid,
            mode: req.mode,
            checked_at: Utc::now(),
        });
    }

    let verdict = match prover::verify_vote(state, req.mode, &req.proof_b64, &signals).await {
        Ok(true) => Verdict::Valid,
        Ok(false) => Verdict::Invalid,
        Err(
            ProofError::NotVerifiable
            | ProofError::BackendUnavailable
            | ProofError::CircuitNotProvisioned,
        ) => Verdict::Inconclusive,
        Err(e) => return Err(e),
    };

    Ok(VerifyResponse { verdict, mode: req.mode, checked_at: Utc::now() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{default_polls, ProveAgeRequest, ProveVoteRequest};
    use crate::orchestrator::{run_age_request, run_vote_request};
    use crate::state::test_support::unprovisioned_state;
    use crate::state::AppState;
    use uuid::Uuid;
    use zk_proofs::types::{CircuitKind, ProofMode};

    fn vote_request(nullifier_seed: &str) -> ProveVoteRequest {
        ProveVoteRequest {
            poll_id: 1,
            candidate_id: 1,
            voter_secret: "98765".to_string(),
            nullifier_seed: nullifier_seed.to_string(),
            timeout_ms: None,
        }
    }

    #[tokio::test]
    async fn simulation_artifacts_verify_inconclusive_never_valid() {
        let state = unprovisioned_state().await;

        let finalized = run_vote_request(&state, vote_request("54321")).await.unwrap();
        assert_eq!(finalized.mode, ProofMode::Simulation);

        let response = verify_vote(
            &state,
            VerifyVoteRequest {
                proof_b64: finalized.proof_b64,
                public_signals: finalized.public_signals,
                mode: finalized.mode,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.verdict, Verdict::Inconclusive);
    }

    #[tokio::test]
    async fn unregistered_nullifier_is_invalid_even_in_simulation() {
        let state = unprovisioned_state().await;

        // A well-formed artifact whose nullifier was never finalized: a replay.
        let finalized = run_vote_request(&state, vote_request("54321")).await.unwrap();
        let mut signals = finalized.public_signals;
        signals.nullifier_hash = zk_proofs::types::FrHex::from_fr(
            &zk_proofs::commitment::nullifier_hash(ark_bn254::Fr::from(999u64), 1),
        );

        let response = verify_vote(
            &state,
            VerifyVoteRequest {
                proof_b64: finalized.proof_b64,
                public_signals: signals,
                mode: finalized.mode,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.verdict, Verdict::Invalid);
    }

    #[tokio::test]
    async fn circuit_tagged_artifact_without_keys_is_inconclusive() {
        let state = unprovisioned_state().await;

        let finalized = run_age_request(
            &state,
            ProveAgeRequest {
                age: 25,
                secret: "12345".to_string(),
                min_age: Some(18),
                timeout_ms: None,
            },
        )
        .await
        .unwrap();

        // Claiming circuit mode does not help: there is no verifying key to check against.
        let response = verify_age(
            &state,
            VerifyAgeRequest {
                proof_b64: finalized.proof_b64,
                public_signals: finalized.public_signals,
                mode: ProofMode::Circuit,
            },
        )
        .await
        .unwrap();

        assert_eq!(response.verdict, Verdict::Inconclusive);
    }

    #[tokio::test]
    async fn circuit_mode_round_trip_and_tamper_detection() {
        let keys_dir = std::env::temp_dir().join(format!("zkvote-test-{}", Uuid::new_v4()));
        let db = crate::db::test_db().await;
        let polls = default_polls().into_iter().map(|p| (p.poll_id, p)).collect();
        let state = AppState::new(db, keys_dir, polls);
        state.provision_keys(CircuitKind::Age).await.unwrap();

        let finalized = run_age_request(
            &state,
            ProveAgeRequest {
                age: 25,
                secret: "12345".to_string(),
                min_age: Some(18),
                timeout_ms: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(finalized.mode, ProofMode::Circuit);

        let valid = verify_age(
            &state,
            VerifyAgeRequest {
                proof_b64: finalized.proof_b64.clone(),
                public_signals: finalized.public_signals.clone(),
                mode: ProofMode::Circuit,
            },
        )
        .await
        .unwrap();
        assert_eq!(valid.verdict, Verdict::Valid);

        // Tampered signals must not verify.
        let mut tampered = finalized.public_signals.clone();
        tampered.is_eligible = false;
        let invalid = verify_age(
            &state,
            VerifyAgeRequest {
                proof_b64: finalized.proof_b64.clone(),
                public_signals: tampered,
                mode: ProofMode::Circuit,
            },
        )
        .await
        .unwrap();
        assert_eq!(invalid.verdict, Verdict::Invalid);

        // Garbage proof bytes are invalid, not an error.
        let garbage = verify_age(
            &state,
            VerifyAgeRequest {
                proof_b64: "AAAA".to_string(),
                public_signals: finalized.public_signals,
                mode: ProofMode::Circuit,
            },
        )
        .await
        .unwrap();
        assert_eq!(garbage.verdict, Verdict::Invalid);
    }
}
