//! Proof backend adapter: genuine circuit proving with a simulation fallback.
//!
//! Backend selection runs per request. A short, time-bounded probe decides whether the
//! circuit backend (provisioned Groth16 keys) is usable; any failure degrades the request
//! to simulation mode rather than failing it. The probe result is never cached across
//! requests, so a backend that disappears mid-session stops being advertised immediately.
//!
//! Simulation artifacts reuse the commitment engine, so their public signals carry the
//! exact values the circuit would prove, but the proof blob is a placeholder with no
//! cryptographic weight. They are tagged `simulation` and refuse verification.

use crate::errors::ProofError;
use crate::state::{AppState, ZkKeys};
use base64::Engine;
use std::time::Duration;
use zk_proofs::commitment::{eligibility_commitment, nullifier_hash, vote_commitment};
use zk_proofs::groth16::{
    proof_to_b64, prove_eligibility, prove_vote, verify_eligibility_proof, verify_vote_proof,
};
use zk_proofs::types::{
    AgeSignals, CircuitKind, EligibilityClaim, ProofMode, VoteClaim, VoteSignals,
};

/// Upper bound on the circuit-backend availability probe. A hung key load degrades the
/// request to simulation instead of stalling it.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(250);

/// Marker blob emitted as the proof of a simulation artifact.
const SIMULATED_PROOF: &[u8] = b"zkvote/simulated-proof/v1";

/// Backend chosen for one request. Tagged-variant dispatch, selected at request time.
pub enum SelectedBackend {
    Circuit(ZkKeys),
    Simulation,
}

/// Probe the circuit backend and pick a variant for this request.
pub async fn select_backend(state: &AppState, kind: CircuitKind) -> SelectedBackend {
    match tokio::time::timeout(PROBE_TIMEOUT, state.load_keys(kind)).await {
        Ok(Ok(keys)) => SelectedBackend::Circuit(keys),
        Ok(Err(e)) => {
            tracing::warn!(%kind, %e, "circuit backend unavailable, falling back to simulation");
            SelectedBackend::Simulation
        }
        Err(_) => {
            tracing::warn!(%kind, "circuit backend probe timed out, falling back to simulation");
            SelectedBackend::Simulation
        }
    }
}

/// A generated proof artifact, immutable once produced.
pub struct GeneratedProof<S> {
    pub proof_b64: String,
    pub signals: S,
    pub mode: ProofMode,
}

pub fn simulated_proof_b64() -> String {
    base64::engine::general_purpose::STANDARD.encode(SIMULATED_PROOF)
}

pub async fn generate_eligibility_proof(
    state: &AppState,
    backend: &SelectedBackend,
    claim: EligibilityClaim,
) -> Result<GeneratedProof<AgeSignals>, ProofError> {
    match backend {
        SelectedBackend::Circuit(keys) => {
            // One in-flight proof per circuit kind; witness generation is memory-heavy.
            let _guard = state.prove_lock(CircuitKind::Age).lock().await;

            let pk = keys.pk.clone();
            let vk = keys.vk.clone();

            let (proof_b64, signals) = tokio::task::spawn_blocking(move || {
                // OS randomness so repeated proofs of the same claim are not linkable.
                let mut rng = rand::rngs::OsRng;
                let (proof, signals) = prove_eligibility(&mut rng, &pk, &claim)?;

                // Fail closed if our own proof doesn't verify.
                verify_eligibility_proof(&vk, &proof, &signals)?;

                let proof_b64 = proof_to_b64(&proof)?;
                Ok::<_, ProofError>((proof_b64, signals))
            })
            .await
            .map_err(|_| ProofError::Internal)??;

            Ok(GeneratedProof { proof_b64, signals, mode: ProofMode::Circuit })
        }
        SelectedBackend::Simulation => {
            let signals = AgeSignals {
                min_age: claim.min_age,
                commitment: eligibility_commitment(claim.age, claim.secret),
                is_eligible: claim.age >= claim.min_age,
            };
            Ok(GeneratedProof {
                proof_b64: simulated_proof_b64(),
                signals,
                mode: ProofMode::Simulation,
            })
        }
    }
}

pub async fn generate_vote_proof(
    state: &AppState,
    backend: &SelectedBackend,
    claim: VoteClaim,
) -> Result<GeneratedProof<VoteSignals>, ProofError> {
    match backend {
        SelectedBackend::Circuit(keys) => {
            let _guard = state.prove_lock(CircuitKind::Vote).lock().await;

            let pk = keys.pk.clone();
            let vk = keys.vk.clone();

            let (proof_b64, signals) = tokio::task::spawn_blocking(move || {
                let mut rng = rand::rngs::OsRng;
                let (proof, signals) = prove_vote(&mut rng, &pk, &claim)?;

                verify_vote_proof(&vk, &proof, &signals)?;

                let proof_b64 = proof_to_b64(&proof)?;
                Ok::<_, ProofError>((proof_b64, signals))
            })
            .await
            .map_err(|_| ProofError::Internal)??;

            Ok(GeneratedProof { proof_b64, signals, mode: ProofMode::Circuit })
        }
        SelectedBackend::Simulation => {
            let signals = VoteSignals {
                poll_id: claim.poll_id,
                commitment: vote_commitment(claim.candidate_id, claim.voter_secret, claim.poll_id),
                nullifier_hash: nullifier_hash(claim.nullifier_seed, claim.poll_id),
            };
            Ok(GeneratedProof {
                proof_b64: simulated_proof_b64(),
                signals,
                mode: ProofMode::Simulation,
            })
        }
    }
}

/// Backend verification contract for eligibility proofs.
///
/// Circuit mode replays the pairing check against the claimed public signals; a proof
/// that fails to decode or verify is simply `false`. Simulation artifacts refuse with
/// `NotVerifiable` (there is nothing to attest either way). An unreachable or
/// unprovisioned circuit backend surfaces as its own error so callers can report an
/// inconclusive verdict instead of a false negative.
pub async fn verify_eligibility(
    state: &AppState,
    mode: ProofMode,
    proof_b64: &str,
    signals: &AgeSignals,
) -> Result<bool, ProofError> {
    match mode {
        ProofMode::Simulation => Err(ProofError::NotVerifiable),
        ProofMode::Circuit => {
            let keys = tokio::time::timeout(PROBE_TIMEOUT, state.load_keys(CircuitKind::Age))
                .await
                .map_err(|_| ProofError::BackendUnavailable)??;

            let Ok(proof) = zk_proofs::groth16::proof_from_b64(proof_b64) else {
                return Ok(false);
            };
            Ok(verify_eligibility_proof(&keys.vk, &proof, signals).is_ok())
        }
    }
}

/// Backend verification contract for vote proofs. Same shape as [`verify_eligibility`].
pub async fn verify_vote(
    state: &AppState,
    mode: ProofMode,
    proof_b64: &str,
    signals: &VoteSignals,
) -> Result<bool, ProofError> {
    match mode {
        ProofMode::Simulation => Err(ProofError::NotVerifiable),
        ProofMode::Circuit => {
            let keys = tokio::time::timeout(PROBE_TIMEOUT, state.load_keys(CircuitKind::Vote))
                .await
                .map_err(|_| ProofError::BackendUnavailable)??;

            let Ok(proof) = zk_proofs::groth16::proof_from_b64(proof_b64) else {
                return Ok(false);
            };
            Ok(verify_vote_proof(&keys.vk, &proof, signals).is_ok())
        }
    }
}
