//! Groth16 prover/verifier orchestration for the protocol circuits.
//!
//! SECURITY NOTE (prototype): Groth16 requires a trusted setup that produces a proving key (PK)
//! and verifying key (VK) per circuit. This prototype generates keys locally. In production, an
//! MPC ceremony (or a transparent system) should be used.

use crate::circuit::{AgeEligibilityCircuit, VoteCommitmentCircuit};
use crate::commitment::{eligibility_commitment, nullifier_hash, vote_commitment};
use crate::constants::MAX_AGE;
use crate::types::{AgeSignals, EligibilityClaim, VoteClaim, VoteSignals};
use ark_bn254::Bn254;
use ark_groth16::{prepare_verifying_key, Groth16, Proof, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use base64::Engine;
use rand::RngCore;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ZkError {
    #[error("scalar is not a non-empty decimal numeric string")]
    InvalidScalar,

    #[error("input exceeds the supported range")]
    InputOutOfRange,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("proof verification failed")]
    VerificationFailed,

    #[error("arkworks error: {0}")]
    Ark(String),
}

/// Generate a Groth16 keypair for the age-eligibility circuit.
///
/// Must be run once per deployment; the keys are persisted by the host.
pub fn setup_age_keys(rng: &mut impl RngCore) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), ZkError> {
    // Constraints do not depend on the witness values; any satisfiable instance works.
    let claim = EligibilityClaim { age: 0, secret: 0u64.into(), min_age: 0 };
    let circuit = age_circuit_for(&claim);

    let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(circuit, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    let vk = pk.vk.clone();
    Ok((pk, vk))
}

/// Generate a Groth16 keypair for the vote-commitment circuit.
pub fn setup_vote_keys(rng: &mut impl RngCore) -> Result<(ProvingKey<Bn254>, VerifyingKey<Bn254>), ZkError> {
    let claim = VoteClaim {
        candidate_id: 0,
        voter_secret: 0u64.into(),
        nullifier_seed: 0u64.into(),
        poll_id: 0,
    };
    let circuit = vote_circuit_for(&claim);

    let pk = Groth16::<Bn254>::generate_random_parameters_with_reduction(circuit, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    let vk = pk.vk.clone();
    Ok((pk, vk))
}

fn age_circuit_for(claim: &EligibilityClaim) -> AgeEligibilityCircuit {
    AgeEligibilityCircuit {
        age: claim.age,
        secret: claim.secret,
        public_min_age: claim.min_age,
        public_commitment: eligibility_commitment(claim.age, claim.secret),
        public_is_eligible: claim.age >= claim.min_age,
    }
}

fn vote_circuit_for(claim: &VoteClaim) -> VoteCommitmentCircuit {
    VoteCommitmentCircuit {
        candidate_id: claim.candidate_id,
        voter_secret: claim.voter_secret,
        nullifier_seed: claim.nullifier_seed,
        public_poll_id: claim.poll_id,
        public_commitment: vote_commitment(claim.candidate_id, claim.voter_secret, claim.poll_id),
        public_nullifier_hash: nullifier_hash(claim.nullifier_seed, claim.poll_id),
    }
}

/// Prove age eligibility. Returns the proof together with the public signals it attests to.
pub fn prove_eligibility(
    rng: &mut impl RngCore,
    pk: &ProvingKey<Bn254>,
    claim: &EligibilityClaim,
) -> Result<(Proof<Bn254>, AgeSignals), ZkError> {
    if claim.age > MAX_AGE || claim.min_age > MAX_AGE {
        return Err(ZkError::InputOutOfRange);
    }

    let circuit = age_circuit_for(claim);
    let signals = AgeSignals {
        min_age: circuit.public_min_age,
        commitment: circuit.public_commitment,
        is_eligible: circuit.public_is_eligible,
    };

    let proof = Groth16::<Bn254>::create_random_proof_with_reduction(circuit, pk, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    Ok((proof, signals))
}

/// Prove a vote commitment and its nullifier hash.
pub fn prove_vote(
    rng: &mut impl RngCore,
    pk: &ProvingKey<Bn254>,
    claim: &VoteClaim,
) -> Result<(Proof<Bn254>, VoteSignals), ZkError> {
    let circuit = vote_circuit_for(claim);
    let signals = VoteSignals {
        poll_id: circuit.public_poll_id,
        commitment: circuit.public_commitment,
        nullifier_hash: circuit.public_nullifier_hash,
    };

    let proof = Groth16::<Bn254>::create_random_proof_with_reduction(circuit, pk, rng)
        .map_err(|e| ZkError::Ark(format!("{e}")))?;

    Ok((proof, signals))
}

/// Verify an age-eligibility proof against its public signals.
pub fn verify_eligibility_proof(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    signals: &AgeSignals,
) -> Result<(), ZkError> {
    let pvk = prepare_verifying_key(vk);
    let ok = Groth16::<Bn254>::verify_proof(&pvk, proof, &signals.to_field_elems())
        .map_err(|e| ZkError::Ark(format!("{e}")))?;
    if !ok {
        return Err(ZkError::VerificationFailed);
    }
    Ok(())
}

/// Verify a vote-commitment proof against its public signals.
pub fn verify_vote_proof(
    vk: &VerifyingKey<Bn254>,
    proof: &Proof<Bn254>,
    signals: &VoteSignals,
) -> Result<(), ZkError> {
    let pvk = prepare_verifying_key(vk);
    let ok = Groth16::<Bn254>::verify_proof(&pvk, proof, &signals.to_field_elems())
        .map_err(|e| ZkError::Ark(format!("{e}")))?;
    if !ok {
        return Err(ZkError::VerificationFailed);
    }
    Ok(())
}

/// Serialize a proving key to bytes.
pub fn serialize_pk(pk: &ProvingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    pk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_pk(bytes: &[u8]) -> Result<ProvingKey<Bn254>, ZkError> {
    ProvingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

pub fn serialize_vk(vk: &VerifyingKey<Bn254>) -> Result<Vec<u8>, ZkError> {
    let mut out = Vec::new();
    vk.serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(out)
}

pub fn deserialize_vk(bytes: &[u8]) -> Result<VerifyingKey<Bn254>, ZkError> {
    VerifyingKey::<Bn254>::deserialize_compressed(bytes)
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

/// Base64 transport encoding for proofs (compressed canonical bytes underneath).
pub fn proof_to_b64(proof: &Proof<Bn254>) -> Result<String, ZkError> {
    let mut out = Vec::new();
    proof
        .serialize_compressed(&mut out)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(out))
}

pub fn proof_from_b64(b64: &str) -> Result<Proof<Bn254>, ZkError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| ZkError::Serialization(format!("{e}")))?;
    Proof::<Bn254>::deserialize_compressed(&bytes[..])
        .map_err(|e| ZkError::Serialization(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn rng() -> ChaCha20Rng {
        // Deterministic setup keeps these tests reproducible.
        ChaCha20Rng::seed_from_u64(0x5eed)
    }

    #[test]
    fn age_proof_round_trip() {
        let mut rng = rng();
        let (pk, vk) = setup_age_keys(&mut rng).unwrap();

        let claim = EligibilityClaim { age: 25, secret: 12345u64.into(), min_age: 18 };
        let (proof, signals) = prove_eligibility(&mut rng, &pk, &claim).unwrap();

        assert!(signals.is_eligible);
        verify_eligibility_proof(&vk, &proof, &signals).unwrap();

        // Commitments are stable across repeated generation with identical inputs.
        let (_, signals_again) = prove_eligibility(&mut rng, &pk, &claim).unwrap();
        assert_eq!(signals.commitment, signals_again.commitment);
    }

    #[test]
    fn age_proof_rejects_foreign_signals() {
        let mut rng = rng();
        let (pk, vk) = setup_age_keys(&mut rng).unwrap();

        let claim = EligibilityClaim { age: 25, secret: 12345u64.into(), min_age: 18 };
        let (proof, _) = prove_eligibility(&mut rng, &pk, &claim).unwrap();

        let other = EligibilityClaim { age: 30, secret: 777u64.into(), min_age: 18 };
        let (_, other_signals) = prove_eligibility(&mut rng, &pk, &other).unwrap();

        assert!(matches!(
            verify_eligibility_proof(&vk, &proof, &other_signals),
            Err(ZkError::VerificationFailed)
        ));
    }

    #[test]
    fn ineligible_age_still_proves() {
        let mut rng = rng();
        let (pk, vk) = setup_age_keys(&mut rng).unwrap();

        let claim = EligibilityClaim { age: 16, secret: 12345u64.into(), min_age: 18 };
        let (proof, signals) = prove_eligibility(&mut rng, &pk, &claim).unwrap();

        assert!(!signals.is_eligible);
        verify_eligibility_proof(&vk, &proof, &signals).unwrap();
    }

    #[test]
    fn age_out_of_range_is_refused() {
        let mut rng = rng();
        let (pk, _) = setup_age_keys(&mut rng).unwrap();

        let claim = EligibilityClaim { age: 200, secret: 1u64.into(), min_age: 18 };
        assert!(matches!(
            prove_eligibility(&mut rng, &pk, &claim),
            Err(ZkError::InputOutOfRange)
        ));
    }

    #[test]
    fn vote_proof_round_trip() {
        let mut rng = rng();
        let (pk, vk) = setup_vote_keys(&mut rng).unwrap();

        let claim = VoteClaim {
            candidate_id: 1,
            voter_secret: 98765u64.into(),
            nullifier_seed: 54321u64.into(),
            poll_id: 1,
        };
        let (proof, signals) = prove_vote(&mut rng, &pk, &claim).unwrap();

        assert_eq!(signals.poll_id, 1);
        verify_vote_proof(&vk, &proof, &signals).unwrap();

        // Tampered nullifier must not verify.
        let mut tampered = signals;
        tampered.nullifier_hash = nullifier_hash(99999u64.into(), 1);
        assert!(matches!(
            verify_vote_proof(&vk, &proof, &tampered),
            Err(ZkError::VerificationFailed)
        ));
    }

    #[test]
    fn proof_b64_round_trip() {
        let mut rng = rng();
        let (pk, vk) = setup_vote_keys(&mut rng).unwrap();

        let claim = VoteClaim {
            candidate_id: 2,
            voter_secret: 4242u64.into(),
            nullifier_seed: 777u64.into(),
            poll_id: 3,
        };
        let (proof, signals) = prove_vote(&mut rng, &pk, &claim).unwrap();

        let b64 = proof_to_b64(&proof).unwrap();
        let decoded = proof_from_b64(&b64).unwrap();
        verify_vote_proof(&vk, &decoded, &signals).unwrap();

        assert!(proof_from_b64("not base64!").is_err());
    }
}
