//! Types shared between the circuits and the host-side prover/verifier.

use std::fmt;
use std::str::FromStr;

use ark_bn254::Fr;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};

/// Which circuit a proof belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitKind {
    Age,
    Vote,
}

impl CircuitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitKind::Age => "age",
            CircuitKind::Vote => "vote",
        }
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "age" => Ok(CircuitKind::Age),
            "vote" => Ok(CircuitKind::Vote),
            other => Err(format!("unknown circuit kind: {other}")),
        }
    }
}

/// How a proof artifact was produced.
///
/// Simulation artifacts reproduce the public-signal shape and the eligibility/nullifier
/// semantics but carry no cryptographic soundness. Verifiers must never treat them as valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofMode {
    Circuit,
    Simulation,
}

/// Private inputs for an age-eligibility proof.
///
/// Only `min_age` is public. The claim is never serialized; it exists in memory for the
/// duration of one proof request.
#[derive(Clone, Debug)]
pub struct EligibilityClaim {
    /// Age in years.
    pub age: u8,
    /// Blinding secret chosen by the prover.
    pub secret: Fr,
    /// Public eligibility threshold.
    pub min_age: u8,
}

/// Private inputs for a vote-commitment proof.
///
/// Only `poll_id` is public; the candidate is revealed solely through its commitment.
#[derive(Clone, Debug)]
pub struct VoteClaim {
    pub candidate_id: u64,
    pub voter_secret: Fr,
    /// Single-use identity seed; its hash against the poll becomes the nullifier.
    pub nullifier_seed: Fr,
    pub poll_id: u64,
}

/// JSON-friendly representation of a field element.
///
/// We expose Fr values as hex strings (canonical compressed encoding) to avoid ambiguities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrHex {
    pub hex: String,
}

impl FrHex {
    pub fn from_fr(x: &Fr) -> Self {
        // Use arkworks' canonical compressed encoding so all components agree.
        let mut bytes = Vec::new();
        x.serialize_compressed(&mut bytes)
            .expect("in-memory serialization");
        Self { hex: hex::encode(bytes) }
    }

    pub fn to_fr(&self) -> Result<Fr, String> {
        let bytes = hex::decode(&self.hex).map_err(|e| format!("invalid hex: {e}"))?;
        Fr::deserialize_compressed(&bytes[..]).map_err(|e| format!("invalid field bytes: {e}"))
    }
}

/// Public signals of an age-eligibility proof, as field elements.
///
/// The struct fixes the signal shape; `to_field_elems` fixes the order the verifier sees.
/// Both MUST match the circuit's public input allocation order: min_age, commitment,
/// is_eligible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgeSignals {
    pub min_age: u8,
    pub commitment: Fr,
    pub is_eligible: bool,
}

impl AgeSignals {
    pub fn to_field_elems(&self) -> Vec<Fr> {
        vec![
            Fr::from(self.min_age as u64),
            self.commitment,
            Fr::from(self.is_eligible as u64),
        ]
    }

    pub fn to_wire(&self) -> AgePublicSignals {
        AgePublicSignals {
            min_age: self.min_age,
            commitment: FrHex::from_fr(&self.commitment),
            is_eligible: self.is_eligible,
        }
    }
}

/// Public signals of a vote-commitment proof, as field elements.
///
/// Order: poll_id, commitment, nullifier_hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteSignals {
    pub poll_id: u64,
    pub commitment: Fr,
    pub nullifier_hash: Fr,
}

impl VoteSignals {
    pub fn to_field_elems(&self) -> Vec<Fr> {
        vec![
            Fr::from(self.poll_id),
            self.commitment,
            self.nullifier_hash,
        ]
    }

    pub fn to_wire(&self) -> VotePublicSignals {
        VotePublicSignals {
            poll_id: self.poll_id,
            commitment: FrHex::from_fr(&self.commitment),
            nullifier_hash: FrHex::from_fr(&self.nullifier_hash),
        }
    }
}

/// Wire form of [`AgeSignals`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgePublicSignals {
    pub min_age: u8,
    pub commitment: FrHex,
    pub is_eligible: bool,
}

impl AgePublicSignals {
    pub fn to_signals(&self) -> Result<AgeSignals, String> {
        Ok(AgeSignals {
            min_age: self.min_age,
            commitment: self.commitment.to_fr()?,
            is_eligible: self.is_eligible,
        })
    }
}

/// Wire form of [`VoteSignals`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VotePublicSignals {
    pub poll_id: u64,
    pub commitment: FrHex,
    pub nullifier_hash: FrHex,
}

impl VotePublicSignals {
    pub fn to_signals(&self) -> Result<VoteSignals, String> {
        Ok(VoteSignals {
            poll_id: self.poll_id,
            commitment: self.commitment.to_fr()?,
            nullifier_hash: self.nullifier_hash.to_fr()?,
        })
    }
}
