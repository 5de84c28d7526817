use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zk_proofs::types::{AgePublicSignals, ProofMode, VotePublicSignals};

/// Read-only poll configuration, supplied externally.
///
/// `candidate_ids` is treated as a set; membership gates vote validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollConfiguration {
    pub poll_id: u64,
    pub name: String,
    pub candidate_ids: Vec<u64>,
    pub min_age: u8,
}

impl PollConfiguration {
    pub fn has_candidate(&self, candidate_id: u64) -> bool {
        self.candidate_ids.contains(&candidate_id)
    }
}

/// Built-in demo poll used when no configuration file is supplied.
pub fn default_polls() -> Vec<PollConfiguration> {
    vec![PollConfiguration {
        poll_id: 1,
        name: "Demo poll".to_string(),
        candidate_ids: vec![1, 2, 3],
        min_age: 18,
    }]
}

/// Load poll configurations from a JSON file, falling back to the built-in default.
pub fn load_polls(path: Option<&Path>) -> Result<HashMap<u64, PollConfiguration>, String> {
    let polls = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read poll configuration {}: {e}", path.display()))?;
            serde_json::from_str::<Vec<PollConfiguration>>(&raw)
                .map_err(|e| format!("invalid poll configuration {}: {e}", path.display()))?
        }
        None => default_polls(),
    };

    let mut map = HashMap::with_capacity(polls.len());
    for poll in polls {
        if map.insert(poll.poll_id, poll).is_some() {
            return Err("duplicate poll_id in poll configuration".to_string());
        }
    }
    Ok(map)
}

#[derive(Debug, Deserialize)]
pub struct ProveAgeRequest {
    pub age: u8,
    /// Blinding secret as a decimal string; never logged.
    pub secret: String,
    /// Defaults to the protocol-wide threshold when absent.
    pub min_age: Option<u8>,
    /// Upper bound on proving time, milliseconds. Clamped server-side.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProveAgeResponse {
    pub request_id: Uuid,
    pub mode: ProofMode,
    pub proof_b64: String,
    pub public_signals: AgePublicSignals,
    pub is_eligible: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ProveVoteRequest {
    pub poll_id: u64,
    pub candidate_id: u64,
    pub voter_secret: String,
    pub nullifier_seed: String,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProveVoteResponse {
    pub request_id: Uuid,
    pub mode: ProofMode,
    pub proof_b64: String,
    pub public_signals: VotePublicSignals,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyAgeRequest {
    pub proof_b64: String,
    pub public_signals: AgePublicSignals,
    /// Mode the artifact was produced under; simulation artifacts verify as inconclusive.
    pub mode: ProofMode,
}

#[derive(Debug, Deserialize)]
pub struct VerifyVoteRequest {
    pub proof_b64: String,
    pub public_signals: VotePublicSignals,
    pub mode: ProofMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub verdict: crate::verify::Verdict,
    pub mode: ProofMode,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub circuits_provisioned: bool,
    pub backend_reachable: bool,
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct PollSummary {
    pub poll_id: u64,
    pub name: String,
    pub candidate_ids: Vec<u64>,
    pub min_age: u8,
    pub votes_cast: u64,
}

#[derive(Debug, Serialize)]
pub struct PollListResponse {
    pub polls: Vec<PollSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ZkVkResponse {
    pub curve: String,
    pub proof_system: String,
    pub circuit: zk_proofs::types::CircuitKind,
    pub vk_b64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetupResponse {
    pub circuits_provisioned: bool,
}
