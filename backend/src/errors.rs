use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use thiserror::Error;
use zk_proofs::groth16::ZkError;

/// Protocol-level failure taxonomy.
///
/// `BackendUnavailable` and `CircuitNotProvisioned` are recovered locally by falling back
/// to simulation mode on prove routes; they only surface from routes whose whole purpose
/// is the circuit backend (vk fetch, setup). `DuplicateVote` is an expected business
/// rejection, not a fault, and rejects deterministically on retry.
#[derive(Debug, Error)]
pub enum ProofError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("poll {0} is not configured")]
    PollNotFound(u64),

    #[error("input exceeds the supported scalar range")]
    InputOutOfRange,

    #[error("proving backend unavailable")]
    BackendUnavailable,

    #[error("circuit keys are not provisioned")]
    CircuitNotProvisioned,

    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    #[error("nullifier already consumed for this poll")]
    DuplicateVote,

    #[error("simulation artifacts cannot be cryptographically verified")]
    NotVerifiable,

    #[error("internal error")]
    Internal,
}

impl From<ZkError> for ProofError {
    fn from(e: ZkError) -> Self {
        match e {
            ZkError::InvalidScalar => ProofError::InvalidInput(e.to_string()),
            ZkError::InputOutOfRange => ProofError::InputOutOfRange,
            ZkError::VerificationFailed => ProofError::ProofGenerationFailed(e.to_string()),
            ZkError::Serialization(_) | ZkError::Ark(_) => {
                ProofError::ProofGenerationFailed(e.to_string())
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("proving error: {0}")]
    Proving(String),

    #[error("internal error")]
    Internal,
}

impl From<ProofError> for ApiError {
    fn from(e: ProofError) -> Self {
        match e {
            ProofError::InvalidInput(_) | ProofError::InputOutOfRange => {
                ApiError::BadRequest(e.to_string())
            }
            ProofError::PollNotFound(_) => ApiError::NotFound(e.to_string()),
            ProofError::DuplicateVote => ApiError::Conflict(e.to_string()),
            ProofError::BackendUnavailable | ProofError::CircuitNotProvisioned => {
                ApiError::Unavailable(e.to_string())
            }
            ProofError::ProofGenerationFailed(_) => ApiError::Proving(e.to_string()),
            ProofError::NotVerifiable => ApiError::BadRequest(e.to_string()),
            ProofError::Internal => ApiError::Internal,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            ApiError::Proving(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            ApiError::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };

        (status, Json(ErrorBody { error: msg })).into_response()
    }
}
