use crate::db;
use crate::errors::ApiError;
use crate::models::*;
use crate::orchestrator;
use crate::prover::{self, SelectedBackend};
use crate::state::AppState;
use crate::verify;
use axum::{
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use tower_http::cors::{Any, CorsLayer};
use zk_proofs::types::CircuitKind;

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/prove/age", post(prove_age))
        .route("/api/v1/prove/vote", post(prove_vote))
        .route("/api/v1/verify/age", post(verify_age))
        .route("/api/v1/verify/vote", post(verify_vote))
        .route("/api/v1/zk/setup", post(run_setup))
        .layer(middleware::from_fn(auth_middleware));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/api/v1/polls", get(list_polls))
        .route("/api/v1/zk/vk/:kind", get(get_vk))
        .merge(protected_routes)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // In production, this should be a strong secret from environment.
    let expected_key = std::env::var("API_KEY").unwrap_or_else(|_| "dev-secret-key".to_string());

    if let Some(provided_key) = headers.get("X-API-KEY") {
        if provided_key == expected_key.as_str() {
            return Ok(next.run(request).await);
        }
    }

    tracing::warn!("unauthorized access attempt");
    Err(StatusCode::UNAUTHORIZED)
}

/// Liveness + provisioning report. `backend_reachable` reflects a fresh probe, not a
/// cached flag, so the answer tracks the backend disappearing mid-session.
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let circuits_provisioned = state.keys_provisioned(CircuitKind::Age)
        && state.keys_provisioned(CircuitKind::Vote);

    let age_reachable = matches!(
        prover::select_backend(&state, CircuitKind::Age).await,
        SelectedBackend::Circuit(_)
    );
    let vote_reachable = matches!(
        prover::select_backend(&state, CircuitKind::Vote).await,
        SelectedBackend::Circuit(_)
    );
    let backend_reachable = age_reachable && vote_reachable;

    Json(StatusResponse {
        circuits_provisioned,
        backend_reachable,
        ready: circuits_provisioned && backend_reachable,
    })
}

async fn list_polls(State(state): State<AppState>) -> Result<Json<PollListResponse>, ApiError> {
    let mut polls = Vec::new();
    for poll in state.polls() {
        let votes_cast = db::count_nullifiers(&state.db, poll.poll_id).await?;
        polls.push(PollSummary {
            poll_id: poll.poll_id,
            name: poll.name.clone(),
            candidate_ids: poll.candidate_ids.clone(),
            min_age: poll.min_age,
            votes_cast,
        });
    }
    polls.sort_by_key(|p| p.poll_id);

    Ok(Json(PollListResponse { polls }))
}

async fn get_vk(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<ZkVkResponse>, ApiError> {
    let kind: CircuitKind = kind.parse().map_err(ApiError::BadRequest)?;

    let keys = state.load_keys(kind).await?;
    let vk_bytes = zk_proofs::groth16::serialize_vk(keys.vk.as_ref())
        .map_err(|_| ApiError::Internal)?;

    let b64 = base64::engine::general_purpose::STANDARD.encode(vk_bytes);

    Ok(Json(ZkVkResponse {
        curve: "bn254".to_string(),
        proof_system: "groth16".to_string(),
        circuit: kind,
        vk_b64: b64,
    }))
}

/// Run the trusted setup for both circuits and persist the keys.
async fn run_setup(State(state): State<AppState>) -> Result<Json<SetupResponse>, ApiError> {
    state.provision_keys(CircuitKind::Age).await?;
    state.provision_keys(CircuitKind::Vote).await?;

    tracing::info!("circuit keys provisioned");
    Ok(Json(SetupResponse { circuits_provisioned: true }))
}

async fn prove_age(
    State(state): State<AppState>,
    Json(req): Json<ProveAgeRequest>,
) -> Result<Json<ProveAgeResponse>, ApiError> {
    let response = orchestrator::run_age_request(&state, req).await?;
    Ok(Json(response))
}

async fn prove_vote(
    State(state): State<AppState>,
    Json(req): Json<ProveVoteRequest>,
) -> Result<Json<ProveVoteResponse>, ApiError> {
    let response = orchestrator::run_vote_request(&state, req).await?;
    Ok(Json(response))
}

async fn verify_age(
    State(state): State<AppState>,
    Json(req): Json<VerifyAgeRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let response = verify::verify_age(&state, req).await?;
    Ok(Json(response))
}

async fn verify_vote(
    State(state): State<AppState>,
    Json(req): Json<VerifyVoteRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let response = verify::verify_vote(&state, req).await?;
    Ok(Json(response))
}
