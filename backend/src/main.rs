mod api;
mod db;
mod errors;
mod models;
mod orchestrator;
mod prover;
mod state;
mod verify;

use crate::errors::ApiError;
use crate::state::AppState;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use zk_proofs::types::CircuitKind;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // Store local state under backend/data (ignored by git).
    let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    std::fs::create_dir_all(&data_dir).map_err(|_| ApiError::Internal)?;

    let db_path = data_dir.join("vote.sqlite");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_string_lossy());

    let db = db::connect(&db_url).await?;
    db::init_schema(&db).await?;

    let polls_path = std::env::var("POLLS_PATH").ok().map(PathBuf::from);
    let polls = models::load_polls(polls_path.as_deref()).map_err(|e| {
        tracing::error!(%e, "poll configuration rejected");
        ApiError::Internal
    })?;
    tracing::info!(polls = polls.len(), "poll configuration loaded");

    let state = AppState::new(db, data_dir, polls);

    // Opt-in trusted setup at startup; otherwise provisioning happens via the setup
    // endpoint, and unprovisioned circuits serve simulation-mode artifacts.
    if std::env::var("SETUP_ON_START").is_ok_and(|v| v == "1") {
        state.provision_keys(CircuitKind::Age).await.map_err(|_| ApiError::Internal)?;
        state.provision_keys(CircuitKind::Vote).await.map_err(|_| ApiError::Internal)?;
        tracing::info!("circuit keys provisioned at startup");
    }

    let app = api::router(state);

    let addr = std::env::var("BACKEND_ADDR").unwrap_or_else(|_| "127.0.0.1:3001".to_string());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|_| ApiError::Internal)?;

    tracing::info!(%addr, "backend listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|_| ApiError::Internal)?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
