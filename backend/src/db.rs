//! SQLite persistence: the nullifier registry and finalized-vote bookkeeping.
//!
//! The registry is the only shared mutable state in the system. Its `reserve` operation
//! must be linearizable across concurrent callers; that rests on the primary-key
//! constraint, not process-local locking, so it holds across processes sharing the file.
//! Records survive restarts for the lifetime of a poll; there is no delete operation.

use crate::errors::ApiError;
use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use uuid::Uuid;
use zk_proofs::types::ProofMode;

pub type Db = Pool<Sqlite>;

/// Outcome of a nullifier reservation. `AlreadyUsed` is a normal result, not a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reservation {
    Accepted,
    AlreadyUsed,
}

pub async fn connect(db_url: &str) -> Result<Db, ApiError> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .map_err(|_| ApiError::Internal)
}

pub async fn init_schema(db: &Db) -> Result<(), ApiError> {
    // NOTE: Keep schema minimal and explicit. Nullifiers are append-only.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS nullifiers (
  poll_id INTEGER NOT NULL,
  nullifier_hash TEXT NOT NULL,
  consumed_at TEXT NOT NULL,
  PRIMARY KEY(poll_id, nullifier_hash)
);

CREATE TABLE IF NOT EXISTS votes (
  request_id TEXT PRIMARY KEY,
  poll_id INTEGER NOT NULL,
  commitment_hex TEXT NOT NULL,
  nullifier_hash TEXT NOT NULL,
  mode TEXT NOT NULL,
  finalized_at TEXT NOT NULL
);
"#,
    )
    .execute(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    Ok(())
}

/// Atomic check-and-insert for a nullifier.
///
/// `INSERT OR IGNORE` against the primary key guarantees that of N concurrent calls for
/// the same (poll_id, nullifier_hash), exactly one observes `Accepted`.
pub async fn reserve(db: &Db, poll_id: u64, nullifier_hash: &str) -> Result<Reservation, ApiError> {
    let consumed_at = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO nullifiers (poll_id, nullifier_hash, consumed_at)
           VALUES (?, ?, ?)"#,
    )
    .bind(poll_id as i64)
    .bind(nullifier_hash)
    .bind(consumed_at)
    .execute(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    if result.rows_affected() == 0 {
        Ok(Reservation::AlreadyUsed)
    } else {
        Ok(Reservation::Accepted)
    }
}

/// Read-only membership test; never mutates.
pub async fn is_reserved(db: &Db, poll_id: u64, nullifier_hash: &str) -> Result<bool, ApiError> {
    let row = sqlx::query(
        r#"SELECT COUNT(*) AS c FROM nullifiers WHERE poll_id = ? AND nullifier_hash = ?"#,
    )
    .bind(poll_id as i64)
    .bind(nullifier_hash)
    .fetch_one(db)
    .await
    .map_err(|_| ApiError::Internal)?;

    let c: i64 = row.get("c");
    Ok(c > 0)
}

/// Reserve the nullifier and record the finalized artifact in one transaction.
///
/// The vote row and the nullifier either both land or neither does; callers never observe
/// a reserved nullifier without its artifact.
pub async fn finalize_vote(
    db: &Db,
    request_id: Uuid,
    poll_id: u64,
    commitment_hex: &str,
    nullifier_hash: &str,
    mode: ProofMode,
) -> Result<Reservation, ApiError> {
    let now = Utc::now().to_rfc3339();
    let mode = match mode {
        ProofMode::Circuit => "circuit",
        ProofMode::Simulation => "simulation",
    };

    let mut tx = db.begin().await.map_err(|_| ApiError::Internal)?;

    let result = sqlx::query(
        r#"INSERT OR IGNORE INTO nullifiers (poll_id, nullifier_hash, consumed_at)
           VALUES (?, ?, ?)"#,
    )
    .bind(poll_id as i64)
    .bind(nullifier_hash)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|_| ApiError::Internal)?;

    if result.rows_affected() == 0 {
        tx.rollback().await.map_err(|_| ApiError::Internal)?;
        return Ok(Reservation::AlreadyUsed);
    }

    sqlx::query(
        r#"INSERT INTO votes (request_id, poll_id, commitment_hex, nullifier_hash, mode, finalized_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(request_id.to_string())
    .bind(poll_id as i64)
    .bind(commitment_hex)
    .bind(nullifier_hash)
    .bind(mode)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .map_err(|_| ApiError::Internal)?;

    tx.commit().await.map_err(|_| ApiError::Internal)?;
    Ok(Reservation::Accepted)
}

pub async fn count_nullifiers(db: &Db, poll_id: u64) -> Result<u64, ApiError> {
    let row = sqlx::query(r#"SELECT COUNT(*) AS c FROM nullifiers WHERE poll_id = ?"#)
        .bind(poll_id as i64)
        .fetch_one(db)
        .await
        .map_err(|_| ApiError::Internal)?;
    let c: i64 = row.get("c");
    Ok(c as u64)
}

pub async fn count_votes(db: &Db, poll_id: u64) -> Result<u64, ApiError> {
    let row = sqlx::query(r#"SELECT COUNT(*) AS c FROM votes WHERE poll_id = ?"#)
        .bind(poll_id as i64)
        .fetch_one(db)
        .await
        .map_err(|_| ApiError::Internal)?;
    let c: i64 = row.get("c");
    Ok(c as u64)
}

#[cfg(test)]
pub(crate) async fn test_db() -> Db {
    // A single connection shares one in-memory database across the test.
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_schema(&db).await.expect("schema");
    db
}
