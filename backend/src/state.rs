use crate::db::Db;
use crate::errors::ProofError;
use crate::models::PollConfiguration;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use zk_proofs::groth16::{
    deserialize_pk, deserialize_vk, serialize_pk, serialize_vk, setup_age_keys, setup_vote_keys,
};
use zk_proofs::types::CircuitKind;

use ark_bn254::Bn254;
use ark_groth16::{ProvingKey, VerifyingKey};
use rand::rngs::OsRng;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub data_dir: PathBuf,
    polls: Arc<HashMap<u64, PollConfiguration>>,
    age_keys: Arc<OnceCell<ZkKeys>>,
    vote_keys: Arc<OnceCell<ZkKeys>>,
    // Proving is CPU- and memory-heavy; one in-flight proof per circuit kind. Different
    // kinds may prove in parallel.
    age_prove_lock: Arc<Mutex<()>>,
    vote_prove_lock: Arc<Mutex<()>>,
}

#[derive(Clone)]
pub struct ZkKeys {
    pub pk: Arc<ProvingKey<Bn254>>,
    pub vk: Arc<VerifyingKey<Bn254>>,
}

impl AppState {
    pub fn new(db: Db, data_dir: PathBuf, polls: HashMap<u64, PollConfiguration>) -> Self {
        Self {
            db,
            data_dir,
            polls: Arc::new(polls),
            age_keys: Arc::new(OnceCell::new()),
            vote_keys: Arc::new(OnceCell::new()),
            age_prove_lock: Arc::new(Mutex::new(())),
            vote_prove_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn poll(&self, poll_id: u64) -> Option<&PollConfiguration> {
        self.polls.get(&poll_id)
    }

    pub fn polls(&self) -> impl Iterator<Item = &PollConfiguration> {
        self.polls.values()
    }

    pub fn prove_lock(&self, kind: CircuitKind) -> &Mutex<()> {
        match kind {
            CircuitKind::Age => &self.age_prove_lock,
            CircuitKind::Vote => &self.vote_prove_lock,
        }
    }

    fn key_cell(&self, kind: CircuitKind) -> &OnceCell<ZkKeys> {
        match kind {
            CircuitKind::Age => &self.age_keys,
            CircuitKind::Vote => &self.vote_keys,
        }
    }

    fn key_paths(&self, kind: CircuitKind) -> (PathBuf, PathBuf) {
        let keys_dir = self.data_dir.join("keys");
        (
            keys_dir.join(format!("{kind}_pk.bin")),
            keys_dir.join(format!("{kind}_vk.bin")),
        )
    }

    /// Cheap disk check used by the status endpoint; no deserialization.
    pub fn keys_provisioned(&self, kind: CircuitKind) -> bool {
        let (pk_path, vk_path) = self.key_paths(kind);
        pk_path.exists() && vk_path.exists()
    }

    /// Load Groth16 keys from disk. Never runs the trusted setup.
    ///
    /// Fails with `CircuitNotProvisioned` when the setup artifacts are missing; the
    /// backend adapter treats that as "fall back to simulation".
    pub async fn load_keys(&self, kind: CircuitKind) -> Result<ZkKeys, ProofError> {
        let (pk_path, vk_path) = self.key_paths(kind);

        self.key_cell(kind)
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || {
                    let pk_bytes =
                        std::fs::read(&pk_path).map_err(|_| ProofError::CircuitNotProvisioned)?;
                    let vk_bytes =
                        std::fs::read(&vk_path).map_err(|_| ProofError::CircuitNotProvisioned)?;

                    let pk = deserialize_pk(&pk_bytes).map_err(|_| ProofError::Internal)?;
                    let vk = deserialize_vk(&vk_bytes).map_err(|_| ProofError::Internal)?;

                    Ok::<ZkKeys, ProofError>(ZkKeys { pk: Arc::new(pk), vk: Arc::new(vk) })
                })
                .await
                .map_err(|_| ProofError::Internal)?
            })
            .await
            .cloned()
    }

    /// Ensure Groth16 keys exist on disk and in memory, running the trusted setup if needed.
    ///
    /// This is the explicit provisioning step (setup endpoint / SETUP_ON_START). Prove
    /// routes never call it; an unprovisioned circuit degrades to simulation instead.
    pub async fn provision_keys(&self, kind: CircuitKind) -> Result<ZkKeys, ProofError> {
        let (pk_path, vk_path) = self.key_paths(kind);

        self.key_cell(kind)
            .get_or_try_init(|| async move {
                tokio::task::spawn_blocking(move || {
                    let keys_dir = pk_path.parent().ok_or(ProofError::Internal)?;
                    std::fs::create_dir_all(keys_dir).map_err(|_| ProofError::Internal)?;

                    if pk_path.exists() && vk_path.exists() {
                        let pk_bytes = std::fs::read(&pk_path).map_err(|_| ProofError::Internal)?;
                        let vk_bytes = std::fs::read(&vk_path).map_err(|_| ProofError::Internal)?;

                        let pk = deserialize_pk(&pk_bytes).map_err(|_| ProofError::Internal)?;
                        let vk = deserialize_vk(&vk_bytes).map_err(|_| ProofError::Internal)?;

                        return Ok::<ZkKeys, ProofError>(ZkKeys {
                            pk: Arc::new(pk),
                            vk: Arc::new(vk),
                        });
                    }

                    // Trusted setup randomness (prototype).
                    //
                    // IMPORTANT: In production, use MPC setup or a transparent proof system.
                    let mut rng = OsRng;
                    let (pk, vk) = match kind {
                        CircuitKind::Age => setup_age_keys(&mut rng),
                        CircuitKind::Vote => setup_vote_keys(&mut rng),
                    }
                    .map_err(|_| ProofError::Internal)?;

                    let pk_bytes = serialize_pk(&pk).map_err(|_| ProofError::Internal)?;
                    let vk_bytes = serialize_vk(&vk).map_err(|_| ProofError::Internal)?;

                    std::fs::write(&pk_path, pk_bytes).map_err(|_| ProofError::Internal)?;
                    std::fs::write(&vk_path, vk_bytes).map_err(|_| ProofError::Internal)?;

                    Ok::<ZkKeys, ProofError>(ZkKeys { pk: Arc::new(pk), vk: Arc::new(vk) })
                })
                .await
                .map_err(|_| ProofError::Internal)?
            })
            .await
            .cloned()
    }
}
