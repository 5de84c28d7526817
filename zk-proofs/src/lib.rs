//! ZK layer for the anonymous eligibility-and-voting protocol.
//!
//! This crate contains:
//! - The Poseidon commitment engine shared by the host and the circuits.
//! - SNARK circuits for age eligibility and vote commitments.
//! - Prover + verifier orchestration.
//! - Serialization helpers for transporting proofs and public signals.

pub mod constants;
pub mod commitment;
pub mod circuit;
pub mod groth16;
pub mod types;
