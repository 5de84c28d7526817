//! Crate-wide constants used by the ZK circuits and host-side orchestration.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::{find_poseidon_ark_and_mds, PoseidonConfig};
use ark_ff::PrimeField;

/// Highest age the protocol accepts as an input.
///
/// Ages are constrained to 8 bits in-circuit, so the bound must stay below 256.
pub const MAX_AGE: u8 = 150;

/// Eligibility threshold used when a request does not supply one.
pub const DEFAULT_MIN_AGE: u8 = 18;

/// Bit width used for age range constraints inside the circuits.
pub const AGE_BITS: usize = 8;

// Poseidon sponge configuration.
//
// We use a width-3 sponge (rate=2, capacity=1) to efficiently absorb pairs of field elements.
// The specific round counts chosen here are consistent with widely used Poseidon instantiations.
//
// NOTE: This is a prototype. For production, parameters should be reviewed by cryptographers
// and ideally fixed via audited constants / standard sets.
pub const POSEIDON_RATE: usize = 2;
pub const POSEIDON_CAPACITY: usize = 1;

// Typical Poseidon parameters for width=3.
pub const POSEIDON_FULL_ROUNDS: usize = 8;
pub const POSEIDON_PARTIAL_ROUNDS: usize = 57;

/// Poseidon S-box exponent (alpha). Common choices are 5 or 17.
pub const POSEIDON_ALPHA: u64 = 5;

/// Deterministically derive Poseidon parameters for BN254::Fr.
///
/// This uses arkworks' parameter derivation helper (Ark + MDS) so both the native hasher
/// and the in-circuit gadget agree on the same constants. Commitments computed on the host
/// for display MUST match the ones the circuits prove, so every commitment in the system
/// goes through this single configuration.
pub fn poseidon_config() -> PoseidonConfig<Fr> {
    // The helper expects the prime field size in bits.
    let prime_bits = Fr::MODULUS_BIT_SIZE as u64;

    // Derive the round constants (ARK) and MDS matrix.
    let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
        prime_bits,
        POSEIDON_RATE,
        POSEIDON_FULL_ROUNDS as u64,
        POSEIDON_PARTIAL_ROUNDS as u64,
        0,
    );

    PoseidonConfig::new(
        POSEIDON_FULL_ROUNDS,
        POSEIDON_PARTIAL_ROUNDS,
        POSEIDON_ALPHA,
        mds,
        ark,
        POSEIDON_RATE,
        POSEIDON_CAPACITY,
    )
}
