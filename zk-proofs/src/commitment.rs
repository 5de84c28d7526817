//! Poseidon commitment engine shared by the host and the circuits.
//!
//! Every commitment and nullifier hash in the protocol comes from `commit`, which MUST
//! agree with the in-circuit sponge gadget (same configuration, same absorb order).
//! Commitments derived here for display or simulation therefore match the ones the
//! circuits prove.

use crate::constants::poseidon_config;
use crate::groth16::ZkError;
use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonSponge;
use ark_crypto_primitives::sponge::CryptographicSponge;

/// Commit to an ordered sequence of field elements.
///
/// Deterministic, one-way, collision resistant. Pure; no failure modes once the inputs
/// are field elements (range checking happens in [`fr_from_decimal`]).
pub fn commit(values: &[Fr]) -> Fr {
    let cfg = poseidon_config();
    let mut sponge = PoseidonSponge::<Fr>::new(&cfg);
    for v in values {
        sponge.absorb(v);
    }
    sponge.squeeze_field_elements(1)[0]
}

/// Parse a caller-supplied decimal scalar into the field.
///
/// Scalars are bounded to 128 bits, comfortably inside the BN254 scalar modulus, so the
/// range check is exact: digit strings that overflow fail with `InputOutOfRange`,
/// anything non-numeric fails with `InvalidScalar`. Error values never echo the scalar.
pub fn fr_from_decimal(s: &str) -> Result<Fr, ZkError> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ZkError::InvalidScalar);
    }
    let value: u128 = s.parse().map_err(|_| ZkError::InputOutOfRange)?;
    Ok(Fr::from(value))
}

/// `H(age, secret)`: binds a private age to a blinding secret.
pub fn eligibility_commitment(age: u8, secret: Fr) -> Fr {
    commit(&[Fr::from(age as u64), secret])
}

/// `H(candidate_id, voter_secret, poll_id)`: binds a vote to a poll without revealing it.
pub fn vote_commitment(candidate_id: u64, voter_secret: Fr, poll_id: u64) -> Fr {
    commit(&[Fr::from(candidate_id), voter_secret, Fr::from(poll_id)])
}

/// `H(nullifier_seed, poll_id)`: the single-use token published when a vote finalizes.
pub fn nullifier_hash(nullifier_seed: Fr, poll_id: u64) -> Fr {
    commit(&[nullifier_seed, Fr::from(poll_id)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitments_are_deterministic() {
        let secret = Fr::from(12345u64);
        let a = eligibility_commitment(25, secret);
        let b = eligibility_commitment(25, secret);
        assert_eq!(a, b);
    }

    #[test]
    fn commitments_differ_on_any_input() {
        let secret = Fr::from(12345u64);
        let base = eligibility_commitment(25, secret);
        assert_ne!(base, eligibility_commitment(26, secret));
        assert_ne!(base, eligibility_commitment(25, Fr::from(12346u64)));
    }

    #[test]
    fn nullifier_is_poll_scoped() {
        let seed = Fr::from(54321u64);
        assert_ne!(nullifier_hash(seed, 1), nullifier_hash(seed, 2));
    }

    #[test]
    fn decimal_parsing_checks_range() {
        assert_eq!(fr_from_decimal("12345").unwrap(), Fr::from(12345u64));
        assert_eq!(fr_from_decimal(" 7 ").unwrap(), Fr::from(7u64));
        assert!(matches!(fr_from_decimal(""), Err(ZkError::InvalidScalar)));
        assert!(matches!(fr_from_decimal("12x"), Err(ZkError::InvalidScalar)));
        assert!(matches!(fr_from_decimal("-5"), Err(ZkError::InvalidScalar)));
        // 2^128 as a decimal string: one past the supported bound.
        assert!(matches!(
            fr_from_decimal("340282366920938463463374607431768211456"),
            Err(ZkError::InputOutOfRange)
        ));
    }

    #[test]
    fn random_secrets_give_distinct_commitments() {
        use ark_std::UniformRand;
        let mut rng = ark_std::test_rng();
        let s1 = Fr::rand(&mut rng);
        let s2 = Fr::rand(&mut rng);
        assert_ne!(eligibility_commitment(30, s1), eligibility_commitment(30, s2));
    }

    #[test]
    fn commit_order_matters() {
        let x = Fr::from(2u64);
        let y = Fr::from(3u64);
        assert_ne!(commit(&[x, y]), commit(&[y, x]));
    }
}
