// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Big-integer sampling and arithmetic helpers shared across the crate.

use crate::errors::{Error, Result};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use tracing::error;

pub(crate) const CRYPTOGRAPHIC_RETRY_MAX: usize = 500usize;

/// Compute a^e (mod n).
pub(crate) fn modpow(a: &BigNumber, e: &BigNumber, n: &BigNumber) -> BigNumber {
    a.modpow(e, n)
}

/// Sample a number uniformly at random from the range `[0, n)`.
pub(crate) fn random_positive_bn<R: RngCore + CryptoRng>(rng: &mut R, n: &BigNumber) -> BigNumber {
    BigNumber::from_rng(n, rng)
}

/// Sample a number uniformly at random from the range `[0, 2^bits)`.
pub(crate) fn random_bn_by_size<R: RngCore + CryptoRng>(rng: &mut R, bits: usize) -> BigNumber {
    let bound = BigNumber::one() << bits;
    BigNumber::from_rng(&bound, rng)
}

/// Sample a random element of the multiplicative group of integers modulo
/// `n`.
///
/// Note: when `n` is a product of two primes, a draw that shares a factor
/// with `n` would reveal the factorization. The chance of hitting one is
/// negligible and the draw is discarded regardless.
pub(crate) fn random_bn_in_z_star<R: RngCore + CryptoRng>(
    rng: &mut R,
    n: &BigNumber,
) -> Result<BigNumber> {
    std::iter::repeat_with(|| BigNumber::from_rng(n, rng))
        .take(CRYPTOGRAPHIC_RETRY_MAX)
        .find(|candidate| candidate != &BigNumber::zero() && candidate.gcd(n) == BigNumber::one())
        .ok_or_else(|| {
            error!("Failed to sample an invertible element after many attempts");
            Error::DomainViolation("could not sample from the multiplicative group")
        })
}

/// Number of significant bits in a nonnegative integer. Zero has none.
pub(crate) fn bit_length(n: &BigNumber) -> usize {
    let bytes = n.to_bytes();
    match bytes.iter().position(|&b| b != 0) {
        Some(first) => (bytes.len() - first - 1) * 8 + (8 - bytes[first].leading_zeros() as usize),
        None => 0,
    }
}

/// Compute `k!` as a [`BigNumber`].
pub(crate) fn factorial(k: usize) -> BigNumber {
    let mut result = BigNumber::one();
    for i in 2..=k {
        result = result * BigNumber::from(i as u64);
    }
    result
}

/// Return a random integer of exactly `bits` bits that passes the backend's
/// Miller–Rabin test.
pub(crate) fn probable_prime<R: RngCore + CryptoRng>(bits: usize, rng: &mut R) -> BigNumber {
    BigNumber::prime_from_rng(bits, rng)
}

/// Sample a safe-prime pair `(p, p')` with `p = 2p' + 1`, where `p'` has
/// `bits - 1` bits and both values are probable primes.
///
/// Retries until a candidate survives; this is the classical search of
/// Handbook of Applied Cryptography, Algorithm 4.86.
pub(crate) fn safe_prime_pair<R: RngCore + CryptoRng>(
    bits: usize,
    rng: &mut R,
) -> (BigNumber, BigNumber) {
    loop {
        let p_prime = probable_prime(bits - 1, rng);
        let p = (p_prime.clone() << 1) + BigNumber::one();
        if p.is_prime() {
            return (p, p_prime);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn bit_length_matches_shifts() {
        assert_eq!(bit_length(&BigNumber::zero()), 0);
        assert_eq!(bit_length(&BigNumber::one()), 1);
        assert_eq!(bit_length(&BigNumber::from(255u64)), 8);
        assert_eq!(bit_length(&BigNumber::from(256u64)), 9);
        assert_eq!(bit_length(&(BigNumber::one() << 511)), 512);
    }

    #[test]
    fn factorial_of_small_inputs() {
        assert_eq!(factorial(0), BigNumber::one());
        assert_eq!(factorial(1), BigNumber::one());
        assert_eq!(factorial(5), BigNumber::from(120u64));
        assert_eq!(factorial(10), BigNumber::from(3628800u64));
    }

    #[test]
    fn sampled_values_stay_below_the_modulus() {
        let mut rng = init_testing();
        let n = BigNumber::from(99991u64);
        for _ in 0..100 {
            assert!(random_positive_bn(&mut rng, &n) < n);
        }
    }

    #[test]
    fn z_star_samples_are_invertible() {
        let mut rng = init_testing();
        let n = BigNumber::from(3u64 * 5 * 7 * 11);
        for _ in 0..50 {
            let r = random_bn_in_z_star(&mut rng, &n).unwrap();
            assert_eq!(r.gcd(&n), BigNumber::one());
        }
    }

    #[test]
    fn safe_prime_pair_is_consistent() {
        let mut rng = init_testing();
        let (p, p_prime) = safe_prime_pair(64, &mut rng);
        assert_eq!(p, (p_prime.clone() << 1) + BigNumber::one());
        assert!(p.is_prime());
        assert!(p_prime.is_prime());
    }
}

////////////////////////////
// Test Utility Functions //
////////////////////////////
