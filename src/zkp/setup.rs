// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Auxiliary public parameters for the range and relation proofs.
//!
//! The signing proofs commit to witnesses in a second, independent RSA
//! group: a modulus `ñ` that is a product of two safe primes, and bases
//! `h₁, h₂ ∈ Z_ñ*` with `h₁ = h₂ˣ mod ñ` for a discarded secret `x`. The
//! Paillier public key everyone encrypts under rides along so provers and
//! verifiers agree on the full context.

use crate::{
    errors::Result,
    paillier::EncryptionKey,
    utils::{modpow, random_bn_in_z_star, random_positive_bn, safe_prime_pair},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Public parameters shared by all parties of a signing protocol instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicParameters {
    n_tilde: BigNumber,
    h1: BigNumber,
    h2: BigNumber,
    pk: EncryptionKey,
}

impl PublicParameters {
    /// Generate fresh auxiliary parameters with an `ñ` of roughly
    /// `modulus_bits` bits.
    ///
    /// The prover-side commitments only hide witnesses if the factorization
    /// of `ñ` and the discrete log `x` are unknown, so this runs at a
    /// trusted dealer and `x` never leaves this function.
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        modulus_bits: usize,
        pk: &EncryptionKey,
    ) -> Result<Self> {
        let (p, p_prime) = safe_prime_pair(modulus_bits / 2, rng);
        let (q, q_prime) = loop {
            let (q, q_prime) = safe_prime_pair(modulus_bits / 2, rng);
            if q != p {
                break (q, q_prime);
            }
        };

        let n_tilde = &p * &q;
        let h2 = random_bn_in_z_star(rng, &n_tilde)?;
        let order = &p_prime * &q_prime;
        let x = random_positive_bn(rng, &order);
        let h1 = modpow(&h2, &x, &n_tilde);

        Ok(Self {
            n_tilde,
            h1,
            h2,
            pk: pk.clone(),
        })
    }

    /// Assemble parameters from pre-agreed values (e.g. read from a
    /// deployment artifact).
    pub fn from_parts(
        n_tilde: &BigNumber,
        h1: &BigNumber,
        h2: &BigNumber,
        pk: &EncryptionKey,
    ) -> Self {
        Self {
            n_tilde: n_tilde.clone(),
            h1: h1.clone(),
            h2: h2.clone(),
            pk: pk.clone(),
        }
    }

    pub(crate) fn n_tilde(&self) -> &BigNumber {
        &self.n_tilde
    }

    pub(crate) fn h1(&self) -> &BigNumber {
        &self.h1
    }

    pub(crate) fn h2(&self) -> &BigNumber {
        &self.h2
    }

    /// The Paillier key the protocol encrypts under.
    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.pk
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{paillier::DecryptionKey, utils::testing::init_testing};

    #[test]
    fn generated_parameters_are_well_formed() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, 256).unwrap();
        let params = PublicParameters::generate(&mut rng, 256, dk.encryption_key()).unwrap();

        assert_eq!(params.h2().gcd(params.n_tilde()), BigNumber::one());
        assert!(params.h1() < params.n_tilde());
        assert_eq!(params.encryption_key(), dk.encryption_key());
    }
}
