// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Plain Pedersen commitments.
//!
//! A drop-in for uses that do not need non-malleability: commitments live in
//! the order-`q` subgroup of `Z_p*` for a safe prime `p = 2q + 1`, with
//! independent generators `g, h`. The parameters can be derived verifiably
//! from a public seed string, so no party controls the generators.

use crate::{
    errors::{Error, Result},
    utils::{modpow, probable_prime, random_positive_bn},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Public Pedersen parameters `(q, p, g, h)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedersenParameters {
    order: BigNumber,
    modulus: BigNumber,
    g: BigNumber,
    h: BigNumber,
}

/// An opening `(secret, randomness)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedersenOpen {
    secret: BigNumber,
    randomness: BigNumber,
}

impl PedersenOpen {
    /// The committed secret.
    pub fn secret(&self) -> &BigNumber {
        &self.secret
    }
}

impl PedersenParameters {
    /// Derive parameters from a public seed string.
    ///
    /// The RNG is seeded with `SHA-256(seed)`, so anyone can re-run the
    /// derivation and confirm nobody picked the generators with a trapdoor
    /// in hand. Searches for a Sophie Germain prime `q` with `p = 2q + 1`
    /// and squares two random elements into the order-`q` subgroup.
    pub fn from_seed(seed: &str, order_bits: usize) -> Self {
        let digest: [u8; 32] = Sha256::digest(seed.as_bytes()).into();
        let mut rng = rand::rngs::StdRng::from_seed(digest);

        let (order, modulus) = loop {
            let q = probable_prime(order_bits, &mut rng);
            let p = (q.clone() << 1) + BigNumber::one();
            if p.is_prime() {
                break (q, p);
            }
        };

        let g = square_into_subgroup(&mut rng, &modulus);
        let h = square_into_subgroup(&mut rng, &modulus);
        Self {
            order,
            modulus,
            g,
            h,
        }
    }

    /// Commit to `secret ∈ [0, q)`.
    pub fn commit<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        secret: &BigNumber,
    ) -> Result<(BigNumber, PedersenOpen)> {
        if !in_range(secret, &self.order) {
            return Err(Error::DomainViolation("secret not in [0, q)"));
        }
        let randomness = random_positive_bn(rng, &self.order);
        let commitment = modpow(&self.g, secret, &self.modulus)
            .modmul(&modpow(&self.h, &randomness, &self.modulus), &self.modulus);
        Ok((
            commitment,
            PedersenOpen {
                secret: secret.clone(),
                randomness,
            },
        ))
    }

    /// Check an opening against a commitment.
    pub fn check(&self, commitment: &BigNumber, open: &PedersenOpen) -> Result<()> {
        if !in_range(&open.secret, &self.order) || !in_range(&open.randomness, &self.order) {
            return Err(Error::DomainViolation("opening not in [0, q)"));
        }
        let expected = modpow(&self.g, &open.secret, &self.modulus).modmul(
            &modpow(&self.h, &open.randomness, &self.modulus),
            &self.modulus,
        );
        if &expected == commitment {
            Ok(())
        } else {
            Err(Error::ProofFailure)
        }
    }
}

fn in_range(value: &BigNumber, bound: &BigNumber) -> bool {
    value >= &BigNumber::zero() && value < bound
}

fn square_into_subgroup<R: RngCore + CryptoRng>(rng: &mut R, modulus: &BigNumber) -> BigNumber {
    let r = random_positive_bn(rng, modulus);
    r.modmul(&r, modulus)
}
