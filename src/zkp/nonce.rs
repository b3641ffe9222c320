// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The composite range-and-relation proof of the four-round signing
//! protocol.
//!
//! A single proof binds a party's whole first-round sample: the nonce point
//! `R = k·G` and the three level-1 encryptions of the nonce `k`, the
//! blinding share `ρ`, and the additive mask `c`, with each plaintext bound
//! to its range (`k, ρ` to `q³`, `c` to `q⁷`, up to soundness slack). The
//! level-1 ciphertexts are first collapsed to plain Paillier form so the
//! plain encryption algebra applies; the collapse preserves the randomizers
//! the prover committed to.

use crate::{
    curve::CurveTrait,
    errors::Result,
    l2fhe::CiphertextL1,
    paillier::Ciphertext,
    utils::{modpow, random_bn_in_z_star, random_positive_bn},
    zkp::{all_checks_pass, setup::PublicParameters, Proof, Transcript},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Public input of [`NonceTripleProof`].
#[derive(Debug, Clone)]
pub struct NonceTripleInput<C> {
    params: PublicParameters,
    /// `R = k·G`.
    nonce_point: C,
    /// `Enc₁(k)`.
    nonce_encryption: CiphertextL1,
    /// `Enc₁(ρ)`.
    blinding_encryption: CiphertextL1,
    /// `Enc₁(c)`.
    mask_encryption: CiphertextL1,
}

impl<C: CurveTrait> NonceTripleInput<C> {
    /// Wrap the verifier's view of the statement.
    pub fn new(
        params: &PublicParameters,
        nonce_point: &C,
        nonce_encryption: &CiphertextL1,
        blinding_encryption: &CiphertextL1,
        mask_encryption: &CiphertextL1,
    ) -> Self {
        Self {
            params: params.clone(),
            nonce_point: *nonce_point,
            nonce_encryption: nonce_encryption.clone(),
            blinding_encryption: blinding_encryption.clone(),
            mask_encryption: mask_encryption.clone(),
        }
    }
}

/// The three sampled plaintexts and the randomizers of their encryptions.
#[derive(Debug, Clone)]
pub struct NonceTripleSecret {
    k: BigNumber,
    rho: BigNumber,
    mask: BigNumber,
    k_randomizer: BigNumber,
    rho_randomizer: BigNumber,
    mask_randomizer: BigNumber,
}

impl NonceTripleSecret {
    /// Wrap the sampled plaintexts and their randomizers.
    pub fn new(
        k: &BigNumber,
        rho: &BigNumber,
        mask: &BigNumber,
        k_randomizer: &BigNumber,
        rho_randomizer: &BigNumber,
        mask_randomizer: &BigNumber,
    ) -> Self {
        Self {
            k: k.clone(),
            rho: rho.clone(),
            mask: mask.clone(),
            k_randomizer: k_randomizer.clone(),
            rho_randomizer: rho_randomizer.clone(),
            mask_randomizer: mask_randomizer.clone(),
        }
    }
}

/// Transcript order:
/// `(G, R, a_k, β_k, a_ρ, β_ρ, a_c, β_c, z₁, u₁, u₂, u₃, u₄, v₁, v₂, v₃)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "C: CurveTrait", deserialize = "C: CurveTrait"))]
pub struct NonceTripleProof<C> {
    z1: BigNumber,
    z2: BigNumber,
    z3: BigNumber,
    u1: C,
    u2: BigNumber,
    u3: BigNumber,
    u4: BigNumber,
    v1: BigNumber,
    v2: BigNumber,
    v3: BigNumber,
    // The collapsed Paillier forms of the three level-1 encryptions; the
    // verifier recomputes them from the input and compares.
    w1: Ciphertext,
    w2: Ciphertext,
    w3: Ciphertext,
    s1: BigNumber,
    s3: BigNumber,
    s4: BigNumber,
    s5: BigNumber,
    s6: BigNumber,
    s7: BigNumber,
    t1: BigNumber,
    t2: BigNumber,
    t3: BigNumber,
    e: BigNumber,
}

impl<C: CurveTrait> NonceTripleProof<C> {
    fn challenge(
        input: &NonceTripleInput<C>,
        z1: &BigNumber,
        u1: &C,
        u2: &BigNumber,
        u3: &BigNumber,
        u4: &BigNumber,
        v1: &BigNumber,
        v2: &BigNumber,
        v3: &BigNumber,
    ) -> BigNumber {
        let mut transcript = Transcript::new();
        transcript.append_point(&C::GENERATOR);
        transcript.append_point(&input.nonce_point);
        for l1 in [
            &input.nonce_encryption,
            &input.blinding_encryption,
            &input.mask_encryption,
        ] {
            transcript.append_bn(l1.mask());
            transcript.append_bn(l1.body().raw());
        }
        transcript.append_bn(z1);
        transcript.append_point(u1);
        transcript.append_bn(u2);
        transcript.append_bn(u3);
        transcript.append_bn(u4);
        transcript.append_bn(v1);
        transcript.append_bn(v2);
        transcript.append_bn(v3);
        transcript.challenge()
    }
}

impl<C: CurveTrait> Proof for NonceTripleProof<C> {
    type CommonInput = NonceTripleInput<C>;
    type ProverSecret = NonceTripleSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let pk = input.params.encryption_key();
        let n = pk.modulus();
        let n_squared = pk.modulus_squared();
        let g = pk.generator();
        let n_tilde = input.params.n_tilde();
        let h1 = input.params.h1();
        let h2 = input.params.h2();
        let q = C::order();

        let q3 = &q * &q * &q;
        let q5 = &q3 * &q * &q;
        let q7 = &q5 * &q * &q;

        let alpha1 = random_positive_bn(rng, &q3);
        let alpha2 = random_positive_bn(rng, &q3);
        let alpha3 = random_positive_bn(rng, &q7);

        let beta1 = random_bn_in_z_star(rng, n)?;
        let beta2 = random_bn_in_z_star(rng, n)?;
        let beta3 = random_bn_in_z_star(rng, n)?;

        let gamma1 = random_positive_bn(rng, &(&q3 * n_tilde));
        let gamma2 = random_positive_bn(rng, &(&q3 * n_tilde));
        let gamma3 = random_positive_bn(rng, &(&q7 * n_tilde));

        let rho1 = random_positive_bn(rng, &(&q * n_tilde));
        let rho2 = random_positive_bn(rng, &(&q * n_tilde));
        let rho3 = random_positive_bn(rng, &(&q5 * n_tilde));

        let z1 = modpow(h1, &secret.k, n_tilde).modmul(&modpow(h2, &rho1, n_tilde), n_tilde);
        let z2 = modpow(h1, &secret.rho, n_tilde).modmul(&modpow(h2, &rho2, n_tilde), n_tilde);
        let z3 = modpow(h1, &secret.mask, n_tilde).modmul(&modpow(h2, &rho3, n_tilde), n_tilde);

        let u1 = C::scale_generator(&alpha1)?;
        let u2 = modpow(g, &alpha1, n_squared).modmul(&modpow(&beta1, n, n_squared), n_squared);
        let u3 = modpow(g, &alpha2, n_squared).modmul(&modpow(&beta2, n, n_squared), n_squared);
        let u4 = modpow(g, &alpha3, n_squared).modmul(&modpow(&beta3, n, n_squared), n_squared);

        let v1 = modpow(h1, &alpha1, n_tilde).modmul(&modpow(h2, &gamma1, n_tilde), n_tilde);
        let v2 = modpow(h1, &alpha2, n_tilde).modmul(&modpow(h2, &gamma2, n_tilde), n_tilde);
        let v3 = modpow(h1, &alpha3, n_tilde).modmul(&modpow(h2, &gamma3, n_tilde), n_tilde);

        let e = Self::challenge(input, &z1, &u1, &u2, &u3, &u4, &v1, &v2, &v3);

        let w1 = input.nonce_encryption.to_paillier(pk)?;
        let w2 = input.blinding_encryption.to_paillier(pk)?;
        let w3 = input.mask_encryption.to_paillier(pk)?;

        let s1 = &e * &secret.k + alpha1;
        let t1 = modpow(&secret.k_randomizer, &e, n).modmul(&beta1, n);
        let t2 = modpow(&secret.rho_randomizer, &e, n).modmul(&beta2, n);
        let t3 = modpow(&secret.mask_randomizer, &e, n).modmul(&beta3, n);

        let s3 = &e * &rho1 + gamma1;
        let s4 = &e * &secret.rho + alpha2;
        let s5 = &e * &rho2 + gamma2;
        let s6 = &e * &secret.mask + alpha3;
        let s7 = &e * &rho3 + gamma3;

        Ok(Self {
            z1,
            z2,
            z3,
            u1,
            u2,
            u3,
            u4,
            v1,
            v2,
            v3,
            w1,
            w2,
            w3,
            s1,
            s3,
            s4,
            s5,
            s6,
            s7,
            t1,
            t2,
            t3,
            e,
        })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let pk = input.params.encryption_key();
        let n = pk.modulus();
        let n_squared = pk.modulus_squared();
        let g = pk.generator();
        let n_tilde = input.params.n_tilde();
        let h1 = input.params.h1();
        let h2 = input.params.h2();

        // The carried Paillier forms must match the level-1 encryptions.
        let collapse_checks = [
            (&self.w1, &input.nonce_encryption),
            (&self.w2, &input.blinding_encryption),
            (&self.w3, &input.mask_encryption),
        ]
        .map(|(claimed, l1)| match l1.to_paillier(pk) {
            Ok(collapsed) => &collapsed == claimed,
            Err(_) => false,
        });

        // u₁ ≡ s₁·G − e·R
        let point_check = match (
            C::scale_generator(&self.s1),
            input.nonce_point.multiply_by_bignum(&self.e),
        ) {
            (Ok(lhs), Ok(shift)) => lhs == self.u1 + shift,
            _ => false,
        };

        // uᵢ ≡ g^{s} · t^n · w⁻ᵉ (mod n²), one per encryption.
        let encryption_check = |s: &BigNumber, t: &BigNumber, u: &BigNumber, w: &Ciphertext| {
            let lhs = modpow(g, s, n_squared).modmul(&modpow(t, n, n_squared), n_squared);
            let rhs = u.modmul(&modpow(w.raw(), &self.e, n_squared), n_squared);
            lhs == rhs
        };
        let nonce_encryption_check = encryption_check(&self.s1, &self.t1, &self.u2, &self.w1);
        let blinding_encryption_check = encryption_check(&self.s4, &self.t2, &self.u3, &self.w2);
        let mask_encryption_check = encryption_check(&self.s6, &self.t3, &self.u4, &self.w3);

        // vᵢ ≡ h₁^{s} · h₂^{s'} · z⁻ᵉ (mod ñ), one per witness commitment.
        let commitment_check = |s: &BigNumber, s_prime: &BigNumber, v: &BigNumber, z: &BigNumber| {
            let lhs = modpow(h1, s, n_tilde).modmul(&modpow(h2, s_prime, n_tilde), n_tilde);
            let rhs = v.modmul(&modpow(z, &self.e, n_tilde), n_tilde);
            lhs == rhs
        };
        let nonce_commitment_check = commitment_check(&self.s1, &self.s3, &self.v1, &self.z1);
        let blinding_commitment_check = commitment_check(&self.s4, &self.s5, &self.v2, &self.z2);
        let mask_commitment_check = commitment_check(&self.s6, &self.s7, &self.v3, &self.z3);

        let challenge_check = Self::challenge(
            input, &self.z1, &self.u1, &self.u2, &self.u3, &self.u4, &self.v1, &self.v2, &self.v3,
        ) == self.e;

        all_checks_pass(&[
            collapse_checks[0],
            collapse_checks[1],
            collapse_checks[2],
            point_check,
            nonce_encryption_check,
            blinding_encryption_check,
            mask_encryption_check,
            nonce_commitment_check,
            blinding_commitment_check,
            mask_commitment_check,
            challenge_check,
        ])
    }
}
