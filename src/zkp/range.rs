// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Range-and-relation proofs for the six-round signing protocol.
//!
//! Both proofs bound a Paillier plaintext to a small multiple of the curve
//! order and tie ciphertexts together:
//!
//! * [`ScaledEncryptionProof`]: the prover knows `ρ` and a randomizer `r`
//!   such that `c₃ = Enc(ρ; r)` and `c₁ = c₂^ρ`, with `ρ` effectively in
//!   `[0, q³)`.
//! * [`MaskedNonceProof`]: the prover knows `k` and `c` such that
//!   `R = k·G`, and `w = u^k · Enc(q·c)`, with `k` in `[0, q³)` and `c` in
//!   `[0, q⁶)` up to soundness slack.
//!
//! Witness commitments live in the auxiliary RSA group of
//! [`PublicParameters`].

use crate::{
    curve::CurveTrait,
    errors::Result,
    paillier::Ciphertext,
    utils::{modpow, random_bn_in_z_star, random_positive_bn},
    zkp::{all_checks_pass, setup::PublicParameters, Proof, Transcript},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Public input of [`ScaledEncryptionProof`].
#[derive(Debug, Clone)]
pub struct ScaledEncryptionInput {
    params: PublicParameters,
    /// `c₁ = c₂^ρ`, the scaled ciphertext.
    scaled: Ciphertext,
    /// `c₂`, the ciphertext being scaled.
    base: Ciphertext,
    /// `c₃ = Enc(ρ; r)`.
    encryption: Ciphertext,
    /// The curve order `q` the range is expressed in.
    curve_order: BigNumber,
}

impl ScaledEncryptionInput {
    /// Wrap the verifier's view of the statement.
    pub fn new(
        params: &PublicParameters,
        scaled: &Ciphertext,
        base: &Ciphertext,
        encryption: &Ciphertext,
        curve_order: &BigNumber,
    ) -> Self {
        Self {
            params: params.clone(),
            scaled: scaled.clone(),
            base: base.clone(),
            encryption: encryption.clone(),
            curve_order: curve_order.clone(),
        }
    }
}

/// The prover's scalar and the randomizer of its encryption.
#[derive(Debug, Clone)]
pub struct ScaledEncryptionSecret {
    rho: BigNumber,
    randomizer: BigNumber,
}

impl ScaledEncryptionSecret {
    /// Wrap the scalar and the randomizer of its encryption.
    pub fn new(rho: &BigNumber, randomizer: &BigNumber) -> Self {
        Self {
            rho: rho.clone(),
            randomizer: randomizer.clone(),
        }
    }
}

/// Transcript order: `(c₁, c₂, c₃, z, u₁, u₂, v)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaledEncryptionProof {
    z: BigNumber,
    u1: BigNumber,
    u2: BigNumber,
    v: BigNumber,
    s1: BigNumber,
    s2: BigNumber,
    s3: BigNumber,
    e: BigNumber,
}

impl Proof for ScaledEncryptionProof {
    type CommonInput = ScaledEncryptionInput;
    type ProverSecret = ScaledEncryptionSecret;

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
        let q = &input.curve_order;

        let q3 = q * q * q;
        let alpha = random_positive_bn(rng, &q3);
        let beta = random_bn_in_z_star(rng, n)?;
        let gamma = random_positive_bn(rng, &(&q3 * n_tilde));
        let rho = random_positive_bn(rng, &(q * n_tilde));

        let z = modpow(h1, &secret.rho, n_tilde).modmul(&modpow(h2, &rho, n_tilde), n_tilde);
        let u1 = modpow(g, &alpha, n_squared).modmul(&modpow(&beta, n, n_squared), n_squared);
        let u2 = modpow(h1, &alpha, n_tilde).modmul(&modpow(h2, &gamma, n_tilde), n_tilde);
        let v = modpow(input.base.raw(), &alpha, n_squared);

        let mut transcript = Transcript::new();
        transcript.append_bn(input.scaled.raw());
        transcript.append_bn(input.base.raw());
        transcript.append_bn(input.encryption.raw());
        transcript.append_bn(&z);
        transcript.append_bn(&u1);
        transcript.append_bn(&u2);
        transcript.append_bn(&v);
        let e = transcript.challenge();

        let s1 = &e * &secret.rho + alpha;
        let s2 = modpow(&secret.randomizer, &e, n).modmul(&beta, n);
        let s3 = &e * &rho + gamma;

        Ok(Self {
            z,
            u1,
            u2,
            v,
            s1,
            s2,
            s3,
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

        // u₁ ≡ g^{s₁} · s₂^n · c₃⁻ᵉ (mod n²)
        let encryption_check = {
            let lhs = modpow(g, &self.s1, n_squared)
                .modmul(&modpow(&self.s2, n, n_squared), n_squared);
            let rhs = self
                .u1
                .modmul(&modpow(input.encryption.raw(), &self.e, n_squared), n_squared);
            lhs == rhs
        };

        // u₂ ≡ h₁^{s₁} · h₂^{s₃} · z⁻ᵉ (mod ñ)
        let commitment_check = {
            let lhs =
                modpow(h1, &self.s1, n_tilde).modmul(&modpow(h2, &self.s3, n_tilde), n_tilde);
            let rhs = self
                .u2
                .modmul(&modpow(&self.z, &self.e, n_tilde), n_tilde);
            lhs == rhs
        };

        // v ≡ c₂^{s₁} · c₁⁻ᵉ (mod n²)
        let scaling_check = {
            let lhs = modpow(input.base.raw(), &self.s1, n_squared);
            let rhs = self
                .v
                .modmul(&modpow(input.scaled.raw(), &self.e, n_squared), n_squared);
            lhs == rhs
        };

        let challenge_check = {
            let mut transcript = Transcript::new();
            transcript.append_bn(input.scaled.raw());
            transcript.append_bn(input.base.raw());
            transcript.append_bn(input.encryption.raw());
            transcript.append_bn(&self.z);
            transcript.append_bn(&self.u1);
            transcript.append_bn(&self.u2);
            transcript.append_bn(&self.v);
            transcript.challenge() == self.e
        };

        all_checks_pass(&[
            encryption_check,
            commitment_check,
            scaling_check,
            challenge_check,
        ])
    }
}

/// Public input of [`MaskedNonceProof`].
#[derive(Debug, Clone)]
pub struct MaskedNonceInput<C> {
    params: PublicParameters,
    /// `R = k·G`.
    nonce_point: C,
    /// `u`, the aggregated encryption the nonce multiplies.
    combined: Ciphertext,
    /// `w = u^k · Enc(q·c)`.
    masked: Ciphertext,
}

impl<C: CurveTrait> MaskedNonceInput<C> {
    /// Wrap the verifier's view of the statement.
    pub fn new(
        params: &PublicParameters,
        nonce_point: &C,
        combined: &Ciphertext,
        masked: &Ciphertext,
    ) -> Self {
        Self {
            params: params.clone(),
            nonce_point: *nonce_point,
            combined: combined.clone(),
            masked: masked.clone(),
        }
    }
}

/// The prover's nonce, additive mask, and encryption randomizer.
#[derive(Debug, Clone)]
pub struct MaskedNonceSecret {
    k: BigNumber,
    mask: BigNumber,
    randomizer: BigNumber,
}

impl MaskedNonceSecret {
    /// Wrap the nonce, its additive mask, and the mask's randomizer.
    pub fn new(k: &BigNumber, mask: &BigNumber, randomizer: &BigNumber) -> Self {
        Self {
            k: k.clone(),
            mask: mask.clone(),
            randomizer: randomizer.clone(),
        }
    }
}

/// Transcript order: `(G, w, u, z₁, z₂, u₁, u₂, u₃, v₁, v₂, v₃)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "C: CurveTrait", deserialize = "C: CurveTrait"))]
pub struct MaskedNonceProof<C> {
    z1: BigNumber,
    z2: BigNumber,
    u1: C,
    u2: BigNumber,
    u3: BigNumber,
    v1: BigNumber,
    v2: BigNumber,
    v3: BigNumber,
    s1: BigNumber,
    s2: BigNumber,
    t1: BigNumber,
    t2: BigNumber,
    t3: BigNumber,
    e: BigNumber,
}

impl<C: CurveTrait> Proof for MaskedNonceProof<C> {
    type CommonInput = MaskedNonceInput<C>;
    type ProverSecret = MaskedNonceSecret;

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
        let q6 = &q3 * &q3;
        let q8 = &q6 * &q * &q;

        let alpha = random_positive_bn(rng, &q3);
        let beta = random_bn_in_z_star(rng, n)?;
        let gamma = random_positive_bn(rng, &(&q3 * n_tilde));
        let delta = random_positive_bn(rng, &q3);
        let mu = random_bn_in_z_star(rng, n)?;
        let nu = random_positive_bn(rng, &(&q3 * n_tilde));
        let theta = random_positive_bn(rng, &q8);
        let tau = random_positive_bn(rng, &(&q8 * n_tilde));
        let rho1 = random_positive_bn(rng, &(&q * n_tilde));
        let rho2 = random_positive_bn(rng, &(&q6 * n_tilde));

        let z1 = modpow(h1, &secret.k, n_tilde).modmul(&modpow(h2, &rho1, n_tilde), n_tilde);
        let z2 = modpow(h1, &secret.mask, n_tilde).modmul(&modpow(h2, &rho2, n_tilde), n_tilde);
        let u1 = C::scale_generator(&alpha)?;
        let u2 = modpow(g, &alpha, n_squared).modmul(&modpow(&beta, n, n_squared), n_squared);
        let u3 = modpow(h1, &alpha, n_tilde).modmul(&modpow(h2, &gamma, n_tilde), n_tilde);
        let v1 = modpow(input.combined.raw(), &alpha, n_squared)
            .modmul(&modpow(g, &(&q * &theta), n_squared), n_squared)
            .modmul(&modpow(&mu, n, n_squared), n_squared);
        let v2 = modpow(h1, &delta, n_tilde).modmul(&modpow(h2, &nu, n_tilde), n_tilde);
        let v3 = modpow(h1, &theta, n_tilde).modmul(&modpow(h2, &tau, n_tilde), n_tilde);

        let mut transcript = Transcript::new();
        transcript.append_point(&C::GENERATOR);
        transcript.append_bn(input.masked.raw());
        transcript.append_bn(input.combined.raw());
        transcript.append_bn(&z1);
        transcript.append_bn(&z2);
        transcript.append_point(&u1);
        transcript.append_bn(&u2);
        transcript.append_bn(&u3);
        transcript.append_bn(&v1);
        transcript.append_bn(&v2);
        transcript.append_bn(&v3);
        let e = transcript.challenge();

        let s1 = &e * &secret.k + alpha;
        let s2 = &e * &rho1 + gamma;
        let t1 = modpow(&secret.randomizer, &e, n).modmul(&mu, n);
        let t2 = &e * &secret.mask + theta;
        let t3 = &e * &rho2 + tau;

        Ok(Self {
            z1,
            z2,
            u1,
            u2,
            u3,
            v1,
            v2,
            v3,
            s1,
            s2,
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
        let q = C::order();

        // u₁ ≡ s₁·G − e·R
        let point_check = match (
            C::scale_generator(&self.s1),
            input.nonce_point.multiply_by_bignum(&self.e),
        ) {
            (Ok(lhs), Ok(shift)) => lhs == self.u1 + shift,
            _ => false,
        };

        // u₃ ≡ h₁^{s₁} · h₂^{s₂} · z₁⁻ᵉ (mod ñ)
        let nonce_commitment_check = {
            let lhs =
                modpow(h1, &self.s1, n_tilde).modmul(&modpow(h2, &self.s2, n_tilde), n_tilde);
            let rhs = self
                .u3
                .modmul(&modpow(&self.z1, &self.e, n_tilde), n_tilde);
            lhs == rhs
        };

        // v₁ ≡ u^{s₁} · g^{q·t₂} · t₁^n · w⁻ᵉ (mod n²)
        let masking_check = {
            let lhs = modpow(input.combined.raw(), &self.s1, n_squared)
                .modmul(&modpow(g, &(&q * &self.t2), n_squared), n_squared)
                .modmul(&modpow(&self.t1, n, n_squared), n_squared);
            let rhs = self
                .v1
                .modmul(&modpow(input.masked.raw(), &self.e, n_squared), n_squared);
            lhs == rhs
        };

        // v₃ ≡ h₁^{t₂} · h₂^{t₃} · z₂⁻ᵉ (mod ñ)
        let mask_commitment_check = {
            let lhs =
                modpow(h1, &self.t2, n_tilde).modmul(&modpow(h2, &self.t3, n_tilde), n_tilde);
            let rhs = self
                .v3
                .modmul(&modpow(&self.z2, &self.e, n_tilde), n_tilde);
            lhs == rhs
        };

        let challenge_check = {
            let mut transcript = Transcript::new();
            transcript.append_point(&C::GENERATOR);
            transcript.append_bn(input.masked.raw());
            transcript.append_bn(input.combined.raw());
            transcript.append_bn(&self.z1);
            transcript.append_bn(&self.z2);
            transcript.append_point(&self.u1);
            transcript.append_bn(&self.u2);
            transcript.append_bn(&self.u3);
            transcript.append_bn(&self.v1);
            transcript.append_bn(&self.v2);
            transcript.append_bn(&self.v3);
            transcript.challenge() == self.e
        };

        all_checks_pass(&[
            point_check,
            nonce_commitment_check,
            masking_check,
            mask_commitment_check,
            challenge_check,
        ])
    }
}
