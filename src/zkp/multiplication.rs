// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Proof of a correct ciphertext–scalar multiplication.
//!
//! Given an existing encryption `C_a = E(a)`, the prover produces a fresh
//! encryption of `a·α` and shows it really is `C_a` raised to a scalar the
//! prover knows, without revealing `α`. The protocol is the multiplication
//! proof of Cramer, Damgård, and Nielsen (p. 40).

use crate::{
    encoding::{self, Decoder},
    errors::{Error, Result},
    paillier::{Ciphertext, EncryptionKey},
    utils::{modpow, random_positive_bn},
    zkp::{all_checks_pass, Proof, Transcript},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Public input: the key and the pre-existing encryption `C_a`.
#[derive(Debug, Clone)]
pub struct MultiplicationInput {
    pk: EncryptionKey,
    base: Ciphertext,
}

impl MultiplicationInput {
    /// Wrap the verifier's view of the statement.
    pub fn new(pk: &EncryptionKey, base: &Ciphertext) -> Self {
        Self {
            pk: pk.clone(),
            base: base.clone(),
        }
    }
}

/// The prover's scalar.
#[derive(Debug, Clone)]
pub struct MultiplicationSecret {
    alpha: BigNumber,
}

impl MultiplicationSecret {
    /// Wrap the scalar being proven.
    pub fn new(alpha: &BigNumber) -> Self {
        Self {
            alpha: alpha.clone(),
        }
    }
}

/// The product encryption `E(a·α)`, a fresh encryption of `α`, and the proof
/// tying them to `C_a`.
///
/// Transcript order: `(C_a, c, d, a, b)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplicationProof {
    scalar_encryption: Ciphertext,
    product: Ciphertext,
    a: BigNumber,
    b: BigNumber,
    w: BigNumber,
    y: BigNumber,
    z: BigNumber,
}

impl MultiplicationProof {
    /// The randomized product `E(a·α)`.
    pub fn product(&self) -> &Ciphertext {
        &self.product
    }

    /// The fresh encryption of the scalar `α`.
    pub fn scalar_encryption(&self) -> &Ciphertext {
        &self.scalar_encryption
    }

    /// Encode as `[len‖c ‖ len‖d ‖ len‖a ‖ len‖b ‖ len‖w ‖ len‖y ‖ len‖z]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for field in [
            self.scalar_encryption.raw(),
            self.product.raw(),
            &self.a,
            &self.b,
            &self.w,
            &self.y,
            &self.z,
        ] {
            encoding::append_bigint(&mut buf, field).expect("field fits");
        }
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let scalar_encryption = Ciphertext(decoder.take_bigint()?);
        let product = Ciphertext(decoder.take_bigint()?);
        let a = decoder.take_bigint()?;
        let b = decoder.take_bigint()?;
        let w = decoder.take_bigint()?;
        let y = decoder.take_bigint()?;
        let z = decoder.take_bigint()?;
        decoder.finish()?;
        Ok(Self {
            scalar_encryption,
            product,
            a,
            b,
            w,
            y,
            z,
        })
    }
}

impl Proof for MultiplicationProof {
    type CommonInput = MultiplicationInput;
    type ProverSecret = MultiplicationSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let pk = &input.pk;
        let n = pk.modulus();
        let n_squared = pk.modulus_squared();
        let g = pk.generator();
        let ca = input.base.raw();

        if !pk.is_ciphertext(&input.base) || ca.gcd(n_squared) != BigNumber::one() {
            return Err(Error::DomainViolation(
                "base encryption is not a unit of the ciphertext group",
            ));
        }

        let s = pk.random_unit_mod_n_squared(rng)?;
        let gamma = pk.random_unit_mod_n_squared(rng)?;

        // c = E(α; s); d = C_a^α · γ^n is the randomized product.
        let c = modpow(g, &secret.alpha, n_squared).modmul(&modpow(&s, n, n_squared), n_squared);
        let d = modpow(ca, &secret.alpha, n_squared)
            .modmul(&modpow(&gamma, n, n_squared), n_squared);

        let x = random_positive_bn(rng, n);
        let u = pk.random_unit_mod_n_squared(rng)?;
        let v = pk.random_unit_mod_n_squared(rng)?;

        let a = modpow(ca, &x, n_squared).modmul(&modpow(&v, n, n_squared), n_squared);
        let b = modpow(g, &x, n_squared).modmul(&modpow(&u, n, n_squared), n_squared);

        let mut transcript = Transcript::new();
        transcript.append_bn(ca);
        transcript.append_bn(&c);
        transcript.append_bn(&d);
        transcript.append_bn(&a);
        transcript.append_bn(&b);
        let e = transcript.challenge();

        let blinded = x + &e * &secret.alpha;
        let w = blinded.nmod(n);
        let t = blinded / n.clone();

        let z = u
            .modmul(&modpow(&s, &e, n_squared), n_squared)
            .modmul(&modpow(g, &t, n_squared), n_squared);
        let y = v
            .modmul(&modpow(ca, &t, n_squared), n_squared)
            .modmul(&modpow(&gamma, &e, n_squared), n_squared);

        Ok(Self {
            scalar_encryption: Ciphertext(c),
            product: Ciphertext(d),
            a,
            b,
            w,
            y,
            z,
        })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let pk = &input.pk;
        let n = pk.modulus();
        let n_squared = pk.modulus_squared();
        let g = pk.generator();
        let ca = input.base.raw();

        let mut transcript = Transcript::new();
        transcript.append_bn(ca);
        transcript.append_bn(self.scalar_encryption.raw());
        transcript.append_bn(self.product.raw());
        transcript.append_bn(&self.a);
        transcript.append_bn(&self.b);
        let e = transcript.challenge();

        // g^w · z^n ≡ b · c^e (mod n²)
        let scalar_check = {
            let lhs =
                modpow(g, &self.w, n_squared).modmul(&modpow(&self.z, n, n_squared), n_squared);
            let rhs = self.b.modmul(
                &modpow(self.scalar_encryption.raw(), &e, n_squared),
                n_squared,
            );
            lhs == rhs
        };

        // C_a^w · y^n ≡ a · d^e (mod n²)
        let product_check = {
            let lhs =
                modpow(ca, &self.w, n_squared).modmul(&modpow(&self.y, n, n_squared), n_squared);
            let rhs = self
                .a
                .modmul(&modpow(self.product.raw(), &e, n_squared), n_squared);
            lhs == rhs
        };

        let checks = [
            pk.is_ciphertext(&self.scalar_encryption),
            pk.is_ciphertext(&self.product),
            scalar_check,
            product_check,
        ];
        all_checks_pass(&checks)
    }
}
