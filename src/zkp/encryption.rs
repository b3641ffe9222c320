// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Proof of knowledge of a Paillier plaintext.
//!
//! The prover encrypts a plaintext `α` and proves knowledge of `(α, s)` with
//! `c = (n+1)^α · s^n mod n²` without revealing either. The protocol is the
//! encryption proof of Cramer, Damgård, and Nielsen, *Multiparty Computation
//! from Threshold Homomorphic Encryption* (p. 41).

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

/// Public input: the key the encryption was produced under.
#[derive(Debug, Clone)]
pub struct EncryptionInput {
    pk: EncryptionKey,
}

impl EncryptionInput {
    /// Wrap the verifier's view of the statement.
    pub fn new(pk: &EncryptionKey) -> Self {
        Self { pk: pk.clone() }
    }
}

/// The prover's plaintext.
#[derive(Debug, Clone)]
pub struct EncryptionSecret {
    alpha: BigNumber,
}

impl EncryptionSecret {
    /// Wrap the plaintext being proven.
    pub fn new(alpha: &BigNumber) -> Self {
        Self {
            alpha: alpha.clone(),
        }
    }
}

/// A fresh encryption of a secret plaintext together with the proof that the
/// prover knows what it encrypts.
///
/// Transcript order: `(c, b)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionProof {
    ciphertext: Ciphertext,
    b: BigNumber,
    w: BigNumber,
    z: BigNumber,
}

impl EncryptionProof {
    /// The encryption this proof speaks about.
    pub fn ciphertext(&self) -> &Ciphertext {
        &self.ciphertext
    }

    /// Encode as `[len‖c ‖ len‖b ‖ len‖w ‖ len‖z]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encoding::append_bigint(&mut buf, self.ciphertext.raw()).expect("field fits");
        encoding::append_bigint(&mut buf, &self.b).expect("field fits");
        encoding::append_bigint(&mut buf, &self.w).expect("field fits");
        encoding::append_bigint(&mut buf, &self.z).expect("field fits");
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let ciphertext = Ciphertext(decoder.take_bigint()?);
        let b = decoder.take_bigint()?;
        let w = decoder.take_bigint()?;
        let z = decoder.take_bigint()?;
        decoder.finish()?;
        Ok(Self {
            ciphertext,
            b,
            w,
            z,
        })
    }
}

impl Proof for EncryptionProof {
    type CommonInput = EncryptionInput;
    type ProverSecret = EncryptionSecret;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        let pk = &input.pk;
        let n = pk.modulus();
        let n_squared = pk.modulus_squared();
        let g = pk.generator();

        let s = pk.random_randomizer(rng)?;
        let ciphertext = pk.encrypt(&secret.alpha, &s)?;

        let x = random_positive_bn(rng, n);
        let u = pk.random_unit_mod_n_squared(rng)?;
        let b = modpow(g, &x, n_squared).modmul(&modpow(&u, n, n_squared), n_squared);

        let mut transcript = Transcript::new();
        transcript.append_bn(ciphertext.raw());
        transcript.append_bn(&b);
        let e = transcript.challenge();

        // The response folds the quotient of x + e·α by n back into the
        // randomizer so the verifier's single identity closes.
        let blinded = x + &e * &secret.alpha;
        let w = blinded.nmod(n);
        let t = blinded / n.clone();
        let z = u
            .modmul(&modpow(&s, &e, n_squared), n_squared)
            .modmul(&modpow(g, &t, n_squared), n_squared);

        Ok(Self {
            ciphertext,
            b,
            w,
            z,
        })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let pk = &input.pk;
        let n = pk.modulus();
        let n_squared = pk.modulus_squared();
        let g = pk.generator();

        let mut transcript = Transcript::new();
        transcript.append_bn(self.ciphertext.raw());
        transcript.append_bn(&self.b);
        let e = transcript.challenge();

        // g^w · z^n ≡ b · c^e (mod n²)
        let lhs = modpow(g, &self.w, n_squared).modmul(&modpow(&self.z, n, n_squared), n_squared);
        let rhs = self
            .b
            .modmul(&modpow(self.ciphertext.raw(), &e, n_squared), n_squared);

        let checks = [pk.is_ciphertext(&self.ciphertext), lhs == rhs];
        all_checks_pass(&checks)
    }
}
