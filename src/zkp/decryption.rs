// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Proof of a correct partial decryption.
//!
//! Equality of discrete logarithms in two bases: the partial decryption
//! `c_i` satisfies `log_{c⁴}(c_i²) = log_v(v_i)`, which ties it to the
//! public per-server verification value `v_i = v^{Δ·s_i}`. The protocol is
//! from Damgård et al., *Generalization of Paillier's Public-Key System*
//! (pp. 16–17).

use crate::{
    encoding::{self, Decoder},
    errors::{Error, Result},
    paillier::{
        threshold::{KeyShare, PartialDecryption, ThresholdKey},
        Ciphertext,
    },
    utils::{modpow, random_bn_by_size},
    zkp::{all_checks_pass, Proof, Transcript},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// Size in bits of the hash used for challenges.
const CHALLENGE_BITS: usize = 256;

/// Public input: the threshold key material and the ciphertext being
/// decrypted.
#[derive(Debug, Clone)]
pub struct DecryptionInput {
    key: ThresholdKey,
    ciphertext: Ciphertext,
}

impl DecryptionInput {
    pub fn new(key: &ThresholdKey, ciphertext: &Ciphertext) -> Self {
        Self {
            key: key.clone(),
            ciphertext: ciphertext.clone(),
        }
    }
}

/// A partial decryption bundled with the proof that it was computed with the
/// share the verification key commits to.
///
/// Transcript order: `(a, b, c⁴, c_i²)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProof {
    share: PartialDecryption,
    e: BigNumber,
    z: BigNumber,
}

impl DecryptionProof {
    /// The partial decryption this proof vouches for.
    pub fn share(&self) -> &PartialDecryption {
        &self.share
    }

    /// Encode as `[id:4 ‖ len‖c_i ‖ len‖e ‖ len‖z]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encoding::append_u32(&mut buf, self.share.id());
        encoding::append_bigint(&mut buf, self.share.value()).expect("field fits");
        encoding::append_bigint(&mut buf, &self.e).expect("field fits");
        encoding::append_bigint(&mut buf, &self.z).expect("field fits");
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let id = decoder.take_u32()?;
        let value = decoder.take_bigint()?;
        let e = decoder.take_bigint()?;
        let z = decoder.take_bigint()?;
        decoder.finish()?;
        Ok(Self {
            share: PartialDecryption::new(id, value),
            e,
            z,
        })
    }
}

impl Proof for DecryptionProof {
    type CommonInput = DecryptionInput;
    type ProverSecret = KeyShare;

    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self> {
        if secret.threshold_key() != &input.key {
            return Err(Error::KeyMismatch(
                "the share belongs to a different threshold key",
            ));
        }
        let pk = input.key.encryption_key();
        let n_squared = pk.modulus_squared();

        // Randomness of 3k + t bits, where t is the hash output length.
        let r = random_bn_by_size(rng, 3 * pk.bits() + CHALLENGE_BITS);

        let c4 = modpow(input.ciphertext.raw(), &BigNumber::from(4u64), n_squared);
        let a = modpow(&c4, &r, n_squared);
        let b = modpow(input.key.v(), &r, n_squared);

        let share = secret.partial_decrypt(&input.ciphertext)?;
        let ci2 = modpow(share.value(), &BigNumber::from(2u64), n_squared);

        let mut transcript = Transcript::new();
        transcript.append_bn(&a);
        transcript.append_bn(&b);
        transcript.append_bn(&c4);
        transcript.append_bn(&ci2);
        let e = transcript.challenge();

        let z = r + &e * &(secret.secret() * input.key.delta());

        Ok(Self { share, e, z })
    }

    fn verify(&self, input: &Self::CommonInput) -> Result<()> {
        let pk = input.key.encryption_key();
        let n_squared = pk.modulus_squared();
        let v_i = input.key.verification_value(self.share.id())?;

        let c4 = modpow(input.ciphertext.raw(), &BigNumber::from(4u64), n_squared);
        let ci2 = modpow(self.share.value(), &BigNumber::from(2u64), n_squared);

        // a = c⁴ᶻ · (c_i²)⁻ᵉ and b = vᶻ · v_i⁻ᵉ; a missing inverse means a
        // corrupted share and reads as a failed proof.
        let (Some(ci2_inv), Some(vi_inv)) = (ci2.invert(n_squared), v_i.invert(n_squared)) else {
            return Err(Error::ProofFailure);
        };
        let a = modpow(&c4, &self.z, n_squared)
            .modmul(&modpow(&ci2_inv, &self.e, n_squared), n_squared);
        let b = modpow(input.key.v(), &self.z, n_squared)
            .modmul(&modpow(&vi_inv, &self.e, n_squared), n_squared);

        let mut transcript = Transcript::new();
        transcript.append_bn(&a);
        transcript.append_bn(&b);
        transcript.append_bn(&c4);
        transcript.append_bn(&ci2);
        let recomputed = transcript.challenge();

        all_checks_pass(&[recomputed == self.e])
    }
}

impl ThresholdKey {
    /// Verify each proof against this key and the common ciphertext, then
    /// combine the vouched-for shares.
    pub fn combine_verified(
        &self,
        ciphertext: &Ciphertext,
        proofs: &[DecryptionProof],
    ) -> Result<BigNumber> {
        let input = DecryptionInput::new(self, ciphertext);
        for proof in proofs {
            proof.verify(&input)?;
        }
        let shares: Vec<_> = proofs.iter().map(|proof| proof.share().clone()).collect();
        self.combine_shares(&shares)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn honest_partial_decryptions_verify_and_combine() {
        let mut rng = init_testing();
        let shares = KeyShare::generate(&mut rng, 256, 5, 3).unwrap();
        let key = shares[0].threshold_key().clone();
        let pk = key.encryption_key();

        let m = BigNumber::from(808u64);
        let c = pk.encrypt_with_rng(&mut rng, &m).unwrap().0;
        let input = DecryptionInput::new(&key, &c);

        let proofs: Vec<_> = shares[..3]
            .iter()
            .map(|share| DecryptionProof::prove(&mut rng, &input, share).unwrap())
            .collect();
        for proof in &proofs {
            proof.verify(&input).unwrap();
        }
        assert_eq!(key.combine_verified(&c, &proofs).unwrap(), m);
    }

    #[test]
    fn proofs_are_bound_to_the_ciphertext() {
        let mut rng = init_testing();
        let shares = KeyShare::generate(&mut rng, 256, 3, 2).unwrap();
        let key = shares[0].threshold_key().clone();
        let pk = key.encryption_key();

        let c = pk.encrypt_with_rng(&mut rng, &BigNumber::from(5u64)).unwrap().0;
        let other = pk.encrypt_with_rng(&mut rng, &BigNumber::from(5u64)).unwrap().0;

        let input = DecryptionInput::new(&key, &c);
        let proof = DecryptionProof::prove(&mut rng, &input, &shares[0]).unwrap();

        let wrong = DecryptionInput::new(&key, &other);
        assert_eq!(proof.verify(&wrong).unwrap_err(), Error::ProofFailure);
    }

    #[test]
    fn wrong_share_decryptions_fail_verification() {
        let mut rng = init_testing();
        let shares = KeyShare::generate(&mut rng, 256, 3, 2).unwrap();
        let key = shares[0].threshold_key().clone();
        let pk = key.encryption_key();

        let c = pk.encrypt_with_rng(&mut rng, &BigNumber::from(5u64)).unwrap().0;
        let input = DecryptionInput::new(&key, &c);
        let proof = DecryptionProof::prove(&mut rng, &input, &shares[0]).unwrap();

        // Claim the same decryption came from server 2.
        let mut forged = proof.clone();
        forged.share = PartialDecryption::new(2, proof.share().value().clone());
        assert_eq!(forged.verify(&input).unwrap_err(), Error::ProofFailure);

        // Reference a server the key does not know about.
        let mut unknown = proof.clone();
        unknown.share = PartialDecryption::new(9, proof.share().value().clone());
        assert!(matches!(
            unknown.verify(&input).unwrap_err(),
            Error::KeyMismatch(_)
        ));
    }

    #[test]
    fn proof_encoding_round_trips() {
        let mut rng = init_testing();
        let shares = KeyShare::generate(&mut rng, 256, 3, 2).unwrap();
        let key = shares[0].threshold_key().clone();
        let pk = key.encryption_key();

        let c = pk.encrypt_with_rng(&mut rng, &BigNumber::from(6u64)).unwrap().0;
        let input = DecryptionInput::new(&key, &c);
        let proof = DecryptionProof::prove(&mut rng, &input, &shares[1]).unwrap();

        let bytes = proof.to_bytes();
        assert_eq!(DecryptionProof::try_from_bytes(&bytes).unwrap(), proof);

        let mut truncated = bytes;
        truncated.pop();
        assert_eq!(
            DecryptionProof::try_from_bytes(&truncated).unwrap_err(),
            Error::CorruptEncoding
        );
    }
}
