// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A two-level somewhat-homomorphic layer over Paillier.
//!
//! Level-1 ciphertexts support additions and scalar multiplications; one
//! multiplication of two level-1 ciphertexts yields a level-2 ciphertext,
//! which again supports additions and scalar multiplications but no further
//! multiplications. The construction is the Catalano–Fiore transform: a
//! level-1 encryption of `m` is `(a, β)` with `a = m − b mod n` for a fresh
//! mask `b` and `β = Enc(b)`.

use crate::{
    encoding::{self, Decoder},
    errors::{Error, Result},
    paillier::{Ciphertext, DecryptionKey, EncryptionKey},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub mod threshold;

/// A level-1 ciphertext `(a, β)`, decrypting to `a + Dec(β) mod n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct CiphertextL1 {
    pub(crate) mask: BigNumber,
    pub(crate) body: Ciphertext,
}

/// A level-2 ciphertext `(α, [(β₀, β₁), …])`, decrypting to
/// `Dec(α) + Σ Dec(β₀)·Dec(β₁) mod n`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct CiphertextL2 {
    pub(crate) alpha: Ciphertext,
    pub(crate) pairs: Vec<(Ciphertext, Ciphertext)>,
}

impl CiphertextL1 {
    pub(crate) fn from_parts(mask: BigNumber, body: Ciphertext) -> Self {
        Self { mask, body }
    }

    /// The additive mask component `a`.
    pub(crate) fn mask(&self) -> &BigNumber {
        &self.mask
    }

    /// The Paillier component `β`.
    pub(crate) fn body(&self) -> &Ciphertext {
        &self.body
    }

    /// Encrypt `m` under a caller-chosen randomizer. The additive mask is
    /// drawn fresh; the randomizer blinds the Paillier component, so proofs
    /// about the encryption can refer to it.
    pub fn encrypt_with_randomizer<R: RngCore + CryptoRng>(
        pk: &EncryptionKey,
        rng: &mut R,
        m: &BigNumber,
        r: &BigNumber,
    ) -> Result<Self> {
        if !pk.is_plaintext(m) {
            return Err(Error::DomainViolation("plaintext not in [0, n)"));
        }
        let b = pk.random_plaintext(rng);
        let mask = (m - &b).nmod(pk.modulus());
        let body = pk.encrypt(&b, r)?;
        Ok(Self { mask, body })
    }

    /// Encrypt `m` under fresh randomness, returning the randomizer.
    pub fn encrypt<R: RngCore + CryptoRng>(
        pk: &EncryptionKey,
        rng: &mut R,
        m: &BigNumber,
    ) -> Result<(Self, BigNumber)> {
        let r = pk.random_randomizer(rng)?;
        let c = Self::encrypt_with_randomizer(pk, rng, m, &r)?;
        Ok((c, r))
    }

    /// A deterministic encryption with both the mask and the randomizer
    /// fixed to one.
    ///
    /// Only sound for plaintexts that are public anyway; the signing
    /// protocol uses it for the constant one and the truncated message
    /// digest, never for a secret.
    pub fn encrypt_public(pk: &EncryptionKey, m: &BigNumber) -> Result<Self> {
        if !pk.is_plaintext(m) {
            return Err(Error::DomainViolation("plaintext not in [0, n)"));
        }
        let b = BigNumber::one();
        let mask = (m - &b).nmod(pk.modulus());
        let body = pk.encrypt(&b, &BigNumber::one())?;
        Ok(Self { mask, body })
    }

    /// Componentwise homomorphic addition.
    pub fn add(&self, pk: &EncryptionKey, other: &Self) -> Result<Self> {
        Ok(Self {
            mask: (&self.mask + &other.mask).nmod(pk.modulus()),
            body: pk.add(&self.body, &other.body)?,
        })
    }

    /// Homomorphic multiplication by a public scalar.
    pub fn scalar_mul(&self, pk: &EncryptionKey, k: &BigNumber) -> Result<Self> {
        Ok(Self {
            mask: (&self.mask * k).nmod(pk.modulus()),
            body: pk.multiply(&self.body, k)?,
        })
    }

    /// Multiply two level-1 ciphertexts into a level-2 ciphertext.
    ///
    /// `α` collects the cross terms:
    /// `Enc(a₁·a₂) ⊕ β₂^{a₁} ⊕ β₁^{a₂}`, and the pair `(β₁, β₂)` carries
    /// the product of the masked parts.
    pub fn mul(&self, pk: &EncryptionKey, other: &Self) -> Result<CiphertextL2> {
        let cross = pk.encrypt_public(&(&self.mask * &other.mask).nmod(pk.modulus()))?;
        let alpha = pk.add(
            &pk.add(&cross, &pk.multiply(&other.body, &self.mask)?)?,
            &pk.multiply(&self.body, &other.mask)?,
        )?;
        Ok(CiphertextL2 {
            alpha,
            pairs: vec![(self.body.clone(), other.body.clone())],
        })
    }

    /// Re-randomize in place of the original mask; decrypts unchanged.
    pub fn rerandomize<R: RngCore + CryptoRng>(
        &self,
        pk: &EncryptionKey,
        rng: &mut R,
    ) -> Result<Self> {
        let b = pk.random_plaintext(rng);
        let fresh = pk.encrypt_with_rng(rng, &b)?.0;
        Ok(Self {
            mask: (&self.mask - &b).nmod(pk.modulus()),
            body: pk.add(&fresh, &self.body)?,
        })
    }

    /// Collapse to a plain Paillier ciphertext of the same plaintext,
    /// preserving the randomizer of `β`: `(n+1)^a · β mod n²`.
    pub fn to_paillier(&self, pk: &EncryptionKey) -> Result<Ciphertext> {
        let shifted = pk.encrypt_public(&self.mask.nmod(pk.modulus()))?;
        pk.add(&shifted, &self.body)
    }

    /// Decrypt with the non-threshold key.
    pub fn decrypt(&self, dk: &DecryptionKey) -> Result<BigNumber> {
        let b = dk.decrypt(&self.body)?;
        Ok((&self.mask + &b).nmod(dk.encryption_key().modulus()))
    }

    /// Encode as `[len‖a ‖ len‖β]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encoding::append_bigint(&mut buf, &self.mask).expect("mask fits a length prefix");
        encoding::append_bigint(&mut buf, self.body.raw()).expect("body fits a length prefix");
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let mask = decoder.take_bigint()?;
        let body = Ciphertext(decoder.take_bigint()?);
        decoder.finish()?;
        Ok(Self { mask, body })
    }
}

impl CiphertextL2 {
    /// The Paillier component `α`.
    pub(crate) fn alpha(&self) -> &Ciphertext {
        &self.alpha
    }

    /// The `(β₀, β₁)` pair sequence.
    pub(crate) fn pairs(&self) -> &[(Ciphertext, Ciphertext)] {
        &self.pairs
    }

    /// Homomorphic addition: Paillier-add the α components and concatenate
    /// the pair sequences.
    pub fn add(&self, pk: &EncryptionKey, other: &Self) -> Result<Self> {
        let mut pairs = self.pairs.clone();
        pairs.extend_from_slice(&other.pairs);
        Ok(Self {
            alpha: pk.add(&self.alpha, &other.alpha)?,
            pairs,
        })
    }

    /// Add a level-1 ciphertext by lifting it through a multiplication with
    /// the public constant one.
    pub fn add_l1(&self, pk: &EncryptionKey, other: &CiphertextL1) -> Result<Self> {
        let lifted = other.mul(pk, &CiphertextL1::encrypt_public(pk, &BigNumber::one())?)?;
        lifted.add(pk, self)
    }

    /// Homomorphic multiplication by a public scalar: scales α and the first
    /// component of every pair.
    pub fn scalar_mul(&self, pk: &EncryptionKey, k: &BigNumber) -> Result<Self> {
        let pairs = self
            .pairs
            .iter()
            .map(|(b0, b1)| Ok((pk.multiply(b0, k)?, b1.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            alpha: pk.multiply(&self.alpha, k)?,
            pairs,
        })
    }

    /// Decrypt with the non-threshold key.
    pub fn decrypt(&self, dk: &DecryptionKey) -> Result<BigNumber> {
        let mut message = dk.decrypt(&self.alpha)?;
        for (b0, b1) in &self.pairs {
            message = message + dk.decrypt(b0)? * dk.decrypt(b1)?;
        }
        Ok(message.nmod(dk.encryption_key().modulus()))
    }

    /// Encode as `[len‖α ‖ count:4 ‖ (len‖β₀ ‖ len‖β₁)*]`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        encoding::append_bigint(&mut buf, self.alpha.raw())?;
        let count = u32::try_from(self.pairs.len()).map_err(|_| Error::EncodingOverflow)?;
        encoding::append_u32(&mut buf, count);
        for (b0, b1) in &self.pairs {
            encoding::append_bigint(&mut buf, b0.raw())?;
            encoding::append_bigint(&mut buf, b1.raw())?;
        }
        Ok(buf)
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let alpha = Ciphertext(decoder.take_bigint()?);
        let count = decoder.take_u32()? as usize;
        let mut pairs = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let b0 = Ciphertext(decoder.take_bigint()?);
            let b1 = Ciphertext(decoder.take_bigint()?);
            pairs.push((b0, b1));
        }
        decoder.finish()?;
        Ok(Self { alpha, pairs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    const TEST_BITS: usize = 256;

    fn keypair(rng: &mut rand::rngs::StdRng) -> (EncryptionKey, DecryptionKey) {
        let dk = DecryptionKey::generate(rng, TEST_BITS).unwrap();
        (dk.encryption_key().clone(), dk)
    }

    #[test]
    fn level_one_round_trips() {
        let mut rng = init_testing();
        let (pk, dk) = keypair(&mut rng);

        for _ in 0..3 {
            let m = pk.random_plaintext(&mut rng);
            let (c, _r) = CiphertextL1::encrypt(&pk, &mut rng, &m).unwrap();
            assert_eq!(c.decrypt(&dk).unwrap(), m);
        }
    }

    #[test]
    fn level_one_is_additively_homomorphic() {
        let mut rng = init_testing();
        let (pk, dk) = keypair(&mut rng);

        let a = pk.random_plaintext(&mut rng);
        let b = pk.random_plaintext(&mut rng);
        let ca = CiphertextL1::encrypt(&pk, &mut rng, &a).unwrap().0;
        let cb = CiphertextL1::encrypt(&pk, &mut rng, &b).unwrap().0;

        let sum = ca.add(&pk, &cb).unwrap();
        assert_eq!(sum.decrypt(&dk).unwrap(), (&a + &b).nmod(pk.modulus()));

        let k = BigNumber::from(31337u64);
        let scaled = ca.scalar_mul(&pk, &k).unwrap();
        assert_eq!(scaled.decrypt(&dk).unwrap(), (&a * &k).nmod(pk.modulus()));
    }

    #[test]
    fn one_multiplication_is_supported() {
        let mut rng = init_testing();
        let (pk, dk) = keypair(&mut rng);

        let msg1 = BigNumber::from(10u64);
        let msg2 = BigNumber::from(2u64);
        let msg3 = BigNumber::from(3u64);

        let c1 = CiphertextL1::encrypt(&pk, &mut rng, &msg1).unwrap().0;
        let c2 = CiphertextL1::encrypt(&pk, &mut rng, &msg2).unwrap().0;
        let c3 = CiphertextL1::encrypt(&pk, &mut rng, &msg3).unwrap().0;

        // (10 + 2) · 3 = 36, and 36 + 36 = 72.
        let product = c1.add(&pk, &c2).unwrap().mul(&pk, &c3).unwrap();
        assert_eq!(product.decrypt(&dk).unwrap(), BigNumber::from(36u64));

        let doubled = product.add(&pk, &product).unwrap();
        assert_eq!(doubled.decrypt(&dk).unwrap(), BigNumber::from(72u64));
    }

    #[test]
    fn level_two_scalar_multiplication_distributes() {
        let mut rng = init_testing();
        let (pk, dk) = keypair(&mut rng);

        let a = BigNumber::from(11u64);
        let b = BigNumber::from(13u64);
        let ca = CiphertextL1::encrypt(&pk, &mut rng, &a).unwrap().0;
        let cb = CiphertextL1::encrypt(&pk, &mut rng, &b).unwrap().0;
        let product = ca.mul(&pk, &cb).unwrap();

        let k = BigNumber::from(5u64);
        let scaled = product.scalar_mul(&pk, &k).unwrap();
        assert_eq!(scaled.decrypt(&dk).unwrap(), BigNumber::from(11 * 13 * 5u64));

        let shifted = scaled.add_l1(&pk, &ca).unwrap();
        assert_eq!(
            shifted.decrypt(&dk).unwrap(),
            BigNumber::from(11 * 13 * 5 + 11u64)
        );
    }

    #[test]
    fn rerandomization_and_conversion_preserve_plaintexts() {
        let mut rng = init_testing();
        let (pk, dk) = keypair(&mut rng);

        let m = pk.random_plaintext(&mut rng);
        let c = CiphertextL1::encrypt(&pk, &mut rng, &m).unwrap().0;

        let rerandomized = c.rerandomize(&pk, &mut rng).unwrap();
        assert_ne!(rerandomized, c);
        assert_eq!(rerandomized.decrypt(&dk).unwrap(), m);

        let plain = c.to_paillier(&pk).unwrap();
        assert_eq!(dk.decrypt(&plain).unwrap(), m);
    }

    #[test]
    fn conversion_keeps_the_randomizer() {
        let mut rng = init_testing();
        let (pk, _dk) = keypair(&mut rng);

        let m = pk.random_plaintext(&mut rng);
        let r = pk.random_randomizer(&mut rng).unwrap();
        let c = CiphertextL1::encrypt_with_randomizer(&pk, &mut rng, &m, &r).unwrap();

        // The collapsed ciphertext is exactly Enc(m; r).
        assert_eq!(c.to_paillier(&pk).unwrap(), pk.encrypt(&m, &r).unwrap());
    }

    #[test]
    fn encodings_round_trip_and_reject_truncation() {
        let mut rng = init_testing();
        let (pk, _dk) = keypair(&mut rng);

        let a = BigNumber::from(17u64);
        let b = BigNumber::from(19u64);
        let ca = CiphertextL1::encrypt(&pk, &mut rng, &a).unwrap().0;
        let cb = CiphertextL1::encrypt(&pk, &mut rng, &b).unwrap().0;

        let l1_bytes = ca.to_bytes();
        assert_eq!(CiphertextL1::try_from_bytes(&l1_bytes).unwrap(), ca);
        let mut truncated = l1_bytes;
        truncated.pop();
        assert_eq!(
            CiphertextL1::try_from_bytes(&truncated).unwrap_err(),
            Error::CorruptEncoding
        );

        let product = ca.mul(&pk, &cb).unwrap();
        let doubled = product.add(&pk, &product).unwrap();
        let l2_bytes = doubled.to_bytes().unwrap();
        assert_eq!(CiphertextL2::try_from_bytes(&l2_bytes).unwrap(), doubled);
        let mut truncated = l2_bytes;
        truncated.pop();
        assert_eq!(
            CiphertextL2::try_from_bytes(&truncated).unwrap_err(),
            Error::CorruptEncoding
        );
    }
}
