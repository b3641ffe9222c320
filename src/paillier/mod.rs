// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The generalized Paillier cryptosystem with the exponent parameter fixed at
//! one.
//!
//! Plaintexts live in `Z_n`, ciphertexts in `Z_{n²}`, and the fixed
//! generator is `g = n + 1`. Encryption is
//! `E(m, r) = (n+1)^m · r^n mod n²`; the scheme is additively homomorphic:
//! multiplying ciphertexts adds plaintexts, exponentiation by a constant
//! multiplies the plaintext by it.

use crate::{
    encoding::{self, Decoder},
    errors::{Error, Result},
    utils::{modpow, random_bn_in_z_star, random_positive_bn},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub mod threshold;

mod keyfile;
pub use keyfile::{
    load_threshold_shares, read_threshold_shares, save_threshold_shares, write_threshold_shares,
};

/// The modulus may not exceed 2^4096.
const MAX_MODULUS_BITS: usize = 4096;

/// A Paillier ciphertext: an element of `Z_{n²}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct Ciphertext(pub(crate) BigNumber);

impl Ciphertext {
    /// The raw group element.
    pub(crate) fn raw(&self) -> &BigNumber {
        &self.0
    }

    /// Encode as a single length-prefixed big integer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encoding::append_bigint(&mut buf, &self.0).expect("a group element fits a length field");
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let value = decoder.take_bigint()?;
        decoder.finish()?;
        Ok(Self(value))
    }
}

/// A Paillier public key: the modulus `n`, the fixed generator `g = n + 1`,
/// and the cached square `n²`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionKey {
    n: BigNumber,
    g: BigNumber,
    n_squared: BigNumber,
    bits: usize,
}

impl EncryptionKey {
    /// Build the public key for a modulus.
    ///
    /// The modulus must be a positive odd number of at most 4096 bits; that
    /// it is a product of two primes is the caller's responsibility (key
    /// generation guarantees it).
    pub fn from_modulus(n: &BigNumber) -> Result<Self> {
        let bits = crate::utils::bit_length(n);
        if n <= &BigNumber::one() || bits > MAX_MODULUS_BITS {
            error!("Rejecting a Paillier modulus outside the supported range");
            return Err(Error::DomainViolation("modulus outside supported range"));
        }
        Ok(Self {
            n: n.clone(),
            g: n + BigNumber::one(),
            n_squared: n * n,
            bits,
        })
    }

    /// The modulus `n`.
    pub fn modulus(&self) -> &BigNumber {
        &self.n
    }

    /// The cached `n²`.
    pub fn modulus_squared(&self) -> &BigNumber {
        &self.n_squared
    }

    /// The fixed generator `g = n + 1`.
    pub fn generator(&self) -> &BigNumber {
        &self.g
    }

    /// The security parameter `k = bitlen(n)`.
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// True iff `m` is a plaintext for this key.
    pub fn is_plaintext(&self, m: &BigNumber) -> bool {
        m >= &BigNumber::zero() && m < &self.n
    }

    /// True iff `r` is a valid randomizer for this key.
    pub fn is_randomizer(&self, r: &BigNumber) -> bool {
        self.is_plaintext(r) && r.gcd(&self.n) == BigNumber::one()
    }

    /// True iff `c` lies in the ciphertext space `[0, n²)`.
    pub fn is_ciphertext(&self, c: &Ciphertext) -> bool {
        c.0 >= BigNumber::zero() && c.0 < self.n_squared
    }

    /// Sample a plaintext uniformly from `[0, n)`.
    pub fn random_plaintext<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigNumber {
        random_positive_bn(rng, &self.n)
    }

    /// Sample a randomizer uniformly from `Z_n*`.
    pub fn random_randomizer<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<BigNumber> {
        random_bn_in_z_star(rng, &self.n)
    }

    /// Sample a unit of `Z_{n²}*`.
    pub(crate) fn random_unit_mod_n_squared<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<BigNumber> {
        random_bn_in_z_star(rng, &self.n_squared)
    }

    /// Encrypt `m` under the given randomizer: `(n+1)^m · r^n mod n²`.
    pub fn encrypt(&self, m: &BigNumber, r: &BigNumber) -> Result<Ciphertext> {
        if !self.is_plaintext(m) {
            error!("Rejecting an encryption of a value outside [0, n)");
            return Err(Error::DomainViolation("plaintext not in [0, n)"));
        }
        if !self.is_randomizer(r) {
            error!("Rejecting an encryption under an invalid randomizer");
            return Err(Error::DomainViolation(
                "randomizer not a unit of the ring modulo n",
            ));
        }
        let gm = modpow(&self.g, m, &self.n_squared);
        let rn = modpow(r, &self.n, &self.n_squared);
        Ok(Ciphertext(gm.modmul(&rn, &self.n_squared)))
    }

    /// Encrypt `m` under a freshly sampled randomizer, returning both.
    pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        m: &BigNumber,
    ) -> Result<(Ciphertext, BigNumber)> {
        let r = self.random_randomizer(rng)?;
        let c = self.encrypt(m, &r)?;
        Ok((c, r))
    }

    /// A random encryption of zero.
    pub fn encrypt_zero<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Ciphertext> {
        Ok(self.encrypt_with_rng(rng, &BigNumber::zero())?.0)
    }

    /// A random encryption of one.
    pub fn encrypt_one<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<Ciphertext> {
        Ok(self.encrypt_with_rng(rng, &BigNumber::one())?.0)
    }

    /// A deterministic encryption with the randomizer fixed to one.
    ///
    /// Only sound for plaintexts that are public anyway (protocol constants,
    /// message digests). Never pass a secret here.
    pub(crate) fn encrypt_public(&self, m: &BigNumber) -> Result<Ciphertext> {
        self.encrypt(m, &BigNumber::one())
    }

    /// Homomorphic addition: `E(m₁ + m₂) = c₁ · c₂ mod n²`.
    pub fn add(&self, c1: &Ciphertext, c2: &Ciphertext) -> Result<Ciphertext> {
        if !self.is_ciphertext(c1) || !self.is_ciphertext(c2) {
            error!("Rejecting a homomorphic addition of out-of-range operands");
            return Err(Error::DomainViolation("ciphertext not in [0, n²)"));
        }
        Ok(Ciphertext(c1.0.modmul(&c2.0, &self.n_squared)))
    }

    /// Homomorphic scalar multiplication: `E(m · k) = c^k mod n²`.
    pub fn multiply(&self, c: &Ciphertext, k: &BigNumber) -> Result<Ciphertext> {
        if !self.is_ciphertext(c) {
            error!("Rejecting a homomorphic multiplication of an out-of-range operand");
            return Err(Error::DomainViolation("ciphertext not in [0, n²)"));
        }
        if k < &BigNumber::zero() {
            return Err(Error::DomainViolation("scalar must be nonnegative"));
        }
        Ok(Ciphertext(modpow(&c.0, k, &self.n_squared)))
    }

    /// Re-randomize a ciphertext: `c · r^n mod n²` decrypts unchanged.
    pub fn rerandomize_with(&self, c: &Ciphertext, r: &BigNumber) -> Result<Ciphertext> {
        if !self.is_ciphertext(c) {
            return Err(Error::DomainViolation("ciphertext not in [0, n²)"));
        }
        if !self.is_randomizer(r) {
            return Err(Error::DomainViolation(
                "randomizer not a unit of the ring modulo n",
            ));
        }
        let rn = modpow(r, &self.n, &self.n_squared);
        Ok(Ciphertext(c.0.modmul(&rn, &self.n_squared)))
    }

    /// Re-randomize under a freshly sampled randomizer.
    pub fn rerandomize<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        c: &Ciphertext,
    ) -> Result<Ciphertext> {
        let r = self.random_randomizer(rng)?;
        self.rerandomize_with(c, &r)
    }

    /// Encode as a single layer `[len ‖ n]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encoding::append_bigint(&mut buf, &self.n).expect("modulus fits a length field");
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut decoder = Decoder::new(bytes);
        let n = decoder.take_bigint()?;
        decoder.finish()?;
        Self::from_modulus(&n)
    }
}

/// A Paillier private key holding the master exponent `d` and its inverse
/// modulo `n`.
///
/// For this scheme `d = λ(n)` works because `g = n + 1` has order `n`.
#[derive(Clone, ZeroizeOnDrop)]
pub struct DecryptionKey {
    #[zeroize(skip)]
    pk: EncryptionKey,
    d: BigNumber,
    d_inv: BigNumber,
}

impl std::fmt::Debug for DecryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionKey")
            .field("pk", &self.pk)
            .field("d", &"[redacted]")
            .finish()
    }
}

impl DecryptionKey {
    /// Generate a fresh key pair.
    ///
    /// Samples two distinct odd primes of exactly `bits` bits with
    /// `q mod (p−1) ≠ 0` and sets `d = λ(n) = lcm(p−1, q−1)`.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R, bits: usize) -> Result<Self> {
        loop {
            let a = crate::utils::probable_prime(bits, rng);
            let b = crate::utils::probable_prime(bits, rng);
            let (p, q) = if a < b { (a, b) } else { (b, a) };
            if p == q {
                continue;
            }
            // p−1 must not divide q, or decryption degenerates.
            if q.clone() % (p.clone() - BigNumber::one()) == BigNumber::zero() {
                continue;
            }

            let n = &p * &q;
            let p_minus_one = p - BigNumber::one();
            let q_minus_one = q - BigNumber::one();
            let phi = &p_minus_one * &q_minus_one;
            let d = phi / p_minus_one.gcd(&q_minus_one);

            // λ(n) is invertible mod n for all but pathological prime pairs;
            // resample rather than hand back a broken key.
            let Some(d_inv) = d.invert(&n) else {
                continue;
            };

            let pk = EncryptionKey::from_modulus(&n)?;
            return Ok(Self { pk, d, d_inv });
        }
    }

    /// The public half of this key.
    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.pk
    }

    /// Decrypt a ciphertext: `d⁻¹ · L(c^d mod n²) mod n` where
    /// `L(x) = (x − 1)/n`.
    pub fn decrypt(&self, c: &Ciphertext) -> Result<BigNumber> {
        if !self.pk.is_ciphertext(c) {
            error!("Rejecting a decryption of an out-of-range ciphertext");
            return Err(Error::DomainViolation("ciphertext not in [0, n²)"));
        }
        let cd = modpow(&c.0, &self.d, &self.pk.n_squared);
        let l = (cd - BigNumber::one()) / self.pk.n.clone();
        Ok(self.d_inv.modmul(&l, &self.pk.n))
    }

    /// Encode as `[public-layer ‖ len‖d ‖ public-layer-length:4]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.pk.to_bytes();
        let mark = buf.len();
        encoding::append_bigint(&mut buf, &self.d).expect("exponent fits a length field");
        encoding::seal_layer(&mut buf, mark).expect("layer fits a length field");
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let (inner, own) = encoding::open_layer(bytes)?;
        let pk = EncryptionKey::try_from_bytes(inner)?;
        let mut decoder = Decoder::new(own);
        let d = decoder.take_bigint()?;
        decoder.finish()?;
        let d_inv = d
            .invert(pk.modulus())
            .ok_or(Error::DomainViolation("exponent not invertible modulo n"))?;
        Ok(Self { pk, d, d_inv })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    const TEST_BITS: usize = 256;

    #[test]
    fn encryption_round_trips() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, TEST_BITS).unwrap();
        let pk = dk.encryption_key().clone();

        for _ in 0..5 {
            let m = pk.random_plaintext(&mut rng);
            let (c, _r) = pk.encrypt_with_rng(&mut rng, &m).unwrap();
            assert_eq!(dk.decrypt(&c).unwrap(), m);
        }
    }

    #[test]
    fn addition_is_homomorphic() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, TEST_BITS).unwrap();
        let pk = dk.encryption_key().clone();

        let m1 = pk.random_plaintext(&mut rng);
        let m2 = pk.random_plaintext(&mut rng);
        let c1 = pk.encrypt_with_rng(&mut rng, &m1).unwrap().0;
        let c2 = pk.encrypt_with_rng(&mut rng, &m2).unwrap().0;

        let sum = pk.add(&c1, &c2).unwrap();
        assert_eq!(dk.decrypt(&sum).unwrap(), (m1 + m2).nmod(pk.modulus()));
    }

    #[test]
    fn scalar_multiplication_is_homomorphic() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, TEST_BITS).unwrap();
        let pk = dk.encryption_key().clone();

        let m = pk.random_plaintext(&mut rng);
        let k = BigNumber::from(777u64);
        let c = pk.encrypt_with_rng(&mut rng, &m).unwrap().0;

        let product = pk.multiply(&c, &k).unwrap();
        assert_eq!(dk.decrypt(&product).unwrap(), (m * k).nmod(pk.modulus()));
    }

    #[test]
    fn rerandomization_preserves_the_plaintext() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, TEST_BITS).unwrap();
        let pk = dk.encryption_key().clone();

        let m = pk.random_plaintext(&mut rng);
        let c = pk.encrypt_with_rng(&mut rng, &m).unwrap().0;
        let c2 = pk.rerandomize(&mut rng, &c).unwrap();

        assert_ne!(c, c2);
        assert_eq!(dk.decrypt(&c2).unwrap(), m);
    }

    #[test]
    fn sums_of_constants_decrypt_correctly() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, TEST_BITS).unwrap();
        let pk = dk.encryption_key().clone();

        // E(0)·E(0) decrypts to 0.
        let zeros = pk
            .add(
                &pk.encrypt_zero(&mut rng).unwrap(),
                &pk.encrypt_zero(&mut rng).unwrap(),
            )
            .unwrap();
        assert_eq!(dk.decrypt(&zeros).unwrap(), BigNumber::zero());

        // E(1)·E(−1 mod n) decrypts to 0.
        let minus_one = pk.modulus() - BigNumber::one();
        let c = pk
            .add(
                &pk.encrypt_one(&mut rng).unwrap(),
                &pk.encrypt_with_rng(&mut rng, &minus_one).unwrap().0,
            )
            .unwrap();
        assert_eq!(dk.decrypt(&c).unwrap(), BigNumber::zero());

        // E(1)·E(1)·E(1) decrypts to 3.
        let first = pk.encrypt_one(&mut rng).unwrap();
        let second = pk.encrypt_one(&mut rng).unwrap();
        let third = pk.encrypt_one(&mut rng).unwrap();
        let three = pk.add(&pk.add(&first, &second).unwrap(), &third).unwrap();
        assert_eq!(dk.decrypt(&three).unwrap(), BigNumber::from(3u64));
    }

    #[test]
    fn out_of_domain_arguments_are_rejected() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, TEST_BITS).unwrap();
        let pk = dk.encryption_key().clone();

        // Plaintext at n.
        let r = pk.random_randomizer(&mut rng).unwrap();
        assert!(matches!(
            pk.encrypt(pk.modulus(), &r),
            Err(Error::DomainViolation(_))
        ));

        // Randomizer sharing a factor with n would be rejected; zero
        // certainly is.
        assert!(matches!(
            pk.encrypt(&BigNumber::one(), &BigNumber::zero()),
            Err(Error::DomainViolation(_))
        ));

        // Ciphertext at n².
        let too_big = Ciphertext(pk.modulus_squared().clone());
        assert!(matches!(
            dk.decrypt(&too_big),
            Err(Error::DomainViolation(_))
        ));
    }

    #[test]
    fn key_encodings_round_trip() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, TEST_BITS).unwrap();
        let pk = dk.encryption_key().clone();

        let pk2 = EncryptionKey::try_from_bytes(&pk.to_bytes()).unwrap();
        assert_eq!(pk, pk2);

        let dk_bytes = dk.to_bytes();
        let dk2 = DecryptionKey::try_from_bytes(&dk_bytes).unwrap();
        assert_eq!(dk.d, dk2.d);
        assert_eq!(dk.encryption_key(), dk2.encryption_key());

        let mut truncated = dk_bytes;
        truncated.pop();
        assert_eq!(
            DecryptionKey::try_from_bytes(&truncated).unwrap_err(),
            Error::CorruptEncoding
        );
    }

    #[test]
    fn ciphertext_encoding_round_trips() {
        let mut rng = init_testing();
        let dk = DecryptionKey::generate(&mut rng, TEST_BITS).unwrap();
        let pk = dk.encryption_key().clone();

        let m = pk.random_plaintext(&mut rng);
        let c = pk.encrypt_with_rng(&mut rng, &m).unwrap().0;
        assert_eq!(Ciphertext::try_from_bytes(&c.to_bytes()).unwrap(), c);

        let mut truncated = c.to_bytes();
        truncated.pop();
        assert_eq!(
            Ciphertext::try_from_bytes(&truncated).unwrap_err(),
            Error::CorruptEncoding
        );
    }
}
