// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The threshold variant of the Paillier cryptosystem.
//!
//! A trusted dealer splits the master decryption exponent across `l` servers
//! with a degree-`(w−1)` polynomial; any `w` of them can decrypt by
//! exchanging partial decryptions, and fewer than `w` learn nothing. The
//! construction follows Damgård–Jurik with Shoup's Δ = l! trick so that the
//! Lagrange recombination never leaves the integers.

use crate::{
    encoding::{self, Decoder},
    errors::{Error, Result},
    paillier::{Ciphertext, EncryptionKey},
    utils::{factorial, modpow, random_bn_in_z_star, random_positive_bn, safe_prime_pair},
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Public material of a threshold Paillier key: the plain public key plus
/// the verification values needed to check and combine partial decryptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdKey {
    pk: EncryptionKey,
    l: usize,
    w: usize,
    delta: BigNumber,
    v: BigNumber,
    vs: Vec<BigNumber>,
    combine_constant: BigNumber,
}

/// One server's private share of a threshold key.
#[derive(Clone, ZeroizeOnDrop)]
pub struct KeyShare {
    #[zeroize(skip)]
    threshold_key: ThresholdKey,
    #[zeroize(skip)]
    id: u32,
    s_i: BigNumber,
}

impl std::fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyShare")
            .field("id", &self.id)
            .field("s_i", &"[redacted]")
            .finish()
    }
}

/// A single server's contribution `(i, c^{2·Δ·s_i} mod n²)` to a threshold
/// decryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct PartialDecryption {
    id: u32,
    value: BigNumber,
}

impl PartialDecryption {
    pub(crate) fn new(id: u32, value: BigNumber) -> Self {
        Self { id, value }
    }

    /// The id of the server that produced this share.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn value(&self) -> &BigNumber {
        &self.value
    }

    /// Encode as `[id:4 ‖ value bytes]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        encoding::append_u32(&mut buf, self.id);
        buf.extend_from_slice(&self.value.to_bytes());
        buf
    }

    /// Decode from the [`Self::to_bytes`] form. The id occupies the first
    /// four bytes, most significant first.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::CorruptEncoding);
        }
        let id = u32::from_be_bytes(bytes[..4].try_into().expect("four bytes"));
        let value = BigNumber::from_slice(&bytes[4..]);
        Ok(Self { id, value })
    }
}

impl ThresholdKey {
    /// Reassemble public threshold material from its parts (used by the
    /// key-file loader). Δ is derived state and recomputed here.
    pub(crate) fn from_parts(
        pk: EncryptionKey,
        l: usize,
        w: usize,
        v: BigNumber,
        vs: Vec<BigNumber>,
        combine_constant: BigNumber,
    ) -> Result<Self> {
        if w < 1 || w > l || vs.len() != l {
            return Err(Error::DomainViolation(
                "threshold parameters must satisfy 1 ≤ w ≤ l with one verification value per server",
            ));
        }
        Ok(Self {
            pk,
            l,
            w,
            delta: factorial(l),
            v,
            vs,
            combine_constant,
        })
    }

    /// The plain Paillier public key.
    pub fn encryption_key(&self) -> &EncryptionKey {
        &self.pk
    }

    /// The number of decryption servers.
    pub fn servers(&self) -> usize {
        self.l
    }

    /// The number of servers that must cooperate to decrypt.
    pub fn threshold(&self) -> usize {
        self.w
    }

    /// Δ = l!.
    pub(crate) fn delta(&self) -> &BigNumber {
        &self.delta
    }

    /// The public verification base `v`.
    pub(crate) fn v(&self) -> &BigNumber {
        &self.v
    }

    /// The verification value `v_i = v^{Δ·s_i}` of server `id`.
    pub(crate) fn verification_value(&self, id: u32) -> Result<&BigNumber> {
        self.vs
            .get(id.checked_sub(1).ok_or(Error::KeyMismatch(
                "share id zero does not belong to any server",
            ))? as usize)
            .ok_or(Error::KeyMismatch(
                "share id outside this key's server set",
            ))
    }

    pub(crate) fn combine_constant(&self) -> &BigNumber {
        &self.combine_constant
    }

    /// Combine at least `w` distinct partial decryptions of the same
    /// ciphertext into the plaintext.
    pub fn combine_shares(&self, shares: &[PartialDecryption]) -> Result<BigNumber> {
        if shares.len() < self.w {
            error!(
                "Refusing to combine {} shares under a threshold of {}",
                shares.len(),
                self.w
            );
            return Err(Error::InsufficientShares {
                needed: self.w,
                got: shares.len(),
            });
        }

        let mut seen = HashSet::new();
        for share in shares {
            if share.id == 0 || share.id as usize > self.l {
                return Err(Error::KeyMismatch(
                    "share id outside this key's server set",
                ));
            }
            if !seen.insert(share.id) {
                error!("Refusing to combine duplicate shares from server {}", share.id);
                return Err(Error::DuplicateShare(share.id));
            }
        }

        let n_squared = self.pk.modulus_squared();
        let mut c_prime = BigNumber::one();
        for share in shares {
            let exponent = BigNumber::from(2u64) * self.lagrange_at_zero(share.id, shares)?;
            let factor = signed_modpow(&share.value, &exponent, n_squared)?;
            c_prime = c_prime.modmul(&factor, n_squared);
        }

        let l_value = (c_prime - BigNumber::one()) / self.pk.modulus().clone();
        Ok(self.combine_constant.modmul(&l_value, self.pk.modulus()))
    }

    /// The scaled Lagrange coefficient `λ_{0,j} = Δ · Π_{k≠j} (−i_k)/(i_j −
    /// i_k)`, an exact integer for ids drawn from `{1..l}`.
    fn lagrange_at_zero(&self, id: u32, shares: &[PartialDecryption]) -> Result<BigNumber> {
        let mut numerator = self.delta.clone();
        let mut denominator = BigNumber::one();
        let mut negative = false;

        for other in shares {
            if other.id == id {
                continue;
            }
            numerator = numerator * BigNumber::from(other.id as u64);
            negative = !negative;

            let (diff, diff_negative) = if id > other.id {
                (id - other.id, false)
            } else {
                (other.id - id, true)
            };
            denominator = denominator * BigNumber::from(diff as u64);
            if diff_negative {
                negative = !negative;
            }
        }

        // Shoup's observation: Δ times any such coefficient is integral.
        let coefficient = numerator / denominator;
        Ok(if negative { -coefficient } else { coefficient })
    }
}

impl KeyShare {
    /// Deal a fresh set of `l` shares with decryption threshold `w`, over a
    /// modulus built from two `bits`-bit safe primes.
    ///
    /// Requires `1 ≤ w ≤ l` and `2w − 1 ≤ l` so that reconstruction is
    /// unambiguous.
    pub fn generate<R: RngCore + CryptoRng>(
        rng: &mut R,
        bits: usize,
        l: usize,
        w: usize,
    ) -> Result<Vec<KeyShare>> {
        if w < 1 || w > l || 2 * w - 1 > l {
            error!("Rejecting threshold parameters l={l}, w={w}");
            return Err(Error::DomainViolation(
                "threshold parameters must satisfy 1 ≤ w ≤ l and 2w−1 ≤ l",
            ));
        }

        let (p, p_prime) = safe_prime_pair(bits, rng);
        let (q, q_prime) = loop {
            let (q, q_prime) = safe_prime_pair(bits, rng);
            if q != p && q != p_prime && q_prime != p {
                break (q, q_prime);
            }
        };

        let n = &p * &q;
        let m = &p_prime * &q_prime;
        let nm = &n * &m;
        let pk = EncryptionKey::from_modulus(&n)?;

        // d ≡ 1 (mod n) and d ≡ 0 (mod m), by the Chinese remainder theorem.
        let m_inv = m.invert(&n).ok_or(Error::DomainViolation(
            "safe prime cofactor shares a factor with the modulus",
        ))?;
        let d = &m * &m_inv;

        // f(X) = d + a₁X + … + a_{w−1}X^{w−1} over Z_{nm}, coefficients
        // uniform over [0, nm].
        let upper = &nm + BigNumber::one();
        let mut coefficients = vec![d];
        for _ in 1..w {
            coefficients.push(random_positive_bn(rng, &upper));
        }

        let r = random_bn_in_z_star(rng, &n)?;
        let v = r.modmul(&r, pk.modulus_squared());

        let delta = factorial(l);
        let combine_constant = (BigNumber::from(4u64) * &delta * &delta)
            .invert(&n)
            .ok_or(Error::DomainViolation(
                "4Δ² shares a factor with the modulus",
            ))?;

        let mut secrets = Vec::with_capacity(l);
        let mut vs = Vec::with_capacity(l);
        for index in 1..=l {
            let s_i = evaluate_polynomial(&coefficients, index, &nm);
            vs.push(modpow(&v, &(&delta * &s_i), pk.modulus_squared()));
            secrets.push(s_i);
        }

        for coefficient in coefficients.iter_mut() {
            coefficient.zeroize();
        }

        let threshold_key = ThresholdKey {
            pk,
            l,
            w,
            delta,
            v,
            vs,
            combine_constant,
        };

        Ok(secrets
            .into_iter()
            .enumerate()
            .map(|(index, s_i)| KeyShare {
                threshold_key: threshold_key.clone(),
                id: (index + 1) as u32,
                s_i,
            })
            .collect())
    }

    /// Reassemble a share from its parts (used by the key-file loader).
    pub(crate) fn from_parts(threshold_key: ThresholdKey, id: u32, s_i: BigNumber) -> Self {
        Self {
            threshold_key,
            id,
            s_i,
        }
    }

    /// The public threshold key.
    pub fn threshold_key(&self) -> &ThresholdKey {
        &self.threshold_key
    }

    /// The plain Paillier public key.
    pub fn encryption_key(&self) -> &EncryptionKey {
        self.threshold_key.encryption_key()
    }

    /// This server's id, in `{1..l}`.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub(crate) fn secret(&self) -> &BigNumber {
        &self.s_i
    }

    /// Produce this server's partial decryption `c^{2·Δ·s_i} mod n²`.
    pub fn partial_decrypt(&self, c: &Ciphertext) -> Result<PartialDecryption> {
        if !self.encryption_key().is_ciphertext(c) {
            error!("Rejecting a partial decryption of an out-of-range ciphertext");
            return Err(Error::DomainViolation("ciphertext not in [0, n²)"));
        }
        let exponent = BigNumber::from(2u64) * self.threshold_key.delta() * &self.s_i;
        let value = modpow(c.raw(), &exponent, self.encryption_key().modulus_squared());
        Ok(PartialDecryption::new(self.id, value))
    }
}

/// Horner evaluation of `f` at the small point `x`, reduced mod `modulus`.
fn evaluate_polynomial(coefficients: &[BigNumber], x: usize, modulus: &BigNumber) -> BigNumber {
    let point = BigNumber::from(x as u64);
    coefficients
        .iter()
        .rev()
        .fold(BigNumber::zero(), |acc, coefficient| {
            (acc * &point + coefficient).nmod(modulus)
        })
}

/// `base^exponent mod modulus` for a possibly negative exponent.
fn signed_modpow(base: &BigNumber, exponent: &BigNumber, modulus: &BigNumber) -> Result<BigNumber> {
    if exponent >= &BigNumber::zero() {
        Ok(modpow(base, exponent, modulus))
    } else {
        let inverse = base.invert(modulus).ok_or(Error::DomainViolation(
            "partial decryption is not invertible",
        ))?;
        Ok(modpow(&inverse, &-exponent.clone(), modulus))
    }
}

impl ThresholdKey {
    /// Encode as a layered record over the plain public key:
    /// `[pk-layer ‖ len‖v ‖ len‖combineConstant ‖ (len‖v_i)* ‖ l:4 ‖ w:4 ‖
    /// pk-layer-length:4]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.pk.to_bytes();
        let mark = buf.len();
        encoding::append_bigint(&mut buf, &self.v).expect("field fits a length prefix");
        encoding::append_bigint(&mut buf, &self.combine_constant).expect("field fits");
        for v_i in &self.vs {
            encoding::append_bigint(&mut buf, v_i).expect("field fits");
        }
        encoding::append_u32(&mut buf, self.l as u32);
        encoding::append_u32(&mut buf, self.w as u32);
        encoding::seal_layer(&mut buf, mark).expect("layer fits");
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let (inner, own) = encoding::open_layer(bytes)?;
        let pk = EncryptionKey::try_from_bytes(inner)?;

        let mut decoder = Decoder::new(own);
        let v = decoder.take_bigint()?;
        let combine_constant = decoder.take_bigint()?;
        let mut vs = Vec::new();
        while decoder.remaining() > 8 {
            vs.push(decoder.take_bigint()?);
        }
        let l = decoder.take_u32()? as usize;
        let w = decoder.take_u32()? as usize;
        decoder.finish()?;

        if vs.len() != l || w < 1 || w > l {
            return Err(Error::CorruptEncoding);
        }
        Ok(Self {
            pk,
            l,
            w,
            delta: factorial(l),
            v,
            vs,
            combine_constant,
        })
    }
}

impl KeyShare {
    /// Encode as `[threshold-layer ‖ len‖s_i ‖ id:4 ‖
    /// threshold-layer-length:4]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.threshold_key.to_bytes();
        let mark = buf.len();
        encoding::append_bigint(&mut buf, &self.s_i).expect("share fits a length prefix");
        encoding::append_u32(&mut buf, self.id);
        encoding::seal_layer(&mut buf, mark).expect("layer fits");
        buf
    }

    /// Decode from the [`Self::to_bytes`] form.
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let (inner, own) = encoding::open_layer(bytes)?;
        let threshold_key = ThresholdKey::try_from_bytes(inner)?;
        let mut decoder = Decoder::new(own);
        let s_i = decoder.take_bigint()?;
        let id = decoder.take_u32()?;
        decoder.finish()?;
        if id == 0 || id as usize > threshold_key.l {
            return Err(Error::CorruptEncoding);
        }
        Ok(Self {
            threshold_key,
            id,
            s_i,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    // Safe-prime generation dominates; 512-bit primes keep the suite honest
    // without taking minutes.
    const TEST_BITS: usize = 512;

    fn dealt_shares() -> Vec<KeyShare> {
        let mut rng = init_testing();
        KeyShare::generate(&mut rng, TEST_BITS, 5, 3).unwrap()
    }

    #[test]
    fn any_threshold_subset_recovers_the_plaintext() {
        let mut rng = init_testing();
        let shares = dealt_shares();
        let key = shares[0].threshold_key().clone();
        let pk = key.encryption_key();

        let m = BigNumber::from(42u64);
        let c = pk.encrypt_with_rng(&mut rng, &m).unwrap().0;

        let partials: Vec<_> = shares
            .iter()
            .map(|share| share.partial_decrypt(&c).unwrap())
            .collect();

        let first = key
            .combine_shares(&[
                partials[0].clone(),
                partials[1].clone(),
                partials[2].clone(),
            ])
            .unwrap();
        let second = key
            .combine_shares(&[
                partials[2].clone(),
                partials[3].clone(),
                partials[4].clone(),
            ])
            .unwrap();

        assert_eq!(first, m);
        assert_eq!(second, m);

        // All five shares together also work.
        assert_eq!(key.combine_shares(&partials).unwrap(), m);
    }

    #[test]
    fn duplicate_share_ids_are_fatal() {
        let mut rng = init_testing();
        let shares = dealt_shares();
        let key = shares[0].threshold_key().clone();
        let c = key
            .encryption_key()
            .encrypt_with_rng(&mut rng, &BigNumber::from(42u64))
            .unwrap()
            .0;

        let p1 = shares[0].partial_decrypt(&c).unwrap();
        let p2 = shares[1].partial_decrypt(&c).unwrap();

        assert_eq!(
            key.combine_shares(&[p1.clone(), p1, p2]).unwrap_err(),
            Error::DuplicateShare(1)
        );
    }

    #[test]
    fn too_few_shares_are_rejected() {
        let mut rng = init_testing();
        let shares = dealt_shares();
        let key = shares[0].threshold_key().clone();
        let c = key
            .encryption_key()
            .encrypt_with_rng(&mut rng, &BigNumber::from(7u64))
            .unwrap()
            .0;

        let partials: Vec<_> = shares[..2]
            .iter()
            .map(|share| share.partial_decrypt(&c).unwrap())
            .collect();
        assert_eq!(
            key.combine_shares(&partials).unwrap_err(),
            Error::InsufficientShares { needed: 3, got: 2 }
        );
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut rng = init_testing();
        assert!(KeyShare::generate(&mut rng, TEST_BITS, 5, 0).is_err());
        assert!(KeyShare::generate(&mut rng, TEST_BITS, 5, 6).is_err());
        // 2w−1 > l leaves reconstruction ambiguous.
        assert!(KeyShare::generate(&mut rng, TEST_BITS, 5, 4).is_err());
    }

    #[test]
    fn share_encodings_round_trip() {
        let shares = dealt_shares();
        let share = &shares[1];

        let key2 = ThresholdKey::try_from_bytes(&share.threshold_key().to_bytes()).unwrap();
        assert_eq!(&key2, share.threshold_key());

        let bytes = share.to_bytes();
        let share2 = KeyShare::try_from_bytes(&bytes).unwrap();
        assert_eq!(share2.id(), share.id());
        assert_eq!(share2.secret(), share.secret());
        assert_eq!(share2.threshold_key(), share.threshold_key());

        let mut truncated = bytes;
        truncated.pop();
        assert!(KeyShare::try_from_bytes(&truncated).is_err());
    }

    #[test]
    fn partial_decryption_encoding_uses_big_endian_ids() {
        let mut rng = init_testing();
        let shares = dealt_shares();
        let c = shares[0]
            .encryption_key()
            .encrypt_with_rng(&mut rng, &BigNumber::from(9u64))
            .unwrap()
            .0;
        let partial = shares[4].partial_decrypt(&c).unwrap();

        let bytes = partial.to_bytes();
        assert_eq!(&bytes[..4], &[0, 0, 0, 5]);
        let parsed = PartialDecryption::try_from_bytes(&bytes).unwrap();
        assert_eq!(parsed, partial);

        assert!(PartialDecryption::try_from_bytes(&bytes[..3]).is_err());
    }
}
