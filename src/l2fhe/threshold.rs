// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Threshold decryption of the two-level ciphertexts.
//!
//! A level-1 ciphertext needs one partial decryption (of its Paillier
//! component); a level-2 ciphertext needs one per component. Recombination
//! aggregates component by component with the plain threshold combiner and
//! then re-assembles the two-level decryption formula.

use crate::{
    errors::{Error, Result},
    l2fhe::{CiphertextL1, CiphertextL2},
    paillier::threshold::{KeyShare, PartialDecryption, ThresholdKey},
    zkp::{
        decryption::{DecryptionInput, DecryptionProof},
        Proof,
    },
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// One server's partial decryption of every component of a level-2
/// ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct PartialDecryptionL2 {
    alpha: PartialDecryption,
    pairs: Vec<(PartialDecryption, PartialDecryption)>,
}

impl PartialDecryptionL2 {
    /// The id of the server that produced this share.
    pub fn id(&self) -> u32 {
        self.alpha.id()
    }
}

impl CiphertextL1 {
    /// Partially decrypt the Paillier component; the mask is public and
    /// rejoins at combination time.
    pub fn partial_decrypt(&self, share: &KeyShare) -> Result<PartialDecryption> {
        share.partial_decrypt(self.body())
    }
}

impl CiphertextL2 {
    /// Partially decrypt every component.
    pub fn partial_decrypt(&self, share: &KeyShare) -> Result<PartialDecryptionL2> {
        let alpha = share.partial_decrypt(self.alpha())?;
        let pairs = self
            .pairs()
            .iter()
            .map(|(b0, b1)| Ok((share.partial_decrypt(b0)?, share.partial_decrypt(b1)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(PartialDecryptionL2 { alpha, pairs })
    }
}

/// Combine partial decryptions of a level-1 ciphertext:
/// `a + combine(β shares) mod n`.
pub fn combine_l1(
    key: &ThresholdKey,
    c: &CiphertextL1,
    shares: &[PartialDecryption],
) -> Result<BigNumber> {
    let b = key.combine_shares(shares)?;
    Ok((c.mask() + &b).nmod(key.encryption_key().modulus()))
}

/// Combine partial decryptions of a level-2 ciphertext component by
/// component: `combine(α) + Σ combine(β₀)·combine(β₁) mod n`.
pub fn combine_l2(key: &ThresholdKey, shares: &[PartialDecryptionL2]) -> Result<BigNumber> {
    let first = shares
        .first()
        .ok_or(Error::InsufficientShares {
            needed: key.threshold(),
            got: 0,
        })?;
    let width = first.pairs.len();
    if shares.iter().any(|share| share.pairs.len() != width) {
        return Err(Error::DomainViolation(
            "partial decryptions disagree on the pair count",
        ));
    }

    let alpha_shares: Vec<_> = shares.iter().map(|share| share.alpha.clone()).collect();
    let mut message = key.combine_shares(&alpha_shares)?;

    for index in 0..width {
        let left: Vec<_> = shares
            .iter()
            .map(|share| share.pairs[index].0.clone())
            .collect();
        let right: Vec<_> = shares
            .iter()
            .map(|share| share.pairs[index].1.clone())
            .collect();
        message = message + key.combine_shares(&left)? * key.combine_shares(&right)?;
    }

    Ok(message.nmod(key.encryption_key().modulus()))
}

/// A level-2 partial decryption whose every component carries its
/// correctness proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionProofL2 {
    alpha: DecryptionProof,
    pairs: Vec<(DecryptionProof, DecryptionProof)>,
}

impl CiphertextL2 {
    /// Partially decrypt every component, attaching a proof of correctness
    /// to each.
    pub fn partial_decrypt_with_proof<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        share: &KeyShare,
    ) -> Result<DecryptionProofL2> {
        let key = share.threshold_key();
        let alpha = DecryptionProof::prove(rng, &DecryptionInput::new(key, self.alpha()), share)?;
        let pairs = self
            .pairs()
            .iter()
            .map(|(b0, b1)| {
                Ok((
                    DecryptionProof::prove(rng, &DecryptionInput::new(key, b0), share)?,
                    DecryptionProof::prove(rng, &DecryptionInput::new(key, b1), share)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DecryptionProofL2 { alpha, pairs })
    }
}

/// Verify every component proof against the ciphertext, then combine.
pub fn combine_verified_l2(
    key: &ThresholdKey,
    c: &CiphertextL2,
    shares: &[DecryptionProofL2],
) -> Result<BigNumber> {
    let width = c.pairs().len();
    if shares.iter().any(|share| share.pairs.len() != width) {
        return Err(Error::DomainViolation(
            "partial decryptions disagree on the pair count",
        ));
    }

    let alpha_input = DecryptionInput::new(key, c.alpha());
    for share in shares {
        share.alpha.verify(&alpha_input)?;
        for (index, (left, right)) in share.pairs.iter().enumerate() {
            left.verify(&DecryptionInput::new(key, &c.pairs()[index].0))?;
            right.verify(&DecryptionInput::new(key, &c.pairs()[index].1))?;
        }
    }

    let plain: Vec<_> = shares
        .iter()
        .map(|share| PartialDecryptionL2 {
            alpha: share.alpha.share().clone(),
            pairs: share
                .pairs
                .iter()
                .map(|(left, right)| (left.share().clone(), right.share().clone()))
                .collect(),
        })
        .collect();
    combine_l2(key, &plain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn threshold_decryption_matches_the_plain_semantics() {
        let mut rng = init_testing();
        let shares = KeyShare::generate(&mut rng, 256, 5, 3).unwrap();
        let key = shares[0].threshold_key().clone();
        let pk = key.encryption_key();

        let msg1 = pk.modulus().clone() / BigNumber::from(16u64);
        let msg2 = BigNumber::from(344569u64);
        let msg3 = BigNumber::from(2u64);

        let c1 = CiphertextL1::encrypt(pk, &mut rng, &msg1).unwrap().0;
        let c2 = CiphertextL1::encrypt(pk, &mut rng, &msg2).unwrap().0;
        let c3 = CiphertextL1::encrypt(pk, &mut rng, &msg3).unwrap().0;
        let sum = c1.add(pk, &c2).unwrap();

        // Level 1: three of five servers decrypt the sum.
        let partials: Vec<_> = shares[..3]
            .iter()
            .map(|share| sum.partial_decrypt(share).unwrap())
            .collect();
        assert_eq!(
            combine_l1(&key, &sum, &partials).unwrap(),
            (&msg1 + &msg2).nmod(pk.modulus())
        );

        // Level 2: (msg1 + msg2) · msg3.
        let product = sum.mul(pk, &c3).unwrap();
        let partials: Vec<_> = shares[1..4]
            .iter()
            .map(|share| product.partial_decrypt(share).unwrap())
            .collect();
        assert_eq!(
            combine_l2(&key, &partials).unwrap(),
            ((&msg1 + &msg2) * &msg3).nmod(pk.modulus())
        );
    }

    #[test]
    fn verified_combination_accepts_honest_shares_and_rejects_forgeries() {
        let mut rng = init_testing();
        let shares = KeyShare::generate(&mut rng, 256, 3, 2).unwrap();
        let key = shares[0].threshold_key().clone();
        let pk = key.encryption_key();

        let a = CiphertextL1::encrypt(pk, &mut rng, &BigNumber::from(6u64))
            .unwrap()
            .0;
        let b = CiphertextL1::encrypt(pk, &mut rng, &BigNumber::from(7u64))
            .unwrap()
            .0;
        let product = a.mul(pk, &b).unwrap();

        let proved: Vec<_> = shares[..2]
            .iter()
            .map(|share| product.partial_decrypt_with_proof(&mut rng, share).unwrap())
            .collect();
        assert_eq!(
            combine_verified_l2(&key, &product, &proved).unwrap(),
            BigNumber::from(42u64)
        );

        // A proof over a different ciphertext must not be accepted.
        let unrelated = a.mul(pk, &a).unwrap();
        let forged = vec![
            proved[0].clone(),
            unrelated
                .partial_decrypt_with_proof(&mut rng, &shares[1])
                .unwrap(),
        ];
        assert_eq!(
            combine_verified_l2(&key, &product, &forged).unwrap_err(),
            Error::ProofFailure
        );
    }

    #[test]
    fn mismatched_pair_counts_are_rejected() {
        let mut rng = init_testing();
        let shares = KeyShare::generate(&mut rng, 256, 3, 2).unwrap();
        let key = shares[0].threshold_key().clone();
        let pk = key.encryption_key();

        let a = CiphertextL1::encrypt(pk, &mut rng, &BigNumber::from(3u64))
            .unwrap()
            .0;
        let b = CiphertextL1::encrypt(pk, &mut rng, &BigNumber::from(4u64))
            .unwrap()
            .0;
        let product = a.mul(pk, &b).unwrap();
        let doubled = product.add(pk, &product).unwrap();

        let good = product.partial_decrypt(&shares[0]).unwrap();
        let wide = doubled.partial_decrypt(&shares[1]).unwrap();
        assert!(matches!(
            combine_l2(&key, &[good, wide]),
            Err(Error::DomainViolation(_))
        ));
    }
}
