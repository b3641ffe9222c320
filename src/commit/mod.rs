// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Non-malleable multi-trapdoor commitments.
//!
//! A commitment to a tuple of secrets is `(e, a)` with a fresh tag
//! `e ← Z_q*` and `a = d·g₁ + r·(h₁ + e·g₁)` where `d = H(secrets) mod q`;
//! the opening is `(r, secrets…)`. Binding the commitment to the fresh tag
//! is what buys non-malleability under the bilinear assumption: the check
//!
//! ```text
//! pairing(r·g₁, h₂ + e·g₂) = pairing(a − d·g₁, g₂)
//! ```
//!
//! only closes for the tag the committer drew. The original construction
//! lives in a symmetric pairing group; on the asymmetric BLS12-381 the
//! dealer publishes mirrored generator pairs `(g₁, h₁ = x·g₁)` and
//! `(g₂, h₂ = x·g₂)` and discards `x`.

use crate::errors::{Error, Result};
use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use libpaillier::unknown_order::BigNumber;
use pairing::group::{ff::Field, Group};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod pedersen;

/// The commitment master public key: mirrored generator pairs with a common
/// discrete-log relation between the `g` and `h` components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterPublicKey {
    g1: G1Projective,
    h1: G1Projective,
    g2: G2Projective,
    h2: G2Projective,
}

impl MasterPublicKey {
    /// Generate a fresh master key. The trapdoor `x` relating `h` to `g`
    /// never leaves this function.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let g1 = G1Projective::random(&mut *rng);
        let g2 = G2Projective::random(&mut *rng);
        let x = Scalar::random(&mut *rng);
        Self {
            g1,
            h1: g1 * x,
            g2,
            h2: g2 * x,
        }
    }
}

/// The public half of a commitment: the fresh tag and the committed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    #[serde(with = "scalar_bytes")]
    tag: Scalar,
    #[serde(with = "g1_bytes")]
    point: G1Projective,
}

/// The opening: the committer's randomness and the secrets themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Open {
    #[serde(with = "scalar_bytes")]
    randomness: Scalar,
    secrets: Vec<BigNumber>,
}

impl Open {
    /// The committed secrets, in commit order.
    pub fn secrets(&self) -> &[BigNumber] {
        &self.secrets
    }
}

/// Commit to a tuple of secrets.
pub fn commit<R: RngCore + CryptoRng>(
    rng: &mut R,
    mpk: &MasterPublicKey,
    secrets: &[BigNumber],
) -> (Commitment, Open) {
    let tag = Scalar::random(&mut *rng);
    let randomness = Scalar::random(&mut *rng);
    let digest = digest_secrets(secrets);

    let tagged_base = mpk.h1 + mpk.g1 * tag;
    let point = mpk.g1 * digest + tagged_base * randomness;

    (
        Commitment { tag, point },
        Open {
            randomness,
            secrets: secrets.to_vec(),
        },
    )
}

/// Check an opening against a commitment.
pub fn check_commitment(
    mpk: &MasterPublicKey,
    commitment: &Commitment,
    open: &Open,
) -> Result<()> {
    let digest = digest_secrets(&open.secrets);

    let lhs = bls12_381::pairing(
        &G1Affine::from(mpk.g1 * open.randomness),
        &G2Affine::from(mpk.h2 + mpk.g2 * commitment.tag),
    );
    let rhs = bls12_381::pairing(
        &G1Affine::from(commitment.point - mpk.g1 * digest),
        &G2Affine::from(mpk.g2),
    );

    if lhs == rhs {
        Ok(())
    } else {
        Err(Error::ProofFailure)
    }
}

/// `H(secrets) mod q`: SHA-256 over the concatenated big-endian encodings,
/// wide-reduced into the scalar field.
fn digest_secrets(secrets: &[BigNumber]) -> Scalar {
    let mut hasher = Sha256::new();
    for secret in secrets {
        hasher.update(secret.to_bytes());
    }
    let digest = hasher.finalize();

    // from_bytes_wide takes 64 little-endian bytes.
    let mut wide = [0u8; 64];
    for (index, byte) in digest.iter().rev().enumerate() {
        wide[index] = *byte;
    }
    Scalar::from_bytes_wide(&wide)
}

mod scalar_bytes {
    use super::Scalar;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Scalar, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&value.to_bytes())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Scalar, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        let fixed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| de::Error::custom("scalar encoding must be 32 bytes"))?;
        Option::from(Scalar::from_bytes(&fixed))
            .ok_or_else(|| de::Error::custom("non-canonical scalar encoding"))
    }
}

mod g1_bytes {
    use super::{G1Affine, G1Projective};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &G1Projective,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&G1Affine::from(value).to_compressed())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<G1Projective, D::Error> {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        let fixed: [u8; 48] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| de::Error::custom("group encoding must be 48 bytes"))?;
        let point: Option<G1Affine> = Option::from(G1Affine::from_compressed(&fixed));
        point
            .map(G1Projective::from)
            .ok_or_else(|| de::Error::custom("bytes do not encode a curve point"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;

    #[test]
    fn commitments_open_correctly() {
        let mut rng = init_testing();
        let mpk = MasterPublicKey::generate(&mut rng);

        let secrets = [
            BigNumber::from(3_445_357u64),
            BigNumber::from(7u64),
            BigNumber::one() << 300,
        ];
        let (commitment, open) = commit(&mut rng, &mpk, &secrets);
        check_commitment(&mpk, &commitment, &open).unwrap();
        assert_eq!(open.secrets(), &secrets);
    }

    #[test]
    fn mutated_secrets_do_not_open() {
        let mut rng = init_testing();
        let mpk = MasterPublicKey::generate(&mut rng);

        let secrets = [BigNumber::from(11u64), BigNumber::from(22u64)];
        let (commitment, open) = commit(&mut rng, &mpk, &secrets);

        let mut forged = open.clone();
        forged.secrets[1] = BigNumber::from(23u64);
        assert_eq!(
            check_commitment(&mpk, &commitment, &forged).unwrap_err(),
            Error::ProofFailure
        );
    }

    #[test]
    fn reusing_an_opening_under_a_fresh_tag_fails() {
        let mut rng = init_testing();
        let mpk = MasterPublicKey::generate(&mut rng);

        let secrets = [BigNumber::from(5u64)];
        let (commitment, open) = commit(&mut rng, &mpk, &secrets);
        let (other_commitment, _) = commit(&mut rng, &mpk, &secrets);

        // Same secrets, but the tag binds the opening to the original.
        assert!(check_commitment(&mpk, &other_commitment, &open).is_err());
        check_commitment(&mpk, &commitment, &open).unwrap();
    }

    #[test]
    fn commitments_serialize() {
        let mut rng = init_testing();
        let mpk = MasterPublicKey::generate(&mut rng);
        let (commitment, open) = commit(&mut rng, &mpk, &[BigNumber::from(9u64)]);

        let bytes = bincode::serialize(&commitment).unwrap();
        let parsed: Commitment = bincode::deserialize(&bytes).unwrap();
        assert_eq!(parsed, commitment);

        let bytes = bincode::serialize(&open).unwrap();
        let parsed: Open = bincode::deserialize(&bytes).unwrap();
        assert_eq!(parsed, open);
    }
}
