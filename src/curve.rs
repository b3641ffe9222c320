//! Elliptic Curve abstraction
use crate::{errors::Result, k256::K256, p256::P256};
use libpaillier::unknown_order::BigNumber;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, ops::Add};
use zeroize::Zeroize;

/// Generic elliptic curve point.
///
/// The signing protocol is parameterised over this trait; any short
/// Weierstrass curve with a prime-order subgroup can be plugged in. The
/// reference instantiation is [`Secp256k1`].
pub trait CurveTrait:
    'static
    + Clone
    + Copy
    + Debug
    + Send
    + Sync
    + Eq
    + PartialEq
    + Serialize
    + DeserializeOwned
    + Add<Output = Self>
    + Zeroize
{
    /// A generator of the prime-order subgroup.
    const GENERATOR: Self;

    /// The identity point, used to initialize point aggregations.
    const IDENTITY: Self;

    /// The order `q` of the prime subgroup.
    fn order() -> BigNumber;

    /// Multiply `self` by a [`BigNumber`] scalar, which is first reduced mod
    /// `q`.
    fn multiply_by_bignum(&self, scalar: &BigNumber) -> Result<Self>;

    /// Multiply the generator by a [`BigNumber`] scalar.
    fn scale_generator(scalar: &BigNumber) -> Result<Self> {
        Self::GENERATOR.multiply_by_bignum(scalar)
    }

    /// The affine x-coordinate of the point as a nonnegative integer.
    ///
    /// Fails on the identity point, which has no affine representation.
    fn x_projection(&self) -> Result<BigNumber>;

    /// Serialize the point as a compressed affine-encoded byte array.
    fn to_bytes(&self) -> Vec<u8>;

    /// Deserialize a point from a compressed affine-encoded byte array.
    fn try_from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// The reference curve of the signing protocol.
pub type Secp256k1 = K256;

/// An alternative instantiation, exercising curve substitution.
pub type Secp256r1 = P256;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::testing::init_testing;
    use rand::Rng;

    #[test]
    fn generator_scaling_matches_repeated_addition() {
        let _rng = init_testing();
        let five = BigNumber::from(5u64);
        let lhs = K256::scale_generator(&five).unwrap();
        let g = K256::GENERATOR;
        let rhs = g + g + g + g + g;
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn x_projection_is_stable_across_encodings() {
        let mut rng = init_testing();
        let k = BigNumber::from(rng.gen::<u64>());
        let point = K256::scale_generator(&k).unwrap();
        let reconstructed = K256::try_from_bytes(&point.to_bytes()).unwrap();
        assert_eq!(
            point.x_projection().unwrap(),
            reconstructed.x_projection().unwrap()
        );
    }
}
