//! K256 functions

use crate::{
    curve::CurveTrait,
    errors::{Error, Result},
};
use k256::{
    elliptic_curve::{
        bigint::Encoding, group::GroupEncoding, point::AffineCoordinates, AffinePoint, Curve,
    },
    ProjectivePoint,
};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::error;
use zeroize::{Zeroize, Zeroizing};

/// Wrapper around k256::ProjectivePoint so that we can define our own
/// serialization/deserialization for it
///
/// Note that this type derives [`Debug`]; if a [`K256`] is used in a
/// private type, `Debug` should be manually implemented with the field of this
/// type explicitly redacted!
#[derive(Eq, PartialEq, Debug, Clone, Copy, Zeroize)]
pub struct K256(pub(crate) k256::ProjectivePoint);

impl K256 {
    pub(crate) fn multiply_by_scalar(&self, scalar: &k256::Scalar) -> Self {
        Self(self.0 * scalar)
    }

    /// Convert a [`BigNumber`] to a scalar, reduced mod `q`. Negative inputs
    /// map to the negated scalar of their absolute value.
    pub(crate) fn bn_to_scalar(x: &BigNumber) -> Result<k256::Scalar> {
        let x_modded = x % Self::order();
        let bytes = Zeroizing::new(x_modded.to_bytes());

        let mut padded = Zeroizing::new(vec![0u8; 32 - bytes.len()]);
        padded.extend_from_slice(&bytes);

        let mut scalar: k256::Scalar = Option::from(
            <k256::Scalar as k256::elliptic_curve::PrimeField>::from_repr(
                k256::FieldBytes::clone_from_slice(&padded),
            ),
        )
        .ok_or_else(|| {
            error!("Failed to convert BigNumber into k256::Scalar");
            Error::DomainViolation("integer does not reduce to a curve scalar")
        })?;

        if x < &BigNumber::zero() {
            scalar = -scalar;
        }
        Ok(scalar)
    }
}

impl std::ops::Add for K256 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Serialize for K256 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let afp = AffinePoint::<k256::Secp256k1>::from(self.0);
        afp.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for K256 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p = AffinePoint::<k256::Secp256k1>::deserialize(deserializer)?;
        Ok(Self(p.into()))
    }
}

pub(crate) fn k256_order() -> BigNumber {
    // Set order = q
    let order_bytes: [u8; 32] = k256::Secp256k1::ORDER.to_be_bytes();
    BigNumber::from_slice(order_bytes)
}

impl CurveTrait for K256 {
    const GENERATOR: Self = K256(k256::ProjectivePoint::GENERATOR);
    const IDENTITY: Self = K256(k256::ProjectivePoint::IDENTITY);

    fn order() -> BigNumber {
        k256_order()
    }

    fn multiply_by_bignum(&self, scalar: &BigNumber) -> Result<Self> {
        let s = Zeroizing::new(Self::bn_to_scalar(scalar)?);
        Ok(self.multiply_by_scalar(&s))
    }

    fn x_projection(&self) -> Result<BigNumber> {
        if self.0 == ProjectivePoint::IDENTITY {
            error!("Attempted to take the x-projection of the identity point");
            return Err(Error::DomainViolation(
                "the identity point has no affine x-coordinate",
            ));
        }
        Ok(BigNumber::from_slice(self.0.to_affine().x()))
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut encoded = AffinePoint::<k256::Secp256k1>::from(self.0).to_bytes();
        let bytes = encoded.to_vec();
        encoded.zeroize();
        bytes
    }

    fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut fixed_len_bytes: [u8; 33] = bytes.try_into().map_err(|_| {
            error!("Failed to decode bytes as a secp256k1 point");
            Error::DomainViolation("not a compressed secp256k1 point encoding")
        })?;

        let point: Option<AffinePoint<k256::Secp256k1>> =
            AffinePoint::<k256::Secp256k1>::from_bytes(&fixed_len_bytes.into()).into();
        fixed_len_bytes.zeroize();

        match point {
            Some(point) => Ok(Self(point.into())),
            None => {
                error!("Failed to decode bytes as a secp256k1 point");
                Err(Error::DomainViolation(
                    "bytes do not lie on the secp256k1 curve",
                ))
            }
        }
    }
}

#[cfg(test)]
mod curve_point_tests {
    use crate::{curve::CurveTrait, k256::K256, utils::testing::init_testing};
    use k256::elliptic_curve::Group;

    #[test]
    fn curve_point_byte_conversion_works() {
        let rng = &mut init_testing();
        let point = K256(k256::ProjectivePoint::random(rng));
        let bytes = point.to_bytes();
        let reconstructed = K256::try_from_bytes(&bytes).unwrap();
        assert_eq!(point, reconstructed);
    }

    #[test]
    fn identity_has_no_x_projection() {
        let _rng = init_testing();
        assert!(K256::IDENTITY.x_projection().is_err());
    }
}
