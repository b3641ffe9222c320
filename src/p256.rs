//! P256 functions

use crate::{
    curve::CurveTrait,
    errors::{Error, Result},
};
use libpaillier::unknown_order::BigNumber;
use p256::{
    elliptic_curve::{bigint::Encoding, group::GroupEncoding, point::AffineCoordinates, Curve},
    AffinePoint, ProjectivePoint,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::error;
use zeroize::{Zeroize, Zeroizing};

/// Wrapper around p256::ProjectivePoint so that we can define our own
/// serialization/deserialization for it
#[derive(Eq, PartialEq, Debug, Clone, Copy, Zeroize)]
pub struct P256(pub(crate) p256::ProjectivePoint);

impl P256 {
    pub(crate) fn multiply_by_scalar(&self, scalar: &p256::Scalar) -> Self {
        Self(self.0 * scalar)
    }

    pub(crate) fn bn_to_scalar(x: &BigNumber) -> Result<p256::Scalar> {
        let x_modded = x % Self::order();
        let bytes = Zeroizing::new(x_modded.to_bytes());

        let mut padded = Zeroizing::new(vec![0u8; 32 - bytes.len()]);
        padded.extend_from_slice(&bytes);

        let mut scalar: p256::Scalar = Option::from(
            <p256::Scalar as p256::elliptic_curve::PrimeField>::from_repr(
                p256::FieldBytes::clone_from_slice(&padded),
            ),
        )
        .ok_or_else(|| {
            error!("Failed to convert BigNumber into p256::Scalar");
            Error::DomainViolation("integer does not reduce to a curve scalar")
        })?;

        if x < &BigNumber::zero() {
            scalar = -scalar;
        }
        Ok(scalar)
    }
}

impl std::ops::Add for P256 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Serialize for P256 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let afp = AffinePoint::from(self.0);
        afp.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for P256 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let p = AffinePoint::deserialize(deserializer)?;
        Ok(Self(p.into()))
    }
}

pub(crate) fn p256_order() -> BigNumber {
    let order_bytes: [u8; 32] = p256::NistP256::ORDER.to_be_bytes();
    BigNumber::from_slice(order_bytes)
}

impl CurveTrait for P256 {
    const GENERATOR: Self = P256(p256::ProjectivePoint::GENERATOR);
    const IDENTITY: Self = P256(p256::ProjectivePoint::IDENTITY);

    fn order() -> BigNumber {
        p256_order()
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
        let mut encoded = AffinePoint::from(self.0).to_bytes();
        let bytes = encoded.to_vec();
        encoded.zeroize();
        bytes
    }

    fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut fixed_len_bytes: [u8; 33] = bytes.try_into().map_err(|_| {
            error!("Failed to decode bytes as a secp256r1 point");
            Error::DomainViolation("not a compressed secp256r1 point encoding")
        })?;

        let point: Option<AffinePoint> =
            AffinePoint::from_bytes(&fixed_len_bytes.into()).into();
        fixed_len_bytes.zeroize();

        match point {
            Some(point) => Ok(Self(point.into())),
            None => {
                error!("Failed to decode bytes as a secp256r1 point");
                Err(Error::DomainViolation(
                    "bytes do not lie on the secp256r1 curve",
                ))
            }
        }
    }
}
