// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The interactive threshold-ECDSA signing protocol.
//!
//! Two per-party state machines are provided: a four-round variant built on
//! the two-level homomorphic layer ([`FheSigner`]) and a six-round variant
//! on plain threshold Paillier ([`PlainSigner`]). Both are strictly
//! round-sequential: each round consumes the bag of previous-round messages
//! from the other parties, in a canonical party order that must stay stable
//! across rounds, and produces one message to broadcast.
//!
//! A party that sees a bad commitment or proof keeps participating so the
//! network shape is preserved, but records the failure; its terminal output
//! is then `None` instead of a signature.

use crate::{
    curve::CurveTrait,
    errors::{Error, Result},
};
use libpaillier::unknown_order::BigNumber;
use serde::{Deserialize, Serialize};

mod fhe;
mod messages;
mod paillier;

pub use fhe::FheSigner;
pub use messages::{
    FheRound1Message, FheRound2Message, FheRound3Message, FheRound4Message, PlainRound1Message,
    PlainRound2Message, PlainRound3Message, PlainRound4Message, PlainRound5Message,
    PlainRound6Message,
};
pub use paillier::PlainSigner;

/// An ECDSA signature `(r, s)`, both in `[1, q)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The x-projection of the aggregated nonce point, mod `q`.
    pub r: BigNumber,
    /// The proof scalar.
    pub s: BigNumber,
}

/// The truncated message digest `m'`.
///
/// The message bytes are read as a big-endian nonnegative integer; if its
/// bit length exceeds that of `q`, it is shifted right by the excess.
pub(crate) fn truncate_digest(q: &BigNumber, message: &[u8]) -> BigNumber {
    let value = BigNumber::from_slice(message);
    let message_bits = message.len() * 8;
    let q_bits = crate::utils::bit_length(q);
    if message_bits > q_bits {
        value / (BigNumber::one() << (message_bits - q_bits))
    } else {
        value
    }
}

/// Textbook ECDSA verification of `(r, s)` over `message` against a public
/// key point.
///
/// The message is digested exactly the way the signers digest it (truncated
/// big-endian interpretation), so this accepts precisely the signatures the
/// protocol produces for honest runs.
pub fn verify_signature<C: CurveTrait>(
    message: &[u8],
    signature: &Signature,
    public_key: &C,
) -> Result<()> {
    let q = C::order();
    let in_range = |value: &BigNumber| value >= &BigNumber::one() && value < &q;
    if !in_range(&signature.r) || !in_range(&signature.s) {
        return Err(Error::DomainViolation("signature scalar not in [1, q)"));
    }

    let s_inv = signature.s.invert(&q).ok_or(Error::ProofFailure)?;
    let m_prime = truncate_digest(&q, message);

    let u1 = m_prime.modmul(&s_inv, &q);
    let u2 = signature.r.modmul(&s_inv, &q);

    let point = C::scale_generator(&u1)? + public_key.multiply_by_bignum(&u2)?;
    let v = point
        .x_projection()
        .map_err(|_| Error::ProofFailure)?
        .nmod(&q);

    if v == signature.r {
        Ok(())
    } else {
        Err(Error::ProofFailure)
    }
}
