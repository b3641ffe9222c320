// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Threshold Paillier and threshold ECDSA.
//!
//! This crate implements the generalized Paillier cryptosystem with the
//! exponent parameter fixed at one, the threshold variant in which
//! decryption is split across `l` servers of which any `w` must cooperate,
//! a two-level somewhat-homomorphic layer supporting one multiplicative
//! level, and the interactive multi-round protocols that use these
//! primitives to produce ECDSA signatures without any party ever holding
//! the signing key.
//!
//! The main entry points:
//!
//! * [`paillier::DecryptionKey`]: the plain additively homomorphic scheme.
//! * [`paillier::threshold::KeyShare`]: dealer-generated threshold keys,
//!   partial decryption, and Lagrange recombination.
//! * [`l2fhe`]: level-1/level-2 ciphertexts with one homomorphic
//!   multiplication, plus their threshold decryption.
//! * [`sign::FheSigner`] / [`sign::PlainSigner`]: the four- and six-round
//!   per-party signing state machines over a pluggable curve
//!   ([`curve::Secp256k1`] is the reference instantiation).
//!
//! This library deliberately stops at the cryptography: transporting round
//! messages between parties, ordering them canonically, and persisting key
//! material are the caller's responsibility.

#![warn(missing_docs)]

pub mod commit;
pub mod curve;
pub mod errors;
pub mod l2fhe;
pub mod paillier;
pub mod sign;
pub mod zkp;

mod encoding;
mod gmp_zeroize;
mod k256;
mod p256;
mod utils;

pub use crate::{
    curve::CurveTrait,
    errors::{Error, Result},
    gmp_zeroize::enable_zeroize,
    k256::K256,
    p256::P256,
    sign::{FheSigner, PlainSigner, Signature},
};
