// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Non-interactive zero-knowledge proofs.
//!
//! Every proof is a sigma protocol made non-interactive with the Fiat–Shamir
//! transform: the challenge is SHA-256 over the big-endian encodings of the
//! public transcript, appended in the fixed order each proof documents.
//! Verification recomputes the challenge and checks the algebraic
//! identities; every sub-test runs to completion before the results are
//! combined, so a failing identity is not observable through timing.

use crate::{curve::CurveTrait, errors::Result};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

pub mod decryption;
pub mod encryption;
pub mod multiplication;
pub mod nonce;
pub mod range;
pub mod setup;

/// Common interface for proving and verifying.
pub trait Proof: Sized {
    /// Values both the prover and the verifier see.
    type CommonInput;
    /// Values only the prover knows.
    type ProverSecret;

    /// Produce a proof over the given input.
    fn prove<R: RngCore + CryptoRng>(
        rng: &mut R,
        input: &Self::CommonInput,
        secret: &Self::ProverSecret,
    ) -> Result<Self>;

    /// Check the proof; any failure, algebraic or arithmetic, reports
    /// [`crate::errors::Error::ProofFailure`].
    fn verify(&self, input: &Self::CommonInput) -> Result<()>;
}

/// A SHA-256 Fiat–Shamir transcript.
///
/// Values are hashed as their raw big-endian encodings, concatenated in
/// append order; the challenge is the digest read as a nonnegative integer.
pub(crate) struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    pub(crate) fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub(crate) fn append_bn(&mut self, value: &BigNumber) {
        self.hasher.update(value.to_bytes());
    }

    pub(crate) fn append_point<C: CurveTrait>(&mut self, point: &C) {
        self.hasher.update(point.to_bytes());
    }

    /// Consume the transcript and produce the challenge.
    pub(crate) fn challenge(self) -> BigNumber {
        BigNumber::from_slice(self.hasher.finalize())
    }
}

/// Fold a set of independently evaluated sub-tests into one verdict.
///
/// All tests are materialized before this is called; the conjunction itself
/// is data-independent.
pub(crate) fn all_checks_pass(checks: &[bool]) -> Result<()> {
    if checks.iter().all(|&ok| ok) {
        Ok(())
    } else {
        Err(crate::errors::Error::ProofFailure)
    }
}
