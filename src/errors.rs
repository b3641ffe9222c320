// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Error types produced by this crate.
//!
//! Every fallible operation returns one of the kinds below; arguments outside
//! their algebraic domain are rejected, never silently reduced.

use thiserror::Error;

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The set of errors this crate reports.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// An argument lies outside the algebraic set the operation requires,
    /// e.g. a plaintext at or above `n`, a ciphertext at or above `n²`, a
    /// randomizer sharing a factor with `n`, or bytes that do not decode to a
    /// point on the curve.
    #[error("argument outside its required domain: {0}")]
    DomainViolation(&'static str),

    /// A proof or share references a modulus or verification key that does
    /// not match the key currently held.
    #[error("key mismatch: {0}")]
    KeyMismatch(&'static str),

    /// Share recombination was attempted with fewer shares than the
    /// decryption threshold.
    #[error("combining requires at least {needed} shares, got {got}")]
    InsufficientShares {
        /// The threshold `w` of the key.
        needed: usize,
        /// How many shares the caller supplied.
        got: usize,
    },

    /// Two of the supplied partial decryptions came from the same server.
    #[error("duplicate share from server {0}")]
    DuplicateShare(u32),

    /// A zero-knowledge proof failed to verify. The caller decides whether
    /// this is a retry or an abort.
    #[error("proof verification failed")]
    ProofFailure,

    /// A length field in an encoding would exceed the index domain.
    #[error("encoding too large for a 4-byte length field")]
    EncodingOverflow,

    /// A length-prefixed slice extends past the end of the buffer, or a
    /// buffer held trailing bytes no field claimed.
    #[error("corrupt or truncated encoding")]
    CorruptEncoding,

    /// Accumulated signal that a signing party must yield no signature
    /// because an earlier check failed, or that rounds were driven out of
    /// sequence.
    #[error("protocol aborted: {0}")]
    ProtocolAbort(&'static str),
}
