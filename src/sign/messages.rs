// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Broadcast messages of the two signing variants.
//!
//! Messages carry no sender identity; parties agree on a canonical order
//! and present every round's bag of messages in that order, which is also
//! how round-1 commitments are matched to round-2 openings.

use crate::{
    commit::{Commitment, Open},
    curve::CurveTrait,
    l2fhe::threshold::PartialDecryptionL2,
    paillier::threshold::PartialDecryption,
    zkp::{nonce::NonceTripleProof, range::{MaskedNonceProof, ScaledEncryptionProof}},
};
use serde::{Deserialize, Serialize};

/// Four-round variant, round 1: commitment to `(R_i, u_i, v_i, w_i)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FheRound1Message {
    pub(crate) commitment: Commitment,
}

/// Four-round variant, round 2: the opening plus the composite proof
/// binding the opened values together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "C: CurveTrait", deserialize = "C: CurveTrait"))]
pub struct FheRound2Message<C> {
    pub(crate) open: Open,
    pub(crate) proof: NonceTripleProof<C>,
}

/// Four-round variant, round 3: the level-2 partial decryption of `z`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FheRound3Message {
    pub(crate) eta_share: PartialDecryptionL2,
}

/// Four-round variant, round 4: the level-2 partial decryption of `σ`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FheRound4Message {
    pub(crate) sigma_share: PartialDecryptionL2,
}

/// Six-round variant, round 1: commitment to `(u_i, v_i)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainRound1Message {
    pub(crate) commitment: Commitment,
}

/// Six-round variant, round 2: the opening plus the proof that `v_i` is the
/// encrypted signing key scaled by the plaintext of `u_i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainRound2Message {
    pub(crate) open: Open,
    pub(crate) proof: ScaledEncryptionProof,
}

/// Six-round variant, round 3: commitment to `(R_i, w_i)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainRound3Message {
    pub(crate) commitment: Commitment,
}

/// Six-round variant, round 4: the opening plus the proof tying the nonce
/// point to the masked encryption.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "C: CurveTrait", deserialize = "C: CurveTrait"))]
pub struct PlainRound4Message<C> {
    pub(crate) open: Open,
    pub(crate) proof: MaskedNonceProof<C>,
}

/// Six-round variant, round 5: the partial decryption of `w`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainRound5Message {
    pub(crate) mu_share: PartialDecryption,
}

/// Six-round variant, round 6: the partial decryption of `σ`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainRound6Message {
    pub(crate) sigma_share: PartialDecryption,
}
