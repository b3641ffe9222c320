// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The four-round signing state machine over the two-level homomorphic
//! layer.
//!
//! Round 1 samples `(ρ_i, k_i, c_i)`, encrypts them at level 1, and
//! broadcasts a non-malleable commitment to the whole tuple. Round 2 opens
//! the commitment with a single composite proof. Round 3 checks every
//! peer's opening and proof, aggregates, and partially decrypts
//! `z = q·w ⊕ u·v`. Round 4 recombines `η = Dec(z)`, forms
//! `σ = (η⁻¹·u) · (Enc₁(m') ⊕ r·Enc₁(x))`, and partially decrypts it; the
//! terminal step recombines `s = Dec(σ) mod q`.

use crate::{
    commit::{check_commitment, commit, MasterPublicKey, Open},
    curve::CurveTrait,
    errors::{Error, Result},
    l2fhe::{
        threshold::{combine_l2, PartialDecryptionL2},
        CiphertextL1,
    },
    paillier::threshold::KeyShare,
    sign::{
        messages::{FheRound1Message, FheRound2Message, FheRound3Message, FheRound4Message},
        truncate_digest, Signature,
    },
    utils::random_positive_bn,
    zkp::{
        nonce::{NonceTripleInput, NonceTripleProof, NonceTripleSecret},
        setup::PublicParameters,
        Proof,
    },
};
use libpaillier::unknown_order::BigNumber;
use rand::{CryptoRng, RngCore};
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Round {
    New,
    One,
    Two,
    Three,
    Four,
}

/// Per-party, per-message signer for the four-round variant.
pub struct FheSigner<C: CurveTrait> {
    params: PublicParameters,
    mpk: MasterPublicKey,
    share: KeyShare,
    encrypted_signing_key: CiphertextL1,
    message: Vec<u8>,

    round: Round,
    abort: Option<&'static str>,

    // Round-1 samples.
    rho: Option<BigNumber>,
    k: Option<BigNumber>,
    mask: Option<BigNumber>,
    rho_randomizer: Option<BigNumber>,
    k_randomizer: Option<BigNumber>,
    mask_randomizer: Option<BigNumber>,
    nonce_point: Option<C>,
    my_rho_encryption: Option<CiphertextL1>,
    my_k_encryption: Option<CiphertextL1>,
    my_mask_encryption: Option<CiphertextL1>,
    my_open: Option<Open>,

    round1_messages: Vec<FheRound1Message>,

    // Aggregates.
    r: Option<BigNumber>,
    combined_rho: Option<CiphertextL1>,
    eta_share: Option<PartialDecryptionL2>,
    sigma_share: Option<PartialDecryptionL2>,
}

impl<C: CurveTrait> FheSigner<C> {
    /// Set up a signer for one signature attempt.
    ///
    /// `encrypted_signing_key` is the level-1 encryption of the shared DSA
    /// key under the threshold Paillier key that `share` belongs to.
    pub fn new(
        params: &PublicParameters,
        mpk: &MasterPublicKey,
        share: KeyShare,
        encrypted_signing_key: &CiphertextL1,
        message: &[u8],
    ) -> Result<Self> {
        if params.encryption_key() != share.encryption_key() {
            return Err(Error::KeyMismatch(
                "public parameters and key share disagree on the Paillier key",
            ));
        }
        Ok(Self {
            params: params.clone(),
            mpk: mpk.clone(),
            share,
            encrypted_signing_key: encrypted_signing_key.clone(),
            message: message.to_vec(),
            round: Round::New,
            abort: None,
            rho: None,
            k: None,
            mask: None,
            rho_randomizer: None,
            k_randomizer: None,
            mask_randomizer: None,
            nonce_point: None,
            my_rho_encryption: None,
            my_k_encryption: None,
            my_mask_encryption: None,
            my_open: None,
            round1_messages: Vec::new(),
            r: None,
            combined_rho: None,
            eta_share: None,
            sigma_share: None,
        })
    }

    /// Whether some earlier check failed; an aborted signer keeps producing
    /// messages but yields no signature.
    pub fn is_aborted(&self) -> bool {
        self.abort.is_some()
    }

    /// Treat missing or timed-out peers as having produced invalid proofs.
    pub fn mark_aborted(&mut self, reason: &'static str) {
        if self.abort.is_none() {
            error!("Signing aborted: {reason}");
            self.abort = Some(reason);
        }
    }

    /// Round 1: sample, encrypt, and commit.
    pub fn round_one<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<FheRound1Message> {
        self.expect_round(Round::New)?;
        let pk = self.share.encryption_key().clone();
        let q = C::order();
        let q6 = &q * &q * &q * &q * &q * &q;

        let rho = random_positive_bn(rng, &q);
        let k = random_positive_bn(rng, &q);
        let mask = random_positive_bn(rng, &q6);
        let nonce_point = C::scale_generator(&k)?;

        let rho_randomizer = pk.random_randomizer(rng)?;
        let k_randomizer = pk.random_randomizer(rng)?;
        let mask_randomizer = pk.random_randomizer(rng)?;

        let rho_encryption =
            CiphertextL1::encrypt_with_randomizer(&pk, rng, &rho, &rho_randomizer)?;
        let k_encryption = CiphertextL1::encrypt_with_randomizer(&pk, rng, &k, &k_randomizer)?;
        let mask_encryption =
            CiphertextL1::encrypt_with_randomizer(&pk, rng, &mask, &mask_randomizer)?;

        let secrets = commitment_secrets(
            &nonce_point,
            &rho_encryption,
            &k_encryption,
            &mask_encryption,
        );
        let (commitment, open) = commit(rng, &self.mpk, &secrets);

        self.rho = Some(rho);
        self.k = Some(k);
        self.mask = Some(mask);
        self.rho_randomizer = Some(rho_randomizer);
        self.k_randomizer = Some(k_randomizer);
        self.mask_randomizer = Some(mask_randomizer);
        self.nonce_point = Some(nonce_point);
        self.my_rho_encryption = Some(rho_encryption);
        self.my_k_encryption = Some(k_encryption);
        self.my_mask_encryption = Some(mask_encryption);
        self.my_open = Some(open);
        self.round = Round::One;

        debug!("Round 1 complete, broadcasting commitment");
        Ok(FheRound1Message { commitment })
    }

    /// Round 2: save the peer commitments, open ours with the composite
    /// proof.
    pub fn round_two<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        peer_commitments: &[FheRound1Message],
    ) -> Result<FheRound2Message<C>> {
        self.expect_round(Round::One)?;
        self.round1_messages = peer_commitments.to_vec();

        let input = NonceTripleInput::new(
            &self.params,
            self.nonce_point.as_ref().expect("set in round 1"),
            self.my_k_encryption.as_ref().expect("set in round 1"),
            self.my_rho_encryption.as_ref().expect("set in round 1"),
            self.my_mask_encryption.as_ref().expect("set in round 1"),
        );
        let secret = NonceTripleSecret::new(
            self.k.as_ref().expect("set in round 1"),
            self.rho.as_ref().expect("set in round 1"),
            self.mask.as_ref().expect("set in round 1"),
            self.k_randomizer.as_ref().expect("set in round 1"),
            self.rho_randomizer.as_ref().expect("set in round 1"),
            self.mask_randomizer.as_ref().expect("set in round 1"),
        );
        let proof = NonceTripleProof::prove(rng, &input, &secret)?;

        self.round = Round::Two;
        debug!("Round 2 complete, broadcasting opening and proof");
        Ok(FheRound2Message {
            open: self.my_open.clone().expect("set in round 1"),
            proof,
        })
    }

    /// Round 3: check every peer's opening and proof, aggregate, and
    /// partially decrypt `z = q·w ⊕ u·v`.
    ///
    /// Openings must arrive in the same party order as the round-1
    /// commitments; a reordering reads as a commitment failure and aborts.
    pub fn round_three(
        &mut self,
        peer_openings: &[FheRound2Message<C>],
    ) -> Result<FheRound3Message> {
        self.expect_round(Round::Two)?;
        if peer_openings.len() != self.round1_messages.len() {
            return Err(Error::ProtocolAbort(
                "round 3 expects one opening per round-1 commitment",
            ));
        }
        let pk = self.share.encryption_key().clone();
        let q = C::order();

        let mut nonce_sum = self.nonce_point.expect("set in round 1");
        let mut u = self.my_rho_encryption.clone().expect("set in round 1");
        let mut v = self.my_k_encryption.clone().expect("set in round 1");
        let mut w = self.my_mask_encryption.clone().expect("set in round 1");

        for (commitment, opening) in self.round1_messages.iter().zip(peer_openings) {
            // An opening that does not even parse cannot be aggregated; this
            // is the one failure that skips a peer instead of crashing.
            let Ok((peer_point, peer_rho, peer_k, peer_mask)) =
                parse_commitment_secrets::<C>(&pk, opening.open.secrets())
            else {
                error!("A peer's opening was malformed; aborting this attempt");
                self.abort.get_or_insert("malformed opening");
                continue;
            };

            // Failed checks mark the attempt aborted but do not gate the
            // aggregation; every round still runs to completion.
            if check_commitment(&self.mpk, &commitment.commitment, &opening.open).is_err() {
                error!("A peer's commitment did not open; aborting this attempt");
                self.abort.get_or_insert("commitment check failed");
            }

            let input =
                NonceTripleInput::new(&self.params, &peer_point, &peer_k, &peer_rho, &peer_mask);
            if opening.proof.verify(&input).is_err() {
                error!("A peer's consistency proof failed; aborting this attempt");
                self.abort.get_or_insert("consistency proof failed");
            }

            nonce_sum = nonce_sum + peer_point;
            u = u.add(&pk, &peer_rho)?;
            v = v.add(&pk, &peer_k)?;
            w = w.add(&pk, &peer_mask)?;
        }

        let r = match nonce_sum.x_projection() {
            Ok(x) => x.nmod(&q),
            Err(_) => {
                self.abort.get_or_insert("aggregated nonce is the identity");
                BigNumber::one()
            }
        };

        let scaled_mask = w.scalar_mul(&pk, &q)?;
        let z = v.mul(&pk, &u)?.add_l1(&pk, &scaled_mask)?;
        let eta_share = z.partial_decrypt(&self.share)?;

        self.r = Some(r);
        self.combined_rho = Some(u);
        self.eta_share = Some(eta_share.clone());
        self.round = Round::Three;

        debug!("Round 3 complete, broadcasting η share");
        Ok(FheRound3Message { eta_share })
    }

    /// Round 4: recombine `η`, build `σ`, and partially decrypt it.
    pub fn round_four(&mut self, peer_eta_shares: &[FheRound3Message]) -> Result<FheRound4Message> {
        self.expect_round(Round::Three)?;
        let pk = self.share.encryption_key().clone();
        let key = self.share.threshold_key().clone();
        let q = C::order();

        let mut shares = vec![self.eta_share.clone().expect("set in round 3")];
        shares.extend(peer_eta_shares.iter().map(|m| m.eta_share.clone()));

        // η⁻¹ mod q; an uninvertible η means some share was corrupt, and the
        // placeholder keeps the message flowing for the remaining rounds.
        // Structural failures (duplicate or missing ids) stay fatal.
        let eta = combine_l2(&key, &shares)?;
        let psi = eta.nmod(&q).invert(&q).unwrap_or_else(|| {
            self.abort.get_or_insert("η is not invertible modulo the curve order");
            BigNumber::one()
        });

        let u = self.combined_rho.clone().expect("set in round 3");
        let r = self.r.clone().expect("set in round 3");
        let scaled_u = u.scalar_mul(&pk, &psi)?;

        let m_prime = truncate_digest(&q, &self.message);
        let digest_encryption = CiphertextL1::encrypt_public(&pk, &m_prime)?;
        let keyed = self.encrypted_signing_key.scalar_mul(&pk, &r)?;
        let sigma = scaled_u.mul(&pk, &digest_encryption.add(&pk, &keyed)?)?;

        let sigma_share = sigma.partial_decrypt(&self.share)?;
        self.sigma_share = Some(sigma_share.clone());
        self.round = Round::Four;

        debug!("Round 4 complete, broadcasting σ share");
        Ok(FheRound4Message { sigma_share })
    }

    /// Recombine the σ shares into the signature, unless this party
    /// aborted.
    pub fn into_signature(self, peer_sigma_shares: &[FheRound4Message]) -> Result<Option<Signature>> {
        if self.round != Round::Four {
            return Err(Error::ProtocolAbort("terminal step called out of sequence"));
        }
        let key = self.share.threshold_key().clone();
        let q = C::order();

        let mut shares = vec![self.sigma_share.clone().expect("set in round 4")];
        shares.extend(peer_sigma_shares.iter().map(|m| m.sigma_share.clone()));

        let s = combine_l2(&key, &shares)?.nmod(&q);

        if self.abort.is_some() {
            return Ok(None);
        }
        Ok(Some(Signature {
            r: self.r.expect("set in round 3"),
            s,
        }))
    }

    fn expect_round(&self, expected: Round) -> Result<()> {
        if self.round == expected {
            Ok(())
        } else {
            Err(Error::ProtocolAbort("round driven out of sequence"))
        }
    }
}

/// The committed tuple, in opening order:
/// `(R, u.a, u.β, v.a, v.β, w.a, w.β)`.
fn commitment_secrets<C: CurveTrait>(
    nonce_point: &C,
    rho_encryption: &CiphertextL1,
    k_encryption: &CiphertextL1,
    mask_encryption: &CiphertextL1,
) -> Vec<BigNumber> {
    let mut secrets = vec![BigNumber::from_slice(nonce_point.to_bytes())];
    for encryption in [rho_encryption, k_encryption, mask_encryption] {
        secrets.push(encryption.mask().clone());
        secrets.push(encryption.body().raw().clone());
    }
    secrets
}

#[allow(clippy::type_complexity)]
fn parse_commitment_secrets<C: CurveTrait>(
    pk: &crate::paillier::EncryptionKey,
    secrets: &[BigNumber],
) -> Result<(C, CiphertextL1, CiphertextL1, CiphertextL1)> {
    if secrets.len() != 7 {
        return Err(Error::CorruptEncoding);
    }
    let point = C::try_from_bytes(&secrets[0].to_bytes())?;
    let mut encryptions = Vec::with_capacity(3);
    for chunk in secrets[1..].chunks_exact(2) {
        let mask = chunk[0].clone();
        let body = crate::paillier::Ciphertext(chunk[1].clone());
        if !pk.is_plaintext(&mask) || !pk.is_ciphertext(&body) {
            return Err(Error::DomainViolation(
                "opened encryption component out of range",
            ));
        }
        encryptions.push(CiphertextL1::from_parts(mask, body));
    }
    let mask_encryption = encryptions.pop().expect("three parsed");
    let k_encryption = encryptions.pop().expect("three parsed");
    let rho_encryption = encryptions.pop().expect("three parsed");
    Ok((point, rho_encryption, k_encryption, mask_encryption))
}
