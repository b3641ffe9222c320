// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The six-round signing state machine over plain threshold Paillier.
//!
//! The flow mirrors the four-round variant but separates the two sampling
//! phases into their own commit/open pairs (rounds 1–2 for the blinding
//! shares, rounds 3–4 for the nonces) and performs two rounds of threshold
//! decryption: first to recover `µ = ρ·k + q·c`, then to recover `s`.

use crate::{
    commit::{check_commitment, commit, MasterPublicKey, Open},
    curve::CurveTrait,
    errors::{Error, Result},
    paillier::{threshold::KeyShare, threshold::PartialDecryption, Ciphertext, EncryptionKey},
    sign::{
        messages::{
            PlainRound1Message, PlainRound2Message, PlainRound3Message, PlainRound4Message,
            PlainRound5Message, PlainRound6Message,
        },
        truncate_digest, Signature,
    },
    utils::random_positive_bn,
    zkp::{
        range::{
            MaskedNonceInput, MaskedNonceProof, MaskedNonceSecret, ScaledEncryptionInput,
            ScaledEncryptionProof, ScaledEncryptionSecret,
        },
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
    Five,
    Six,
}

/// Per-party, per-message signer for the six-round variant.
pub struct PlainSigner<C: CurveTrait> {
    params: PublicParameters,
    mpk: MasterPublicKey,
    share: KeyShare,
    encrypted_signing_key: Ciphertext,
    message: Vec<u8>,

    round: Round,
    abort: Option<&'static str>,

    // Rounds 1–2: blinding share state.
    rho: Option<BigNumber>,
    rho_randomizer: Option<BigNumber>,
    my_blinding: Option<Ciphertext>,
    my_keyed_blinding: Option<Ciphertext>,
    my_first_open: Option<Open>,
    round1_messages: Vec<PlainRound1Message>,

    // Rounds 3–4: nonce state.
    k: Option<BigNumber>,
    mask: Option<BigNumber>,
    mask_randomizer: Option<BigNumber>,
    nonce_point: Option<C>,
    my_masked_nonce: Option<Ciphertext>,
    my_second_open: Option<Open>,
    round3_messages: Vec<PlainRound3Message>,

    // Aggregates.
    combined_blinding: Option<Ciphertext>,
    combined_keyed_blinding: Option<Ciphertext>,
    r: Option<BigNumber>,
    mu_share: Option<PartialDecryption>,
    sigma_share: Option<PartialDecryption>,
}

impl<C: CurveTrait> PlainSigner<C> {
    /// Set up a signer for one signature attempt.
    ///
    /// `encrypted_signing_key` is the plain Paillier encryption of the
    /// shared DSA key under the threshold key that `share` belongs to.
    pub fn new(
        params: &PublicParameters,
        mpk: &MasterPublicKey,
        share: KeyShare,
        encrypted_signing_key: &Ciphertext,
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
            rho_randomizer: None,
            my_blinding: None,
            my_keyed_blinding: None,
            my_first_open: None,
            round1_messages: Vec::new(),
            k: None,
            mask: None,
            mask_randomizer: None,
            nonce_point: None,
            my_masked_nonce: None,
            my_second_open: None,
            round3_messages: Vec::new(),
            combined_blinding: None,
            combined_keyed_blinding: None,
            r: None,
            mu_share: None,
            sigma_share: None,
        })
    }

    /// Whether some earlier check failed.
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

    /// Round 1: sample the blinding share `ρ_i`, encrypt it, scale the
    /// encrypted signing key by it, and commit to both.
    pub fn round_one<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<PlainRound1Message> {
        self.expect_round(Round::New)?;
        let pk = self.share.encryption_key().clone();
        let q = C::order();

        let rho = random_positive_bn(rng, &q);
        let rho_randomizer = pk.random_randomizer(rng)?;
        let blinding = pk.encrypt(&rho, &rho_randomizer)?;
        let keyed_blinding = pk.multiply(&self.encrypted_signing_key, &rho)?;

        let secrets = vec![blinding.raw().clone(), keyed_blinding.raw().clone()];
        let (commitment, open) = commit(rng, &self.mpk, &secrets);

        self.rho = Some(rho);
        self.rho_randomizer = Some(rho_randomizer);
        self.my_blinding = Some(blinding);
        self.my_keyed_blinding = Some(keyed_blinding);
        self.my_first_open = Some(open);
        self.round = Round::One;

        debug!("Round 1 complete, broadcasting blinding commitment");
        Ok(PlainRound1Message { commitment })
    }

    /// Round 2: save the peer commitments, open ours with the scaling
    /// proof.
    pub fn round_two<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        peer_commitments: &[PlainRound1Message],
    ) -> Result<PlainRound2Message> {
        self.expect_round(Round::One)?;
        self.round1_messages = peer_commitments.to_vec();

        let input = ScaledEncryptionInput::new(
            &self.params,
            self.my_keyed_blinding.as_ref().expect("set in round 1"),
            &self.encrypted_signing_key,
            self.my_blinding.as_ref().expect("set in round 1"),
            &C::order(),
        );
        let secret = ScaledEncryptionSecret::new(
            self.rho.as_ref().expect("set in round 1"),
            self.rho_randomizer.as_ref().expect("set in round 1"),
        );
        let proof = ScaledEncryptionProof::prove(rng, &input, &secret)?;

        self.round = Round::Two;
        debug!("Round 2 complete, broadcasting blinding opening and proof");
        Ok(PlainRound2Message {
            open: self.my_first_open.clone().expect("set in round 1"),
            proof,
        })
    }

    /// Round 3: check peer openings and proofs, aggregate `u` and `v`, then
    /// sample the nonce and commit to `(R_i, w_i)`.
    pub fn round_three<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        peer_openings: &[PlainRound2Message],
    ) -> Result<PlainRound3Message> {
        self.expect_round(Round::Two)?;
        if peer_openings.len() != self.round1_messages.len() {
            return Err(Error::ProtocolAbort(
                "round 3 expects one opening per round-1 commitment",
            ));
        }
        let pk = self.share.encryption_key().clone();
        let q = C::order();

        let mut u = self.my_blinding.clone().expect("set in round 1");
        let mut v = self.my_keyed_blinding.clone().expect("set in round 1");

        for (commitment, opening) in self.round1_messages.iter().zip(peer_openings) {
            // An opening that does not even parse cannot be aggregated; this
            // is the one failure that skips a peer instead of crashing.
            let Ok((peer_blinding, peer_keyed)) = parse_pair(&pk, opening.open.secrets()) else {
                error!("A peer's blinding opening was malformed; aborting this attempt");
                self.abort.get_or_insert("malformed opening");
                continue;
            };

            // Failed checks mark the attempt aborted but do not gate the
            // aggregation; every round still runs to completion.
            if check_commitment(&self.mpk, &commitment.commitment, &opening.open).is_err() {
                error!("A peer's blinding commitment did not open; aborting this attempt");
                self.abort.get_or_insert("commitment check failed");
            }

            let input = ScaledEncryptionInput::new(
                &self.params,
                &peer_keyed,
                &self.encrypted_signing_key,
                &peer_blinding,
                &q,
            );
            if opening.proof.verify(&input).is_err() {
                error!("A peer's scaling proof failed; aborting this attempt");
                self.abort.get_or_insert("scaling proof failed");
            }

            u = pk.add(&u, &peer_blinding)?;
            v = pk.add(&v, &peer_keyed)?;
        }

        // Nonce phase.
        let k = random_positive_bn(rng, &q);
        let nonce_point = C::scale_generator(&k)?;
        let q6 = &q * &q * &q * &q * &q * &q;
        let mask = random_positive_bn(rng, &q6);
        let mask_randomizer = pk.random_randomizer(rng)?;

        let masked_term = pk.encrypt(&(&q * &mask).nmod(pk.modulus()), &mask_randomizer)?;
        let masked_nonce = pk.add(&pk.multiply(&u, &k)?, &masked_term)?;

        let secrets = vec![
            BigNumber::from_slice(nonce_point.to_bytes()),
            masked_nonce.raw().clone(),
        ];
        let (commitment, open) = commit(rng, &self.mpk, &secrets);

        self.combined_blinding = Some(u);
        self.combined_keyed_blinding = Some(v);
        self.k = Some(k);
        self.mask = Some(mask);
        self.mask_randomizer = Some(mask_randomizer);
        self.nonce_point = Some(nonce_point);
        self.my_masked_nonce = Some(masked_nonce);
        self.my_second_open = Some(open);
        self.round = Round::Three;

        debug!("Round 3 complete, broadcasting nonce commitment");
        Ok(PlainRound3Message { commitment })
    }

    /// Round 4: save the peer nonce commitments, open ours with the masked
    /// nonce proof.
    pub fn round_four<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
        peer_commitments: &[PlainRound3Message],
    ) -> Result<PlainRound4Message<C>> {
        self.expect_round(Round::Three)?;
        self.round3_messages = peer_commitments.to_vec();

        let input = MaskedNonceInput::new(
            &self.params,
            self.nonce_point.as_ref().expect("set in round 3"),
            self.combined_blinding.as_ref().expect("set in round 3"),
            self.my_masked_nonce.as_ref().expect("set in round 3"),
        );
        let secret = MaskedNonceSecret::new(
            self.k.as_ref().expect("set in round 3"),
            self.mask.as_ref().expect("set in round 3"),
            self.mask_randomizer.as_ref().expect("set in round 3"),
        );
        let proof = MaskedNonceProof::prove(rng, &input, &secret)?;

        self.round = Round::Four;
        debug!("Round 4 complete, broadcasting nonce opening and proof");
        Ok(PlainRound4Message {
            open: self.my_second_open.clone().expect("set in round 3"),
            proof,
        })
    }

    /// Round 5: check peer openings and proofs, aggregate `R` and `w`, and
    /// partially decrypt `w`.
    pub fn round_five(
        &mut self,
        peer_openings: &[PlainRound4Message<C>],
    ) -> Result<PlainRound5Message> {
        self.expect_round(Round::Four)?;
        if peer_openings.len() != self.round3_messages.len() {
            return Err(Error::ProtocolAbort(
                "round 5 expects one opening per round-3 commitment",
            ));
        }
        let pk = self.share.encryption_key().clone();
        let q = C::order();
        let u = self.combined_blinding.clone().expect("set in round 3");

        let mut nonce_sum = self.nonce_point.expect("set in round 3");
        let mut w = self.my_masked_nonce.clone().expect("set in round 3");

        for (commitment, opening) in self.round3_messages.iter().zip(peer_openings) {
            // An opening that does not even parse cannot be aggregated; this
            // is the one failure that skips a peer instead of crashing.
            let Ok((peer_point, peer_masked)) =
                parse_point_pair::<C>(&pk, opening.open.secrets())
            else {
                error!("A peer's nonce opening was malformed; aborting this attempt");
                self.abort.get_or_insert("malformed opening");
                continue;
            };

            // Failed checks mark the attempt aborted but do not gate the
            // aggregation; every round still runs to completion.
            if check_commitment(&self.mpk, &commitment.commitment, &opening.open).is_err() {
                error!("A peer's nonce commitment did not open; aborting this attempt");
                self.abort.get_or_insert("commitment check failed");
            }

            let input = MaskedNonceInput::new(&self.params, &peer_point, &u, &peer_masked);
            if opening.proof.verify(&input).is_err() {
                error!("A peer's masked nonce proof failed; aborting this attempt");
                self.abort.get_or_insert("masked nonce proof failed");
            }

            nonce_sum = nonce_sum + peer_point;
            w = pk.add(&w, &peer_masked)?;
        }

        let r = match nonce_sum.x_projection() {
            Ok(x) => x.nmod(&q),
            Err(_) => {
                self.abort.get_or_insert("aggregated nonce is the identity");
                BigNumber::one()
            }
        };

        let mu_share = self.share.partial_decrypt(&w)?;

        self.r = Some(r);
        self.mu_share = Some(mu_share.clone());
        self.round = Round::Five;

        debug!("Round 5 complete, broadcasting µ share");
        Ok(PlainRound5Message { mu_share })
    }

    /// Round 6: recombine `µ`, build `σ`, and partially decrypt it.
    pub fn round_six(&mut self, peer_mu_shares: &[PlainRound5Message]) -> Result<PlainRound6Message> {
        self.expect_round(Round::Five)?;
        let pk = self.share.encryption_key().clone();
        let key = self.share.threshold_key().clone();
        let q = C::order();

        let mut shares = vec![self.mu_share.clone().expect("set in round 5")];
        shares.extend(peer_mu_shares.iter().map(|m| m.mu_share.clone()));

        // Structural failures (duplicate or missing ids) stay fatal; a
        // non-invertible µ only dooms this attempt.
        let mu = key.combine_shares(&shares)?;
        let psi = mu.nmod(&q).invert(&q).unwrap_or_else(|| {
            self.abort.get_or_insert("µ is not invertible modulo the curve order");
            BigNumber::one()
        });

        let u = self.combined_blinding.clone().expect("set in round 3");
        let v = self.combined_keyed_blinding.clone().expect("set in round 3");
        let r = self.r.clone().expect("set in round 5");

        let m_prime = truncate_digest(&q, &self.message);
        let sigma = pk.multiply(
            &pk.add(&pk.multiply(&u, &m_prime)?, &pk.multiply(&v, &r)?)?,
            &psi,
        )?;

        let sigma_share = self.share.partial_decrypt(&sigma)?;
        self.sigma_share = Some(sigma_share.clone());
        self.round = Round::Six;

        debug!("Round 6 complete, broadcasting σ share");
        Ok(PlainRound6Message { sigma_share })
    }

    /// Recombine the σ shares into the signature, unless this party
    /// aborted.
    pub fn into_signature(
        self,
        peer_sigma_shares: &[PlainRound6Message],
    ) -> Result<Option<Signature>> {
        if self.round != Round::Six {
            return Err(Error::ProtocolAbort("terminal step called out of sequence"));
        }
        let key = self.share.threshold_key().clone();
        let q = C::order();

        let mut shares = vec![self.sigma_share.clone().expect("set in round 6")];
        shares.extend(peer_sigma_shares.iter().map(|m| m.sigma_share.clone()));

        let s = key.combine_shares(&shares)?.nmod(&q);

        if self.abort.is_some() {
            return Ok(None);
        }
        Ok(Some(Signature {
            r: self.r.expect("set in round 5"),
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

fn parse_pair(pk: &EncryptionKey, secrets: &[BigNumber]) -> Result<(Ciphertext, Ciphertext)> {
    if secrets.len() != 2 {
        return Err(Error::CorruptEncoding);
    }
    let first = Ciphertext(secrets[0].clone());
    let second = Ciphertext(secrets[1].clone());
    if !pk.is_ciphertext(&first) || !pk.is_ciphertext(&second) {
        return Err(Error::DomainViolation("opened ciphertext out of range"));
    }
    Ok((first, second))
}

fn parse_point_pair<C: CurveTrait>(
    pk: &EncryptionKey,
    secrets: &[BigNumber],
) -> Result<(C, Ciphertext)> {
    if secrets.len() != 2 {
        return Err(Error::CorruptEncoding);
    }
    let point = C::try_from_bytes(&secrets[0].to_bytes())?;
    let masked = Ciphertext(secrets[1].clone());
    if !pk.is_ciphertext(&masked) {
        return Err(Error::DomainViolation("opened ciphertext out of range"));
    }
    Ok((point, masked))
}
