// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! End-to-end threshold ECDSA signing, honest and adversarial.
//!
//! Three of fifteen servers cooperate over secp256k1. The Paillier modulus
//! must dominate `q⁷`, hence the 1024-bit safe primes; dealing them is by
//! far the slowest step, so all tests share one fixture.

use libpaillier::unknown_order::BigNumber;
use paillier_tss::{
    commit::MasterPublicKey,
    curve::{CurveTrait, Secp256k1},
    enable_zeroize,
    l2fhe::CiphertextL1,
    paillier::{threshold::KeyShare, Ciphertext},
    sign::{
        verify_signature, FheRound2Message, FheSigner, PlainSigner, Signature,
    },
    zkp::setup::PublicParameters,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::OnceLock;

const SERVERS: usize = 15;
const THRESHOLD: usize = 3;
const MESSAGE: &[u8] = b"Hello Universe";

struct Fixture {
    shares: Vec<KeyShare>,
    params: PublicParameters,
    mpk: MasterPublicKey,
    signing_key: BigNumber,
    public_key: Secp256k1,
}

fn fixture() -> &'static Fixture {
    static FIXTURE: OnceLock<Fixture> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        enable_zeroize();
        let mut rng = StdRng::seed_from_u64(0x7455_0eca);

        // n of roughly 2048 bits comfortably exceeds q⁷ for a 256-bit q.
        let shares = KeyShare::generate(&mut rng, 1024, SERVERS, THRESHOLD).unwrap();
        let pk = shares[0].encryption_key().clone();
        let params = PublicParameters::generate(&mut rng, 512, &pk).unwrap();
        let mpk = MasterPublicKey::generate(&mut rng);

        let q = Secp256k1::order();
        let signing_key = BigNumber::from_rng(&q, &mut rng);
        let public_key = Secp256k1::scale_generator(&signing_key).unwrap();

        Fixture {
            shares,
            params,
            mpk,
            signing_key,
            public_key,
        }
    })
}

fn rng(tweak: u64) -> StdRng {
    StdRng::seed_from_u64(0xd5a_0000 ^ tweak)
}

/// The bag of a party's peers' messages, in canonical (ascending) order.
fn peers_of<T: Clone>(all: &[T], me: usize) -> Vec<T> {
    all.iter()
        .enumerate()
        .filter(|(index, _)| *index != me)
        .map(|(_, message)| message.clone())
        .collect()
}

fn run_fhe_protocol(
    signers: &mut Vec<FheSigner<Secp256k1>>,
    rng: &mut StdRng,
    tamper_round2: Option<usize>,
) -> Vec<Option<Signature>> {
    let count = signers.len();

    let round1: Vec<_> = signers
        .iter_mut()
        .map(|signer| signer.round_one(rng).unwrap())
        .collect();

    let mut round2: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_two(rng, &peers_of(&round1, me)).unwrap())
        .collect();

    if let Some(cheater) = tamper_round2 {
        round2[cheater] = flip_one_byte(&round2[cheater]);
    }

    let round3: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_three(&peers_of(&round2, me)).unwrap())
        .collect();

    let round4: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_four(&peers_of(&round3, me)).unwrap())
        .collect();

    (0..count)
        .zip(std::mem::take(signers))
        .map(|(me, signer)| signer.into_signature(&peers_of(&round4, me)).unwrap())
        .collect()
}

/// Re-encode a message with one byte flipped, retrying positions until the
/// mutation still deserializes.
fn flip_one_byte<T: Serialize + DeserializeOwned>(message: &T) -> T {
    let bytes = bincode::serialize(message).unwrap();
    for position in (0..bytes.len()).rev() {
        let mut mutated = bytes.clone();
        mutated[position] ^= 0x01;
        if let Ok(parsed) = bincode::deserialize::<T>(&mutated) {
            return parsed;
        }
    }
    panic!("no byte flip produced a decodable message");
}

#[test]
fn four_round_signing_produces_a_valid_signature() {
    let fixture = fixture();
    let mut rng = rng(1);
    let pk = fixture.shares[0].encryption_key().clone();

    let encrypted_key = CiphertextL1::encrypt(&pk, &mut rng, &fixture.signing_key)
        .unwrap()
        .0;

    let mut signers: Vec<_> = fixture.shares[..THRESHOLD]
        .iter()
        .map(|share| {
            FheSigner::new(
                &fixture.params,
                &fixture.mpk,
                share.clone(),
                &encrypted_key,
                MESSAGE,
            )
            .unwrap()
        })
        .collect();

    let signatures = run_fhe_protocol(&mut signers, &mut rng, None);
    for signature in signatures {
        let signature = signature.expect("honest run must produce a signature");
        verify_signature(MESSAGE, &signature, &fixture.public_key).unwrap();
    }
}

#[test]
fn four_round_signing_aborts_on_a_corrupted_proof() {
    let fixture = fixture();
    let mut rng = rng(2);
    let pk = fixture.shares[0].encryption_key().clone();

    let encrypted_key = CiphertextL1::encrypt(&pk, &mut rng, &fixture.signing_key)
        .unwrap()
        .0;

    let mut signers: Vec<_> = fixture.shares[..THRESHOLD]
        .iter()
        .map(|share| {
            FheSigner::new(
                &fixture.params,
                &fixture.mpk,
                share.clone(),
                &encrypted_key,
                MESSAGE,
            )
            .unwrap()
        })
        .collect();

    // Party 0's round-2 proof has one byte flipped; every honest party must
    // notice and abort, yielding no signature.
    let signatures = run_fhe_protocol(&mut signers, &mut rng, Some(0));
    assert!(signatures[1].is_none());
    assert!(signatures[2].is_none());
}

#[test]
fn four_round_signing_aborts_on_a_mutated_opening() {
    let fixture = fixture();
    let mut rng = rng(3);
    let pk = fixture.shares[0].encryption_key().clone();

    let encrypted_key = CiphertextL1::encrypt(&pk, &mut rng, &fixture.signing_key)
        .unwrap()
        .0;

    let make_signer = |share: &KeyShare| {
        FheSigner::new(
            &fixture.params,
            &fixture.mpk,
            share.clone(),
            &encrypted_key,
            MESSAGE,
        )
        .unwrap()
    };

    // The cheater runs two independent signers: it broadcasts the first
    // one's commitment but the second one's opening, i.e. an opening over a
    // different ρ than it committed to.
    let mut cheater_commit = make_signer(&fixture.shares[0]);
    let mut cheater_open = make_signer(&fixture.shares[0]);
    let mut honest: Vec<_> = fixture.shares[1..THRESHOLD].iter().map(make_signer).collect();

    let committed = cheater_commit.round_one(&mut rng).unwrap();
    let _discarded = cheater_open.round_one(&mut rng).unwrap();
    let honest_round1: Vec<_> = honest
        .iter_mut()
        .map(|signer| signer.round_one(&mut rng).unwrap())
        .collect();

    // Canonical order: cheater is party 0.
    let round1 = {
        let mut all = vec![committed];
        all.extend(honest_round1);
        all
    };

    let cheater_round2 = cheater_open
        .round_two(&mut rng, &peers_of(&round1, 0))
        .unwrap();
    let honest_round2: Vec<FheRound2Message<Secp256k1>> = honest
        .iter_mut()
        .enumerate()
        .map(|(index, signer)| {
            signer
                .round_two(&mut rng, &peers_of(&round1, index + 1))
                .unwrap()
        })
        .collect();

    let round2 = {
        let mut all = vec![cheater_round2];
        all.extend(honest_round2);
        all
    };

    // Every honest peer sees the commitment check fail.
    for (index, signer) in honest.iter_mut().enumerate() {
        let _ = signer.round_three(&peers_of(&round2, index + 1)).unwrap();
        assert!(signer.is_aborted());
    }
}

#[test]
fn six_round_signing_produces_a_valid_signature_and_aborts_on_cheating() {
    let fixture = fixture();
    let mut rng = rng(4);
    let pk = fixture.shares[0].encryption_key().clone();

    let encrypted_key: Ciphertext = pk
        .encrypt_with_rng(&mut rng, &fixture.signing_key)
        .unwrap()
        .0;

    let make_signers = || -> Vec<PlainSigner<Secp256k1>> {
        fixture.shares[..THRESHOLD]
            .iter()
            .map(|share| {
                PlainSigner::new(
                    &fixture.params,
                    &fixture.mpk,
                    share.clone(),
                    &encrypted_key,
                    MESSAGE,
                )
                .unwrap()
            })
            .collect()
    };

    // Honest run.
    let mut signers = make_signers();
    let round1: Vec<_> = signers
        .iter_mut()
        .map(|signer| signer.round_one(&mut rng).unwrap())
        .collect();
    let round2: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_two(&mut rng, &peers_of(&round1, me)).unwrap())
        .collect();
    let round3: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_three(&mut rng, &peers_of(&round2, me)).unwrap())
        .collect();
    let round4: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_four(&mut rng, &peers_of(&round3, me)).unwrap())
        .collect();
    let round5: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_five(&peers_of(&round4, me)).unwrap())
        .collect();
    let round6: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_six(&peers_of(&round5, me)).unwrap())
        .collect();

    for (me, signer) in std::mem::take(&mut signers).into_iter().enumerate() {
        let signature = signer
            .into_signature(&peers_of(&round6, me))
            .unwrap()
            .expect("honest run must produce a signature");
        verify_signature(MESSAGE, &signature, &fixture.public_key).unwrap();
    }

    // A corrupted round-2 proof aborts every honest party.
    let mut signers = make_signers();
    let round1: Vec<_> = signers
        .iter_mut()
        .map(|signer| signer.round_one(&mut rng).unwrap())
        .collect();
    let mut round2: Vec<_> = signers
        .iter_mut()
        .enumerate()
        .map(|(me, signer)| signer.round_two(&mut rng, &peers_of(&round1, me)).unwrap())
        .collect();
    round2[0] = flip_one_byte(&round2[0]);

    for (me, signer) in signers.iter_mut().enumerate().skip(1) {
        let _ = signer.round_three(&mut rng, &peers_of(&round2, me)).unwrap();
        assert!(signer.is_aborted());
    }
}
