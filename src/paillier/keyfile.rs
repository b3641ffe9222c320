// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Plain-text threshold key files.
//!
//! The format is line oriented, `name:value` with base-10 integer values, in
//! this exact order:
//!
//! ```text
//! l:<l>
//! w:<w>
//! v:<v>
//! n:<n>
//! combineSharesConstant:<c>
//! s0:<s_1>
//! v0:<v_1>
//! s1:<s_2>
//! v1:<v_2>
//! …
//! ```
//!
//! The file stores every share; a deployment tool is expected to split it
//! across the parties before distribution.

use crate::{
    errors::{Error, Result},
    paillier::{
        threshold::{KeyShare, ThresholdKey},
        EncryptionKey,
    },
};
use libpaillier::unknown_order::BigNumber;
use std::{fmt::Write as _, path::Path};
use tracing::error;

/// Render a dealt set of shares in the key-file format.
///
/// The slice must be a complete dealing: `l` shares of the same key with ids
/// `1..=l` in order, as produced by [`KeyShare::generate`].
pub fn write_threshold_shares(shares: &[KeyShare]) -> Result<String> {
    let first = shares
        .first()
        .ok_or(Error::DomainViolation("no shares to write"))?;
    let key = first.threshold_key();
    if shares.len() != key.servers() {
        return Err(Error::DomainViolation(
            "a key file must hold every dealt share",
        ));
    }

    let mut out = String::new();
    let _ = writeln!(out, "l:{}", key.servers());
    let _ = writeln!(out, "w:{}", key.threshold());
    let _ = writeln!(out, "v:{}", to_decimal(key.v()));
    let _ = writeln!(out, "n:{}", to_decimal(key.encryption_key().modulus()));
    let _ = writeln!(
        out,
        "combineSharesConstant:{}",
        to_decimal(key.combine_constant())
    );
    for (index, share) in shares.iter().enumerate() {
        if share.id() as usize != index + 1 || share.threshold_key() != key {
            return Err(Error::KeyMismatch(
                "shares must come from a single dealing, in id order",
            ));
        }
        let _ = writeln!(out, "s{}:{}", index, to_decimal(share.secret()));
        let _ = writeln!(
            out,
            "v{}:{}",
            index,
            to_decimal(key.verification_value(share.id())?)
        );
    }
    Ok(out)
}

/// Parse a key file back into the full set of shares.
pub fn read_threshold_shares(contents: &str) -> Result<Vec<KeyShare>> {
    let mut lines = contents.lines();

    let l = parse_decimal(field(&mut lines, "l")?)?;
    let w = parse_decimal(field(&mut lines, "w")?)?;
    let (l, w) = (to_small(&l)?, to_small(&w)?);
    let v = parse_decimal(field(&mut lines, "v")?)?;
    let n = parse_decimal(field(&mut lines, "n")?)?;
    let combine_constant = parse_decimal(field(&mut lines, "combineSharesConstant")?)?;

    let mut secrets = Vec::with_capacity(l);
    let mut vs = Vec::with_capacity(l);
    for index in 0..l {
        secrets.push(parse_decimal(field(&mut lines, &format!("s{index}"))?)?);
        vs.push(parse_decimal(field(&mut lines, &format!("v{index}"))?)?);
    }

    let pk = EncryptionKey::from_modulus(&n)?;
    let key = ThresholdKey::from_parts(pk, l, w, v, vs, combine_constant)?;

    Ok(secrets
        .into_iter()
        .enumerate()
        .map(|(index, s_i)| KeyShare::from_parts(key.clone(), (index + 1) as u32, s_i))
        .collect())
}

/// Write a key file at `path`.
pub fn save_threshold_shares(path: impl AsRef<Path>, shares: &[KeyShare]) -> std::io::Result<()> {
    let contents = write_threshold_shares(shares)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    std::fs::write(path, contents)
}

/// Load a key file from `path`.
pub fn load_threshold_shares(path: impl AsRef<Path>) -> std::io::Result<Vec<KeyShare>> {
    let contents = std::fs::read_to_string(path)?;
    read_threshold_shares(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Pull the next `name:value` line and return the value.
fn field<'a>(lines: &mut impl Iterator<Item = &'a str>, name: &str) -> Result<&'a str> {
    let line = lines.next().ok_or(Error::CorruptEncoding)?;
    let (found, value) = line.split_once(':').ok_or(Error::CorruptEncoding)?;
    if found != name {
        error!("Key file field out of order: expected {name}, found {found}");
        return Err(Error::CorruptEncoding);
    }
    Ok(value.trim())
}

fn to_small(value: &BigNumber) -> Result<usize> {
    let bytes = value.to_bytes();
    if bytes.len() > 2 {
        return Err(Error::CorruptEncoding);
    }
    Ok(bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize))
}

fn to_decimal(value: &BigNumber) -> String {
    if value == &BigNumber::zero() {
        return "0".into();
    }
    let ten = BigNumber::from(10u64);
    let mut digits = Vec::new();
    let mut rest = value.clone();
    while rest > BigNumber::zero() {
        let digit = rest.clone() % ten.clone();
        digits.push(b'0' + digit.to_bytes().last().copied().unwrap_or(0));
        rest = rest / ten.clone();
    }
    digits.reverse();
    String::from_utf8(digits).expect("digits are ascii")
}

fn parse_decimal(text: &str) -> Result<BigNumber> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::CorruptEncoding);
    }
    let ten = BigNumber::from(10u64);
    let mut acc = BigNumber::zero();
    for b in text.bytes() {
        acc = acc * ten.clone() + BigNumber::from((b - b'0') as u64);
    }
    Ok(acc)
}
