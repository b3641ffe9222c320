// Copyright (c) Facebook, Inc. and its affiliates.
// Modifications Copyright (c) 2022-2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Length-prefixed byte encodings.
//!
//! Integers are written big-endian in four bytes. A big integer is written as
//! `[len:4 ‖ bytes]`, and compound objects concatenate their fields in
//! declaration order. A "layered" record additionally carries the length of
//! its inner layer in its trailing four bytes, so a parser can peel the
//! outermost layer first and recurse.

use crate::errors::{Error, Result};
use libpaillier::unknown_order::BigNumber;

/// Width of every length prefix and plain integer field.
const INT_BYTES: usize = 4;

/// Append a 32-bit integer in big-endian form.
pub(crate) fn append_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

/// Append a length-prefixed byte string.
pub(crate) fn append_bytes(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    let len = u32::try_from(bytes.len()).map_err(|_| Error::EncodingOverflow)?;
    buf.len()
        .checked_add(bytes.len() + INT_BYTES)
        .and_then(|total| u32::try_from(total).ok())
        .ok_or(Error::EncodingOverflow)?;
    append_u32(buf, len);
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Append a big integer as `[len:4 ‖ big-endian bytes]`.
pub(crate) fn append_bigint(buf: &mut Vec<u8>, value: &BigNumber) -> Result<()> {
    append_bytes(buf, &value.to_bytes())
}

/// Seal a layered record by appending the inner-layer length in four bytes.
///
/// Writers record `buf.len()` after the inner layer, append their own
/// fields, and then seal with that mark so readers can peel from the outside.
pub(crate) fn seal_layer(buf: &mut Vec<u8>, inner_len: usize) -> Result<()> {
    let len = u32::try_from(inner_len).map_err(|_| Error::EncodingOverflow)?;
    append_u32(buf, len);
    Ok(())
}

/// Split a layered record into `(inner_layer, own_fields)` by reading the
/// trailing four bytes.
pub(crate) fn open_layer(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    if bytes.len() < INT_BYTES {
        return Err(Error::CorruptEncoding);
    }
    let (body, tail) = bytes.split_at(bytes.len() - INT_BYTES);
    let inner_len = u32::from_be_bytes(tail.try_into().expect("tail is four bytes")) as usize;
    if inner_len > body.len() {
        return Err(Error::CorruptEncoding);
    }
    Ok(body.split_at(inner_len))
}

/// Cursor over an encoded buffer.
///
/// Each `take_*` call consumes exactly the bytes of one field and fails with
/// [`Error::CorruptEncoding`] if the field would extend past the buffer.
pub(crate) struct Decoder<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.offset.checked_add(n).ok_or(Error::CorruptEncoding)?;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or(Error::CorruptEncoding)?;
        self.offset = end;
        Ok(slice)
    }

    /// Read a plain 4-byte big-endian integer.
    pub(crate) fn take_u32(&mut self) -> Result<u32> {
        let slice = self.take(INT_BYTES)?;
        Ok(u32::from_be_bytes(slice.try_into().expect("four bytes")))
    }

    /// Read a length-prefixed byte string.
    pub(crate) fn take_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.take_u32()? as usize;
        self.take(len)
    }

    /// Read a length-prefixed big integer.
    pub(crate) fn take_bigint(&mut self) -> Result<BigNumber> {
        Ok(BigNumber::from_slice(self.take_bytes()?))
    }

    /// Bytes not yet consumed.
    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// Assert that the whole buffer has been consumed.
    pub(crate) fn finish(self) -> Result<()> {
        if self.offset == self.bytes.len() {
            Ok(())
        } else {
            Err(Error::CorruptEncoding)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bigint_fields_round_trip() {
        let values = [
            BigNumber::zero(),
            BigNumber::one(),
            BigNumber::from(0xdead_beefu64),
            BigNumber::one() << 900,
        ];
        let mut buf = Vec::new();
        for v in &values {
            append_bigint(&mut buf, v).unwrap();
        }

        let mut decoder = Decoder::new(&buf);
        for v in &values {
            assert_eq!(&decoder.take_bigint().unwrap(), v);
        }
        decoder.finish().unwrap();
    }

    #[test]
    fn truncated_field_is_rejected() {
        let mut buf = Vec::new();
        append_bigint(&mut buf, &(BigNumber::one() << 128)).unwrap();
        buf.pop();

        let mut decoder = Decoder::new(&buf);
        assert_eq!(decoder.take_bigint().unwrap_err(), Error::CorruptEncoding);
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = Vec::new();
        append_bigint(&mut buf, &BigNumber::from(7u64)).unwrap();
        buf.push(0);

        let mut decoder = Decoder::new(&buf);
        let _ = decoder.take_bigint().unwrap();
        assert_eq!(decoder.finish().unwrap_err(), Error::CorruptEncoding);
    }

    #[test]
    fn layers_peel_from_the_outside() {
        let mut inner = Vec::new();
        append_bigint(&mut inner, &BigNumber::from(42u64)).unwrap();

        let mut outer = inner.clone();
        let mark = outer.len();
        append_bigint(&mut outer, &BigNumber::from(7u64)).unwrap();
        append_u32(&mut outer, 3);
        seal_layer(&mut outer, mark).unwrap();

        let (peeled, own) = open_layer(&outer).unwrap();
        assert_eq!(peeled, inner.as_slice());

        let mut fields = Decoder::new(own);
        assert_eq!(fields.take_bigint().unwrap(), BigNumber::from(7u64));
        assert_eq!(fields.take_u32().unwrap(), 3);
        fields.finish().unwrap();
    }

    #[test]
    fn layer_length_past_buffer_is_rejected() {
        let mut buf = Vec::new();
        append_u32(&mut buf, 1000);
        assert_eq!(open_layer(&buf).unwrap_err(), Error::CorruptEncoding);
    }
}
