/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Manual big-endian byte (de)serialization helpers.
//!
//! Weft blocks are variable-length (their coefficient count is a runtime
//! value), so they cannot be described with a fixed `#[repr(C)]` layout the
//! way a `zerocopy::FromBytes` struct can. Instead we read and write them with
//! explicit `from_be_bytes`/`to_be_bytes` calls over a cursor.

use crate::errors::DecodeError;

/// A cursor over a byte slice that always reads big-endian, two's-complement
/// integers and IEEE 754 big-endian floats, per the Weft wire format.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::TruncatedBlock {
                needed: n,
                available: self.remaining(),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Peeks the next two bytes as a big-endian u16 without advancing the cursor.
    /// Used to identify a block's marker before committing to decode it.
    pub fn peek_u16_be(&self) -> Result<u16, DecodeError> {
        if self.remaining() < 2 {
            return Err(DecodeError::TruncatedBlock {
                needed: 2,
                available: self.remaining(),
            });
        }
        Ok(u16::from_be_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]))
    }

    pub fn take_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn take_i16_be(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn take_u16_be(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn take_u32_be(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn take_f32_be(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn take_f32_vec_be(&mut self, count: usize) -> Result<Vec<f32>, DecodeError> {
        (0..count).map(|_| self.take_f32_be()).collect()
    }

    /// Consumes and discards `n` bytes, e.g. zero-padding at the end of a
    /// fixed-size forty-eight-hour block.
    pub fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.take(n)?;
        Ok(())
    }
}

/// An append-only big-endian byte writer mirroring [`ByteReader`].
#[derive(Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn put_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    pub fn put_i16_be(&mut self, v: i16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u16_be(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32_be(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_f32_be(&mut self, v: f32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_f32_slice_be(&mut self, vs: &[f32]) {
        for v in vs {
            self.put_f32_be(*v);
        }
    }

    pub fn put_zeros(&mut self, n: usize) {
        self.bytes.extend(std::iter::repeat(0u8).take(n));
    }

    pub fn extend_from_bytes(&mut self, other: &[u8]) {
        self.bytes.extend_from_slice(other);
    }
}

#[cfg(test)]
mod codec_ut {
    use super::*;

    #[test]
    fn roundtrip_scalars() {
        let mut w = ByteWriter::new();
        w.put_i16_be(-7);
        w.put_u16_be(0x00_03);
        w.put_u32_be(42);
        w.put_f32_be(1.5);

        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.take_i16_be().unwrap(), -7);
        assert_eq!(r.take_u16_be().unwrap(), 0x0003);
        assert_eq!(r.take_u32_be().unwrap(), 42);
        assert_eq!(r.take_f32_be().unwrap(), 1.5);
        assert!(r.is_empty());
    }

    #[test]
    fn truncated_read_errors() {
        let bytes = [0u8; 1];
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            r.take_u16_be(),
            Err(DecodeError::TruncatedBlock {
                needed: 2,
                available: 1
            })
        );
    }
}
