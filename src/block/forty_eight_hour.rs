/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use hifitime::{Epoch, TimeUnits};

use crate::block::{normalize, Coverage, MARKER_FORTY_EIGHT_HOUR, MARKER_SECTION_HEADER};
use crate::codec::{ByteReader, ByteWriter};
use crate::errors::DecodeError;
use crate::math::eval_cheb;

/// Defines the fixed byte-size and expected count of the run of
/// forty-eight-hour blocks immediately following it. Carries no polynomial
/// data itself. Marker `0x0002`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectionHeader {
    pub start_y: i16,
    pub start_m: u8,
    pub start_d: u8,
    pub end_y: i16,
    pub end_m: u8,
    pub end_d: u8,
    /// Total serialized length (including the block's own 2-byte marker) of
    /// each forty-eight-hour block that follows this header.
    pub block_size: u16,
    pub block_count: u32,
}

impl SectionHeader {
    pub fn start_date(&self) -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(self.start_y as i32, self.start_m, self.start_d)
    }

    pub fn end_date(&self) -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(self.end_y as i32, self.end_m, self.end_d)
    }

    /// Whether `date` (truncated to a calendar day) falls within
    /// `[start_date, end_date]`, inclusive on both ends (this is the run's
    /// declared calendar range, not a block's half-open coverage interval).
    pub fn contains_date(&self, date: Epoch) -> bool {
        date >= self.start_date() && date <= self.end_date()
    }

    pub fn serialize(&self, w: &mut ByteWriter) -> u32 {
        let start_len = w.len();
        w.put_u16_be(MARKER_SECTION_HEADER);
        w.put_i16_be(self.start_y);
        w.put_u8(self.start_m);
        w.put_u8(self.start_d);
        w.put_i16_be(self.end_y);
        w.put_u8(self.end_m);
        w.put_u8(self.end_d);
        w.put_u16_be(self.block_size);
        w.put_u32_be(self.block_count);
        (w.len() - start_len) as u32
    }

    pub fn deserialize(r: &mut ByteReader) -> Result<Self, DecodeError> {
        let start_y = r.take_i16_be()?;
        let start_m = r.take_u8()?;
        let start_d = r.take_u8()?;
        let end_y = r.take_i16_be()?;
        let end_m = r.take_u8()?;
        let end_d = r.take_u8()?;
        let block_size = r.take_u16_be()?;
        let block_count = r.take_u32_be()?;

        let header = Self {
            start_y,
            start_m,
            start_d,
            end_y,
            end_m,
            end_d,
            block_size,
            block_count,
        };

        if header.end_date() < header.start_date() {
            return Err(DecodeError::SectionEndBeforeStart);
        }

        Ok(header)
    }
}

/// Highest-precision block, covering `[center-24h, center+24h)` where
/// `center = y-m-dT00:00:00Z`. Marker `0x0001`. Its serialized length is
/// exactly the `block_size` of the currently active [`SectionHeader`]; since
/// the forty-eight-hour record carries no explicit coefficient count (unlike
/// the multi-year and monthly blocks), the coefficient count is derived from
/// `block_size`: `(block_size - 6) / 4` (6 = 2-byte marker + 2-byte year +
/// 1-byte month + 1-byte day). Any bytes left over after that many `f32`s
/// (there normally are none, since 16-bit alignment already divides evenly
/// into 4-byte floats) are zero-padding.
#[derive(Clone, Debug, PartialEq)]
pub struct FortyEightHourBlock {
    pub y: i16,
    pub m: u8,
    pub d: u8,
    pub coeffs: Vec<f32>,
}

impl FortyEightHourBlock {
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn center(&self) -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(self.y as i32, self.m, self.d)
    }

    pub fn eval_raw(&self, t: Epoch) -> f64 {
        let (start, end) = self.coverage();
        let x = normalize(t, start, end).clamp(-1.0, 1.0);
        let coeffs: Vec<f64> = self.coeffs.iter().map(|&c| c as f64).collect();
        eval_cheb(&coeffs, x)
    }

    /// Serializes this block, zero-padding up to `block_size` bytes
    /// (including the marker). Fails if the coefficients alone would not fit.
    pub fn serialize(&self, w: &mut ByteWriter, block_size: u16) -> Result<u32, DecodeError> {
        let start_len = w.len();
        w.put_u16_be(MARKER_FORTY_EIGHT_HOUR);
        w.put_i16_be(self.y);
        w.put_u8(self.m);
        w.put_u8(self.d);
        w.put_f32_slice_be(&self.coeffs);

        let written = w.len() - start_len;
        if written > block_size as usize {
            return Err(DecodeError::SizeMismatch {
                expected: block_size as usize,
                found: written,
            });
        }
        w.put_zeros(block_size as usize - written);
        Ok(block_size as u32)
    }

    /// Deserializes the payload following an already-consumed marker, given
    /// the currently active section header.
    pub fn deserialize(r: &mut ByteReader, active: &SectionHeader) -> Result<Self, DecodeError> {
        let payload_len = active.block_size as usize;
        if payload_len < 6 {
            return Err(DecodeError::SizeMismatch {
                expected: payload_len,
                found: 0,
            });
        }
        let y = r.take_i16_be()?;
        let m = r.take_u8()?;
        let d = r.take_u8()?;

        let remaining = payload_len - 6;
        let coef_count = remaining / 4;
        let pad = remaining % 4;

        let coeffs = r.take_f32_vec_be(coef_count)?;
        if pad > 0 {
            r.skip(pad)?;
        }

        Ok(Self { y, m, d, coeffs })
    }
}

impl Coverage for FortyEightHourBlock {
    fn coverage(&self) -> (Epoch, Epoch) {
        let center = self.center();
        (center - 24.hours(), center + 24.hours())
    }
}

#[cfg(test)]
mod forty_eight_hour_ut {
    use super::*;

    fn header(block_size: u16, block_count: u32) -> SectionHeader {
        SectionHeader {
            start_y: 2024,
            start_m: 1,
            start_d: 1,
            end_y: 2024,
            end_m: 1,
            end_d: 3,
            block_size,
            block_count,
        }
    }

    #[test]
    fn roundtrip_exact_fit() {
        let block = FortyEightHourBlock {
            y: 2024,
            m: 1,
            d: 2,
            coeffs: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        };
        // marker(2) + y(2) + m(1) + d(1) + 6 * f32(4) = 30
        let block_size = 30u16;
        let mut w = ByteWriter::new();
        let written = block.serialize(&mut w, block_size).unwrap();
        assert_eq!(written, block_size as u32);

        let bytes = w.into_vec();
        assert_eq!(bytes.len(), block_size as usize);

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.take_u16_be().unwrap(), MARKER_FORTY_EIGHT_HOUR);
        let active = header(block_size, 1);
        let decoded = FortyEightHourBlock::deserialize(&mut r, &active).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn roundtrip_with_padding() {
        let block = FortyEightHourBlock {
            y: 2024,
            m: 1,
            d: 2,
            coeffs: vec![1.0, 2.0],
        };
        // Declare a block_size larger than needed; the rest must zero-pad.
        let block_size = 40u16;
        let mut w = ByteWriter::new();
        let written = block.serialize(&mut w, block_size).unwrap();
        assert_eq!(written, block_size as u32);
        let bytes = w.into_vec();
        assert_eq!(bytes.len(), block_size as usize);

        let mut r = ByteReader::new(&bytes);
        r.take_u16_be().unwrap();
        let active = header(block_size, 1);
        let decoded = FortyEightHourBlock::deserialize(&mut r, &active).unwrap();
        assert_eq!(decoded.coeffs.len(), (block_size as usize - 6) / 4);
        assert_eq!(&decoded.coeffs[..2], &block.coeffs[..]);
        assert!(decoded.coeffs[2..].iter().all(|&c| c == 0.0));
    }

    #[test]
    fn coverage_is_48h_window_centered_on_midnight() {
        let block = FortyEightHourBlock {
            y: 2024,
            m: 1,
            d: 2,
            coeffs: vec![0.0],
        };
        let (start, end) = block.coverage();
        assert_eq!(start, Epoch::from_gregorian_utc_at_midnight(2024, 1, 1));
        assert_eq!(end, Epoch::from_gregorian_utc_at_midnight(2024, 1, 3));
    }

    #[test]
    fn section_header_rejects_end_before_start() {
        let mut w = ByteWriter::new();
        w.put_i16_be(2024);
        w.put_u8(1);
        w.put_u8(10);
        w.put_i16_be(2024);
        w.put_u8(1);
        w.put_u8(5);
        w.put_u16_be(30);
        w.put_u32_be(0);
        let bytes = w.into_vec();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            SectionHeader::deserialize(&mut r),
            Err(DecodeError::SectionEndBeforeStart)
        );
    }
}
