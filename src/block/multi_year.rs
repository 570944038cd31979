/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use hifitime::Epoch;

use crate::block::{normalize, Coverage, MARKER_MULTI_YEAR};
use crate::codec::{ByteReader, ByteWriter};
use crate::errors::DecodeError;
use crate::math::eval_cheb;

/// Coarsest-precision block, covering `duration_years` starting at
/// `start_year-01-01T00:00:00Z`. Marker `0x0003`.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiYearBlock {
    pub start_year: i16,
    pub duration_years: u16,
    pub coeffs: Vec<f32>,
}

impl MultiYearBlock {
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    /// Evaluates the raw (pre value-behavior) polynomial at `t`. Caller must
    /// have already confirmed `self.covers(t)`.
    pub fn eval_raw(&self, t: Epoch) -> f64 {
        let (start, end) = self.coverage();
        let x = normalize(t, start, end).clamp(-1.0, 1.0);
        let coeffs: Vec<f64> = self.coeffs.iter().map(|&c| c as f64).collect();
        eval_cheb(&coeffs, x)
    }

    pub fn serialize(&self, w: &mut ByteWriter) -> u32 {
        let start_len = w.len();
        w.put_u16_be(MARKER_MULTI_YEAR);
        w.put_i16_be(self.start_year);
        w.put_u16_be(self.duration_years);
        w.put_u32_be(self.coeffs.len() as u32);
        w.put_f32_slice_be(&self.coeffs);
        (w.len() - start_len) as u32
    }

    /// Deserializes the payload following an already-consumed marker.
    pub fn deserialize(r: &mut ByteReader) -> Result<Self, DecodeError> {
        let start_year = r.take_i16_be()?;
        let duration_years = r.take_u16_be()?;
        let coef_count = r.take_u32_be()? as usize;
        let coeffs = r.take_f32_vec_be(coef_count)?;
        Ok(Self {
            start_year,
            duration_years,
            coeffs,
        })
    }
}

impl Coverage for MultiYearBlock {
    fn coverage(&self) -> (Epoch, Epoch) {
        let start = Epoch::from_gregorian_utc_at_midnight(self.start_year as i32, 1, 1);
        let end = Epoch::from_gregorian_utc_at_midnight(
            self.start_year as i32 + self.duration_years as i32,
            1,
            1,
        );
        (start, end)
    }
}

#[cfg(test)]
mod multi_year_ut {
    use super::*;

    #[test]
    fn roundtrip() {
        let block = MultiYearBlock {
            start_year: 2000,
            duration_years: 100,
            coeffs: vec![1.0, 2.0, 3.0],
        };
        let mut w = ByteWriter::new();
        let written = block.serialize(&mut w);
        let bytes = w.into_vec();
        assert_eq!(written as usize, bytes.len());

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.take_u16_be().unwrap(), MARKER_MULTI_YEAR);
        let decoded = MultiYearBlock::deserialize(&mut r).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn coverage_spans_decade() {
        let block = MultiYearBlock {
            start_year: 2000,
            duration_years: 10,
            coeffs: vec![0.0],
        };
        let (start, end) = block.coverage();
        assert_eq!(start, Epoch::from_gregorian_utc_at_midnight(2000, 1, 1));
        assert_eq!(end, Epoch::from_gregorian_utc_at_midnight(2010, 1, 1));
        assert!(block.covers(Epoch::from_gregorian_utc_at_midnight(2005, 6, 1)));
        assert!(!block.covers(end));
    }
}
