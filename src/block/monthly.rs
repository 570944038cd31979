/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use hifitime::{Epoch, TimeUnits};
use log::warn;

use crate::block::{normalize, Coverage, MARKER_MONTHLY};
use crate::codec::{ByteReader, ByteWriter};
use crate::errors::DecodeError;
use crate::math::eval_cheb;

/// Mid-precision block, covering `day_count` days starting at
/// `year-month-01T00:00:00Z`. Marker `0x0000`.
#[derive(Clone, Debug, PartialEq)]
pub struct MonthlyBlock {
    pub year: i16,
    pub month: u8,
    pub day_count: u8,
    pub coeffs: Vec<f32>,
}

impl MonthlyBlock {
    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }

    pub fn eval_raw(&self, t: Epoch) -> f64 {
        let (start, end) = self.coverage();
        let x = normalize(t, start, end).clamp(-1.0, 1.0);
        let coeffs: Vec<f64> = self.coeffs.iter().map(|&c| c as f64).collect();
        eval_cheb(&coeffs, x)
    }

    pub fn serialize(&self, w: &mut ByteWriter) -> u32 {
        let start_len = w.len();
        w.put_u16_be(MARKER_MONTHLY);
        w.put_i16_be(self.year);
        w.put_u8(self.month);
        w.put_u8(self.day_count);
        w.put_u32_be(self.coeffs.len() as u32);
        w.put_f32_slice_be(&self.coeffs);
        (w.len() - start_len) as u32
    }

    pub fn deserialize(r: &mut ByteReader) -> Result<Self, DecodeError> {
        let year = r.take_i16_be()?;
        let month = r.take_u8()?;
        let day_count = r.take_u8()?;
        if day_count == 0 {
            return Err(DecodeError::NonPositiveDayCount);
        }
        if !(28..=31).contains(&day_count) {
            warn!(
                "monthly block {year}-{month:02} has unusual day_count={day_count} (accepted, likely a partial-month block)"
            );
        }
        let coef_count = r.take_u32_be()? as usize;
        let coeffs = r.take_f32_vec_be(coef_count)?;
        Ok(Self {
            year,
            month,
            day_count,
            coeffs,
        })
    }
}

impl Coverage for MonthlyBlock {
    fn coverage(&self) -> (Epoch, Epoch) {
        let start =
            Epoch::from_gregorian_utc_at_midnight(self.year as i32, self.month, 1);
        let end = start + (self.day_count as f64).days();
        (start, end)
    }
}
