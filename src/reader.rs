/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Priority-ordered block lookup, binary search within a forty-eight-hour
//! section, and linear blend across adjacent 48h blocks near a midnight
//! boundary.

use hifitime::{Duration, Epoch, TimeUnits};
use log::trace;

use crate::block::Coverage;
use crate::errors::ReadError;
use crate::file::WeftFile;
use crate::source::Instant;

/// Injected trace sink so tests can assert on block-selection decisions
/// deterministically, routed through the crate's own `log` facade rather
/// than a bespoke channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    #[default]
    Silent,
    Trace,
}

/// A read-only view over a [`WeftFile`]. Single-threaded by contract;
/// concurrent readers each hold their own `Reader`, though they may share
/// the underlying `WeftFile` behind `Arc` since it is immutable after parse.
pub struct Reader<'f> {
    file: &'f WeftFile,
    verbosity: Verbosity,
}

impl<'f> Reader<'f> {
    pub fn new(file: &'f WeftFile) -> Self {
        Self::new_with_verbosity(file, Verbosity::Silent)
    }

    pub fn new_with_verbosity(file: &'f WeftFile, verbosity: Verbosity) -> Self {
        Self { file, verbosity }
    }

    /// Resolves `t` to a scalar value via priority-order block lookup
    /// (48h > monthly > multi-year), binary search within the active 48h
    /// section, and linear blend across adjacent 48h blocks.
    pub fn value_at(&self, t: Instant) -> Result<f64, ReadError> {
        if let Some(value) = self.value_from_forty_eight_hour(t)? {
            return Ok(value);
        }
        if let Some(block) = self.file.monthly_blocks().iter().find(|b| b.covers(t)) {
            if self.verbosity == Verbosity::Trace {
                trace!("value_at({t:?}): selected monthly block {}-{:02}", block.year, block.month);
            }
            return Ok(self.file.preamble.value_behavior.post_process(block.eval_raw(t)));
        }
        if let Some(block) = self.file.multi_year_blocks().iter().find(|b| b.covers(t)) {
            if self.verbosity == Verbosity::Trace {
                trace!("value_at({t:?}): selected multi-year block starting {}", block.start_year);
            }
            return Ok(self.file.preamble.value_behavior.post_process(block.eval_raw(t)));
        }
        Err(ReadError::OutOfRange { at: t })
    }

    /// Returns `Ok(Some(value))` if a 48h section covers `t` (after blend if
    /// applicable), `Ok(None)` if no 48h section is active for `t` (fall
    /// through to monthly/multi-year), or `Err` only for malformed index
    /// state that should never occur for a file parsed by this crate.
    fn value_from_forty_eight_hour(&self, t: Instant) -> Result<Option<f64>, ReadError> {
        let date = truncate_to_day(t);
        let header = match self.file.section_headers().find(|h| h.contains_date(date)) {
            Some(h) => h,
            None => return Ok(None),
        };

        let count = self.file.forty_eight_hour_block_count(header);
        if count == 0 {
            return Ok(None);
        }

        // Binary search over block center-dates for the greatest index
        // whose center <= t.
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let block = self
                .file
                .forty_eight_hour_block(header, mid)
                .expect("section index is internally consistent");
            if block.center() <= t {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        // `lo` is the first index whose center > t; the candidate pivot is lo-1.
        let pivot = lo.saturating_sub(1);

        let candidates: Vec<usize> = [pivot.checked_sub(1), Some(pivot), Some(pivot + 1)]
            .into_iter()
            .flatten()
            .filter(|&i| i < count)
            .collect();

        let mut covering = Vec::new();
        for idx in candidates {
            let block = self
                .file
                .forty_eight_hour_block(header, idx)
                .expect("section index is internally consistent");
            if block.covers(t) {
                covering.push(block);
            }
        }

        match covering.len() {
            0 => Ok(None),
            1 => {
                let block = &covering[0];
                if self.verbosity == Verbosity::Trace {
                    trace!("value_at({t:?}): selected single 48h block centered {:?}", block.center());
                }
                Ok(Some(self.file.preamble.value_behavior.post_process(block.eval_raw(t))))
            }
            _ => {
                // Exactly two adjacent blocks can ever both cover a given
                // instant (the overlap zone is 24h wide); order them by center.
                let (left, right) = if covering[0].center() <= covering[1].center() {
                    (&covering[0], &covering[1])
                } else {
                    (&covering[1], &covering[0])
                };
                let weight_left = (right.center() - t).to_seconds() / (24.hours()).to_seconds();
                let weight_right = 1.0 - weight_left;

                let raw_left = left.eval_raw(t);
                let raw_right = right.eval_raw(t);
                let blended_raw = blend_raw(raw_left, raw_right, weight_left, weight_right, &self.file.preamble.value_behavior);

                if self.verbosity == Verbosity::Trace {
                    trace!(
                        "value_at({t:?}): blended 48h blocks centered {:?}/{:?} weights ({weight_left:.3},{weight_right:.3})",
                        left.center(),
                        right.center()
                    );
                }
                Ok(Some(self.file.preamble.value_behavior.post_process(blended_raw)))
            }
        }
    }

    /// An iterator of `(instant, value_at(instant))` stepping from `start`
    /// to `end` (inclusive) by `step`. Trivially cancellable by dropping it.
    pub fn value_in_range(
        &self,
        start: Instant,
        end: Instant,
        step: Duration,
    ) -> impl Iterator<Item = (Instant, Result<f64, ReadError>)> + '_ {
        let mut t = start;
        std::iter::from_fn(move || {
            if t > end {
                return None;
            }
            let current = t;
            let value = self.value_at(current);
            t += step;
            Some((current, value))
        })
    }
}

/// For a wrapping value behavior, blends the unwrapped representative of
/// `raw_right` closest to `raw_left` before weighting, so a blend straddling
/// a wrap discontinuity (e.g. 359 deg and 1 deg) does not average toward the
/// wrong side of the circle. For bounded/unbounded behaviors, blends the raw
/// values directly; post-processing (clamp/reduce) is applied by the caller
/// afterward.
fn blend_raw(
    raw_left: f64,
    raw_right: f64,
    weight_left: f64,
    weight_right: f64,
    behavior: &crate::value_behavior::ValueBehavior,
) -> f64 {
    match *behavior {
        crate::value_behavior::ValueBehavior::Wrapping { min, max } => {
            let span = max - min;
            let mut right = raw_right;
            if right - raw_left > span / 2.0 {
                right -= span;
            } else if right - raw_left < -span / 2.0 {
                right += span;
            }
            weight_left * raw_left + weight_right * right
        }
        _ => weight_left * raw_left + weight_right * raw_right,
    }
}

fn truncate_to_day(t: Epoch) -> Epoch {
    let (y, m, d, _, _, _, _) = t.to_gregorian_utc();
    Epoch::from_gregorian_utc_at_midnight(y, m, d)
}
