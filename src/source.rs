/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The abstract boundary between a Weft writer and wherever its samples
//! actually come from (a remote ephemeris API, a local cache, a database —
//! irrelevant to this crate).

use hifitime::Epoch;

/// The time representation used everywhere in this crate. A type alias
/// rather than a bespoke wall-clock type: every component (reader blend
/// weights, writer calendar bucketing, preamble timestamps) already needs
/// calendar/duration arithmetic `hifitime` provides.
pub type Instant = Epoch;

/// A scalar function of time plus enough structure (span, timestamps) for
/// the writer to decide which blocks to emit and how densely to sample them.
///
/// For wrapping quantities the source may return any consistent
/// representative value; unwrapping for fitting purposes is the writer's
/// job, not the source's.
pub trait DataSource {
    fn start(&self) -> Instant;
    fn end(&self) -> Instant;

    /// Ascending, finite iterator of the instants this source was actually
    /// sampled/observed at. Used by the block-selection policy to estimate
    /// sample density and by the writer to choose fit sample points.
    fn timestamps(&self) -> Box<dyn Iterator<Item = Instant> + '_>;

    /// Evaluates the source at `at`. May interpolate internally; that is not
    /// this crate's concern. No error path: a source that cannot produce a
    /// value for any in-range instant is a bug in the adapter, not a
    /// recoverable condition the writer can route around.
    fn value_at(&self, at: Instant) -> f64;
}

/// An owned, in-memory `(timestamp, value)` adapter for tests and small
/// synthetic sources.
#[derive(Clone, Debug)]
pub struct VecDataSource {
    samples: Vec<(Instant, f64)>,
}

impl VecDataSource {
    /// Builds a source from samples which must already be sorted ascending
    /// by timestamp; panics otherwise since this is a test/synthetic
    /// construction helper, not a parser of untrusted input.
    pub fn new(samples: Vec<(Instant, f64)>) -> Self {
        assert!(
            samples.windows(2).all(|w| w[0].0 < w[1].0),
            "VecDataSource samples must be strictly ascending by timestamp"
        );
        assert!(!samples.is_empty(), "VecDataSource requires at least one sample");
        Self { samples }
    }

    /// Builds a source by evaluating `f` at every instant produced by
    /// stepping from `start` to `end` (inclusive) by `step`.
    pub fn sampled(start: Instant, end: Instant, step: hifitime::Duration, f: impl Fn(Instant) -> f64) -> Self {
        let mut samples = Vec::new();
        let mut t = start;
        while t <= end {
            samples.push((t, f(t)));
            t += step;
        }
        Self::new(samples)
    }
}

impl DataSource for VecDataSource {
    fn start(&self) -> Instant {
        self.samples.first().expect("non-empty by construction").0
    }

    fn end(&self) -> Instant {
        self.samples.last().expect("non-empty by construction").0
    }

    fn timestamps(&self) -> Box<dyn Iterator<Item = Instant> + '_> {
        Box::new(self.samples.iter().map(|(t, _)| *t))
    }

    fn value_at(&self, at: Instant) -> f64 {
        match self.samples.binary_search_by(|(t, _)| t.cmp(&at)) {
            Ok(idx) => self.samples[idx].1,
            Err(0) => self.samples[0].1,
            Err(idx) if idx >= self.samples.len() => self.samples.last().unwrap().1,
            Err(idx) => {
                let (t0, v0) = self.samples[idx - 1];
                let (t1, v1) = self.samples[idx];
                let frac = (at - t0).to_seconds() / (t1 - t0).to_seconds();
                v0 + frac * (v1 - v0)
            }
        }
    }
}
