/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The `ValueBehavior` sum type: wrapping, bounded, and unbounded semantics
//! are expressed as one tagged variant instead of a runtime flag so that the
//! fit pre-processing and read post-processing live in a single place.

use std::fmt;

/// Controls how a quantity's range is interpreted both when fitting samples
/// and when returning a value from the reader.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueBehavior {
    /// The quantity wraps around at `max` back to `min`, e.g. an angle in
    /// `[0, 360)` degrees.
    Wrapping { min: f64, max: f64 },
    /// The quantity is clamped into `[min, max]` but does not wrap.
    Bounded { min: f64, max: f64 },
    /// No range semantics; the raw evaluated value is returned as-is.
    Unbounded,
}

impl ValueBehavior {
    /// Span of the wrapping/bounded interval, `b - a`.
    pub fn span(&self) -> Option<f64> {
        match self {
            Self::Wrapping { min, max } | Self::Bounded { min, max } => Some(max - min),
            Self::Unbounded => None,
        }
    }

    /// Applies the read-time post-processing: reduce modulo for wrapping
    /// quantities, clamp for bounded quantities, pass through otherwise.
    pub fn post_process(&self, raw: f64) -> f64 {
        match *self {
            Self::Wrapping { min, max } => {
                let span = max - min;
                let mut reduced = (raw - min) % span;
                if reduced < 0.0 {
                    reduced += span;
                }
                min + reduced
            }
            Self::Bounded { min, max } => raw.clamp(min, max),
            Self::Unbounded => raw,
        }
    }

    /// Parses the preamble's `value behavior` field (idx 6), e.g.
    /// `wrapping[0,360]`, `bounded[-90,90]`, or the empty string for
    /// [`ValueBehavior::Unbounded`].
    pub fn parse(token: &str) -> Option<Self> {
        if token.is_empty() {
            return Some(Self::Unbounded);
        }
        let (kind, rest) = token.split_once('[')?;
        let rest = rest.strip_suffix(']')?;
        let (min_s, max_s) = rest.split_once(',')?;
        let min: f64 = min_s.trim().parse().ok()?;
        let max: f64 = max_s.trim().parse().ok()?;
        match kind {
            "wrapping" => Some(Self::Wrapping { min, max }),
            "bounded" => Some(Self::Bounded { min, max }),
            _ => None,
        }
    }
}

impl fmt::Display for ValueBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wrapping { min, max } => write!(f, "wrapping[{min},{max}]"),
            Self::Bounded { min, max } => write!(f, "bounded[{min},{max}]"),
            Self::Unbounded => Ok(()),
        }
    }
}
