/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Coverage-ratio thresholds and the `auto` block-kind recommendation the
//! writer falls back to when a caller does not hand it an explicit
//! [`crate::writer::WriterConfig`].

use log::debug;

use crate::source::DataSource;

/// Default coverage-ratio threshold below which a candidate block is
/// skipped, for every block kind.
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.666;
/// Minimum samples/day within a 48h block's window for it to be eligible
/// absent `force_forty_eight_hour_blocks`.
pub const DEFAULT_MIN_SAMPLES_PER_DAY: f64 = 8.0;

/// Per-kind enable flag plus fit parameters, as recommended by
/// [`get_recommended_blocks`] or set explicitly on a `WriterConfig`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KindRecommendation {
    pub enabled: bool,
    pub sample_count: u32,
    pub polynomial_degree: u32,
}

/// The full recommended configuration for a data source, one entry per
/// block kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlockSelectionPolicy {
    pub multi_year: KindRecommendation,
    pub monthly: KindRecommendation,
    pub forty_eight_hour: KindRecommendation,
}

/// The coverage ratio of a nominal span given the earliest/latest in-range
/// data-source timestamps: `(t_max - t_min) / nominal_span`. Deliberately
/// not gap-sensitive: regular sampling anywhere in the interval yields a
/// ratio near the fraction of the interval actually spanned by data.
pub fn coverage_ratio(t_min_s: f64, t_max_s: f64, nominal_span_s: f64) -> f64 {
    if nominal_span_s <= 0.0 {
        return 0.0;
    }
    ((t_max_s - t_min_s) / nominal_span_s).clamp(0.0, 1.0)
}

/// Inspects `source`'s span and observed sample density and produces a
/// [`BlockSelectionPolicy`]. All three kinds are recommended enabled with
/// their spec-default fit parameters; density below
/// [`DEFAULT_MIN_SAMPLES_PER_DAY`] disables the 48h recommendation since it
/// could not pass the coverage/density check on write regardless.
pub fn get_recommended_blocks(source: &dyn DataSource) -> BlockSelectionPolicy {
    let span_days = (source.end() - source.start()).to_seconds() / 86_400.0;
    let sample_count = source.timestamps().count();
    let samples_per_day = if span_days > 0.0 {
        sample_count as f64 / span_days
    } else {
        0.0
    };

    let forty_eight_hour_enabled = samples_per_day >= DEFAULT_MIN_SAMPLES_PER_DAY;

    debug!(
        "policy: span={span_days:.1}d samples={sample_count} density={samples_per_day:.2}/day -> 48h enabled={forty_eight_hour_enabled}"
    );

    BlockSelectionPolicy {
        multi_year: KindRecommendation {
            enabled: span_days >= 365.0,
            sample_count: 50,
            polynomial_degree: 14,
        },
        monthly: KindRecommendation {
            enabled: true,
            sample_count: 48,
            polynomial_degree: 9,
        },
        forty_eight_hour: KindRecommendation {
            enabled: forty_eight_hour_enabled,
            sample_count: 48,
            polynomial_degree: 5,
        },
    }
}

#[cfg(test)]
mod policy_ut {
    use super::*;

    #[test]
    fn coverage_ratio_full_span_is_one() {
        assert_eq!(coverage_ratio(0.0, 86_400.0, 86_400.0), 1.0);
    }

    #[test]
    fn coverage_ratio_partial_span() {
        let ratio = coverage_ratio(0.0, 5.0 * 86_400.0, 31.0 * 86_400.0);
        assert!((ratio - 5.0 / 31.0).abs() < 1e-9);
    }

    #[test]
    fn coverage_ratio_zero_span_is_zero() {
        assert_eq!(coverage_ratio(0.0, 0.0, 0.0), 0.0);
    }
}
