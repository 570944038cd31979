/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The wrapping-discontinuity law and blend continuity across adjacent
//! forty-eight-hour blocks.

use approx::assert_relative_eq;
use hifitime::{Epoch, TimeUnits};
use rstest::{fixture, rstest};

use weft::prelude::*;

#[fixture]
fn jan_2024() -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(2024, 1, 1)
}

#[rstest]
fn wrapping_discontinuity_reduces_correctly(jan_2024: Epoch) {
    let _ = pretty_env_logger::try_init();

    let start = jan_2024;
    let end = Epoch::from_gregorian_utc_at_midnight(2024, 1, 31) + 23.hours();
    let source = VecDataSource::sampled(start, end, 1.hours(), |t| {
        let hours = (t - start).to_seconds() / 3600.0;
        (hours * 15.0).rem_euclid(360.0)
    });

    let config = WriterConfig {
        multi_year_enabled: false,
        monthly_enabled: true,
        forty_eight_hour_enabled: false,
        id: "rotator".to_string(),
        data_source: "synthetic".to_string(),
        quantity: "longitude".to_string(),
        value_behavior: ValueBehavior::Wrapping { min: 0.0, max: 360.0 },
        ..Default::default()
    };

    let file = Writer::write(&source, &config).unwrap();
    let reader = Reader::new(&file);

    let noon = start + 12.hours();
    assert_relative_eq!(reader.value_at(noon).unwrap(), 180.0, epsilon = 0.5);

    let midnight_jan_2 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 2);
    assert_relative_eq!(reader.value_at(midnight_jan_2).unwrap(), 0.0, epsilon = 0.5);
}

#[rstest]
fn blend_across_midnight_matches_source(jan_2024: Epoch) {
    let _ = pretty_env_logger::try_init();

    let start = jan_2024;
    let end = Epoch::from_gregorian_utc_at_midnight(2024, 1, 3) + 23.hours();
    let source = VecDataSource::sampled(start, end, 15.minutes(), |t| {
        let hours = (t - start).to_seconds() / 3600.0;
        (2.0 * std::f64::consts::PI * hours / 24.0).sin()
    });

    let config = WriterConfig {
        multi_year_enabled: false,
        monthly_enabled: false,
        forty_eight_hour_enabled: true,
        forty_eight_hour_polynomial_degree: 5,
        force_forty_eight_hour_blocks: true,
        id: "wobble".to_string(),
        data_source: "synthetic".to_string(),
        quantity: "phase".to_string(),
        value_behavior: ValueBehavior::Unbounded,
        ..Default::default()
    };

    let file = Writer::write(&source, &config).unwrap();
    let reader = Reader::new_with_verbosity(&file, Verbosity::Trace);

    // Inside the overlap of the Jan-1 and Jan-2 centered blocks.
    let t = start + 18.hours();
    let hours = (t - start).to_seconds() / 3600.0;
    let expected = (2.0 * std::f64::consts::PI * hours / 24.0).sin();
    assert_relative_eq!(reader.value_at(t).unwrap(), expected, epsilon = 1e-2);

    // Squarely inside a single block's window, no blend should occur.
    let single = start + 2.hours();
    let expected_single = (2.0 * std::f64::consts::PI * 2.0 / 24.0).sin();
    assert_relative_eq!(reader.value_at(single).unwrap(), expected_single, epsilon = 1e-2);
}

#[rstest]
fn past_coverage_returns_out_of_range_not_extrapolation(jan_2024: Epoch) {
    let _ = pretty_env_logger::try_init();

    let start = jan_2024;
    let end = Epoch::from_gregorian_utc_at_midnight(2024, 1, 31) + 23.hours();
    let source = VecDataSource::sampled(start, end, 1.hours(), |_| 42.0);

    let config = WriterConfig {
        multi_year_enabled: false,
        monthly_enabled: true,
        forty_eight_hour_enabled: false,
        id: "flat".to_string(),
        data_source: "synthetic".to_string(),
        quantity: "dummy".to_string(),
        value_behavior: ValueBehavior::Unbounded,
        ..Default::default()
    };

    let file = Writer::write(&source, &config).unwrap();
    let reader = Reader::new(&file);

    let far_future = Epoch::from_gregorian_utc_at_midnight(2030, 1, 1);
    assert!(reader.value_at(far_future).is_err());
}
