/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! A single monthly block written then parsed back, plus the general
//! round-trip property: `parse(serialize(w)) == w` structurally.

use approx::assert_relative_eq;
use bytes::Bytes;
use hifitime::{Epoch, TimeUnits};

use weft::codec::ByteWriter;
use weft::prelude::*;

fn hourly_constant_source(value: f64, start: Epoch, end: Epoch) -> VecDataSource {
    VecDataSource::sampled(start, end, 1.hours(), |_| value)
}

#[test]
fn single_monthly_block_roundtrip() {
    let _ = pretty_env_logger::try_init();

    let start = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
    let end = Epoch::from_gregorian_utc_at_midnight(2024, 1, 31) + 23.hours();
    let source = hourly_constant_source(120.5, start, end);

    let config = WriterConfig {
        multi_year_enabled: false,
        monthly_enabled: true,
        forty_eight_hour_enabled: false,
        id: "mars".to_string(),
        data_source: "jpl:horizons".to_string(),
        quantity: "longitude".to_string(),
        value_behavior: ValueBehavior::Wrapping { min: 0.0, max: 360.0 },
        ..Default::default()
    };

    let file = Writer::write(&source, &config).unwrap();
    assert_eq!(file.multi_year_blocks().len(), 0);
    assert_eq!(file.monthly_blocks().len(), 1);

    let block = &file.monthly_blocks()[0];
    assert_eq!(block.year, 2024);
    assert_eq!(block.month, 1);
    assert_eq!(block.day_count, 31);

    let mut w = ByteWriter::new();
    file.serialize(&mut w).unwrap();
    let bytes = Bytes::from(w.into_vec());
    let parsed = WeftFile::parse(bytes, true).unwrap();

    assert_eq!(parsed.preamble, file.preamble);
    assert_eq!(parsed.monthly_blocks(), file.monthly_blocks());

    let reader = Reader::new(&parsed);
    let t = Epoch::from_gregorian_utc_at_midnight(2024, 1, 15) + 12.hours();
    assert_relative_eq!(reader.value_at(t).unwrap(), 120.5, epsilon = 1e-3);
}

#[test]
fn roundtrip_preserves_bit_identical_coefficients() {
    let _ = pretty_env_logger::try_init();

    let start = Epoch::from_gregorian_utc_at_midnight(2023, 1, 1);
    let end = Epoch::from_gregorian_utc_at_midnight(2023, 3, 1);
    let source = VecDataSource::sampled(start, end, 1.hours(), |t| {
        let days = (t - start).to_seconds() / 86_400.0;
        10.0 + 0.5 * days
    });

    let config = WriterConfig {
        multi_year_enabled: false,
        monthly_enabled: true,
        forty_eight_hour_enabled: false,
        id: "ceres".to_string(),
        data_source: "jpl:horizons".to_string(),
        quantity: "distance".to_string(),
        value_behavior: ValueBehavior::Unbounded,
        ..Default::default()
    };

    let file = Writer::write(&source, &config).unwrap();

    let mut w = ByteWriter::new();
    file.serialize(&mut w).unwrap();
    let bytes = Bytes::from(w.into_vec());
    let parsed = WeftFile::parse(bytes, true).unwrap();

    assert_eq!(parsed.monthly_blocks(), file.monthly_blocks());
}
