/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The single UTF-8 header line every Weft file begins with, e.g.
//! `#weft! v0.02 mars jpl:horizons 2000s 32bit longitude wrapping[0,360] chebychevs generated@24-01-01T00:00:00`.

use hifitime::Epoch;

use crate::errors::{CombineError, DecodeError};
use crate::value_behavior::ValueBehavior;

/// Required literal at field index 0.
pub const MAGIC_VERSION: &str = "#weft! v0.02";
/// Required literal at field index 7.
pub const METHOD: &str = "chebychevs";

/// The parsed form of a Weft file's single header line. `id`, `data_source`
/// and `quantity` are owned `String`s rather than fixed-width buffers since
/// this header is a variable-length text line, not a fixed binary record.
#[derive(Clone, Debug, PartialEq)]
pub struct Preamble {
    pub id: String,
    pub data_source: String,
    /// Human label only (`2000s`, `1900-2100`); never consulted for parsing.
    pub timespan: String,
    /// IEEE 754 float width of the on-disk coefficients. Only `32` is
    /// produced by this crate's writer; read as informational metadata.
    pub precision_bits: u32,
    pub quantity: String,
    pub value_behavior: ValueBehavior,
    /// The raw `generated@...` token, kept only for round-tripping an
    /// already-parsed file; [`crate::writer::Writer`] always regenerates
    /// this from the current time at serialization.
    pub generated_at: String,
}

/// Fields checked for exact match by `combine`: id, data source, precision,
/// quantity, value behavior, and method must agree byte-for-byte across
/// inputs. `timespan` and `generated-at` are recomputed instead.
const COMBINE_INVARIANT_FIELDS: &[&str] = &[
    "id",
    "data_source",
    "precision_bits",
    "quantity",
    "value_behavior",
    "method",
];

impl Preamble {
    /// Parses a single preamble line (without its trailing `\n`).
    pub fn parse(line: &str) -> Result<Self, DecodeError> {
        let fields: Vec<&str> = line.splitn(9, ' ').collect();
        if fields.len() < 8 {
            return Err(DecodeError::PreambleInvalid {
                reason: format!("expected at least 8 space-separated fields, got {}", fields.len()),
            });
        }

        let magic_version = format!("{} {}", fields[0], fields[1]);
        if magic_version != MAGIC_VERSION {
            return Err(DecodeError::PreambleInvalid {
                reason: format!("expected magic/version `{MAGIC_VERSION}`, got `{magic_version}`"),
            });
        }

        let id = fields[2].to_string();
        let data_source = fields[3].to_string();
        let timespan = fields[4].to_string();

        let precision_bits = parse_precision(fields[5])?;
        let quantity = fields[6].to_string();
        let value_behavior = ValueBehavior::parse(fields[7]).ok_or_else(|| DecodeError::PreambleInvalid {
            reason: format!("unparseable value-behavior token `{}`", fields[7]),
        })?;

        let method = fields.get(8).map(|rest| {
            rest.split(' ').next().unwrap_or_default()
        });
        if let Some(method) = method {
            if method != METHOD {
                return Err(DecodeError::PreambleInvalid {
                    reason: format!("expected method literal `{METHOD}`, got `{method}`"),
                });
            }
        }

        let generated_at = fields
            .get(8)
            .and_then(|rest| rest.splitn(2, ' ').nth(1))
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            id,
            data_source,
            timespan,
            precision_bits,
            quantity,
            value_behavior,
            generated_at,
        })
    }

    /// Renders this preamble as its on-disk line, without a trailing `\n`.
    pub fn render(&self) -> String {
        format!(
            "{} {} {} {} {}bit {} {} {} {}",
            MAGIC_VERSION,
            self.id,
            self.data_source,
            self.timespan,
            self.precision_bits,
            self.quantity,
            self.value_behavior,
            METHOD,
            self.generated_at,
        )
    }

    /// Produces the `generated@YY-MM-DDThh:mm:ss` token for `at`.
    pub fn generated_at_token(at: Epoch) -> String {
        let (y, m, d, hh, mm, ss, _) = at.to_gregorian_utc();
        format!(
            "generated@{:02}-{:02}-{:02}T{:02}:{:02}:{:02}",
            y.rem_euclid(100),
            m,
            d,
            hh,
            mm,
            ss
        )
    }

    /// Checks that `self` and `other` agree on every field `combine`
    /// requires to match, returning the first mismatch found.
    pub fn check_combinable_with(&self, other: &Self) -> Result<(), CombineError> {
        let pairs: [(&'static str, String, String); 6] = [
            ("id", self.id.clone(), other.id.clone()),
            ("data_source", self.data_source.clone(), other.data_source.clone()),
            (
                "precision_bits",
                self.precision_bits.to_string(),
                other.precision_bits.to_string(),
            ),
            ("quantity", self.quantity.clone(), other.quantity.clone()),
            (
                "value_behavior",
                self.value_behavior.to_string(),
                other.value_behavior.to_string(),
            ),
            ("method", METHOD.to_string(), METHOD.to_string()),
        ];

        for (field, left, right) in pairs {
            if left != right {
                debug_assert!(COMBINE_INVARIANT_FIELDS.contains(&field));
                return Err(CombineError::IncompatiblePreamble { field, left, right });
            }
        }
        Ok(())
    }
}

fn parse_precision(token: &str) -> Result<u32, DecodeError> {
    token
        .strip_suffix("bit")
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| DecodeError::PreambleInvalid {
            reason: format!("expected a precision token like `32bit`, got `{token}`"),
        })
}

#[cfg(test)]
mod preamble_ut {
    use super::*;

    fn sample_line() -> String {
        "#weft! v0.02 mars jpl:horizons 2000s 32bit longitude wrapping[0,360] chebychevs generated@24-01-01T00:00:00"
            .to_string()
    }

    #[test]
    fn parse_then_render_roundtrips() {
        let line = sample_line();
        let preamble = Preamble::parse(&line).unwrap();
        assert_eq!(preamble.id, "mars");
        assert_eq!(preamble.data_source, "jpl:horizons");
        assert_eq!(preamble.timespan, "2000s");
        assert_eq!(preamble.precision_bits, 32);
        assert_eq!(preamble.quantity, "longitude");
        assert_eq!(
            preamble.value_behavior,
            ValueBehavior::Wrapping {
                min: 0.0,
                max: 360.0
            }
        );
        assert_eq!(preamble.generated_at, "generated@24-01-01T00:00:00");
        assert_eq!(preamble.render(), line);
    }

    #[test]
    fn rejects_wrong_magic_version() {
        let line = "#weft! v0.01 mars jpl:horizons 2000s 32bit longitude wrapping[0,360] chebychevs generated@24-01-01T00:00:00";
        assert!(matches!(
            Preamble::parse(line),
            Err(DecodeError::PreambleInvalid { .. })
        ));
    }

    #[test]
    fn combine_check_reports_mismatched_field() {
        let a = Preamble::parse(&sample_line()).unwrap();
        let mut b = a.clone();
        b.value_behavior = ValueBehavior::Bounded {
            min: -90.0,
            max: 90.0,
        };
        let err = a.check_combinable_with(&b).unwrap_err();
        assert_eq!(
            err,
            CombineError::IncompatiblePreamble {
                field: "value_behavior",
                left: "wrapping[0,360]".to_string(),
                right: "bounded[-90,90]".to_string(),
            }
        );
    }

    #[test]
    fn combine_check_accepts_identical_preambles() {
        let a = Preamble::parse(&sample_line()).unwrap();
        let mut b = a.clone();
        b.timespan = "1900-2100".to_string();
        b.generated_at = "generated@24-06-01T00:00:00".to_string();
        assert!(a.check_combinable_with(&b).is_ok());
    }
}
