/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Multi-precision block generation: samples a [`DataSource`], fits
//! coefficients per candidate block, and assembles a [`WeftFile`].

use hifitime::{Epoch, TimeUnits};
use log::warn;

use crate::block::{normalize, FortyEightHourBlock, MonthlyBlock, MultiYearBlock, SectionHeader};
use crate::errors::WriteError;
use crate::file::WeftFile;
use crate::math::{fit, unwrap_angles};
use crate::policy::{coverage_ratio, get_recommended_blocks, DEFAULT_COVERAGE_THRESHOLD, DEFAULT_MIN_SAMPLES_PER_DAY};
use crate::preamble::Preamble;
use crate::source::DataSource;
use crate::value_behavior::ValueBehavior;

/// Per-kind block generation parameters plus the preamble literals. Uses
/// `..Default::default()` update syntax, the idiom for this crate's other
/// configuration-shaped structs.
#[derive(Clone, Debug)]
pub struct WriterConfig {
    pub multi_year_enabled: bool,
    pub multi_year_sample_count: u32,
    pub multi_year_polynomial_degree: u32,

    pub monthly_enabled: bool,
    pub monthly_sample_count: u32,
    pub monthly_polynomial_degree: u32,

    pub forty_eight_hour_enabled: bool,
    pub forty_eight_hour_sample_count: u32,
    pub forty_eight_hour_polynomial_degree: u32,
    pub force_forty_eight_hour_blocks: bool,

    pub custom_timespan: Option<String>,

    pub id: String,
    pub data_source: String,
    pub quantity: String,
    pub value_behavior: ValueBehavior,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            multi_year_enabled: true,
            multi_year_sample_count: 50,
            multi_year_polynomial_degree: 14,
            monthly_enabled: true,
            monthly_sample_count: 48,
            monthly_polynomial_degree: 9,
            forty_eight_hour_enabled: true,
            forty_eight_hour_sample_count: 48,
            forty_eight_hour_polynomial_degree: 5,
            force_forty_eight_hour_blocks: false,
            custom_timespan: None,
            id: String::new(),
            data_source: String::new(),
            quantity: String::new(),
            value_behavior: ValueBehavior::Unbounded,
        }
    }
}

impl WriterConfig {
    /// Builds a config from [`get_recommended_blocks`], keeping the
    /// preamble literal fields the caller must still supply.
    pub fn auto(source: &dyn DataSource, id: String, data_source: String, quantity: String, value_behavior: ValueBehavior) -> Self {
        let policy = get_recommended_blocks(source);
        Self {
            multi_year_enabled: policy.multi_year.enabled,
            multi_year_sample_count: policy.multi_year.sample_count,
            multi_year_polynomial_degree: policy.multi_year.polynomial_degree,
            monthly_enabled: policy.monthly.enabled,
            monthly_sample_count: policy.monthly.sample_count,
            monthly_polynomial_degree: policy.monthly.polynomial_degree,
            forty_eight_hour_enabled: policy.forty_eight_hour.enabled,
            forty_eight_hour_sample_count: policy.forty_eight_hour.sample_count,
            forty_eight_hour_polynomial_degree: policy.forty_eight_hour.polynomial_degree,
            force_forty_eight_hour_blocks: false,
            custom_timespan: None,
            id,
            data_source,
            quantity,
            value_behavior,
        }
    }
}

/// Stateless entry point; `write` is the crate's only public operation here,
/// preferring a single-method driver over a long-lived writer object with
/// internal mutable state.
pub struct Writer;

impl Writer {
    /// Samples `source` per `config`, fits every eligible block, and
    /// assembles the resulting [`WeftFile`]. Never invents data: a candidate
    /// block whose coverage ratio falls below threshold is silently skipped
    /// (with a warning logged), not synthesized from neighboring blocks.
    pub fn write(source: &dyn DataSource, config: &WriterConfig) -> Result<WeftFile, WriteError> {
        let start = source.start();
        let end = source.end();
        if start >= end {
            return Err(WriteError::EmptyDataSource);
        }

        let multi_year = if config.multi_year_enabled {
            build_multi_year_blocks(source, config)?
        } else {
            Vec::new()
        };

        let monthly = if config.monthly_enabled {
            build_monthly_blocks(source, config)?
        } else {
            Vec::new()
        };

        let (sections, forty_eight_hour) = if config.forty_eight_hour_enabled {
            build_forty_eight_hour_sections(source, config)?
        } else {
            (Vec::new(), Vec::new())
        };

        let timespan = config
            .custom_timespan
            .clone()
            .unwrap_or_else(|| infer_timespan(start, end));

        let preamble = Preamble {
            id: config.id.clone(),
            data_source: config.data_source.clone(),
            timespan,
            precision_bits: 32,
            quantity: config.quantity.clone(),
            value_behavior: config.value_behavior,
            generated_at: Preamble::generated_at_token(Epoch::now().unwrap_or(start)),
        };

        Ok(WeftFile::assemble(preamble, multi_year, monthly, sections, forty_eight_hour))
    }
}

/// Fits `degree + 1` coefficients to `sample_count` evenly spaced samples of
/// `source` taken across `[sample_start, sample_end]` (typically the data
/// source's clipped overlap with a candidate block), applying
/// angle-unwrapping first for wrapping value behaviors.
///
/// Each sample's `x` coordinate is `normalize(t, coverage_start,
/// coverage_end)` over the block's full *nominal* coverage interval, not
/// `[sample_start, sample_end]` — the reader's `eval_raw` always maps `t`
/// through the same nominal coverage (`src/block/mod.rs`'s `normalize`), so
/// the fit must use that exact frame or the stored coefficients answer for
/// the wrong instant whenever a block's coverage is only partially filled
/// by the data source (every boundary block).
fn fit_clip(
    source: &dyn DataSource,
    coverage_start: Epoch,
    coverage_end: Epoch,
    sample_start: Epoch,
    sample_end: Epoch,
    sample_count: u32,
    degree: u32,
    value_behavior: ValueBehavior,
) -> Result<Vec<f32>, WriteError> {
    let n = sample_count.max(1) as usize;
    let sample_span_s = (sample_end - sample_start).to_seconds();

    let mut xs = Vec::with_capacity(n);
    let mut raw_ys = Vec::with_capacity(n);
    for i in 0..n {
        let frac = if n == 1 { 0.0 } else { i as f64 / (n - 1) as f64 };
        let t = sample_start + (frac * sample_span_s).seconds();
        xs.push(normalize(t, coverage_start, coverage_end));
        raw_ys.push(source.value_at(t));
    }

    let ys = match value_behavior {
        ValueBehavior::Wrapping { min, max } => unwrap_angles(&raw_ys, min, max),
        _ => raw_ys,
    };

    let samples: Vec<(f64, f64)> = xs.into_iter().zip(ys).collect();
    let coeffs = fit(&samples, degree as usize).map_err(|source| WriteError::Fit { source })?;
    Ok(coeffs.into_iter().map(|c| c as f32).collect())
}

fn build_multi_year_blocks(source: &dyn DataSource, config: &WriterConfig) -> Result<Vec<MultiYearBlock>, WriteError> {
    let (start_year, _, _, _, _, _, _) = source.start().to_gregorian_utc();
    let (end_year, _, _, _, _, _, _) = source.end().to_gregorian_utc();

    let span_start_year = start_year - (start_year.rem_euclid(10));
    let mut blocks = Vec::new();
    let mut decade_start = span_start_year;

    while decade_start <= end_year {
        let block_start = Epoch::from_gregorian_utc_at_midnight(decade_start, 1, 1);
        let block_end = Epoch::from_gregorian_utc_at_midnight(decade_start + 10, 1, 1);

        let clip_start = block_start.max(source.start());
        let clip_end = block_end.min(source.end());

        if clip_start < clip_end {
            let nominal_span_s = (block_end - block_start).to_seconds();
            let ratio = coverage_ratio(
                0.0,
                (clip_end - clip_start).to_seconds(),
                nominal_span_s,
            );
            if ratio < DEFAULT_COVERAGE_THRESHOLD {
                warn!(
                    "skipping multi-year block {decade_start}-{}: coverage ratio {ratio:.3} below threshold {DEFAULT_COVERAGE_THRESHOLD}",
                    decade_start + 10
                );
            } else {
                let coeffs = fit_clip(
                    source,
                    block_start,
                    block_end,
                    clip_start,
                    clip_end,
                    config.multi_year_sample_count,
                    config.multi_year_polynomial_degree,
                    config.value_behavior,
                )?;
                blocks.push(MultiYearBlock {
                    start_year: decade_start as i16,
                    duration_years: 10,
                    coeffs,
                });
            }
        }

        decade_start += 10;
    }

    Ok(blocks)
}

fn build_monthly_blocks(source: &dyn DataSource, config: &WriterConfig) -> Result<Vec<MonthlyBlock>, WriteError> {
    let mut blocks = Vec::new();
    let (mut year, mut month, _, _, _, _, _) = source.start().to_gregorian_utc();
    let (end_year, end_month, _, _, _, _, _) = source.end().to_gregorian_utc();

    loop {
        let month_start = Epoch::from_gregorian_utc_at_midnight(year, month, 1);
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let month_end = Epoch::from_gregorian_utc_at_midnight(next_year, next_month, 1);

        let clip_start = month_start.max(source.start());
        let clip_end = month_end.min(source.end());

        if clip_start < clip_end {
            let nominal_span_s = (month_end - month_start).to_seconds();
            let ratio = coverage_ratio(0.0, (clip_end - clip_start).to_seconds(), nominal_span_s);
            if ratio < DEFAULT_COVERAGE_THRESHOLD {
                warn!(
                    "skipping monthly block {year}-{month:02}: coverage ratio {ratio:.3} below threshold {DEFAULT_COVERAGE_THRESHOLD}"
                );
            } else {
                // A monthly block can only be truncated on its right edge
                // (the format always starts a month block at day 1); when
                // the data source ends mid-month, declare `day_count` to
                // match the clipped span rather than the full calendar
                // month, so the block's declared coverage agrees with the
                // interval it was actually fit against.
                let block_end = clip_end;
                let day_count = (((block_end - month_start).to_seconds() / 86_400.0).round() as u8).max(1);
                let coeffs = fit_clip(
                    source,
                    month_start,
                    block_end,
                    clip_start,
                    clip_end,
                    config.monthly_sample_count,
                    config.monthly_polynomial_degree,
                    config.value_behavior,
                )?;
                blocks.push(MonthlyBlock {
                    year: year as i16,
                    month,
                    day_count,
                    coeffs,
                });
            }
        }

        if year > end_year || (year == end_year && month >= end_month) {
            break;
        }
        year = next_year;
        month = next_month;
    }

    Ok(blocks)
}

fn build_forty_eight_hour_sections(
    source: &dyn DataSource,
    config: &WriterConfig,
) -> Result<(Vec<SectionHeader>, Vec<FortyEightHourBlock>), WriteError> {
    let start_date = truncate_to_day(source.start());
    let end_date = truncate_to_day(source.end());

    let timestamps: Vec<Epoch> = source.timestamps().collect();

    let mut included_days = Vec::new();
    let mut day = start_date;
    while day <= end_date {
        let window_start = day - 24.hours();
        let window_end = day + 24.hours();

        let in_window = timestamps
            .iter()
            .filter(|t| **t >= window_start && **t < window_end)
            .count();
        let span_days = 2.0;
        let samples_per_day = in_window as f64 / span_days;

        let t_min = timestamps.iter().filter(|t| **t >= window_start && **t < window_end).min();
        let t_max = timestamps.iter().filter(|t| **t >= window_start && **t < window_end).max();
        let ratio = match (t_min, t_max) {
            (Some(&tmin), Some(&tmax)) => {
                coverage_ratio(0.0, (tmax - tmin).to_seconds(), (window_end - window_start).to_seconds())
            }
            _ => 0.0,
        };

        let eligible = config.force_forty_eight_hour_blocks
            || (samples_per_day >= DEFAULT_MIN_SAMPLES_PER_DAY && ratio >= DEFAULT_COVERAGE_THRESHOLD);

        if eligible {
            included_days.push(day);
        } else {
            warn!(
                "skipping 48h block centered on {day:?}: density={samples_per_day:.1}/day coverage={ratio:.3}"
            );
        }

        day += 1.days();
    }

    let mut headers = Vec::new();
    let mut blocks = Vec::new();
    let mut run_start_idx = 0;

    while run_start_idx < included_days.len() {
        let mut run_end_idx = run_start_idx;
        while run_end_idx + 1 < included_days.len()
            && (included_days[run_end_idx + 1] - included_days[run_end_idx]).to_seconds() <= 86_400.0
        {
            run_end_idx += 1;
        }

        let mut run_blocks = Vec::new();
        for &day in &included_days[run_start_idx..=run_end_idx] {
            let window_start = day - 24.hours();
            let window_end = day + 24.hours();
            let coeffs = fit_clip(
                source,
                window_start,
                window_end,
                window_start.max(source.start()),
                window_end.min(source.end()),
                config.forty_eight_hour_sample_count,
                config.forty_eight_hour_polynomial_degree,
                config.value_behavior,
            )?;
            let (y, m, d, _, _, _, _) = day.to_gregorian_utc();
            run_blocks.push(FortyEightHourBlock { y: y as i16, m, d, coeffs });
        }

        let block_size = run_blocks
            .first()
            .map(|b| 6 + 4 * b.coeffs.len())
            .unwrap_or(0) as u16;

        let (sy, sm, sd, _, _, _, _) = included_days[run_start_idx].to_gregorian_utc();
        let (ey, em, ed, _, _, _, _) = included_days[run_end_idx].to_gregorian_utc();

        headers.push(SectionHeader {
            start_y: sy as i16,
            start_m: sm,
            start_d: sd,
            end_y: ey as i16,
            end_m: em,
            end_d: ed,
            block_size,
            block_count: run_blocks.len() as u32,
        });
        blocks.extend(run_blocks);

        run_start_idx = run_end_idx + 1;
    }

    Ok((headers, blocks))
}

fn truncate_to_day(t: Epoch) -> Epoch {
    let (y, m, d, _, _, _, _) = t.to_gregorian_utc();
    Epoch::from_gregorian_utc_at_midnight(y, m, d)
}

/// `2000s` when start/end lie within one decade (±1 day buffer), `2000` when
/// they lie within one calendar year (±1 day buffer), else `YYYY-YYYY`.
fn infer_timespan(start: Epoch, end: Epoch) -> String {
    let buffer = 1.days();
    let (start_year, _, _, _, _, _, _) = start.to_gregorian_utc();
    let (end_year, _, _, _, _, _, _) = (end - buffer).to_gregorian_utc();

    if start_year == end_year {
        return start_year.to_string();
    }

    let start_decade = start_year - start_year.rem_euclid(10);
    let end_decade = end_year - end_year.rem_euclid(10);
    if start_decade == end_decade {
        return format!("{start_decade}s");
    }

    format!("{start_year}-{end_year}")
}

#[cfg(test)]
mod writer_ut {
    use super::*;
    use crate::source::VecDataSource;

    #[test]
    fn infer_timespan_single_year() {
        let start = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let end = Epoch::from_gregorian_utc_at_midnight(2024, 12, 31);
        assert_eq!(infer_timespan(start, end), "2024");
    }

    #[test]
    fn infer_timespan_decade() {
        let start = Epoch::from_gregorian_utc_at_midnight(2000, 1, 1);
        let end = Epoch::from_gregorian_utc_at_midnight(2009, 6, 1);
        assert_eq!(infer_timespan(start, end), "2000s");
    }

    #[test]
    fn infer_timespan_range() {
        let start = Epoch::from_gregorian_utc_at_midnight(1950, 1, 1);
        let end = Epoch::from_gregorian_utc_at_midnight(2050, 1, 1);
        assert_eq!(infer_timespan(start, end), "1950-2050");
    }

    #[test]
    fn empty_span_rejected() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let source = VecDataSource::new(vec![(t0, 1.0), (t0, 1.0)]);
        let config = WriterConfig::default();
        assert!(matches!(Writer::write(&source, &config), Err(WriteError::EmptyDataSource)));
    }
}
