/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! The container: preamble, ordered block list, and a lazily-loaded index of
//! forty-eight-hour sections, split between eagerly-parsed metadata and
//! on-demand data access.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tabled::{Table, Tabled};

use crate::block::{
    precision_rank, Coverage, FortyEightHourBlock, MonthlyBlock, MultiYearBlock, SectionHeader,
    MARKER_FORTY_EIGHT_HOUR, MARKER_MONTHLY, MARKER_MULTI_YEAR, MARKER_SECTION_HEADER,
};
use crate::codec::{ByteReader, ByteWriter};
use crate::errors::{CombineError, DecodeError, InputOutputError, WeftError};
use crate::preamble::Preamble;

/// A run of forty-eight-hour blocks following one [`SectionHeader`]. Either
/// materialized up front (`WeftFile::load`) or indexed lazily against an
/// owned byte buffer (`WeftFile::parse_mmap`).
enum SectionRun {
    Eager(Vec<FortyEightHourBlock>),
    Lazy {
        /// Byte offset of the first forty-eight-hour block's marker,
        /// relative to `WeftFile::raw`.
        offset: usize,
        block_size: u16,
        count: u32,
        cache: Mutex<HashMap<usize, FortyEightHourBlock>>,
    },
}

/// A single forty-eight-hour section: its header plus the run of blocks it
/// governs.
struct Section {
    header: SectionHeader,
    run: SectionRun,
}

/// A self-contained, immutable, parsed Weft file. Owns its preamble and
/// every block; each section stores its header and blocks together rather
/// than a block holding a back-pointer to its header, avoiding a cyclic
/// reference between the two.
pub struct WeftFile {
    pub preamble: Preamble,
    multi_year: Vec<MultiYearBlock>,
    monthly: Vec<MonthlyBlock>,
    sections: Vec<Section>,
    /// The bytes this file was parsed from, retained only to back
    /// [`SectionRun::Lazy`] on-demand reads; empty for files assembled by
    /// the writer or loaded eagerly.
    raw: Bytes,
}

impl WeftFile {
    /// Used by [`crate::writer::Writer`] to build a fully in-memory file
    /// with no lazy sections.
    pub(crate) fn assemble(
        preamble: Preamble,
        multi_year: Vec<MultiYearBlock>,
        monthly: Vec<MonthlyBlock>,
        headers: Vec<SectionHeader>,
        blocks: Vec<FortyEightHourBlock>,
    ) -> Self {
        let mut remaining = blocks.into_iter();
        let sections = headers
            .into_iter()
            .map(|header| {
                let run: Vec<FortyEightHourBlock> = (&mut remaining).take(header.block_count as usize).collect();
                Section {
                    header,
                    run: SectionRun::Eager(run),
                }
            })
            .collect();

        Self {
            preamble,
            multi_year,
            monthly,
            sections,
            raw: Bytes::new(),
        }
    }

    /// Loads and fully materializes a Weft file from `path`: the file is
    /// memory-mapped, then copied onto the heap into an owned `Bytes` (the
    /// simpler of the two resource policies — the mapping need not outlive
    /// the returned `WeftFile`).
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, WeftError> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| WeftError::Io {
            action: "opening weft file".to_string(),
            source: InputOutputError::from(e.kind()),
        })?;
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| WeftError::Io {
            action: "memory-mapping weft file".to_string(),
            source: InputOutputError::from(e.kind()),
        })?;
        let bytes = Bytes::copy_from_slice(&mmap[..]);
        Self::parse(bytes, true).map_err(WeftError::from)
    }

    /// Parses `path` behind a memory map without the up-front heap copy,
    /// keeping forty-eight-hour sections lazily indexed against the
    /// mapping. For the large-file path where materializing every 48h
    /// block eagerly would be wasteful.
    pub fn parse_mmap(path: impl AsRef<std::path::Path>) -> Result<Self, WeftError> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| WeftError::Io {
            action: "opening weft file".to_string(),
            source: InputOutputError::from(e.kind()),
        })?;
        let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| WeftError::Io {
            action: "memory-mapping weft file".to_string(),
            source: InputOutputError::from(e.kind()),
        })?;
        let bytes = Bytes::copy_from_slice(&mmap[..]);
        Self::parse(bytes, false).map_err(WeftError::from)
    }

    /// Parses an in-memory buffer. `eager` controls whether 48h sections are
    /// fully materialized (`true`, used by [`Self::load`]) or left as a lazy
    /// index against `bytes` (`false`, used by [`Self::parse_mmap`]).
    pub fn parse(bytes: Bytes, eager: bool) -> Result<Self, DecodeError> {
        let text_end = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| DecodeError::PreambleInvalid {
                reason: "no newline-terminated preamble line found".to_string(),
            })?;
        let line = std::str::from_utf8(&bytes[..text_end]).map_err(|_| DecodeError::PreambleInvalid {
            reason: "preamble is not valid UTF-8".to_string(),
        })?;
        let preamble = Preamble::parse(line)?;

        let mut r = ByteReader::new(&bytes[text_end + 1..]);
        let base_offset = text_end + 1;

        let mut multi_year = Vec::new();
        let mut monthly = Vec::new();
        let mut sections: Vec<Section> = Vec::new();

        let mut highest_rank_seen: Option<u8> = None;
        let mut active_header: Option<SectionHeader> = None;
        let mut active_remaining: u32 = 0;
        let mut active_run: Vec<FortyEightHourBlock> = Vec::new();
        let mut active_run_offset = 0usize;

        while !r.is_empty() {
            let marker = r.peek_u16_be()?;

            if marker == MARKER_FORTY_EIGHT_HOUR && active_header.is_none() {
                return Err(DecodeError::NoActiveSectionHeader);
            }

            if let Some(header) = active_header {
                if marker != MARKER_FORTY_EIGHT_HOUR {
                    if active_remaining != 0 {
                        return Err(DecodeError::BlockCountMismatch {
                            expected: header.block_count as usize,
                            found: (header.block_count - active_remaining) as usize,
                        });
                    }
                    finish_section(&mut sections, header, std::mem::take(&mut active_run), eager, active_run_offset);
                    active_header = None;
                }
            }

            let rank = precision_rank(marker).ok_or(DecodeError::BadMarker {
                expected: MARKER_MULTI_YEAR,
                found: marker,
                offset: base_offset + r.position(),
            })?;
            if let Some(highest) = highest_rank_seen {
                if rank < highest {
                    return Err(DecodeError::OutOfOrderBlock { found: marker });
                }
            }
            highest_rank_seen = Some(highest_rank_seen.map_or(rank, |h| h.max(rank)));

            match marker {
                MARKER_MULTI_YEAR => {
                    r.skip(2)?;
                    multi_year.push(MultiYearBlock::deserialize(&mut r)?);
                }
                MARKER_MONTHLY => {
                    r.skip(2)?;
                    monthly.push(MonthlyBlock::deserialize(&mut r)?);
                }
                MARKER_SECTION_HEADER => {
                    r.skip(2)?;
                    let header = SectionHeader::deserialize(&mut r)?;
                    active_remaining = header.block_count;
                    active_run = Vec::new();
                    active_run_offset = base_offset + r.position();
                    active_header = Some(header);
                }
                MARKER_FORTY_EIGHT_HOUR => {
                    let header = active_header.expect("checked above");
                    r.skip(2)?;
                    let block = FortyEightHourBlock::deserialize(&mut r, &header)?;
                    active_run.push(block);
                    active_remaining -= 1;
                }
                other => {
                    return Err(DecodeError::BadMarker {
                        expected: MARKER_MULTI_YEAR,
                        found: other,
                        offset: base_offset + r.position(),
                    })
                }
            }
        }

        if let Some(header) = active_header {
            if active_remaining != 0 {
                return Err(DecodeError::BlockCountMismatch {
                    expected: header.block_count as usize,
                    found: (header.block_count - active_remaining) as usize,
                });
            }
            finish_section(&mut sections, header, active_run, eager, active_run_offset);
        }

        Ok(Self {
            preamble,
            multi_year,
            monthly,
            sections,
            raw: bytes,
        })
    }

    /// Serializes the preamble, then every block in canonical precision
    /// order (multi-year, monthly, 48h sections).
    pub fn serialize(&self, w: &mut ByteWriter) -> Result<(), DecodeError> {
        w.extend_from_bytes(self.preamble.render().as_bytes());
        w.put_u8(b'\n');

        for block in &self.multi_year {
            block.serialize(w);
        }
        for block in &self.monthly {
            block.serialize(w);
        }
        for section in &self.sections {
            section.header.serialize(w);
            for block in self.section_blocks(section)? {
                block.serialize(w, section.header.block_size)?;
            }
        }
        Ok(())
    }

    /// Materializes every block in a section, touching the lazy cache if
    /// needed.
    fn section_blocks(&self, section: &Section) -> Result<Vec<FortyEightHourBlock>, DecodeError> {
        match &section.run {
            SectionRun::Eager(blocks) => Ok(blocks.clone()),
            SectionRun::Lazy { offset, block_size, count, cache } => {
                (0..*count as usize)
                    .map(|idx| self.load_lazy_block(*offset, *block_size, cache, idx))
                    .collect()
            }
        }
    }

    /// Materializes (and caches) the `idx`-th block of a lazy section run.
    fn load_lazy_block(
        &self,
        run_offset: usize,
        block_size: u16,
        cache: &Mutex<HashMap<usize, FortyEightHourBlock>>,
        idx: usize,
    ) -> Result<FortyEightHourBlock, DecodeError> {
        let mut guard = cache.lock().expect("section cache mutex poisoned");
        if let Some(block) = guard.get(&idx) {
            return Ok(block.clone());
        }

        let byte_offset = run_offset + idx * block_size as usize;
        let block_bytes = &self.raw[byte_offset..byte_offset + block_size as usize];
        let mut r = ByteReader::new(block_bytes);
        let marker = r.take_u16_be()?;
        if marker != MARKER_FORTY_EIGHT_HOUR {
            return Err(DecodeError::BadMarker {
                expected: MARKER_FORTY_EIGHT_HOUR,
                found: marker,
                offset: byte_offset,
            });
        }
        let header = SectionHeader {
            start_y: 0,
            start_m: 1,
            start_d: 1,
            end_y: 0,
            end_m: 1,
            end_d: 1,
            block_size,
            block_count: 1,
        };
        let block = FortyEightHourBlock::deserialize(&mut r, &header)?;
        guard.insert(idx, block.clone());
        Ok(block)
    }

    pub fn multi_year_blocks(&self) -> &[MultiYearBlock] {
        &self.multi_year
    }

    pub fn monthly_blocks(&self) -> &[MonthlyBlock] {
        &self.monthly
    }

    pub fn section_headers(&self) -> impl Iterator<Item = &SectionHeader> {
        self.sections.iter().map(|s| &s.header)
    }

    /// Returns the `idx`-th forty-eight-hour block of the section governed
    /// by `header`, materializing it from the lazy cache if necessary.
    pub(crate) fn forty_eight_hour_block(&self, header: &SectionHeader, idx: usize) -> Result<FortyEightHourBlock, DecodeError> {
        let section = self
            .sections
            .iter()
            .find(|s| std::ptr::eq(&s.header, header))
            .expect("header must belong to this file");
        match &section.run {
            SectionRun::Eager(blocks) => Ok(blocks[idx].clone()),
            SectionRun::Lazy { offset, block_size, cache, .. } => {
                self.load_lazy_block(*offset, *block_size, cache, idx)
            }
        }
    }

    /// The number of blocks materialized (or indexed) for the section
    /// governed by `header`.
    pub(crate) fn forty_eight_hour_block_count(&self, header: &SectionHeader) -> usize {
        self.sections
            .iter()
            .find(|s| std::ptr::eq(&s.header, header))
            .map(|s| match &s.run {
                SectionRun::Eager(blocks) => blocks.len(),
                SectionRun::Lazy { count, .. } => *count as usize,
            })
            .unwrap_or(0)
    }

    /// Concatenates `files` into one, after validating preamble-field
    /// equality. Every block kind is sorted into canonical order (multi-year
    /// by `start_year`, monthly by `(year, month)`, forty-eight-hour
    /// chronologically per resulting section) so combining the same inputs
    /// in any order serializes byte-identically; `block_count`/`block_size`
    /// are recomputed from the merged contents. `new_timespan` overrides the
    /// recomputed timespan if supplied.
    pub fn combine(files: &[WeftFile], new_timespan: Option<String>) -> Result<WeftFile, CombineError> {
        let first = files.first().ok_or(CombineError::NoInputs)?;
        for other in &files[1..] {
            first.preamble.check_combinable_with(&other.preamble)?;
        }

        let mut multi_year = Vec::new();
        let mut monthly = Vec::new();
        let mut all_fh_blocks: Vec<FortyEightHourBlock> = Vec::new();

        for file in files {
            multi_year.extend(file.multi_year.iter().cloned());
            monthly.extend(file.monthly.iter().cloned());
            for section in &file.sections {
                let blocks = file.section_blocks(section).map_err(|source| CombineError::Decode { source })?;
                all_fh_blocks.extend(blocks);
            }
        }

        // Canonical order for every block kind, so combine([A,B]) and
        // combine([B,A]) serialize identically regardless of input order.
        multi_year.sort_by_key(|b: &MultiYearBlock| b.start_year);
        monthly.sort_by_key(|b: &MonthlyBlock| (b.year, b.month));
        all_fh_blocks.sort_by_key(|b| (b.y, b.m, b.d));
        all_fh_blocks.dedup_by_key(|b| (b.y, b.m, b.d));

        let mut sections = Vec::new();
        let mut run: Vec<FortyEightHourBlock> = Vec::new();
        for block in all_fh_blocks {
            if let Some(last) = run.last() {
                let gap_days = days_between(last, &block);
                if gap_days > 1 {
                    sections.push(finish_combined_run(std::mem::take(&mut run)));
                }
            }
            run.push(block);
        }
        if !run.is_empty() {
            sections.push(finish_combined_run(run));
        }

        let mut preamble = first.preamble.clone();
        if let Some(timespan) = new_timespan {
            preamble.timespan = timespan;
        }

        let mut headers = Vec::new();
        let mut blocks = Vec::new();
        for (header, section_blocks) in sections {
            headers.push(header);
            blocks.extend(section_blocks);
        }

        Ok(WeftFile::assemble(preamble, multi_year, monthly, headers, blocks))
    }

    /// Renders a `tabled` listing of every block in this file: kind,
    /// coverage start/end, coefficient count.
    pub fn describe(&self) -> Result<String, DecodeError> {
        let mut rows = Vec::new();

        for block in &self.multi_year {
            let (start, end) = block.coverage();
            rows.push(BlockRow {
                kind: "multi-year".to_string(),
                start: start.to_string(),
                end: end.to_string(),
                coef_count: block.coeffs.len(),
            });
        }
        for block in &self.monthly {
            let (start, end) = block.coverage();
            rows.push(BlockRow {
                kind: "monthly".to_string(),
                start: start.to_string(),
                end: end.to_string(),
                coef_count: block.coeffs.len(),
            });
        }
        for section in &self.sections {
            for block in self.section_blocks(section)? {
                let (start, end) = block.coverage();
                rows.push(BlockRow {
                    kind: "48h".to_string(),
                    start: start.to_string(),
                    end: end.to_string(),
                    coef_count: block.coeffs.len(),
                });
            }
        }

        Ok(Table::new(rows).to_string())
    }
}

fn days_between(a: &FortyEightHourBlock, b: &FortyEightHourBlock) -> i64 {
    let ea = hifitime::Epoch::from_gregorian_utc_at_midnight(a.y as i32, a.m, a.d);
    let eb = hifitime::Epoch::from_gregorian_utc_at_midnight(b.y as i32, b.m, b.d);
    ((eb - ea).to_seconds() / 86_400.0).round() as i64
}

fn finish_combined_run(run: Vec<FortyEightHourBlock>) -> (SectionHeader, Vec<FortyEightHourBlock>) {
    let first = run.first().expect("non-empty run");
    let last = run.last().expect("non-empty run");
    let block_size = 6 + 4 * first.coeffs.len();
    let header = SectionHeader {
        start_y: first.y,
        start_m: first.m,
        start_d: first.d,
        end_y: last.y,
        end_m: last.m,
        end_d: last.d,
        block_size: block_size as u16,
        block_count: run.len() as u32,
    };
    (header, run)
}

fn finish_section(
    sections: &mut Vec<Section>,
    header: SectionHeader,
    run: Vec<FortyEightHourBlock>,
    eager: bool,
    run_offset: usize,
) {
    let section_run = if eager {
        SectionRun::Eager(run)
    } else {
        SectionRun::Lazy {
            offset: run_offset,
            block_size: header.block_size,
            count: header.block_count,
            cache: Mutex::new(HashMap::new()),
        }
    };
    sections.push(Section { header, run: section_run });
}

#[derive(Tabled)]
struct BlockRow {
    kind: String,
    start: String,
    end: String,
    coef_count: usize,
}

#[cfg(test)]
mod file_ut {
    use super::*;
    use crate::value_behavior::ValueBehavior;

    fn sample_preamble() -> Preamble {
        Preamble {
            id: "mars".to_string(),
            data_source: "jpl:horizons".to_string(),
            timespan: "2024".to_string(),
            precision_bits: 32,
            quantity: "longitude".to_string(),
            value_behavior: ValueBehavior::Wrapping { min: 0.0, max: 360.0 },
            generated_at: "generated@24-01-01T00:00:00".to_string(),
        }
    }

    #[test]
    fn roundtrip_monthly_only_file() {
        let block = MonthlyBlock {
            year: 2024,
            month: 1,
            day_count: 31,
            coeffs: vec![120.5, 0.1],
        };
        let file = WeftFile::assemble(sample_preamble(), Vec::new(), vec![block.clone()], Vec::new(), Vec::new());

        let mut w = ByteWriter::new();
        file.serialize(&mut w).unwrap();
        let bytes = Bytes::from(w.into_vec());

        let parsed = WeftFile::parse(bytes, true).unwrap();
        assert_eq!(parsed.preamble, sample_preamble());
        assert_eq!(parsed.monthly_blocks(), &[block]);
    }

    #[test]
    fn combine_rejects_incompatible_preambles() {
        let a = WeftFile::assemble(sample_preamble(), Vec::new(), Vec::new(), Vec::new(), Vec::new());
        let mut preamble_b = sample_preamble();
        preamble_b.value_behavior = ValueBehavior::Bounded { min: -90.0, max: 90.0 };
        let b = WeftFile::assemble(preamble_b, Vec::new(), Vec::new(), Vec::new(), Vec::new());

        let err = WeftFile::combine(&[a, b], None).unwrap_err();
        assert!(matches!(err, CombineError::IncompatiblePreamble { field: "value_behavior", .. }));
    }

    #[test]
    fn out_of_order_block_rejected() {
        let mut w = ByteWriter::new();
        w.extend_from_bytes(sample_preamble().render().as_bytes());
        w.put_u8(b'\n');
        // A monthly block (rank 1) followed by a multi-year block (rank 0) is out of order.
        MonthlyBlock {
            year: 2024,
            month: 1,
            day_count: 31,
            coeffs: vec![0.0],
        }
        .serialize(&mut w);
        MultiYearBlock {
            start_year: 2000,
            duration_years: 10,
            coeffs: vec![0.0],
        }
        .serialize(&mut w);

        let bytes = Bytes::from(w.into_vec());
        assert!(matches!(
            WeftFile::parse(bytes, true),
            Err(DecodeError::OutOfOrderBlock { .. })
        ));
    }

    #[test]
    fn section_block_count_mismatch_detected() {
        let mut w = ByteWriter::new();
        w.extend_from_bytes(sample_preamble().render().as_bytes());
        w.put_u8(b'\n');

        let header = SectionHeader {
            start_y: 2024,
            start_m: 1,
            start_d: 1,
            end_y: 2024,
            end_m: 1,
            end_d: 3,
            block_size: 14,
            block_count: 3,
        };
        header.serialize(&mut w);

        let block = FortyEightHourBlock {
            y: 2024,
            m: 1,
            d: 1,
            coeffs: vec![1.0, 2.0],
        };
        block.serialize(&mut w, 14).unwrap();
        let block2 = FortyEightHourBlock {
            y: 2024,
            m: 1,
            d: 2,
            coeffs: vec![1.0, 2.0],
        };
        block2.serialize(&mut w, 14).unwrap();
        // Declared block_count=3 but only 2 blocks are followed by EOF.

        let bytes = Bytes::from(w.into_vec());
        assert!(matches!(
            WeftFile::parse(bytes, true),
            Err(DecodeError::BlockCountMismatch { expected: 3, found: 2 })
        ));
    }
}
