/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use hifitime::Epoch;
use snafu::prelude::*;
use std::io::ErrorKind as IOErrorKind;

/// Raised when reading or writing the underlying bytes of a Weft file fails.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum InputOutputError {
    /// Raised for an error in reading or writing the file(s)
    IOError { kind: IOErrorKind },
    /// Raised if an IO error occurred but its representation is not simple enough to be an std::io::ErrorKind
    IOUnknownError,
}

impl From<IOErrorKind> for InputOutputError {
    fn from(kind: IOErrorKind) -> Self {
        Self::IOError { kind }
    }
}

/// Errors raised while parsing the preamble line or the block stream of a Weft file.
#[derive(Clone, Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    #[snafu(display("preamble invalid: {reason}"))]
    PreambleInvalid { reason: String },
    #[snafu(display("expected block marker {expected:#06x} but found {found:#06x} at byte offset {offset}"))]
    BadMarker {
        expected: u16,
        found: u16,
        offset: usize,
    },
    #[snafu(display("truncated block: needed {needed} more bytes but only {available} remain"))]
    TruncatedBlock { needed: usize, available: usize },
    #[snafu(display("block declared size {expected} but serialized to {found} bytes"))]
    SizeMismatch { expected: usize, found: usize },
    #[snafu(display(
        "section header declared block_count={expected} but {found} forty-eight-hour blocks followed before the next marker"
    ))]
    BlockCountMismatch { expected: usize, found: usize },
    #[snafu(display(
        "block of marker {found:#06x} follows a block of higher precision; files must be written multi-year, then monthly, then 48h"
    ))]
    OutOfOrderBlock { found: u16 },
    #[snafu(display("forty-eight-hour block requires an active section header but none is in scope"))]
    NoActiveSectionHeader,
    #[snafu(display("section header end date is before its start date"))]
    SectionEndBeforeStart,
    #[snafu(display("monthly block day_count must be strictly positive"))]
    NonPositiveDayCount,
}

/// Errors raised while combining multiple Weft files into one.
#[derive(Clone, Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum CombineError {
    #[snafu(display("cannot combine zero input files"))]
    NoInputs,
    #[snafu(display(
        "preamble field `{field}` is incompatible across inputs: {left:?} vs {right:?}"
    ))]
    IncompatiblePreamble {
        field: &'static str,
        left: String,
        right: String,
    },
    #[snafu(display("decoding an input file failed: {source}"))]
    Decode { source: DecodeError },
}

/// Errors raised while fitting a Chebyshev series to samples.
#[derive(Clone, Copy, Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum FitError {
    #[snafu(display("need at least {need} samples to fit a degree-{degree} polynomial but got {got}"))]
    InsufficientSamples {
        degree: usize,
        need: usize,
        got: usize,
    },
    #[snafu(display("least-squares normal equations were singular and could not be solved"))]
    SingularSystem,
}

/// Errors raised while reading a value out of a parsed Weft file.
#[derive(Clone, Copy, Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum ReadError {
    #[snafu(display("no block covers requested instant {at}"))]
    OutOfRange { at: Epoch },
}

/// Errors raised while writing a new Weft file from a data source.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WriteError {
    #[snafu(display("data source produced no timestamps"))]
    EmptyDataSource,
    #[snafu(display("fitting a block failed: {source}"))]
    Fit { source: FitError },
    #[snafu(display("while {action} encountered input/output error: {source}"))]
    Io {
        action: String,
        source: InputOutputError,
    },
}

/// The aggregate error type for all fallible Weft operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WeftError {
    #[snafu(display("{source}"))]
    Decode { source: DecodeError },
    #[snafu(display("{source}"))]
    Combine { source: CombineError },
    #[snafu(display("{source}"))]
    Fit { source: FitError },
    #[snafu(display("{source}"))]
    Read { source: ReadError },
    #[snafu(display("{source}"))]
    Write { source: WriteError },
    #[snafu(display("while {action} encountered input/output error: {source}"))]
    Io {
        action: String,
        source: InputOutputError,
    },
}

impl From<DecodeError> for WeftError {
    fn from(source: DecodeError) -> Self {
        Self::Decode { source }
    }
}

impl From<CombineError> for WeftError {
    fn from(source: CombineError) -> Self {
        Self::Combine { source }
    }
}

impl From<FitError> for WeftError {
    fn from(source: FitError) -> Self {
        Self::Fit { source }
    }
}

impl From<ReadError> for WeftError {
    fn from(source: ReadError) -> Self {
        Self::Read { source }
    }
}

impl From<WriteError> for WeftError {
    fn from(source: WriteError) -> Self {
        Self::Write { source }
    }
}
