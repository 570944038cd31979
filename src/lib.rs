/*
 * Weft Binary Ephemeris Engine
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! A versioned binary container, writer, and reader for a single scalar
//! time series approximated by piecewise Chebyshev polynomials at three
//! time scales (multi-year, monthly, forty-eight-hour).
//!
//! ```text
//! DataSource -> BlockSelectionPolicy -> Writer -> WeftFile -> bytes
//! bytes -> WeftFile::parse -> Reader::value_at(instant) -> scalar
//! ```

pub mod block;
pub mod codec;
pub mod errors;
pub mod file;
pub mod math;
pub mod policy;
pub mod preamble;
pub mod reader;
pub mod source;
pub mod value_behavior;
pub mod writer;

pub mod prelude {
    pub use crate::errors::WeftError;
    pub use crate::file::WeftFile;
    pub use crate::policy::{get_recommended_blocks, BlockSelectionPolicy};
    pub use crate::preamble::Preamble;
    pub use crate::reader::{Reader, Verbosity};
    pub use crate::source::{DataSource, Instant, VecDataSource};
    pub use crate::value_behavior::ValueBehavior;
    pub use crate::writer::{Writer, WriterConfig};
}
