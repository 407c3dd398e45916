#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geography conversion algorithm.
//!
//! Moves a table of per-unit statistics from one boundary generation onto
//! another using a precomputed overlap table. Each source unit's quantity is
//! assumed to be spread uniformly over its population (or area), so a
//! fragment receives the share of the quantity that matches its share of
//! the unit. The conversion is a pure function: no I/O, no hidden state.

mod algorithm;
pub mod table;

use areashift_geography_models::{
    ConversionSpec, GeographyGeneration, OverlapMeasure, ValueKind,
};
use thiserror::Error;

pub use algorithm::convert;
pub use table::{ValueRow, ValueTable};

/// The value table or request cannot be converted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Source and target generation are the same.
    #[error("Source and target generation are both {generation}")]
    SameGeneration {
        /// The generation given on both sides.
        generation: GeographyGeneration,
    },

    /// The table is keyed by a different generation than declared.
    #[error("Value table is keyed by {found}, expected {expected}")]
    KeyColumnMismatch {
        /// Code of the declared source generation.
        expected: String,
        /// Key column the table actually has.
        found: String,
    },

    /// The table has no value columns.
    #[error("Value table has no value columns")]
    NoValueColumns,

    /// A row has the wrong number of values.
    #[error("Row {code} has {found} values, expected {expected}")]
    RowWidth {
        /// Unit code of the row.
        code: String,
        /// Number of value columns.
        expected: usize,
        /// Number of values in the row.
        found: usize,
    },

    /// Two rows share a unit code.
    #[error("Unit {code} appears more than once")]
    DuplicateCode {
        /// The repeated unit code.
        code: String,
    },

    /// A value is NaN or infinite.
    #[error("Unit {code} has a non-finite value in column {column}")]
    NonFiniteValue {
        /// Unit code of the row.
        code: String,
        /// Column holding the value.
        column: String,
    },
}

/// Parameters of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionRequest {
    /// Generation the table is keyed by.
    pub source: GeographyGeneration,
    /// Generation to convert onto.
    pub target: GeographyGeneration,
    /// Overlap quantity used for weighting.
    pub measure: OverlapMeasure,
    /// Kind shared by every input column.
    pub input_kind: ValueKind,
    /// Kind of the output columns; `None` keeps the input kind.
    pub output_kind: Option<ValueKind>,
}

impl ConversionRequest {
    /// Builds a request for `spec` whose output kind matches the input.
    #[must_use]
    pub const fn from_spec(spec: &ConversionSpec, input_kind: ValueKind) -> Self {
        Self {
            source: spec.source,
            target: spec.target,
            measure: spec.measure,
            input_kind,
            output_kind: None,
        }
    }

    /// Overrides the output kind.
    #[must_use]
    pub const fn with_output_kind(mut self, output_kind: ValueKind) -> Self {
        self.output_kind = Some(output_kind);
        self
    }

    /// Effective output kind.
    #[must_use]
    pub fn output_kind(&self) -> ValueKind {
        self.output_kind.unwrap_or(self.input_kind)
    }
}

/// Result of a conversion.
///
/// A target code missing from [`Conversion::table`] means "no data", never
/// zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    /// Converted values keyed by target code, sorted by code.
    pub table: ValueTable,
    /// Source codes dropped because they have no overlap fragment.
    pub unmatched: Vec<String>,
    /// Fragments skipped because their source total was zero.
    pub skipped_fragments: usize,
    /// Targets left out of percentage output because their summed overlap
    /// was zero.
    pub undefined_targets: Vec<String>,
}
