#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geography generation and boundary overlap types.
//!
//! These types describe the boundary generations that statistics are
//! recorded against, the overlap fragments that relate two generations, and
//! the [`ConversionSpec`] that selects how values move between them. They
//! carry no I/O and are shared by the fetch, conversion, and storage crates.

pub mod generation;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use generation::GeographyGeneration;

/// Invalid configuration: a caller bug, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Geography generation outside the supported set.
    #[error("Unsupported geography generation: {value}")]
    UnknownGeneration {
        /// The rejected input.
        value: String,
    },

    /// Source and target generation are the same.
    #[error("Source and target generation are both {generation}")]
    SameGeneration {
        /// The generation given on both sides.
        generation: GeographyGeneration,
    },
}

/// Whether a statistic is a raw count or a rate.
///
/// Decides how values are normalized before being redistributed across
/// overlap fragments.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValueKind {
    /// A raw count (people, households, incidents).
    Absolute,
    /// A rate, already expressed per unit of population or area.
    Percentage,
}


/// Which overlap quantity weights the redistribution.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverlapMeasure {
    /// Weight by shared population.
    Population,
    /// Weight by shared area.
    Area,
}


/// How converted target codes are mapped to canonical store codes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CodeResolverKind {
    /// Overlap table codes already are canonical codes.
    Identity,
    /// Short codes are looked up in the target generation's code table.
    Lookup,
}

/// One area within a generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeographyUnit {
    /// Generation the unit belongs to.
    pub generation: GeographyGeneration,
    /// Stable canonical code (e.g. a GSS code such as `"E14001063"`).
    pub code: String,
}

impl GeographyUnit {
    /// Creates a unit reference.
    #[must_use]
    pub fn new(generation: GeographyGeneration, code: impl Into<String>) -> Self {
        Self {
            generation,
            code: code.into(),
        }
    }
}

/// The intersection of one source unit with one target unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapFragment {
    /// Code of the source-generation unit.
    pub source_code: String,
    /// Code of the target-generation unit.
    pub target_code: String,
    /// Population living in the intersection.
    pub overlap_pop: f64,
    /// Area of the intersection.
    pub overlap_area: f64,
    /// Share of the source unit's population in the intersection.
    pub percentage_overlap_pop: f64,
    /// Share of the source unit's area in the intersection.
    pub percentage_overlap_area: f64,
    /// Total population of the source unit.
    pub original_pop: f64,
    /// Total area of the source unit.
    pub original_area: f64,
}

impl OverlapFragment {
    /// Absolute overlap for the given measure.
    #[must_use]
    pub const fn overlap(&self, measure: OverlapMeasure) -> f64 {
        match measure {
            OverlapMeasure::Population => self.overlap_pop,
            OverlapMeasure::Area => self.overlap_area,
        }
    }

    /// Source unit total for the given measure.
    #[must_use]
    pub const fn source_total(&self, measure: OverlapMeasure) -> f64 {
        match measure {
            OverlapMeasure::Population => self.original_pop,
            OverlapMeasure::Area => self.original_area,
        }
    }
}

/// Which generation pair, measure, and resolver a conversion uses.
///
/// Every converter flavour is a value of this type; there is one
/// conversion routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversionSpec {
    /// Generation the stored values are recorded against.
    pub source: GeographyGeneration,
    /// Generation to convert onto.
    pub target: GeographyGeneration,
    /// Overlap quantity used for weighting.
    pub measure: OverlapMeasure,
    /// How target codes become canonical codes.
    pub resolver: CodeResolverKind,
}

impl ConversionSpec {
    /// Builds a conversion, rejecting identical source and target generations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::SameGeneration`] if `source == target`.
    pub const fn new(
        source: GeographyGeneration,
        target: GeographyGeneration,
        measure: OverlapMeasure,
        resolver: CodeResolverKind,
    ) -> Result<Self, ConfigurationError> {
        if source as u8 == target as u8 {
            return Err(ConfigurationError::SameGeneration { generation: source });
        }
        Ok(Self {
            source,
            target,
            measure,
            resolver,
        })
    }
}
