#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Converts stored attributes from one geography generation to another.
//!
//! Reads an attribute's values from the statistics store, moves them onto
//! the target generation with the overlap table, maps the result to
//! canonical codes, and writes it back in a single transaction. Named
//! conversions live in an embedded registry.

pub mod orchestrator;
pub mod progress;
pub mod registry;

use areashift_conversion::ValidationError;
use areashift_database::DbError;
use areashift_database_models::UnitType;
use areashift_geography::GeoError;
use areashift_geography_models::{ConfigurationError, GeographyGeneration};
use thiserror::Error;

pub use orchestrator::{
    AttributeFailure, AttributeReport, BatchReport, ConversionStage, ConvertOptions,
    convert_attribute, convert_batch,
};

/// Errors that can occur while converting an attribute.
#[derive(Debug, Error)]
pub enum ReprojectError {
    /// Invalid conversion parameters.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The stored values do not form a convertible table.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Overlap or lookup data could not be obtained.
    #[error(transparent)]
    Network(#[from] GeoError),

    /// The store failed or refused a write.
    #[error(transparent)]
    Store(#[from] DbError),

    /// The attribute is not declared for the source generation.
    #[error("Attribute {name} is not declared for {generation}")]
    MissingAttribute {
        /// Attribute name.
        name: String,
        /// Generation it was looked up in.
        generation: GeographyGeneration,
    },

    /// The attribute already exists in the target generation with another
    /// unit.
    #[error("Attribute {name} is declared as {found} for {generation}, expected {expected}")]
    UnitMismatch {
        /// Attribute name.
        name: String,
        /// Target generation.
        generation: GeographyGeneration,
        /// Unit of the source attribute.
        expected: UnitType,
        /// Unit already declared in the target generation.
        found: UnitType,
    },

    /// Two codes resolve to the same canonical code.
    #[error("Codes {first} and {second} both resolve to {canonical}")]
    AmbiguousCode {
        /// The shared canonical code.
        canonical: String,
        /// First code resolving to it.
        first: String,
        /// Second code resolving to it.
        second: String,
    },

    /// No registered conversion has this id.
    #[error("Unknown conversion: {id}")]
    UnknownConversion {
        /// The id asked for.
        id: String,
    },

    /// An embedded conversion config is malformed.
    #[error("Conversion registry error: {message}")]
    Registry {
        /// Description of what went wrong.
        message: String,
    },
}
