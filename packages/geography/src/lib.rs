#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary overlap tables and code lookups.
//!
//! Downloads the published overlap table for a pair of geography
//! generations and the short-code lookup for a generation, parses both from
//! CSV, and memoizes them in a [`cache::BatchCache`] that lives for exactly
//! one batch run.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod overlap;
pub mod resolver;
pub mod retry;

use areashift_geography_models::ConfigurationError;
use thiserror::Error;

/// Errors that can occur while obtaining overlap or lookup data.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Invalid generation pair, rejected before any network access.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource could not be fetched (bad status, exhausted retries,
    /// unreadable file).
    #[error("Fetch error for {url}: {message}")]
    Fetch {
        /// Resource address.
        url: String,
        /// Description of what went wrong.
        message: String,
    },

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The resource downloaded but does not have the expected shape.
    #[error("Schema error in {resource}: {message}")]
    Schema {
        /// Which resource was malformed.
        resource: String,
        /// Description of what went wrong.
        message: String,
    },
}

impl GeoError {
    /// Whether this error came from fetching rather than from configuration.
    ///
    /// Network errors are safe to retry by re-running the batch.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Fetch { .. })
    }
}
