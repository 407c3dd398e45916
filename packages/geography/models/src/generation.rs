//! Supported geography generations.
//!
//! A generation is a fixed-in-time partition of territory into
//! non-overlapping units. The set is closed: overlap and code lookup
//! resources are only published for these generations, so anything else is
//! rejected up front as a [`ConfigurationError`].

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::ConfigurationError;

/// A named boundary generation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum GeographyGeneration {
    /// Westminster parliamentary constituencies, 2010 boundaries.
    Parl10,
    /// Westminster parliamentary constituencies, 2024 boundaries.
    Parl25,
    /// Local authority districts as of April 2023.
    Lad23,
    /// Local authority districts as of April 2024.
    Lad24,
}

impl GeographyGeneration {
    /// Every supported generation, in declaration order.
    pub const ALL: &[Self] = &[Self::Parl10, Self::Parl25, Self::Lad23, Self::Lad24];

    /// Returns the upper-case generation code (e.g. `"PARL10"`).
    ///
    /// This is also the name of the generation's key column in overlap
    /// tables and value tables.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Parl10 => "PARL10",
            Self::Parl25 => "PARL25",
            Self::Lad23 => "LAD23",
            Self::Lad24 => "LAD24",
        }
    }

    /// Returns the lower-case code used in published resource file names.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Parl10 => "parl10",
            Self::Parl25 => "parl25",
            Self::Lad23 => "lad23",
            Self::Lad24 => "lad24",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Parl10 => "2010 parliamentary constituencies",
            Self::Parl25 => "2024 parliamentary constituencies",
            Self::Lad23 => "2023 local authority districts",
            Self::Lad24 => "2024 local authority districts",
        }
    }

    /// Parses a generation code, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownGeneration`] for anything outside
    /// the supported set.
    pub fn from_code(code: &str) -> Result<Self, ConfigurationError> {
        let normalized = code.trim().to_ascii_uppercase();
        normalized
            .parse()
            .map_err(|_| ConfigurationError::UnknownGeneration {
                value: code.to_string(),
            })
    }
}
