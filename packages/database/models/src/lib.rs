#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Row types for the statistics store.
//!
//! An attribute is a named statistic declared per geography generation;
//! its values are keyed by unit code. Summaries cache the average, minimum,
//! and maximum of an attribute's values within one generation.

use areashift_geography_models::{GeographyGeneration, ValueKind};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Declared unit of an attribute's values.
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
pub enum UnitType {
    /// Counts of people, households, and the like.
    Raw,
    /// Rates and shares.
    Percentage,
}

impl UnitType {
    /// How values of this unit are treated during conversion.
    #[must_use]
    pub const fn value_kind(self) -> ValueKind {
        match self {
            Self::Raw => ValueKind::Absolute,
            Self::Percentage => ValueKind::Percentage,
        }
    }
}

/// A statistic declared for one generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Attribute name, shared by every generation's counterpart.
    pub name: String,
    /// Generation the attribute's values are keyed by.
    pub generation: GeographyGeneration,
    /// Declared unit.
    pub unit_type: UnitType,
    /// Free-form description.
    pub description: Option<String>,
}

impl Attribute {
    /// Creates an attribute without a description.
    #[must_use]
    pub fn new(name: impl Into<String>, generation: GeographyGeneration, unit_type: UnitType) -> Self {
        Self {
            name: name.into(),
            generation,
            unit_type,
            description: None,
        }
    }

    /// The same attribute declared for another generation.
    #[must_use]
    pub fn counterpart(&self, generation: GeographyGeneration) -> Self {
        Self {
            generation,
            ..self.clone()
        }
    }

    /// Conversion kind derived from the declared unit.
    #[must_use]
    pub const fn value_kind(&self) -> ValueKind {
        self.unit_type.value_kind()
    }
}

/// Cached summary of an attribute's values in one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeSummary {
    /// Attribute name.
    pub attribute: String,
    /// Generation summarised.
    pub generation: GeographyGeneration,
    /// Mean value.
    pub average: f64,
    /// Smallest value.
    pub minimum: f64,
    /// Largest value.
    pub maximum: f64,
    /// Number of units with a value.
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_type_decides_value_kind() {
        assert_eq!(UnitType::Raw.value_kind(), ValueKind::Absolute);
        assert_eq!(UnitType::Percentage.value_kind(), ValueKind::Percentage);
    }

    #[test]
    fn unit_type_round_trips_through_strings() {
        assert_eq!(UnitType::Percentage.as_ref(), "percentage");
        assert_eq!("raw".parse::<UnitType>().unwrap(), UnitType::Raw);
    }

    #[test]
    fn counterpart_keeps_everything_but_generation() {
        let mut attribute = Attribute::new("pop_over_65", GeographyGeneration::Parl10, UnitType::Raw);
        attribute.description = Some("Residents aged 65+".to_string());

        let target = attribute.counterpart(GeographyGeneration::Parl25);

        assert_eq!(target.generation, GeographyGeneration::Parl25);
        assert_eq!(target.name, attribute.name);
        assert_eq!(target.unit_type, attribute.unit_type);
        assert_eq!(target.description, attribute.description);
    }
}
