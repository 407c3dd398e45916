//! Conversion registry: loads conversion definitions from embedded TOML.
//!
//! Each `.toml` file in `packages/reproject/conversions/` is baked into the
//! binary at compile time via [`include_str!`]. Adding a conversion between
//! two supported generations is a matter of adding a TOML file and listing
//! it below.

use areashift_geography_models::{
    CodeResolverKind, ConfigurationError, ConversionSpec, GeographyGeneration, OverlapMeasure,
};
use serde::Deserialize;

use crate::ReprojectError;

/// TOML configs embedded at compile time.
const CONVERSION_TOMLS: &[(&str, &str)] = &[
    (
        "parl10_to_parl25",
        include_str!("../conversions/parl10_to_parl25.toml"),
    ),
    (
        "parl25_to_parl10",
        include_str!("../conversions/parl25_to_parl10.toml"),
    ),
    (
        "lad23_to_lad24",
        include_str!("../conversions/lad23_to_lad24.toml"),
    ),
    (
        "parl25_to_lad24",
        include_str!("../conversions/parl25_to_lad24.toml"),
    ),
];

/// A named, config-driven conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionDefinition {
    /// Unique identifier (e.g. `"parl10_to_parl25"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Longer description of what the conversion is for.
    #[serde(default)]
    pub description: Option<String>,
    /// Source generation.
    pub source: GeographyGeneration,
    /// Target generation.
    pub target: GeographyGeneration,
    /// Overlap measure used for weighting.
    pub measure: OverlapMeasure,
    /// How target codes are resolved.
    pub resolver: CodeResolverKind,
}

impl ConversionDefinition {
    /// The [`ConversionSpec`] this definition describes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if source and target are the same.
    pub const fn spec(&self) -> Result<ConversionSpec, ConfigurationError> {
        ConversionSpec::new(self.source, self.target, self.measure, self.resolver)
    }
}

/// Parses a conversion definition and checks its generation pair.
///
/// # Errors
///
/// Returns [`ReprojectError::Registry`] if the TOML is malformed or names an
/// unsupported generation, or [`ReprojectError::Configuration`] if source
/// and target are the same.
pub fn parse_conversion_toml(toml_str: &str) -> Result<ConversionDefinition, ReprojectError> {
    let definition: ConversionDefinition =
        toml::from_str(toml_str).map_err(|e| ReprojectError::Registry {
            message: e.to_string(),
        })?;
    definition.spec()?;
    Ok(definition)
}

/// Returns every registered conversion.
///
/// # Errors
///
/// Returns [`ReprojectError`] naming the first embedded config that fails to
/// parse.
pub fn all_conversions() -> Result<Vec<ConversionDefinition>, ReprojectError> {
    CONVERSION_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_conversion_toml(toml).map_err(|e| ReprojectError::Registry {
                message: format!("{name}.toml: {e}"),
            })
        })
        .collect()
}

/// Looks up a registered conversion by id.
///
/// # Errors
///
/// Returns [`ReprojectError::UnknownConversion`] if no conversion has that
/// id.
pub fn find_conversion(id: &str) -> Result<ConversionDefinition, ReprojectError> {
    all_conversions()?
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| ReprojectError::UnknownConversion { id: id.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_conversions() {
        let conversions = all_conversions().unwrap();
        assert_eq!(conversions.len(), CONVERSION_TOMLS.len());

        for ((file_id, _), definition) in CONVERSION_TOMLS.iter().zip(&conversions) {
            assert_eq!(*file_id, definition.id, "id must match file name");
            assert_ne!(definition.source, definition.target);
        }
    }

    #[test]
    fn no_duplicate_ids() {
        let conversions = all_conversions().unwrap();
        let mut ids: Vec<&str> = conversions.iter().map(|c| c.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), conversions.len());
    }

    #[test]
    fn finds_conversion_by_id() {
        let definition = find_conversion("parl10_to_parl25").unwrap();
        let spec = definition.spec().unwrap();
        assert_eq!(spec.source, GeographyGeneration::Parl10);
        assert_eq!(spec.target, GeographyGeneration::Parl25);
        assert_eq!(spec.measure, OverlapMeasure::Population);
        assert_eq!(spec.resolver, CodeResolverKind::Lookup);

        assert!(matches!(
            find_conversion("parl97_to_parl25"),
            Err(ReprojectError::UnknownConversion { .. })
        ));
    }

    #[test]
    fn rejects_unsupported_generation() {
        let toml = r#"
            id = "bad"
            name = "Bad"
            source = "WMC23"
            target = "PARL25"
            measure = "population"
            resolver = "identity"
        "#;
        assert!(matches!(
            parse_conversion_toml(toml),
            Err(ReprojectError::Registry { .. })
        ));
    }

    #[test]
    fn rejects_same_generation_pair() {
        let toml = r#"
            id = "loop"
            name = "Loop"
            source = "LAD24"
            target = "LAD24"
            measure = "area"
            resolver = "identity"
        "#;
        assert!(matches!(
            parse_conversion_toml(toml),
            Err(ReprojectError::Configuration(
                ConfigurationError::SameGeneration { .. }
            ))
        ));
    }
}
