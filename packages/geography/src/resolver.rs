//! Short-code to canonical-code lookups.
//!
//! Some overlap tables key target units by a generation-internal short code
//! rather than the canonical code the statistics store uses. Each such
//! generation publishes a lookup with `short_code` and `gss_code` columns.

use std::collections::BTreeMap;

use areashift_geography_models::GeographyGeneration;

use crate::GeoError;
use crate::config::ResourceConfig;
use crate::fetch::ResourceFetcher;

/// A generation's short-code lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLookup {
    generation: GeographyGeneration,
    codes: BTreeMap<String, String>,
}

impl CodeLookup {
    /// Canonical code for `short_code`, or `None` if it is unmapped or
    /// retired.
    #[must_use]
    pub fn resolve(&self, short_code: &str) -> Option<&str> {
        let canonical = self.codes.get(short_code.trim()).map(String::as_str);
        if canonical.is_none() {
            log::debug!("{} short code {short_code} is unmapped", self.generation);
        }
        canonical
    }

    /// Number of mapped short codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the lookup maps nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Downloads and parses the lookup table for `generation`.
///
/// # Errors
///
/// Returns a network error if the download fails or [`GeoError::Schema`]
/// if the body is malformed.
pub async fn get_code_lookup(
    fetcher: &dyn ResourceFetcher,
    config: &ResourceConfig,
    generation: GeographyGeneration,
) -> Result<CodeLookup, GeoError> {
    let url = config.lookup_url(generation);
    let body = fetcher.fetch_text(&url).await?;
    let lookup = parse_code_lookup(&body, generation)?;
    if lookup.is_empty() {
        log::warn!("{generation} code lookup at {url} maps no codes");
    } else {
        log::info!("Loaded {} {generation} short codes", lookup.len());
    }
    Ok(lookup)
}

/// Parses a lookup table body.
///
/// Rows with an empty canonical code are treated as retired and skipped.
///
/// # Errors
///
/// Returns [`GeoError::Schema`] if a column is missing or a short code maps
/// to two different canonical codes, or [`GeoError::Csv`] for invalid CSV.
pub fn parse_code_lookup(
    body: &str,
    generation: GeographyGeneration,
) -> Result<CodeLookup, GeoError> {
    let resource = format!("{generation} code lookup");
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| GeoError::Schema {
                resource: resource.clone(),
                message: format!("missing column {name}"),
            })
    };
    let short_idx = column("short_code")?;
    let gss_idx = column("gss_code")?;

    let mut codes = BTreeMap::new();

    for record in reader.records() {
        let record = record?;
        let short = record.get(short_idx).unwrap_or_default();
        let gss = record.get(gss_idx).unwrap_or_default();

        if short.is_empty() || gss.is_empty() {
            log::debug!("{resource}: skipping row with empty code ({short:?}, {gss:?})");
            continue;
        }

        if let Some(existing) = codes.insert(short.to_string(), gss.to_string())
            && existing != gss
        {
            return Err(GeoError::Schema {
                resource,
                message: format!("short code {short} maps to both {existing} and {gss}"),
            });
        }
    }

    Ok(CodeLookup { generation, codes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_resolves() {
        let body = "short_code,gss_code,name\nABE,E14001063,Aberafan\nALD,E14001064,Aldershot\nOLD,,Retired\n";
        let lookup = parse_code_lookup(body, GeographyGeneration::Parl25).unwrap();

        assert_eq!(lookup.len(), 2);
        assert_eq!(lookup.resolve("ABE"), Some("E14001063"));
        assert_eq!(lookup.resolve(" ALD "), Some("E14001064"));
        assert_eq!(lookup.resolve("OLD"), None);
        assert_eq!(lookup.resolve("XYZ"), None);
    }

    #[test]
    fn conflicting_rows_are_rejected() {
        let body = "short_code,gss_code\nABE,E1\nABE,E2\n";
        let err = parse_code_lookup(body, GeographyGeneration::Parl25).unwrap_err();
        assert!(matches!(err, GeoError::Schema { .. }));
    }

    #[test]
    fn repeated_identical_rows_are_accepted() {
        let body = "short_code,gss_code\nABE,E1\nABE,E1\n";
        let lookup = parse_code_lookup(body, GeographyGeneration::Parl25).unwrap();
        assert_eq!(lookup.len(), 1);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let err = parse_code_lookup("short,gss\nA,B\n", GeographyGeneration::Lad23).unwrap_err();
        assert!(matches!(err, GeoError::Schema { .. }));
    }

    #[tokio::test]
    async fn header_only_lookup_is_empty() {
        let config = ResourceConfig::new("mem://data", "1.0.0");
        let fetcher = crate::fetch::StaticFetcher::new().with_body(
            config.lookup_url(GeographyGeneration::Parl25),
            "short_code,gss_code\n",
        );

        let lookup = get_code_lookup(&fetcher, &config, GeographyGeneration::Parl25)
            .await
            .unwrap();

        assert!(lookup.is_empty());
        assert_eq!(lookup.resolve("ABE"), None);
    }
}
