//! Overlap tables between two geography generations.
//!
//! Each row of a published overlap table is one [`OverlapFragment`]: the
//! intersection of a source unit with a target unit, keyed by the two
//! generation code columns (e.g. `PARL10`, `PARL25`).

use std::collections::BTreeMap;

use areashift_geography_models::{ConfigurationError, GeographyGeneration, OverlapFragment};

use crate::GeoError;
use crate::config::ResourceConfig;
use crate::fetch::ResourceFetcher;

/// Relative deviation between a unit's summed fragment population and its
/// recorded total above which the table is reported as inconsistent.
pub const COVERAGE_TOLERANCE: f64 = 0.01;

/// Measure columns every overlap table must carry.
const MEASURE_COLUMNS: [&str; 6] = [
    "overlap_pop",
    "overlap_area",
    "percentage_overlap_pop",
    "percentage_overlap_area",
    "original_pop",
    "original_area",
];

/// Rejects generation pairs that have no overlap table.
///
/// # Errors
///
/// Returns [`ConfigurationError::SameGeneration`] if both sides are equal.
pub const fn validate_pair(
    source: GeographyGeneration,
    target: GeographyGeneration,
) -> Result<(), ConfigurationError> {
    if source as u8 == target as u8 {
        return Err(ConfigurationError::SameGeneration { generation: source });
    }
    Ok(())
}

/// Downloads and parses the overlap table for `source` → `target`.
///
/// The pair is validated before any request is made. Callers running more
/// than one conversion should go through
/// [`BatchCache::overlap_table`](crate::cache::BatchCache::overlap_table)
/// instead so the table is fetched once per run.
///
/// # Errors
///
/// Returns [`GeoError::Configuration`] for an invalid pair, a network error
/// if the download fails, or [`GeoError::Schema`] if the body is malformed.
pub async fn get_overlap_table(
    fetcher: &dyn ResourceFetcher,
    config: &ResourceConfig,
    source: GeographyGeneration,
    target: GeographyGeneration,
) -> Result<Vec<OverlapFragment>, GeoError> {
    validate_pair(source, target)?;

    let url = config.overlap_url(source, target);
    let body = fetcher.fetch_text(&url).await?;
    let fragments = parse_overlap_csv(&body, source, target)?;

    log::info!(
        "Loaded {} overlap fragments for {source} -> {target}",
        fragments.len()
    );

    for (code, ratio) in coverage_outliers(&fragments, COVERAGE_TOLERANCE) {
        log::warn!(
            "{source} unit {code}: fragments cover {:.1}% of its population",
            ratio * 100.0
        );
    }

    Ok(fragments)
}

/// Parses an overlap table body.
///
/// # Errors
///
/// Returns [`GeoError::Schema`] if a required column is missing or a
/// measure is not a finite number, or [`GeoError::Csv`] if the body is not
/// valid CSV.
pub fn parse_overlap_csv(
    body: &str,
    source: GeographyGeneration,
    target: GeographyGeneration,
) -> Result<Vec<OverlapFragment>, GeoError> {
    let resource = format!("{source}->{target} overlap table");
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

    let source_idx = column(source.code())?;
    let target_idx = column(target.code())?;
    let mut measure_idx = [0usize; MEASURE_COLUMNS.len()];
    for (slot, name) in measure_idx.iter_mut().zip(MEASURE_COLUMNS) {
        *slot = column(name)?;
    }

    let mut fragments = Vec::new();

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        let mut measures = [0.0f64; MEASURE_COLUMNS.len()];
        for ((value, idx), name) in measures.iter_mut().zip(measure_idx).zip(MEASURE_COLUMNS) {
            let raw = field(idx);
            *value = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| GeoError::Schema {
                    resource: resource.clone(),
                    message: format!("row {}: {name} is not a number: {raw:?}", line + 2),
                })?;
        }

        let source_code = field(source_idx);
        let target_code = field(target_idx);
        if source_code.is_empty() || target_code.is_empty() {
            return Err(GeoError::Schema {
                resource,
                message: format!("row {}: empty unit code", line + 2),
            });
        }

        let [
            overlap_pop,
            overlap_area,
            percentage_overlap_pop,
            percentage_overlap_area,
            original_pop,
            original_area,
        ] = measures;

        fragments.push(OverlapFragment {
            source_code: source_code.to_string(),
            target_code: target_code.to_string(),
            overlap_pop,
            overlap_area,
            percentage_overlap_pop,
            percentage_overlap_area,
            original_pop,
            original_area,
        });
    }

    Ok(fragments)
}

/// Finds source units whose fragments' population does not add up to the
/// unit's recorded total.
///
/// Returns `(source_code, covered_ratio)` for every unit deviating by more
/// than `tolerance`, sorted by code. Units with a zero total are skipped.
#[must_use]
pub fn coverage_outliers(fragments: &[OverlapFragment], tolerance: f64) -> Vec<(String, f64)> {
    let mut per_unit: BTreeMap<&str, (f64, f64)> = BTreeMap::new();

    for fragment in fragments {
        let entry = per_unit
            .entry(fragment.source_code.as_str())
            .or_insert((0.0, fragment.original_pop));
        entry.0 += fragment.overlap_pop;
    }

    per_unit
        .into_iter()
        .filter(|(_, (_, total))| *total > 0.0)
        .map(|(code, (covered, total))| (code.to_string(), covered / total))
        .filter(|(_, ratio)| (ratio - 1.0).abs() > tolerance)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;

    const TABLE: &str = "\
PARL10,PARL25,overlap_pop,overlap_area,percentage_overlap_pop,percentage_overlap_area,original_pop,original_area
A1,B1,30,4,0.3,0.4,100,10
A1,B2,70,6,0.7,0.6,100,10
A2,B1,20,1,1.0,1.0,20,1
";

    #[test]
    fn parses_fragments() {
        let fragments =
            parse_overlap_csv(TABLE, GeographyGeneration::Parl10, GeographyGeneration::Parl25)
                .unwrap();

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[1].source_code, "A1");
        assert_eq!(fragments[1].target_code, "B2");
        assert!((fragments[1].overlap_pop - 70.0).abs() < f64::EPSILON);
        assert!((fragments[1].percentage_overlap_area - 0.6).abs() < f64::EPSILON);
        assert!((fragments[2].original_area - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_key_column_is_schema_error() {
        let err =
            parse_overlap_csv(TABLE, GeographyGeneration::Parl10, GeographyGeneration::Lad24)
                .unwrap_err();
        match err {
            GeoError::Schema { message, .. } => assert_eq!(message, "missing column LAD24"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_measure_is_schema_error() {
        let body = "\
PARL10,PARL25,overlap_pop,overlap_area,percentage_overlap_pop,percentage_overlap_area,original_pop,original_area
A1,B1,n/a,4,0.3,0.4,100,10
";
        let err = parse_overlap_csv(body, GeographyGeneration::Parl10, GeographyGeneration::Parl25)
            .unwrap_err();
        assert!(matches!(err, GeoError::Schema { .. }));
    }

    #[test]
    fn reports_units_with_incomplete_coverage() {
        let mut fragments =
            parse_overlap_csv(TABLE, GeographyGeneration::Parl10, GeographyGeneration::Parl25)
                .unwrap();
        assert!(coverage_outliers(&fragments, COVERAGE_TOLERANCE).is_empty());

        fragments[1].overlap_pop = 50.0;
        let outliers = coverage_outliers(&fragments, COVERAGE_TOLERANCE);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].0, "A1");
        assert!((outliers[0].1 - 0.8).abs() < 1e-12);
    }

    #[tokio::test]
    async fn same_generation_rejected_before_fetch() {
        let config = ResourceConfig::new("mem://data", "1.0.0");
        let fetcher = StaticFetcher::new();

        let err = get_overlap_table(
            &fetcher,
            &config,
            GeographyGeneration::Parl25,
            GeographyGeneration::Parl25,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            GeoError::Configuration(ConfigurationError::SameGeneration { .. })
        ));
        assert_eq!(
            fetcher.request_count(&config.overlap_url(
                GeographyGeneration::Parl25,
                GeographyGeneration::Parl25
            )),
            0
        );
    }

    #[tokio::test]
    async fn fetch_failure_is_network_error() {
        let config = ResourceConfig::new("mem://data", "1.0.0");
        let fetcher = StaticFetcher::new();

        let err = get_overlap_table(
            &fetcher,
            &config,
            GeographyGeneration::Parl10,
            GeographyGeneration::Parl25,
        )
        .await
        .unwrap_err();

        assert!(err.is_network());
    }
}
