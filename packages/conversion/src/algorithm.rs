//! Join, weight, and aggregate.
//!
//! Two hash-map stages replace a dataframe merge/groupby: fragments are
//! indexed by source code, then every matched row is spread over its
//! fragments into per-target accumulators.

use std::collections::{BTreeMap, HashMap, HashSet};

use areashift_geography_models::{OverlapFragment, ValueKind};

use crate::{Conversion, ConversionRequest, ValidationError, ValueTable};

/// Running sums for one target unit.
struct Accumulator {
    sums: Vec<f64>,
    overlap: f64,
}

impl Accumulator {
    fn new(width: usize) -> Self {
        Self {
            sums: vec![0.0; width],
            overlap: 0.0,
        }
    }
}

/// Converts `table` from the request's source generation onto its target
/// generation.
///
/// 1. Rows are joined to `fragments` on source code; rows with no fragment
///    are dropped and listed in [`Conversion::unmatched`].
/// 2. Absolute input is divided by the source unit's total population or
///    area (per `request.measure`) to get a density. Percentage input is
///    already a density.
/// 3. Each density is multiplied by the fragment's overlap and summed per
///    target, together with the overlap itself.
/// 4. Percentage output divides each sum by the target's summed overlap;
///    absolute output keeps the sum.
///
/// # Errors
///
/// Returns [`ValidationError`] if the request pairs a generation with
/// itself or the table is not a well-formed table keyed by the source
/// generation. Validation happens before any computation.
pub fn convert(
    table: &ValueTable,
    fragments: &[OverlapFragment],
    request: &ConversionRequest,
) -> Result<Conversion, ValidationError> {
    validate(table, request)?;

    let measure = request.measure;
    let output_kind = request.output_kind();
    let width = table.columns().len();

    let mut by_source: HashMap<&str, Vec<&OverlapFragment>> = HashMap::new();
    for fragment in fragments {
        by_source
            .entry(fragment.source_code.as_str())
            .or_default()
            .push(fragment);
    }

    let mut accumulators: BTreeMap<&str, Accumulator> = BTreeMap::new();
    let mut unmatched = Vec::new();
    let mut skipped_fragments = 0;

    for row in table.rows() {
        let Some(row_fragments) = by_source.get(row.code.as_str()) else {
            log::warn!(
                "{} unit {} has no overlap with {}; dropping its values",
                request.source,
                row.code,
                request.target
            );
            unmatched.push(row.code.clone());
            continue;
        };

        for fragment in row_fragments {
            let density_scale = match request.input_kind {
                ValueKind::Absolute => {
                    let total = fragment.source_total(measure);
                    if !total.is_finite() || total <= 0.0 {
                        log::warn!(
                            "{} unit {} has {measure} total {total}; skipping its fragment in {}",
                            request.source,
                            row.code,
                            fragment.target_code
                        );
                        skipped_fragments += 1;
                        continue;
                    }
                    total.recip()
                }
                ValueKind::Percentage => 1.0,
            };

            let overlap = fragment.overlap(measure);
            let accumulator = accumulators
                .entry(fragment.target_code.as_str())
                .or_insert_with(|| Accumulator::new(width));

            for (sum, value) in accumulator.sums.iter_mut().zip(&row.values) {
                *sum += value * density_scale * overlap;
            }
            accumulator.overlap += overlap;
        }
    }

    let mut output = ValueTable::new(request.target.code(), table.columns().to_vec());
    let mut undefined_targets = Vec::new();

    for (code, accumulator) in accumulators {
        match output_kind {
            ValueKind::Absolute => output.push_row(code, accumulator.sums),
            ValueKind::Percentage => {
                if accumulator.overlap > 0.0 {
                    let rates = accumulator
                        .sums
                        .iter()
                        .map(|sum| sum / accumulator.overlap)
                        .collect();
                    output.push_row(code, rates);
                } else {
                    log::warn!(
                        "{} unit {code} has zero {measure} overlap; rate is undefined",
                        request.target
                    );
                    undefined_targets.push(code.to_string());
                }
            }
        }
    }

    log::debug!(
        "Converted {} {} rows into {} {} rows ({} unmatched, {} fragments skipped, first column {} -> {})",
        table.len(),
        request.source,
        output.len(),
        request.target,
        unmatched.len(),
        skipped_fragments,
        table.column_total(0),
        output.column_total(0)
    );

    Ok(Conversion {
        table: output,
        unmatched,
        skipped_fragments,
        undefined_targets,
    })
}

fn validate(table: &ValueTable, request: &ConversionRequest) -> Result<(), ValidationError> {
    if request.source == request.target {
        return Err(ValidationError::SameGeneration {
            generation: request.source,
        });
    }

    if table.key_column() != request.source.code() {
        return Err(ValidationError::KeyColumnMismatch {
            expected: request.source.code().to_string(),
            found: table.key_column().to_string(),
        });
    }

    let width = table.columns().len();
    if width == 0 {
        return Err(ValidationError::NoValueColumns);
    }

    let mut seen = HashSet::with_capacity(table.len());
    for row in table.rows() {
        if row.values.len() != width {
            return Err(ValidationError::RowWidth {
                code: row.code.clone(),
                expected: width,
                found: row.values.len(),
            });
        }
        if let Some(idx) = row.values.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteValue {
                code: row.code.clone(),
                column: table.columns()[idx].clone(),
            });
        }
        if !seen.insert(row.code.as_str()) {
            return Err(ValidationError::DuplicateCode {
                code: row.code.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use areashift_geography_models::{GeographyGeneration, OverlapMeasure};

    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn fragment(source: &str, target: &str, overlap_pop: f64, original_pop: f64) -> OverlapFragment {
        OverlapFragment {
            source_code: source.to_string(),
            target_code: target.to_string(),
            overlap_pop,
            overlap_area: 0.0,
            percentage_overlap_pop: overlap_pop / original_pop,
            percentage_overlap_area: 0.0,
            original_pop,
            original_area: 0.0,
        }
    }

    fn request(input_kind: ValueKind) -> ConversionRequest {
        ConversionRequest {
            source: GeographyGeneration::Parl10,
            target: GeographyGeneration::Parl25,
            measure: OverlapMeasure::Population,
            input_kind,
            output_kind: None,
        }
    }

    fn values(rows: &[(&str, f64)]) -> ValueTable {
        ValueTable::single_column("PARL10", "value", rows.iter().map(|(c, v)| (*c, *v)))
    }

    fn row<'a>(conversion: &'a Conversion, code: &str) -> Option<&'a [f64]> {
        conversion
            .table
            .rows()
            .iter()
            .find(|r| r.code == code)
            .map(|r| r.values.as_slice())
    }

    fn value_of(conversion: &Conversion, code: &str) -> f64 {
        row(conversion, code).unwrap()[0]
    }

    #[test]
    fn absolute_value_is_split_by_population_share() {
        let fragments = [fragment("A1", "B1", 30.0, 100.0), fragment("A1", "B2", 70.0, 100.0)];

        let conversion = convert(
            &values(&[("A1", 50.0)]),
            &fragments,
            &request(ValueKind::Absolute),
        )
        .unwrap();

        assert_eq!(conversion.table.key_column(), "PARL25");
        assert_eq!(conversion.table.len(), 2);
        assert!((value_of(&conversion, "B1") - 15.0).abs() < TOLERANCE);
        assert!((value_of(&conversion, "B2") - 35.0).abs() < TOLERANCE);
        assert!(conversion.unmatched.is_empty());
    }

    #[test]
    fn uniform_rate_is_reproduced_exactly() {
        let fragments = [fragment("A1", "B1", 30.0, 100.0), fragment("A1", "B2", 70.0, 100.0)];

        let conversion = convert(
            &values(&[("A1", 40.0)]),
            &fragments,
            &request(ValueKind::Percentage),
        )
        .unwrap();

        assert!((value_of(&conversion, "B1") - 40.0).abs() < TOLERANCE);
        assert!((value_of(&conversion, "B2") - 40.0).abs() < TOLERANCE);
    }

    #[test]
    fn merged_rates_are_weighted_by_overlap() {
        let fragments = [fragment("A1", "B1", 30.0, 30.0), fragment("A2", "B1", 20.0, 20.0)];

        let conversion = convert(
            &values(&[("A1", 40.0), ("A2", 60.0)]),
            &fragments,
            &request(ValueKind::Percentage),
        )
        .unwrap();

        assert_eq!(conversion.table.len(), 1);
        assert!((value_of(&conversion, "B1") - 48.0).abs() < TOLERANCE);
    }

    #[test]
    fn absolute_totals_are_conserved() {
        let fragments = [
            fragment("A1", "B1", 30.0, 100.0),
            fragment("A1", "B2", 70.0, 100.0),
            fragment("A2", "B2", 12.5, 50.0),
            fragment("A2", "B3", 37.5, 50.0),
            fragment("A3", "B3", 80.0, 80.0),
        ];
        let input = values(&[("A1", 1234.0), ("A2", 17.0), ("A3", 0.5)]);

        let conversion = convert(&input, &fragments, &request(ValueKind::Absolute)).unwrap();

        let input_total = input.column_total(0);
        let output_total = conversion.table.column_total(0);
        assert!((input_total - output_total).abs() < TOLERANCE * input_total);
    }

    #[test]
    fn unmatched_source_never_appears_in_output() {
        let fragments = [fragment("A1", "B1", 100.0, 100.0)];

        let conversion = convert(
            &values(&[("A1", 10.0), ("A9", 99.0)]),
            &fragments,
            &request(ValueKind::Absolute),
        )
        .unwrap();

        assert_eq!(conversion.unmatched, vec!["A9".to_string()]);
        assert_eq!(conversion.table.len(), 1);
        assert!((conversion.table.column_total(0) - 10.0).abs() < TOLERANCE);
    }

    #[test]
    fn absolute_input_can_produce_rates() {
        let fragments = [fragment("A1", "B1", 30.0, 100.0), fragment("A2", "B1", 20.0, 40.0)];

        let conversion = convert(
            &values(&[("A1", 50.0), ("A2", 10.0)]),
            &fragments,
            &request(ValueKind::Absolute).with_output_kind(ValueKind::Percentage),
        )
        .unwrap();

        // (0.5 * 30 + 0.25 * 20) / 50
        assert!((value_of(&conversion, "B1") - 0.4).abs() < TOLERANCE);
    }

    #[test]
    fn area_measure_uses_area_columns() {
        let fragments = [
            OverlapFragment {
                overlap_area: 1.0,
                original_area: 4.0,
                ..fragment("A1", "B1", 90.0, 100.0)
            },
            OverlapFragment {
                overlap_area: 3.0,
                original_area: 4.0,
                ..fragment("A1", "B2", 10.0, 100.0)
            },
        ];
        let request = ConversionRequest {
            measure: OverlapMeasure::Area,
            ..request(ValueKind::Absolute)
        };

        let conversion = convert(&values(&[("A1", 8.0)]), &fragments, &request).unwrap();

        assert!((value_of(&conversion, "B1") - 2.0).abs() < TOLERANCE);
        assert!((value_of(&conversion, "B2") - 6.0).abs() < TOLERANCE);
    }

    #[test]
    fn multiple_columns_keep_their_order() {
        let mut table = ValueTable::new("PARL10", vec!["men".to_string(), "women".to_string()]);
        table.push_row("A1", vec![40.0, 60.0]);
        let fragments = [fragment("A1", "B1", 25.0, 100.0), fragment("A1", "B2", 75.0, 100.0)];

        let conversion = convert(&table, &fragments, &request(ValueKind::Absolute)).unwrap();

        assert_eq!(conversion.table.columns(), table.columns());
        let b2 = row(&conversion, "B2").unwrap();
        assert!((b2[0] - 30.0).abs() < TOLERANCE);
        assert!((b2[1] - 45.0).abs() < TOLERANCE);
    }

    #[test]
    fn zero_source_total_fragment_is_skipped() {
        let fragments = [fragment("A1", "B1", 0.0, 0.0)];

        let conversion = convert(
            &values(&[("A1", 5.0)]),
            &fragments,
            &request(ValueKind::Absolute),
        )
        .unwrap();

        assert_eq!(conversion.skipped_fragments, 1);
        assert!(conversion.table.is_empty());
    }

    #[test]
    fn zero_overlap_target_has_no_rate() {
        let fragments = [fragment("A1", "B1", 0.0, 100.0), fragment("A1", "B2", 100.0, 100.0)];

        let conversion = convert(
            &values(&[("A1", 12.0)]),
            &fragments,
            &request(ValueKind::Percentage),
        )
        .unwrap();

        assert_eq!(conversion.undefined_targets, vec!["B1".to_string()]);
        assert!(row(&conversion, "B1").is_none());
        assert!((value_of(&conversion, "B2") - 12.0).abs() < TOLERANCE);
    }

    #[test]
    fn output_is_sorted_and_deterministic() {
        let fragments = [
            fragment("A2", "B9", 10.0, 10.0),
            fragment("A1", "B3", 5.0, 10.0),
            fragment("A1", "B1", 5.0, 10.0),
        ];
        let input = values(&[("A1", 2.0), ("A2", 3.0)]);

        let first = convert(&input, &fragments, &request(ValueKind::Absolute)).unwrap();
        let second = convert(&input, &fragments, &request(ValueKind::Absolute)).unwrap();

        let codes: Vec<&str> = first.table.rows().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, ["B1", "B3", "B9"]);
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_wrong_key_column() {
        let table = ValueTable::single_column("PARL25", "value", [("B1", 1.0)]);

        let err = convert(&table, &[], &request(ValueKind::Absolute)).unwrap_err();

        assert_eq!(
            err,
            ValidationError::KeyColumnMismatch {
                expected: "PARL10".to_string(),
                found: "PARL25".to_string(),
            }
        );
    }

    #[test]
    fn rejects_malformed_tables() {
        let empty_columns = ValueTable::new("PARL10", Vec::new());
        assert_eq!(
            convert(&empty_columns, &[], &request(ValueKind::Absolute)).unwrap_err(),
            ValidationError::NoValueColumns
        );

        let mut ragged = ValueTable::new("PARL10", vec!["a".to_string(), "b".to_string()]);
        ragged.push_row("A1", vec![1.0]);
        assert!(matches!(
            convert(&ragged, &[], &request(ValueKind::Absolute)).unwrap_err(),
            ValidationError::RowWidth { expected: 2, found: 1, .. }
        ));

        let duplicated = values(&[("A1", 1.0), ("A1", 2.0)]);
        assert_eq!(
            convert(&duplicated, &[], &request(ValueKind::Absolute)).unwrap_err(),
            ValidationError::DuplicateCode {
                code: "A1".to_string()
            }
        );

        let nan = values(&[("A1", f64::NAN)]);
        assert!(matches!(
            convert(&nan, &[], &request(ValueKind::Absolute)).unwrap_err(),
            ValidationError::NonFiniteValue { .. }
        ));
    }

    #[test]
    fn rejects_same_generation() {
        let request = ConversionRequest {
            target: GeographyGeneration::Parl10,
            ..request(ValueKind::Absolute)
        };

        let err = convert(&values(&[("A1", 1.0)]), &[], &request).unwrap_err();

        assert_eq!(
            err,
            ValidationError::SameGeneration {
                generation: GeographyGeneration::Parl10
            }
        );
    }
}
