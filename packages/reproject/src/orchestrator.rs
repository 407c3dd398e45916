//! Per-attribute conversion runs.
//!
//! Each attribute moves through [`ConversionStage`]s in order. Everything
//! written for an attribute goes through one store transaction, so a
//! failure at any stage leaves the store exactly as it was. Within a batch
//! a failed attribute is recorded and the next one still runs.

use std::collections::BTreeMap;

use areashift_conversion::{ConversionRequest, ValueTable, convert};
use areashift_database::StatisticsStore;
use areashift_database_models::Attribute;
use areashift_geography::cache::BatchCache;
use areashift_geography_models::{ConversionSpec, GeographyUnit};
use strum_macros::{AsRefStr, Display};

use crate::ReprojectError;
use crate::progress::ProgressCallback;

/// Where an attribute's conversion currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ConversionStage {
    /// Loading the attribute and its values.
    NotStarted,
    /// Fetching fragments and running the conversion.
    Converting,
    /// Mapping target codes to canonical codes.
    Resolving,
    /// Writing target values inside the transaction.
    Writing,
    /// Recomputing summaries and committing.
    Recomputing,
    /// Finished.
    Done,
}

/// Knobs for a conversion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Delete the source generation's values once the target is written.
    pub delete_old: bool,
    /// Convert and resolve but write nothing.
    pub dry_run: bool,
}

/// Outcome of one successfully converted attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeReport {
    /// Attribute name.
    pub attribute: String,
    /// Source values read.
    pub rows_read: usize,
    /// Target values written (or that would be written in a dry run).
    pub rows_written: usize,
    /// Source codes dropped because no overlap fragment covers them.
    pub unmatched: Vec<String>,
    /// Target codes dropped because they have no canonical code.
    pub unresolved: Vec<String>,
    /// Fragments skipped because their source unit had a zero total.
    pub skipped_fragments: usize,
    /// Existing target values replaced.
    pub superseded: u64,
    /// Source values deleted.
    pub source_deleted: u64,
    /// Whether nothing was written.
    pub dry_run: bool,
    /// Whether the attribute was left untouched because no value survived
    /// conversion.
    pub skipped: bool,
}

/// A conversion that stopped, and where.
#[derive(Debug)]
pub struct AttributeFailure {
    /// Attribute name.
    pub attribute: String,
    /// Stage the error happened in.
    pub stage: ConversionStage,
    /// What went wrong.
    pub error: ReprojectError,
}

/// Outcome of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Attributes converted, in processing order.
    pub converted: Vec<AttributeReport>,
    /// Attributes that failed, in processing order.
    pub failed: Vec<AttributeFailure>,
}

impl BatchReport {
    /// Whether every attribute converted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total target values written across the batch.
    #[must_use]
    pub fn rows_written(&self) -> usize {
        self.converted.iter().map(|r| r.rows_written).sum()
    }
}

/// Names of every attribute declared for the conversion's source
/// generation.
///
/// # Errors
///
/// Returns [`ReprojectError::Store`] if the lookup fails.
pub fn source_attributes(
    store: &dyn StatisticsStore,
    spec: &ConversionSpec,
) -> Result<Vec<String>, ReprojectError> {
    Ok(store
        .attributes(spec.source)?
        .into_iter()
        .map(|a| a.name)
        .collect())
}

/// Converts one attribute from `spec.source` to `spec.target`.
///
/// An attribute with no stored values, or whose values all drop out during
/// conversion or resolution, is reported as skipped and the store is left
/// as it was.
///
/// # Errors
///
/// Returns an [`AttributeFailure`] naming the stage that failed. The store
/// is unchanged whenever this returns an error.
pub async fn convert_attribute(
    store: &mut dyn StatisticsStore,
    cache: &mut BatchCache<'_>,
    spec: &ConversionSpec,
    name: &str,
    options: ConvertOptions,
) -> Result<AttributeReport, AttributeFailure> {
    let mut stage = ConversionStage::NotStarted;
    let result = run_attribute(store, cache, spec, name, options, &mut stage).await;

    result.map_err(|error| {
        log::error!("{name}: {spec_label} failed while {stage}: {error}", spec_label = label(spec));
        AttributeFailure {
            attribute: name.to_string(),
            stage,
            error,
        }
    })
}

/// Converts each named attribute in turn.
///
/// A failure is logged and recorded; it never stops the batch.
pub async fn convert_batch(
    store: &mut dyn StatisticsStore,
    cache: &mut BatchCache<'_>,
    spec: &ConversionSpec,
    names: &[String],
    options: ConvertOptions,
    progress: &dyn ProgressCallback,
) -> BatchReport {
    let mut report = BatchReport::default();
    progress.set_total(names.len() as u64);

    log::info!(
        "Converting {} attribute(s) {}{}",
        names.len(),
        label(spec),
        if options.dry_run { " (dry run)" } else { "" }
    );

    for name in names {
        progress.set_message(name.clone());

        match convert_attribute(store, cache, spec, name, options).await {
            Ok(attribute_report) => report.converted.push(attribute_report),
            Err(failure) => report.failed.push(failure),
        }

        progress.inc(1);
    }

    progress.finish(format!(
        "{} converted, {} failed",
        report.converted.len(),
        report.failed.len()
    ));

    report
}

async fn run_attribute(
    store: &mut dyn StatisticsStore,
    cache: &mut BatchCache<'_>,
    spec: &ConversionSpec,
    name: &str,
    options: ConvertOptions,
    stage: &mut ConversionStage,
) -> Result<AttributeReport, ReprojectError> {
    let attribute =
        store
            .attribute(name, spec.source)?
            .ok_or_else(|| ReprojectError::MissingAttribute {
                name: name.to_string(),
                generation: spec.source,
            })?;
    let values = store.get_values(name, spec.source)?;
    let rows_read = values.len();

    if values.is_empty() {
        log::warn!(
            "{name}: no values stored for {}; leaving {} untouched",
            spec.source,
            spec.target
        );
        *stage = ConversionStage::Done;
        return Ok(AttributeReport {
            attribute: name.to_string(),
            dry_run: options.dry_run,
            skipped: true,
            ..AttributeReport::default()
        });
    }

    *stage = ConversionStage::Converting;
    let table = ValueTable::single_column(spec.source.code(), name, values);
    let fragments = cache.overlap_table(spec.source, spec.target).await?;
    let request = ConversionRequest::from_spec(spec, attribute.value_kind());
    let conversion = convert(&table, &fragments, &request)?;

    *stage = ConversionStage::Resolving;
    let (rows, unresolved) = resolve_rows(cache, spec, &conversion.table).await?;

    let mut report = AttributeReport {
        attribute: name.to_string(),
        rows_read,
        rows_written: rows.len(),
        unmatched: conversion.unmatched,
        unresolved,
        skipped_fragments: conversion.skipped_fragments,
        dry_run: options.dry_run,
        skipped: rows.is_empty(),
        ..AttributeReport::default()
    };

    if report.skipped {
        log::warn!(
            "{name}: none of {rows_read} value(s) survived conversion to {}; leaving it untouched",
            spec.target
        );
        *stage = ConversionStage::Done;
        return Ok(report);
    }

    if options.dry_run {
        log::info!(
            "{name}: dry run, would write {} value(s) to {}",
            report.rows_written,
            spec.target
        );
        *stage = ConversionStage::Done;
        return Ok(report);
    }

    *stage = ConversionStage::Writing;
    store.begin()?;

    match write_attribute(store, spec, &attribute, &rows, options, stage) {
        Ok((superseded, source_deleted)) => {
            store.commit()?;
            report.superseded = superseded;
            report.source_deleted = source_deleted;
        }
        Err(e) => {
            if let Err(rollback_err) = store.rollback() {
                log::error!("{name}: rollback failed: {rollback_err}");
            }
            return Err(e);
        }
    }

    *stage = ConversionStage::Done;
    log::info!(
        "{name}: wrote {} value(s) to {} ({} superseded, {} unmatched, {} unresolved)",
        report.rows_written,
        spec.target,
        report.superseded,
        report.unmatched.len(),
        report.unresolved.len()
    );

    Ok(report)
}

/// Maps converted rows to canonical codes, returning the resolved rows and
/// the codes that could not be resolved.
async fn resolve_rows(
    cache: &mut BatchCache<'_>,
    spec: &ConversionSpec,
    table: &ValueTable,
) -> Result<(Vec<(String, f64)>, Vec<String>), ReprojectError> {
    let mut resolved: BTreeMap<String, (String, f64)> = BTreeMap::new();
    let mut unresolved = Vec::new();

    for (code, value) in table.column_values(0) {
        let Some(canonical) = cache.resolve_with(spec.resolver, spec.target, &code).await? else {
            log::warn!("{}: no canonical code for {code}, dropping", spec.target);
            unresolved.push(code);
            continue;
        };

        if let Some((first, _)) = resolved.get(&canonical) {
            return Err(ReprojectError::AmbiguousCode {
                canonical,
                first: first.clone(),
                second: code,
            });
        }

        resolved.insert(canonical, (code, value));
    }

    let rows = resolved
        .into_iter()
        .map(|(canonical, (_, value))| (canonical, value))
        .collect();

    Ok((rows, unresolved))
}

/// Everything written for one attribute. Runs inside an open transaction.
fn write_attribute(
    store: &mut dyn StatisticsStore,
    spec: &ConversionSpec,
    attribute: &Attribute,
    rows: &[(String, f64)],
    options: ConvertOptions,
    stage: &mut ConversionStage,
) -> Result<(u64, u64), ReprojectError> {
    let name = attribute.name.as_str();

    match store.attribute(name, spec.target)? {
        Some(existing) if existing.unit_type != attribute.unit_type => {
            return Err(ReprojectError::UnitMismatch {
                name: name.to_string(),
                generation: spec.target,
                expected: attribute.unit_type,
                found: existing.unit_type,
            });
        }
        Some(_) => {}
        None => {
            store.ensure_attribute(&attribute.counterpart(spec.target))?;
            log::info!("{name}: declared for {}", spec.target);
        }
    }

    let superseded = store.delete_values(name, spec.target)?;

    for (code, value) in rows {
        store.upsert_value(&GeographyUnit::new(spec.target, code.as_str()), name, *value)?;
    }

    let source_deleted = if options.delete_old {
        store.delete_values(name, spec.source)?
    } else {
        0
    };

    *stage = ConversionStage::Recomputing;
    store.recompute_summary(name, spec.target)?;
    if options.delete_old {
        store.recompute_summary(name, spec.source)?;
    }

    Ok((superseded, source_deleted))
}

fn label(spec: &ConversionSpec) -> String {
    format!("{} -> {}", spec.source, spec.target)
}
