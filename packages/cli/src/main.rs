#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for converting stored statistics between geography
//! generations.
//!
//! Uses `indicatif-log-bridge` (via [`areashift_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and the batch progress bar never fight for the terminal.

use std::time::Instant;

use areashift_cli_utils::IndicatifProgress;
use areashift_database::{DuckDbStore, StatisticsStore, paths};
use areashift_geography::cache::BatchCache;
use areashift_geography::config::ResourceConfig;
use areashift_geography::fetch::fetcher_for;
use areashift_geography_models::GeographyGeneration;
use areashift_reproject::orchestrator::source_attributes;
use areashift_reproject::registry::{all_conversions, find_conversion};
use areashift_reproject::{BatchReport, ConvertOptions, convert_batch};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "areashift",
    about = "Move stored statistics between geography generations"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered conversions
    Conversions,
    /// Convert attributes using a registered conversion
    Convert {
        /// Conversion identifier (e.g., "`parl10_to_parl25`")
        conversion: String,
        /// Comma-separated list of attribute names to convert
        #[arg(long, value_delimiter = ',', conflicts_with = "all")]
        attributes: Vec<String>,
        /// Convert every attribute declared for the source generation
        #[arg(long)]
        all: bool,
        /// Delete the source generation's values after a successful write
        #[arg(long)]
        delete_old: bool,
        /// Convert and resolve but write nothing
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the cached summary of an attribute
    Summary {
        /// Attribute name
        attribute: String,
        /// Generation code (e.g., "PARL25")
        generation: String,
    },
    /// Create the statistics store and its schema
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = areashift_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Conversions => {
            let conversions = all_conversions()?;
            println!("{:<20} {:<8} {:<8} {:<12} NAME", "ID", "FROM", "TO", "MEASURE");
            println!("{}", "-".repeat(72));
            for c in &conversions {
                println!(
                    "{:<20} {:<8} {:<8} {:<12} {}",
                    c.id,
                    c.source.code(),
                    c.target.code(),
                    c.measure,
                    c.name
                );
            }
        }
        Commands::Convert {
            conversion,
            attributes,
            all,
            delete_old,
            dry_run,
        } => {
            let definition = find_conversion(&conversion)?;
            let spec = definition.spec()?;
            let mut store = DuckDbStore::open_default()?;

            let names = if all {
                source_attributes(&store, &spec)?
            } else if attributes.is_empty() {
                return Err("pass --attributes or --all".into());
            } else {
                attributes
            };

            let config = ResourceConfig::from_env();
            let fetcher = fetcher_for(&config)?;
            let mut cache = BatchCache::new(fetcher.as_ref(), &config);
            let progress = IndicatifProgress::steps_bar(&multi, &definition.name);
            let options = ConvertOptions {
                delete_old,
                dry_run,
            };

            let start = Instant::now();
            let report = convert_batch(
                &mut store,
                &mut cache,
                &spec,
                &names,
                options,
                progress.as_ref(),
            )
            .await;
            let elapsed = start.elapsed();

            print_report(&report);
            log::info!(
                "{}: {} attribute(s), {} value(s) written in {:.1}s ({} overlap table(s), {} code lookup(s) fetched)",
                definition.id,
                names.len(),
                report.rows_written(),
                elapsed.as_secs_f64(),
                cache.overlap_table_count(),
                cache.lookup_count()
            );

            if !report.is_success() {
                return Err(format!("{} attribute(s) failed", report.failed.len()).into());
            }
        }
        Commands::Summary {
            attribute,
            generation,
        } => {
            let generation = GeographyGeneration::from_code(&generation)?;
            let store = DuckDbStore::open_default()?;

            match store.summary(&attribute, generation)? {
                Some(summary) => {
                    println!("{attribute} ({generation})");
                    println!("  count:   {}", summary.count);
                    println!("  average: {}", summary.average);
                    println!("  minimum: {}", summary.minimum);
                    println!("  maximum: {}", summary.maximum);
                }
                None => println!("No summary for {attribute} in {generation}"),
            }
        }
        Commands::Init => {
            let path = paths::statistics_db_path();
            DuckDbStore::open(&path)?;
            log::info!("Statistics store ready at {}", path.display());
        }
    }

    Ok(())
}

fn print_report(report: &BatchReport) {
    println!(
        "{:<28} {:>8} {:>8} {:>9} {:>10}",
        "ATTRIBUTE", "READ", "WRITTEN", "UNMATCHED", "UNRESOLVED"
    );
    println!("{}", "-".repeat(67));

    for r in &report.converted {
        println!(
            "{:<28} {:>8} {:>8} {:>9} {:>10}{}",
            r.attribute,
            r.rows_read,
            r.rows_written,
            r.unmatched.len(),
            r.unresolved.len(),
            if r.skipped {
                "  (skipped, nothing converted)"
            } else if r.dry_run {
                "  (dry run)"
            } else {
                ""
            }
        );
    }

    for f in &report.failed {
        println!("{:<28} FAILED while {}: {}", f.attribute, f.stage, f.error);
    }
}
