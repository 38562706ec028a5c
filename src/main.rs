use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use enedis_gap_filler::config::Config;
use enedis_gap_filler::db::{self, ConsumptionRepository};
use enedis_gap_filler::exporters::{export_period, validate_export_format, ExportFormat};
use enedis_gap_filler::gaps::RangePolicy;
use enedis_gap_filler::importers::read_export;
use enedis_gap_filler::series::Aggregation;
use enedis_gap_filler::services::{RepairReport, RepairService};
use enedis_gap_filler::units::Unit;

#[derive(Parser)]
#[command(name = "enedis-gap-filler")]
#[command(about = "Repair gaps in hourly ENEDIS consumption exports from neighbouring years", long_about = None)]
struct Cli {
    /// ENEDIS export to repair (.csv with ';' separator, or .xlsx)
    #[arg(long)]
    input: PathBuf,

    /// Directory for the per-year output files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output files: 'template' (load-profile .xlsx), 'csv', or 'both'
    #[arg(long)]
    format: Option<ExportFormat>,

    /// Expected hours per year: 'observed' (first to last reading) or 'calendar' (Jan 1 to Dec 31)
    #[arg(long)]
    range_policy: Option<RangePolicy>,

    /// Unit of CSV values: 'W' or 'kW' (power), 'Wh' or 'kWh' (energy); .xlsx exports are always kW
    #[arg(long)]
    input_unit: Option<Unit>,

    /// How sub-hour samples combine: 'sum' (energy) or 'mean' (power); defaults to the input unit's kind
    #[arg(long)]
    aggregation: Option<Aggregation>,

    /// CSV column holding the values
    #[arg(long)]
    value_column: Option<String>,

    /// Database connection string; the repaired series replaces the stored one
    #[arg(long, env)]
    database_url: Option<String>,

    /// Fail without writing anything if some hours cannot be filled
    #[arg(long)]
    strict: bool,

    /// Print the repair report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if it exists (ignore errors if not found)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,enedis_gap_filler=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let output_dir = cli.output_dir.unwrap_or(config.output_dir);
    let format = cli.format.unwrap_or(config.export_format);
    let range_policy = cli.range_policy.unwrap_or(config.range_policy);
    let input_unit = cli.input_unit.unwrap_or(config.input_unit);
    let aggregation = cli.aggregation.or(config.aggregation);
    let value_column = cli.value_column.unwrap_or(config.value_column);
    let database_url = cli.database_url.or(config.database_url);

    info!(
        "Repairing {:?} (policy: {:?}, unit: {}, aggregation: {:?})",
        cli.input, range_policy, input_unit, aggregation
    );

    if !cli.input.exists() {
        error!("File not found: {:?}", cli.input);
        return Err(format!("File not found: {:?}", cli.input).into());
    }

    // Parse the export (blocking operation)
    let start_time = Instant::now();
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Reading {}...", cli.input.display()));

    let input = cli.input.clone();
    let raw = tokio::task::spawn_blocking(move || read_export(&input, &value_column, input_unit))
        .await??;
    pb.finish_with_message(format!("✓ Read {} rows", raw.records.len()));

    let service = match aggregation {
        Some(aggregation) => RepairService::new(range_policy, aggregation),
        None => RepairService::with_unit_aggregation(range_policy),
    };
    let outcome = service.repair(raw);
    print_summary(&outcome.report);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    }

    if cli.strict {
        outcome.report.ensure_complete()?;
    } else if !outcome.report.completeness.is_valid {
        for problem in &outcome.report.completeness.errors {
            warn!("Repaired series: {}", problem);
        }
    }

    // Export one set of files per year
    std::fs::create_dir_all(&output_dir)?;
    let periods = outcome.series.periods();
    let pb = ProgressBar::new(periods.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("##-"),
    );

    for period in periods {
        pb.set_message(format!("{period}"));
        for file in export_period(&outcome.series, period, &output_dir, format)? {
            if file.path.extension().is_some_and(|ext| ext == "xlsx") {
                let problems = validate_export_format(&file.path);
                if problems.is_empty() {
                    info!("✓ {} generated", file.path.display());
                } else {
                    warn!("Validation errors for {}:", file.path.display());
                    for problem in problems {
                        warn!("  - {}", problem);
                    }
                }
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("files written");

    match database_url {
        Some(url) => {
            let pool = db::connect(&url, config.database_max_connections).await?;
            let repository = ConsumptionRepository::new(pool);
            let stored = service.publish(&repository, &outcome).await?;
            info!("Stored {} records", stored);
        }
        None => info!("No DATABASE_URL configured, skipping persistence"),
    }

    info!("Done in {:.2?}", start_time.elapsed());
    Ok(())
}

fn print_summary(report: &RepairReport) {
    println!("\n=== Repair summary ===");
    println!("Raw rows:        {}", report.raw_rows);
    println!("Hourly records:  {}", report.hourly_records);
    println!("Malformed rows:  {}", report.validation.malformed.len());
    println!("Empty values:    {}", report.validation.missing_values.len());
    println!("Skipped rows:    {}", report.validation.skipped_rows.len());

    for malformed in &report.validation.malformed {
        println!(
            "  row {} ({}): '{}' {}",
            malformed.row, malformed.timestamp, malformed.raw_value, malformed.reason
        );
    }

    for period in &report.periods {
        println!("\nYear {}:", period.period);
        if period.missing_hours == 0 {
            println!("  - no missing hours");
            continue;
        }
        println!("  - {} missing hours detected", period.missing_hours);
        for (year, count) in &period.filled_by_source {
            println!("  - {count} filled from {year}");
        }
        if !period.residual_gaps.is_empty() {
            println!(
                "  - {} left empty (first: {})",
                period.residual_gaps.len(),
                period.residual_gaps[0]
            );
        }
    }
    println!();
}
