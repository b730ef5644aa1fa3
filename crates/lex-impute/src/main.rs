//! CLI entry point for the imputation pipeline composer.

use anyhow::{Result, anyhow};
use clap::{ArgGroup, Parser, ValueEnum};
use lex_impute::{
    ColumnRequest, ComposedPipeline, DatasetView, ImputeConfig, ImputeError, PipelineComposer,
    PipelineDefaults, SchemaColumn, StrategyKind,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// CLI-compatible replacement strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStrategy {
    /// Zero, empty text, false or the zero instant
    #[value(alias = "def")]
    Default,
    /// Mean of the observed values
    Mean,
    /// Smallest observed value
    #[value(alias = "minimum")]
    Min,
    /// Largest observed value
    #[value(alias = "maximum")]
    Max,
}

impl From<CliStrategy> for StrategyKind {
    fn from(cli: CliStrategy) -> Self {
        match cli {
            CliStrategy::Default => StrategyKind::Default,
            CliStrategy::Mean => StrategyKind::Mean,
            CliStrategy::Min => StrategyKind::Minimum,
            CliStrategy::Max => StrategyKind::Maximum,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Schema-aware missing-value imputation",
    long_about = "Composes and runs a missing-value imputation pipeline over a CSV or Parquet file.\n\n\
                  EXAMPLES:\n  \
                  # Mean-impute two columns, with indicators\n  \
                  lex-impute -i data.csv --column age --column income --strategy mean -o out.parquet\n\n  \
                  # Impute into a new column, no indicator\n  \
                  lex-impute -i data.csv --column age_filled=age --no-indicator -o out.csv\n\n  \
                  # Preview the planned stages from a JSON config\n  \
                  lex-impute -i data.parquet --config impute.json --dry-run"
)]
#[command(group(ArgGroup::new("slot_mode").args(["by_slot", "whole_column"])))]
struct Args {
    /// Path to the CSV or Parquet file to process
    #[arg(short, long)]
    input: PathBuf,

    /// Output file (.parquet or .csv)
    ///
    /// If not specified, writes "<input_stem>_imputed.parquet" next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration with defaults and column requests
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Column to impute, as `output` or `output=source` (repeatable)
    #[arg(long = "column", value_name = "SPEC")]
    columns: Vec<String>,

    /// Default replacement strategy
    #[arg(long, value_enum)]
    strategy: Option<CliStrategy>,

    /// Impute vector columns per slot by default
    #[arg(long)]
    by_slot: bool,

    /// Impute vector columns as a whole by default
    #[arg(long)]
    whole_column: bool,

    /// Do not emit missing-value indicators by default
    #[arg(long)]
    no_indicator: bool,

    /// Report every failing column instead of stopping at the first
    #[arg(long)]
    all_errors: bool,

    /// Print the planned pipeline without processing data
    #[arg(long)]
    dry_run: bool,

    /// Print JSON to stdout instead of human-readable output
    ///
    /// Disables all logs so stdout can be piped to other tools.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is disabled so stdout only carries JSON.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) if args.json => {
            let payload = match e.downcast_ref::<ImputeError>() {
                Some(err) => serde_json::json!({ "error": err }),
                None => serde_json::json!({ "error": { "code": "CLI_ERROR", "message": e.to_string() } }),
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Err(e)
        }
        Err(e) => {
            error!("{}", e);
            Err(e)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    let (defaults, requests) = resolve_requests(args)?;

    info!("Loading dataset from: {}", args.input.display());
    let data = load_dataset(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());

    let input = DatasetView::new(data);
    let pipeline = PipelineComposer::builder()
        .defaults(defaults)
        .collect_all_errors(args.all_errors)
        .build()
        .compose(&requests, &input)?;

    if args.dry_run {
        return print_plan(&pipeline, args.json);
    }

    let output = pipeline.apply(&input)?;
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input));
    write_dataset(&output, &output_path)?;
    info!("Imputed dataset written to: {}", output_path.display());

    if args.json {
        let report = serde_json::json!({
            "output": output_path.display().to_string(),
            "rows": output.height(),
            "pipeline": pipeline.summary(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", pipeline.describe());
        println!("Wrote {} rows to {}", output.height(), output_path.display());
    }
    Ok(())
}

/// Merge the JSON config (if any) with the command line.
///
/// Command-line defaults override the file's, and `--column` requests are
/// appended after the file's columns.
fn resolve_requests(args: &Args) -> Result<(PipelineDefaults, Vec<ColumnRequest>)> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            ImputeConfig::from_json_file(path)?
        }
        None => ImputeConfig::default(),
    };

    let mut defaults = config.defaults;
    if let Some(strategy) = args.strategy {
        defaults.strategy = strategy.into();
    }
    if args.by_slot {
        defaults.impute_by_slot = true;
    }
    if args.whole_column {
        defaults.impute_by_slot = false;
    }
    if args.no_indicator {
        defaults.emit_indicator = false;
    }

    let mut requests = config.columns;
    for spec in &args.columns {
        requests.push(spec.parse::<ColumnRequest>()?);
    }
    debug!("Resolved {} request(s) with defaults {:?}", requests.len(), defaults);

    Ok((defaults, requests))
}

/// Print the planned stage groups.
///
/// Uses `println!` intentionally: the plan is the primary output of --dry-run.
fn print_plan(pipeline: &ComposedPipeline, json: bool) -> Result<()> {
    if json {
        let plan = serde_json::json!({
            "input_schema": pipeline.input_schema().describe(),
            "groups": pipeline.groups(),
            "summary": pipeline.summary(),
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(80));
    println!("DRY RUN - Planned imputation pipeline");
    println!("{}\n", "=".repeat(80));
    print!("{}", pipeline.describe());
    Ok(())
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    input.with_file_name(format!("{}_imputed.parquet", stem))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

fn load_dataset(path: &Path) -> Result<DataFrame> {
    if has_extension(path, "parquet") {
        let file = File::open(path)?;
        return Ok(ParquetReader::new(file).finish()?);
    }
    load_csv_with_fallbacks(path)
}

/// Load a CSV file, retrying without quote handling if the first attempt fails.
fn load_csv_with_fallbacks(path: &Path) -> Result<DataFrame> {
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .map_err(|e| anyhow!("Failed to read CSV file {}: {}", path.display(), e))
}

fn write_dataset(view: &DatasetView, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;

    if has_extension(path, "csv") {
        let mut df = flatten_vectors(view)?;
        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(&mut df)?;
    } else {
        let mut df = view.frame().clone();
        ParquetWriter::new(&mut file).finish(&mut df)?;
    }
    Ok(())
}

/// CSV cannot hold nested values.
///
/// Fixed-length vectors become one column per slot, named after the slot.
/// Variable-length vectors are written as `;`-separated text, skipping
/// missing items.
fn flatten_vectors(view: &DatasetView) -> Result<DataFrame> {
    let mut exprs = Vec::with_capacity(view.frame().width());
    for column in view.schema().columns() {
        let name = column.name.as_str();
        match view.frame().column(name)?.dtype() {
            DataType::Array(_, width) => exprs.extend(slot_exprs(column, *width)),
            DataType::List(_) => exprs.push(
                col(name)
                    .cast(DataType::List(Box::new(DataType::String)))
                    .list()
                    .join(lit(";"), true),
            ),
            _ => exprs.push(col(name)),
        }
    }
    Ok(view.frame().clone().lazy().select(exprs).collect()?)
}

fn slot_exprs(column: &SchemaColumn, width: usize) -> Vec<Expr> {
    (0..width)
        .map(|slot| {
            let suffix = column
                .slot_names
                .as_ref()
                .and_then(|names| names.get(slot).cloned())
                .unwrap_or_else(|| slot.to_string());
            col(column.name.as_str())
                .arr()
                .get(lit(slot as i64), false)
                .alias(format!("{}.{}", column.name, suffix))
        })
        .collect()
}
