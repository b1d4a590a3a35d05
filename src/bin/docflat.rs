//! docflat: Flatten document-database JSON exports into tables
//!
//! Usage:
//!   # Process the receipts/users/brands exports under data/input_data
//!   docflat
//!
//!   # Process specific files, writing one .jsonl per table
//!   docflat exports/users.json.gz exports/brands.json.gz --output-dir ./tables
//!
//!   # Spread receipt items into one row each and count brand references
//!   docflat --explode --value-counts brands_cpg.cpg.ref_collection

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use docflat::profile::profile_table;
use docflat::writer::{write_rows, TableWriter};
use docflat::{ExtractMode, Pipeline, PipelineConfig, PipelineOutput, SourceConfig, Table};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docflat")]
#[command(about = "Flatten gzip-compressed JSON exports into tables", long_about = None)]
struct Args {
    /// Export files to process (default: the configured sources)
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Directory holding receipts/users/brands exports
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// JSON config file with rules, extraction settings and sources
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for one .jsonl file per table
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Spread nested arrays into one row per element
    #[arg(long)]
    explode: bool,

    /// Don't link extracted rows back to their parent rows
    #[arg(long)]
    no_parent_ids: bool,

    /// Number of rows to print per table (default: 10)
    #[arg(long, default_value_t = 10)]
    head: usize,

    /// Print a column profile for every table
    #[arg(long)]
    profile: bool,

    /// Print value counts for TABLE.COLUMN or TABLE.COLUMN.FIELD
    #[arg(long, value_name = "TABLE.COLUMN[.FIELD]")]
    value_counts: Vec<String>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = build_config(&args)?;
    let pipeline = Pipeline::new(&config);

    let writer = match &args.output_dir {
        Some(dir) => Some(TableWriter::new(dir)?),
        None => None,
    };

    let mut outputs = Vec::new();
    let mut failures = 0;
    for (source, result) in pipeline.run_all(&config.sources) {
        match result {
            Ok(output) => outputs.push(output),
            Err(err) => {
                eprintln!("✗ {}: {}", source.name, err);
                failures += 1;
            }
        }
    }

    let mut stdout = std::io::stdout().lock();
    for table in outputs.iter().flat_map(|output| output.tables()) {
        print_table(&mut stdout, table, args.head)?;

        if args.profile {
            let profiles = profile_table(table);
            writeln!(stdout, "Column profile of {}:", table.name)?;
            writeln!(stdout, "{}\n", serde_json::to_string_pretty(&profiles)?)?;
        }

        if let Some(writer) = &writer {
            let path = writer.write_table(table)?;
            tracing::info!(table = %table.name, path = %path.display(), "Wrote table");
        }
    }

    for selector in &args.value_counts {
        print_value_counts(&mut stdout, &outputs, selector)?;
    }

    if failures > 0 {
        bail!("{} of {} sources failed", failures, config.sources.len());
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, then the config file, then command-line flags
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.sources = SourceConfig::defaults_in(dir);
    }
    if !args.inputs.is_empty() {
        config.sources = args.inputs.iter().map(SourceConfig::for_path).collect();
    }
    if args.explode {
        config.extract.mode = ExtractMode::Explode;
    }
    if args.no_parent_ids {
        config.extract.include_parent_ids = false;
    }

    Ok(config)
}

fn print_table<W: Write>(out: &mut W, table: &Table, head: usize) -> Result<()> {
    writeln!(out, "First {} rows of {}:", head.min(table.len()), table.name)?;
    write_rows(out, &table.head(head))?;
    let (rows, columns) = table.shape();
    writeln!(out, "Shape of the table: ({}, {})\n", rows, columns)?;
    Ok(())
}

fn print_value_counts<W: Write>(out: &mut W, outputs: &[PipelineOutput], selector: &str) -> Result<()> {
    let mut parts = selector.splitn(3, '.');
    let (Some(table_name), Some(column)) = (parts.next(), parts.next()) else {
        bail!("--value-counts expects TABLE.COLUMN[.FIELD], got '{}'", selector);
    };
    let field = parts.next();

    let table = outputs
        .iter()
        .flat_map(|output| output.tables())
        .find(|t| t.name == table_name)
        .with_context(|| format!("No table named '{}'", table_name))?;

    writeln!(out, "Value counts of {}:", selector)?;
    for (value, count) in table.value_counts(column, field) {
        writeln!(out, "{:<40} {}", value, count)?;
    }
    writeln!(out)?;
    Ok(())
}
