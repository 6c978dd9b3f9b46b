use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use doctables::{
    ExportFormat, ExtractOptions, ExtractionResult, ExtractionStatus, PageSelection,
    TableExtractor, export, to_csv_with_delimiter, to_json,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "doctables",
    version,
    about = "Extract tables from PDF and Word documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Extract tables and print a summary of each one.
    Extract(ExtractArgs),
    /// Extract tables and write them as CSV, JSON or Excel.
    Export(ExportArgs),
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Input document (.pdf, .docx or .doc).
    #[arg(short, long)]
    input: PathBuf,

    /// Page selection like 1-3,5 (PDF only).
    #[arg(long)]
    pages: Option<String>,

    /// Minimum cells required per borderless table row.
    #[arg(long, default_value_t = 2)]
    min_cols: usize,

    /// Distance in points under which ruling lines are merged.
    #[arg(long, default_value_t = 2.0)]
    edge_tolerance: f32,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Also write the full result as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output format: csv, json or xlsx.
    #[arg(short, long)]
    format: String,

    /// Output path. For CSV without --table-id this is a directory that
    /// receives one file per table.
    #[arg(short, long)]
    output: PathBuf,

    /// Export only this table.
    #[arg(long)]
    table_id: Option<String>,

    /// CSV delimiter character.
    #[arg(long, default_value = ",")]
    delimiter: char,
}

fn parse_options(args: &SourceArgs) -> Result<ExtractOptions> {
    let pages = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .map_err(|error| anyhow!("invalid page selection: {error}"))
        .context("failed to parse --pages")?;

    let options = ExtractOptions {
        pages,
        min_cols: args.min_cols,
        edge_tolerance: args.edge_tolerance,
        ..ExtractOptions::default()
    };
    options.validate()?;
    Ok(options)
}

fn run_extraction(args: &SourceArgs) -> Result<ExtractionResult> {
    let options = parse_options(args)?;
    Ok(TableExtractor::new(options).extract(&args.input))
}

fn print_summary(result: &ExtractionResult) {
    let method = result
        .extraction_method
        .map_or("none", |method| method.tag());
    println!(
        "{}: {} ({} table(s), method {method})",
        result.file_name,
        result.status.as_str(),
        result.tables.len()
    );
    for table in &result.tables {
        println!(
            "  {}  {} rows x {} cols  [{}]",
            table.table_id,
            table.row_count(),
            table.column_count(),
            table.headers.join(", ")
        );
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create '{}'", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write '{}'", path.display()))
}

fn run_extract(args: &ExtractArgs) -> Result<ExtractionResult> {
    let result = run_extraction(&args.source)?;
    print_summary(&result);

    if let Some(path) = &args.json {
        let bytes = to_json(&result).context("failed to encode extraction result")?;
        write_file(path, &bytes)?;
    }

    Ok(result)
}

fn run_export(args: &ExportArgs) -> Result<ExtractionResult> {
    let format = ExportFormat::from_str(&args.format).map_err(|error| anyhow!(error))?;
    if !args.delimiter.is_ascii() {
        bail!("delimiter must be a single ASCII character");
    }
    let delimiter = u8::try_from(args.delimiter).context("delimiter must be ASCII")?;

    let result = run_extraction(&args.source)?;
    if result.tables.is_empty() {
        return Ok(result);
    }

    if format == ExportFormat::Csv && args.table_id.is_none() {
        let written = to_csv_with_delimiter(&result.tables, &args.output, delimiter)
            .with_context(|| format!("failed to write CSV files to '{}'", args.output.display()))?;
        for path in written {
            println!("{}", path.display());
        }
        return Ok(result);
    }

    let payload = export(&result, format, args.table_id.as_deref())
        .with_context(|| format!("failed to export {format}"))?;
    write_file(&args.output, &payload.bytes)?;
    println!("{} ({})", args.output.display(), payload.mime_type);

    Ok(result)
}

fn exit_code(result: &ExtractionResult) -> ExitCode {
    match result.status {
        ExtractionStatus::Success => ExitCode::SUCCESS,
        ExtractionStatus::NoTablesFound => ExitCode::from(2),
        ExtractionStatus::Failed => {
            eprintln!(
                "error: {}",
                result.error.as_deref().unwrap_or("extraction failed")
            );
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doctables=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let cli = Cli::parse();
    let outcome = match &cli.command {
        Commands::Extract(args) => run_extract(args),
        Commands::Export(args) => run_export(args),
    };

    match outcome {
        Ok(result) => exit_code(&result),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
