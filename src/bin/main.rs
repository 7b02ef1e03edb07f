//! lakeshift CLI - Convert T-SQL, Fabric SQL and Power Query M to Databricks SQL
//!
//! Usage:
//!   lakeshift convert <paths...> [--dialect <dialect>] [--profile <name>] [--out-dir <dir>]
//!   lakeshift config [--profile <name>]
//!
//! Examples:
//!   lakeshift convert queries/ --catalog analytics --out-dir converted
//!   lakeshift convert sales.m --format json
//!   lakeshift convert warehouse.sql --dialect fabric --check

use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};
use clap::{Parser, Subcommand, ValueEnum};
use lakeshift::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lakeshift")]
#[command(about = "lakeshift - Convert T-SQL, Fabric SQL and Power Query M to Databricks SQL")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert source files to Databricks SQL
    Convert {
        /// Files or directories to convert
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Source dialect (auto routes .sql to T-SQL and .m/.pq to M)
        #[arg(short, long, default_value = "auto")]
        dialect: DialectArg,

        /// Unity Catalog catalog (overrides the profile)
        #[arg(long)]
        catalog: Option<String>,

        /// Default schema (overrides the profile)
        #[arg(long)]
        schema: Option<String>,

        /// Profile from lakeshift.toml
        #[arg(short, long)]
        profile: Option<String>,

        /// Write converted files here instead of stdout
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        format: OutputFormat,

        /// Syntax-check converted SQL offline
        #[arg(long)]
        check: bool,
    },

    /// Print the resolved conversion context
    Config {
        /// Profile from lakeshift.toml
        #[arg(short, long)]
        profile: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DialectArg {
    Auto,
    Tsql,
    Fabric,
    M,
}

impl DialectArg {
    fn resolve(self, path: &Path) -> Option<SourceDialect> {
        match self {
            DialectArg::Auto => SourceDialect::from_extension(path),
            DialectArg::Tsql => Some(SourceDialect::TSql),
            DialectArg::Fabric => Some(SourceDialect::Fabric),
            DialectArg::M => Some(SourceDialect::PowerQuery),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Converted SQL, notes on stderr
    Sql,
    /// One JSON report per input
    Json,
}

/// JSON report entry for one file.
#[derive(Serialize)]
struct FileReport<'a> {
    path: String,
    #[serde(flatten)]
    result: &'a ConversionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationOutcome>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Convert {
            paths,
            dialect,
            catalog,
            schema,
            profile,
            out_dir,
            format,
            check,
        } => {
            let settings = match Settings::load() {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error loading configuration: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            let mut context = match settings.context(profile.as_deref()) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error resolving configuration: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if let Some(catalog) = catalog {
                context.default_catalog = catalog;
            }
            if let Some(schema) = schema {
                context.default_schema = schema;
            }
            let out_dir = out_dir.or(settings.output.directory.clone());
            cmd_convert(&paths, dialect, &context, out_dir.as_deref(), format, check)
        }
        Commands::Config { profile } => cmd_config(profile.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_convert(
    paths: &[PathBuf],
    dialect: DialectArg,
    context: &ConversionContext,
    out_dir: Option<&Path>,
    format: OutputFormat,
    check: bool,
) -> ExitCode {
    let mut files = Vec::new();
    for path in paths {
        if let Err(e) = collect_files(path, dialect, &mut files) {
            eprintln!("Error reading '{}': {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    }
    if files.is_empty() {
        eprintln!("No .sql, .m or .pq files found");
        return ExitCode::FAILURE;
    }
    if let Some(dir) = out_dir {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Error creating '{}': {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let validator = SyntaxValidator::lenient();
    let mut failed = 0usize;
    let mut reports = Vec::new();

    for (path, source_dialect) in files {
        let source = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                failed += 1;
                continue;
            }
        };

        debug!(path = %path.display(), dialect = %source_dialect, "converting file");
        let result = convert(&source, source_dialect, context);
        let validation = match (&result.output_sql, check) {
            (Some(sql), true) => Some(validator.validate(sql, &Databricks)),
            _ => None,
        };
        if !result.succeeded() || validation.as_ref().is_some_and(ValidationOutcome::is_failed) {
            failed += 1;
        }

        match format {
            OutputFormat::Sql => {
                report_notes(&path, &source, &result);
                if let Some(outcome) = &validation {
                    eprintln!("{}: check {:?}", path.display(), outcome);
                }
                if let Some(sql) = &result.output_sql {
                    if let Err(e) = write_sql(&path, sql, out_dir) {
                        eprintln!("Error writing output for '{}': {}", path.display(), e);
                        failed += 1;
                    }
                }
            }
            OutputFormat::Json => reports.push((path.display().to_string(), result, validation)),
        }
    }

    if format == OutputFormat::Json {
        let entries: Vec<FileReport<'_>> = reports
            .iter()
            .map(|(path, result, validation)| FileReport {
                path: path.clone(),
                result,
                validation: validation.clone(),
            })
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => match out_dir {
                Some(dir) => {
                    if let Err(e) = fs::write(dir.join("lakeshift-report.json"), json) {
                        eprintln!("Error writing report: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
                None => println!("{}", json),
            },
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    info!(failed, "conversion finished");
    if failed > 0 {
        eprintln!("{} file(s) failed", failed);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Expand directories into convertible files, sorted for stable output.
fn collect_files(
    path: &Path,
    dialect: DialectArg,
    out: &mut Vec<(PathBuf, SourceDialect)>,
) -> std::io::Result<()> {
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = fs::read_dir(path)?
            .map(|e| e.map(|e| e.path()))
            .collect::<Result<_, _>>()?;
        entries.sort();
        for entry in entries {
            if entry.is_dir() {
                collect_files(&entry, dialect, out)?;
            } else if let Some(found) = SourceDialect::from_extension(&entry) {
                // an explicit SQL dialect only picks up .sql files, and M only .m/.pq
                let is_m = |d: SourceDialect| d == SourceDialect::PowerQuery;
                if let Some(d) = dialect.resolve(&entry).filter(|d| is_m(*d) == is_m(found)) {
                    out.push((entry, d));
                }
            }
        }
    } else if let Some(d) = dialect.resolve(path) {
        out.push((path.to_path_buf(), d));
    } else {
        eprintln!(
            "Skipping '{}': unknown extension (use --dialect)",
            path.display()
        );
    }
    Ok(())
}

fn write_sql(path: &Path, sql: &str, out_dir: Option<&Path>) -> std::io::Result<()> {
    match out_dir {
        Some(dir) => {
            let stem = path.file_stem().unwrap_or(path.as_os_str());
            let target = dir.join(stem).with_extension("sql");
            fs::write(target, format!("{}\n", sql.trim_end()))
        }
        None => {
            println!("-- {}", path.display());
            println!("{}", sql.trim_end());
            println!();
            Ok(())
        }
    }
}

/// Print notes to stderr; fatal errors are rendered against the source.
fn report_notes(path: &Path, source: &str, result: &ConversionResult) {
    let name = path.display().to_string();
    for note in &result.notes {
        match (note.severity, note.offset) {
            (Severity::Error, Some(offset)) => {
                let end = (offset + 1).min(source.len()).max(offset);
                let span = (name.as_str(), offset..end);
                let rendered = Report::build(ReportKind::Error, span.clone())
                    .with_config(Config::default().with_index_type(IndexType::Byte))
                    .with_code(note.code.as_str())
                    .with_message(&note.message)
                    .with_label(
                        Label::new(span)
                            .with_message(note.code.as_str())
                            .with_color(Color::Red),
                    )
                    .finish()
                    .eprint((name.as_str(), Source::from(source)));
                if rendered.is_err() {
                    eprintln!("{}: {}", name, note);
                }
            }
            _ => eprintln!("{}: {}", name, note),
        }
    }
    if result.incomplete {
        eprintln!("{}: output is incomplete", name);
    }
}

fn cmd_config(profile: Option<&str>) -> ExitCode {
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    match settings.context(profile) {
        Ok(context) => {
            println!("catalog        = {}", context.default_catalog);
            println!("schema         = {}", context.default_schema);
            println!("staging schema = {}", context.staging_schema);
            let profile = profile.or(settings.defaults.profile.as_deref());
            if let Some(name) = profile {
                println!("profile        = {}", name);
                if let Ok(Some(id)) = settings.warehouse_id(name) {
                    println!("warehouse id   = {}", id);
                }
            }
            if let Some(dir) = &settings.output.directory {
                println!("output         = {}", dir.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error resolving configuration: {}", e);
            ExitCode::FAILURE
        }
    }
}
