// crates/imagequery-cli/src/main.rs
// ============================================================================
// Module: imagequery CLI Entry Point
// Description: Command dispatcher for running and listing image queries.
// Purpose: Provide the operator surface over the query dispatch subsystem.
// Dependencies: clap, imagequery-config, imagequery-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! The imagequery CLI loads the explicit configuration object, builds a
//! dispatcher, and exposes two commands: `run` executes a query against a
//! set of analyzed images, `list` enumerates discoverable queries with their
//! self-reported help text. Results render as aligned text tables or JSON.
//! Query names are untrusted operator input; unsafe or unknown names exit
//! nonzero without touching the filesystem with them.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use imagequery_config::QueryConfig;
use imagequery_core::ImageId;
use imagequery_core::QueryDispatcher;
use imagequery_core::QueryOutcome;
use imagequery_core::QueryReport;
use imagequery_core::ResultMapping;
use imagequery_core::TabularResult;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration file location.
const DEFAULT_CONFIG_PATH: &str = "/etc/imagequery/imagequery.toml";

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Run ad-hoc queries against analyzed container images.
#[derive(Debug, Parser)]
#[command(name = "imagequery", version, about)]
struct Cli {
    /// Path to the imagequery configuration file.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a query against one or more analyzed images.
    Run {
        /// Query name to resolve and execute.
        query: String,
        /// Free-form parameters passed to the query script.
        #[arg(value_name = "PARAM")]
        params: Vec<String>,
        /// Analyzed image identifier (repeatable).
        #[arg(long = "image", value_name = "IMAGE_ID", required = true)]
        images: Vec<String>,
        /// Output rendering format.
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// List discoverable queries with their help text.
    List {
        /// Optional query name to show help for.
        query: Option<String>,
        /// Output rendering format.
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

/// Output rendering formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Aligned plain-text tables.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal CLI error carrying a user-facing message.
#[derive(Debug)]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.message.fmt(f)
    }
}

/// Result alias for CLI command handlers.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    init_tracing();
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let config = QueryConfig::load(&cli.config)
        .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    debug!(config = %cli.config.display(), "configuration loaded");
    let dispatcher = QueryDispatcher::new(&config);

    match cli.command {
        Commands::Run {
            query,
            params,
            images,
            format,
        } => command_run(&dispatcher, query, params, &images, format),
        Commands::List {
            query,
            format,
        } => command_list(&dispatcher, query, format),
    }
}

/// Initializes stderr logging from the environment filter.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// SECTION: Run Command
// ============================================================================

/// Executes the `run` command.
fn command_run(
    dispatcher: &QueryDispatcher,
    query: String,
    params: Vec<String>,
    images: &[String],
    format: OutputFormat,
) -> CliResult<ExitCode> {
    let mut tokens = vec![query];
    tokens.extend(params);
    let image_ids: Vec<ImageId> = images.iter().map(ImageId::new).collect();

    let report = dispatcher
        .run_query(&tokens, &image_ids)
        .map_err(|err| CliError::new(err.to_string()))?;
    render_report(&report, format)
}

// ============================================================================
// SECTION: List Command
// ============================================================================

/// Executes the `list` command.
fn command_list(
    dispatcher: &QueryDispatcher,
    query: Option<String>,
    format: OutputFormat,
) -> CliResult<ExitCode> {
    let tokens: Vec<String> = query.into_iter().collect();
    let report =
        dispatcher.run_query(&tokens, &[]).map_err(|err| CliError::new(err.to_string()))?;
    render_report(&report, format)
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders a query report and derives the exit code.
fn render_report(report: &QueryReport, format: OutputFormat) -> CliResult<ExitCode> {
    match report {
        QueryReport::Rejected(rejection) => {
            write_stderr_line(&format!("query rejected: {}", rejection.message))
                .map_err(|err| CliError::new(err.to_string()))?;
            Ok(ExitCode::FAILURE)
        }
        QueryReport::Help(listing) => {
            render_tabular(listing, format)?;
            Ok(ExitCode::SUCCESS)
        }
        QueryReport::Results(mapping) => render_mapping(mapping, format),
    }
}

/// Renders a result mapping; exits nonzero when every outcome failed.
fn render_mapping(mapping: &ResultMapping, format: OutputFormat) -> CliResult<ExitCode> {
    if format == OutputFormat::Json {
        let text = serde_json::to_string_pretty(mapping)
            .map_err(|err| CliError::new(err.to_string()))?;
        write_stdout_line(&text).map_err(|err| CliError::new(err.to_string()))?;
    } else {
        for (key, outcome) in mapping {
            write_stdout_line(&format!("{key}:"))
                .map_err(|err| CliError::new(err.to_string()))?;
            for line in outcome_lines(outcome) {
                write_stdout_line(&line).map_err(|err| CliError::new(err.to_string()))?;
            }
        }
    }
    let all_failed = !mapping.is_empty() && mapping.values().all(|outcome| !outcome.success);
    if all_failed {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Renders one tabular result in the requested format.
fn render_tabular(result: &TabularResult, format: OutputFormat) -> CliResult<()> {
    if format == OutputFormat::Json {
        let text =
            serde_json::to_string_pretty(result).map_err(|err| CliError::new(err.to_string()))?;
        write_stdout_line(&text).map_err(|err| CliError::new(err.to_string()))?;
        return Ok(());
    }
    for line in table_lines(result, "") {
        write_stdout_line(&line).map_err(|err| CliError::new(err.to_string()))?;
    }
    Ok(())
}

/// Builds the text lines for one outcome under its mapping key.
fn outcome_lines(outcome: &QueryOutcome) -> Vec<String> {
    outcome.meta.as_ref().map_or_else(
        || {
            let detail = outcome.error.as_deref().unwrap_or("unknown failure");
            vec![format!("  query failed: {detail}")]
        },
        |meta| table_lines(&meta.result, "  "),
    )
}

/// Formats a tabular result as aligned text lines.
fn table_lines(result: &TabularResult, indent: &str) -> Vec<String> {
    let mut widths: Vec<usize> = result.header.iter().map(String::len).collect();
    for row in &result.rows {
        for (index, field) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(field.len());
            }
        }
    }
    let mut lines = vec![format_row(&result.header, &widths, indent)];
    for row in &result.rows {
        lines.push(format_row(row, &widths, indent));
    }
    lines
}

/// Pads one row's fields to the computed column widths.
fn format_row(fields: &[String], widths: &[usize], indent: &str) -> String {
    let mut line = String::from(indent);
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            line.push_str("  ");
        }
        let width = widths.get(index).copied().unwrap_or(field.len());
        line.push_str(field);
        for _ in field.len()..width {
            line.push(' ');
        }
    }
    line.trim_end().to_string()
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
