//! Binary entry point for the textpatch CLI.
//!
//! Applies a rule file of literal search-and-replace patches to a text file.
//!
//! ## Usage
//!
//! ```bash
//! # Apply every rule and write the result
//! textpatch apply --rules patches.toml src/App.tsx
//!
//! # Preview the edits as a unified diff without writing
//! textpatch apply --rules patches.toml --dry-run --format diff
//!
//! # Report whether a file is patched, unpatched, or drifted
//! textpatch check --rules patches.toml
//!
//! # Validate a rule file
//! textpatch list --rules patches.toml
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use textpatch::apply::LineEndings;
use textpatch::cli::{run_apply, run_check, run_list, ApplyRequest, OptionOverrides};
use textpatch::error::{OutputErrorCode, PatchError};
use textpatch::output::{
    emit_apply_summary, emit_check_summary, emit_response, ErrorResponse, ListResponse,
};
use textpatch::rule::ReplaceMode;

// ============================================================================
// CLI Structure
// ============================================================================

/// Idempotent literal search-and-replace patching.
#[derive(Parser, Debug)]
#[command(
    name = "textpatch",
    version,
    about = "Apply named literal search-and-replace rules to a file"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text summary (default).
    #[default]
    Text,
    /// Full JSON response.
    Json,
    /// Unified diff of the edits (`apply` only; other commands print text).
    Diff,
}

/// Replacement mode override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Replace the first occurrence only.
    FirstOnly,
    /// Replace every non-overlapping occurrence.
    All,
}

impl From<ModeArg> for ReplaceMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::FirstOnly => ReplaceMode::FirstOnly,
            ModeArg::All => ReplaceMode::All,
        }
    }
}

/// Line-ending handling override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LineEndingsArg {
    /// Use rule text byte for byte.
    AsWritten,
    /// Convert rule text to CRLF when the target uses CRLF.
    MatchFile,
}

impl From<LineEndingsArg> for LineEndings {
    fn from(arg: LineEndingsArg) -> Self {
        match arg {
            LineEndingsArg::AsWritten => LineEndings::AsWritten,
            LineEndingsArg::MatchFile => LineEndings::MatchFile,
        }
    }
}

/// Overrides for the rule file's run-wide defaults.
#[derive(clap::Args, Debug, Clone, Copy)]
struct OverrideArgs {
    /// Override the rule file's default replacement mode.
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Override the rule file's line-ending handling.
    #[arg(long, value_enum)]
    line_endings: Option<LineEndingsArg>,
}

impl From<OverrideArgs> for OptionOverrides {
    fn from(args: OverrideArgs) -> Self {
        OptionOverrides {
            mode: args.mode.map(Into::into),
            line_endings: args.line_endings.map(Into::into),
        }
    }
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a rule file to a target and write the result.
    ///
    /// Every rule runs in order against the in-memory text; the file is
    /// written once at the end. Rules that do not match are reported and
    /// the remaining rules still run.
    Apply {
        /// Rule file (TOML or JSON).
        #[arg(long, short = 'r')]
        rules: PathBuf,
        /// Target file (default: the rule file's `target`).
        target: Option<PathBuf>,
        /// Compute and report without writing.
        #[arg(long)]
        dry_run: bool,
        /// Do not write unless every required rule applied.
        #[arg(long)]
        all_or_nothing: bool,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Dry-run a rule file and report whether the target is already patched.
    Check {
        /// Rule file (TOML or JSON).
        #[arg(long, short = 'r')]
        rules: PathBuf,
        /// Target file (default: the rule file's `target`).
        target: Option<PathBuf>,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Parse and validate a rule file, then print its rules.
    List {
        /// Rule file (TOML or JSON).
        #[arg(long, short = 'r')]
        rules: PathBuf,
    },
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    let format = cli.global.format;
    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            if format == OutputFormat::Json {
                let _ = emit_response(&ErrorResponse::new(&err), &mut io::stdout());
                let _ = io::stdout().flush();
            } else {
                eprintln!("error: {}", err);
            }
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
///
/// A run where a required rule did not apply is reported in full and then
/// exits with [`OutputErrorCode::PatternNotFound`].
fn execute(cli: Cli) -> Result<ExitCode, PatchError> {
    let format = cli.global.format;
    match cli.command {
        Command::Apply {
            rules,
            target,
            dry_run,
            all_or_nothing,
            overrides,
        } => execute_apply(
            ApplyRequest {
                rules,
                target,
                dry_run,
                all_or_nothing,
                with_diff: format == OutputFormat::Diff,
                overrides: overrides.into(),
            },
            format,
        ),
        Command::Check {
            rules,
            target,
            overrides,
        } => execute_check(rules, target, overrides.into(), format),
        Command::List { rules } => execute_list(rules, format),
    }
}

fn execute_apply(request: ApplyRequest, format: OutputFormat) -> Result<ExitCode, PatchError> {
    let response = run_apply(&request)?;

    let mut stdout = io::stdout();
    match format {
        OutputFormat::Json => emit_response(&response, &mut stdout),
        OutputFormat::Diff => write!(stdout, "{}", response.diff.as_deref().unwrap_or_default()),
        OutputFormat::Text => emit_apply_summary(&response, &mut stdout),
    }
    .map_err(|e| PatchError::internal(e.to_string()))?;

    Ok(exit_status(response.is_success()))
}

fn execute_check(
    rules: PathBuf,
    target: Option<PathBuf>,
    overrides: OptionOverrides,
    format: OutputFormat,
) -> Result<ExitCode, PatchError> {
    let response = run_check(&rules, target.as_deref(), &overrides)?;

    let mut stdout = io::stdout();
    match format {
        OutputFormat::Json => emit_response(&response, &mut stdout),
        OutputFormat::Text | OutputFormat::Diff => emit_check_summary(&response, &mut stdout),
    }
    .map_err(|e| PatchError::internal(e.to_string()))?;

    Ok(exit_status(response.state.is_ok()))
}

fn execute_list(rules: PathBuf, format: OutputFormat) -> Result<ExitCode, PatchError> {
    let response = run_list(&rules)?;

    let mut stdout = io::stdout();
    match format {
        OutputFormat::Json => emit_response(&response, &mut stdout),
        OutputFormat::Text | OutputFormat::Diff => output_rule_list(&response, &mut stdout),
    }
    .map_err(|e| PatchError::internal(e.to_string()))?;

    Ok(ExitCode::SUCCESS)
}

/// Output a human-readable listing of a rule file.
fn output_rule_list(response: &ListResponse, writer: &mut impl Write) -> io::Result<()> {
    writeln!(
        writer,
        "{}: {} rule(s), mode {}, line endings {}",
        response.source,
        response.rules.len(),
        response.mode,
        response.line_endings
    )?;
    if let Some(target) = &response.target {
        writeln!(writer, "target: {}", target)?;
    }
    for (index, rule) in response.rules.iter().enumerate() {
        let mode = rule.mode.map(|m| m.to_string());
        let required = if rule.required { "" } else { " (optional)" };
        writeln!(
            writer,
            "  {:>2}. {} [{}]{}",
            index + 1,
            rule.name,
            mode.as_deref().unwrap_or(&response.mode),
            required
        )?;
    }
    Ok(())
}

fn exit_status(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(OutputErrorCode::PatternNotFound.code())
    }
}

// ============================================================================
// Tests
// ============================================================================
