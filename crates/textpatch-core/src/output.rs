//! JSON output types and serialization for CLI responses.
//!
//! ## Design Principles
//!
//! 1. **Status first:** Every response has `status` as first field
//! 2. **Deterministic:** Same input -> same output (field order, rule order)
//! 3. **Nullable vs absent:** absent field means "not applicable"
//! 4. **Versioned:** Schema version in response enables forward compatibility
//!
//! The human-readable text summary is rendered from the same response types,
//! so text and JSON never disagree.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::apply::{PatchResult, PatchRun};
use crate::config::RuleSet;
use crate::error::{OutputErrorCode, PatchError};
use crate::file::ContentHash;
use crate::rule::PatchRule;

/// Current schema version for all responses.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Run Summary
// ============================================================================

/// Rule counts for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Total rules in the run.
    pub rules: usize,
    /// Rules that applied.
    pub applied: usize,
    /// Rules that did not apply.
    pub not_found: usize,
    /// Required rules that did not apply.
    pub failed: usize,
    /// Total occurrences replaced across all rules.
    pub replacements: usize,
}

impl RunSummary {
    /// Tally a run's results.
    pub fn from_results(results: &[PatchResult]) -> Self {
        let applied = results.iter().filter(|r| r.applied).count();
        RunSummary {
            rules: results.len(),
            applied,
            not_found: results.len() - applied,
            failed: results.iter().filter(|r| r.is_failure()).count(),
            replacements: results.iter().map(|r| r.replacements).sum(),
        }
    }
}

// ============================================================================
// Apply Response
// ============================================================================

/// Response for the `apply` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResponse {
    /// "ok" when every required rule applied, otherwise "partial".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Target file path as given.
    pub target: String,
    /// True when the run did not write.
    pub dry_run: bool,
    /// True when the target was rewritten.
    pub written: bool,
    /// SHA-256 of the content before the run.
    pub before_hash: ContentHash,
    /// SHA-256 of the text the rules produced. This is what is on disk only
    /// when `written` is true or the text did not change; a dry run or a
    /// blocked write leaves the file at `before_hash`.
    pub after_hash: ContentHash,
    /// Rule counts.
    pub summary: RunSummary,
    /// One entry per rule, in rule order.
    pub results: Vec<PatchResult>,
    /// Unified diff of the edits, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

impl ApplyResponse {
    /// Build a response from a finished run.
    pub fn new(
        target: impl Into<String>,
        before_hash: ContentHash,
        run: &PatchRun,
        dry_run: bool,
        written: bool,
    ) -> Self {
        ApplyResponse {
            status: if run.is_success() { "ok" } else { "partial" }.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            target: target.into(),
            dry_run,
            written,
            before_hash,
            after_hash: ContentHash::compute(run.final_text.as_bytes()),
            summary: RunSummary::from_results(&run.results),
            results: run.results.clone(),
            diff: None,
        }
    }

    /// Attach a rendered diff.
    pub fn with_diff(mut self, diff: String) -> Self {
        self.diff = Some(diff);
        self
    }

    /// True when every required rule applied.
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0
    }
}

// ============================================================================
// Check Response
// ============================================================================

/// Whether a target is ready for, or already carries, a rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchState {
    /// Every required rule would apply.
    Applicable,
    /// No required rule would apply and each one's replacement is present.
    AlreadyPatched,
    /// Some required rules would not apply and the file is not patched.
    Partial,
}

impl PatchState {
    /// Classify a dry run's results.
    pub fn classify(results: &[PatchResult]) -> Self {
        let required: Vec<_> = results.iter().filter(|r| r.required).collect();
        if required.iter().all(|r| r.applied) {
            PatchState::Applicable
        } else if required.iter().all(|r| !r.applied && r.already_patched) {
            PatchState::AlreadyPatched
        } else {
            PatchState::Partial
        }
    }

    /// True for states that need no manual attention.
    pub fn is_ok(&self) -> bool {
        !matches!(self, PatchState::Partial)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PatchState::Applicable => "applicable",
            PatchState::AlreadyPatched => "already-patched",
            PatchState::Partial => "partial",
        }
    }
}

/// Response for the `check` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    /// "ok" unless the state is partial.
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Target file path as given.
    pub target: String,
    /// Classification of the target.
    pub state: PatchState,
    /// Rule counts for the dry run.
    pub summary: RunSummary,
    /// One entry per rule, in rule order.
    pub results: Vec<PatchResult>,
}

impl CheckResponse {
    /// Build a response from a dry run.
    pub fn new(target: impl Into<String>, run: &PatchRun) -> Self {
        let state = PatchState::classify(&run.results);
        CheckResponse {
            status: if state.is_ok() { "ok" } else { "partial" }.to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            target: target.into(),
            state,
            summary: RunSummary::from_results(&run.results),
            results: run.results.clone(),
        }
    }
}

// ============================================================================
// List Response
// ============================================================================

/// Response for the `list` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Rule file path.
    pub source: String,
    /// Default replacement mode.
    pub mode: String,
    /// Line-ending handling.
    pub line_endings: String,
    /// Default target, if the rule file names one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Rules in order.
    pub rules: Vec<PatchRule>,
}

impl ListResponse {
    pub fn new(rule_set: &RuleSet) -> Self {
        ListResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            source: rule_set.source.display().to_string(),
            mode: rule_set.options.default_mode.to_string(),
            line_endings: rule_set.options.line_endings.to_string(),
            target: rule_set.target.as_ref().map(|t| t.display().to_string()),
            rules: rule_set.rules.clone(),
        }
    }
}

// ============================================================================
// Error Response
// ============================================================================

/// Error details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Numeric error code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
    /// Error-specific structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorInfo {
    /// Create from a PatchError.
    pub fn from_error(err: &PatchError) -> Self {
        let code = OutputErrorCode::from(err).code();
        let message = err.to_string();

        let details = match err {
            PatchError::InvalidArguments { details, .. } => details.clone(),
            PatchError::InvalidRule(rule_err) => Some(serde_json::json!({
                "rule": rule_err.to_string()
            })),
            PatchError::FileNotFound { path } => Some(serde_json::json!({ "path": path })),
            PatchError::ApplyError { file, .. } => {
                file.as_ref().map(|f| serde_json::json!({ "file": f }))
            }
            PatchError::Config { .. } | PatchError::InternalError { .. } => None,
        };

        ErrorInfo {
            code,
            message,
            details,
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error details.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn new(err: &PatchError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Emit Functions
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
///
/// This is the single JSON output path for the CLI.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// One report line for a rule result.
pub fn format_result_line(result: &PatchResult) -> String {
    if result.applied {
        let plural = if result.replacements == 1 { "" } else { "s" };
        return format!(
            "  applied     {} ({} replacement{})",
            result.rule_name, result.replacements, plural
        );
    }

    let label = if result.already_patched {
        "patched"
    } else if result.required {
        "NOT FOUND"
    } else {
        "skipped"
    };
    let reason = result
        .diagnostic
        .as_ref()
        .map(|d| d.message.as_str())
        .unwrap_or("search pattern not found");
    format!("  {:<11} {}: {}", label, result.rule_name, reason)
}

/// Write the human-readable summary of an apply run.
pub fn emit_apply_summary(response: &ApplyResponse, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "{}", response.target)?;
    for result in &response.results {
        writeln!(writer, "{}", format_result_line(result))?;
        if let Some(context) = result.diagnostic.as_ref().and_then(|d| d.context.as_ref()) {
            for line in context.lines() {
                writeln!(writer, "      | {}", line)?;
            }
        }
    }

    let outcome = if response.written {
        "written"
    } else if response.dry_run {
        "dry run, not written"
    } else if response.before_hash != response.after_hash {
        "not written"
    } else {
        "unchanged"
    };
    writeln!(
        writer,
        "{}/{} rules applied, {} replacement(s); {}",
        response.summary.applied, response.summary.rules, response.summary.replacements, outcome
    )?;
    if response.summary.failed > 0 {
        writeln!(
            writer,
            "{} required rule(s) did not apply",
            response.summary.failed
        )?;
    }
    Ok(())
}

/// Write the human-readable summary of a check.
pub fn emit_check_summary(response: &CheckResponse, writer: &mut impl Write) -> io::Result<()> {
    writeln!(writer, "{}", response.target)?;
    for result in &response.results {
        writeln!(writer, "{}", format_result_line(result))?;
    }
    writeln!(writer, "state: {}", response.state.as_str())
}

// ============================================================================
// Tests
// ============================================================================
