//! CLI front door.
//!
//! Provides the command helpers behind the `textpatch` binary:
//! - `apply` - Run a rule file against a target and (unless dry-run) write it
//! - `check` - Dry-run a rule file and classify the target
//! - `list` - Load and validate a rule file
//!
//! ## Error Handling
//!
//! All functions return `Result<T, PatchError>`. A rule that does not match
//! is not an error: it is reported in the response and the caller decides
//! the exit status from it.
//!
//! File I/O is confined to this layer. The target is read once, the whole
//! rule sequence runs in memory, and only then is the result written.

use std::path::{Path, PathBuf};

use textpatch_core::apply::{apply, ApplyOptions, LineEndings, PatchRun};
use textpatch_core::config::RuleSet;
use textpatch_core::diff::generate_unified_diff;
use textpatch_core::error::PatchError;
use textpatch_core::file::TargetFile;
use textpatch_core::output::{ApplyResponse, CheckResponse, ListResponse};
use textpatch_core::rule::ReplaceMode;

// ============================================================================
// Run Options
// ============================================================================

/// Overrides for a rule file's run-wide defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionOverrides {
    /// Replaces the rule file's `mode`.
    pub mode: Option<ReplaceMode>,
    /// Replaces the rule file's `line_endings`.
    pub line_endings: Option<LineEndings>,
}

impl OptionOverrides {
    /// Merge over the rule file's options.
    pub fn resolve(&self, base: ApplyOptions) -> ApplyOptions {
        ApplyOptions {
            default_mode: self.mode.unwrap_or(base.default_mode),
            line_endings: self.line_endings.unwrap_or(base.line_endings),
        }
    }
}

/// Everything the `apply` command needs.
#[derive(Debug, Clone, Default)]
pub struct ApplyRequest {
    /// Rule file path.
    pub rules: PathBuf,
    /// Target path; falls back to the rule file's `target`.
    pub target: Option<PathBuf>,
    /// Compute and report without writing.
    pub dry_run: bool,
    /// Refuse to write unless every required rule applied.
    pub all_or_nothing: bool,
    /// Attach a unified diff of the edits to the response.
    pub with_diff: bool,
    /// Overrides for the rule file's defaults.
    pub overrides: OptionOverrides,
}

// ============================================================================
// Commands
// ============================================================================

/// Load and validate a rule file.
pub fn load_rules(path: &Path) -> Result<RuleSet, PatchError> {
    Ok(RuleSet::load(path)?)
}

/// Pick the target: explicit path first, then the rule file's `target`.
pub fn resolve_target(rule_set: &RuleSet, explicit: Option<&Path>) -> Result<PathBuf, PatchError> {
    match (explicit, rule_set.target.as_ref()) {
        (Some(path), _) => Ok(path.to_path_buf()),
        (None, Some(path)) => Ok(path.clone()),
        (None, None) => Err(PatchError::invalid_args_with_details(
            "no target file given and the rule file does not name one",
            serde_json::json!({ "rules": rule_set.source.display().to_string() }),
        )),
    }
}

/// Read the target and run the rule set against it in memory.
fn run_rules(
    rule_set: &RuleSet,
    target: &TargetFile,
    overrides: &OptionOverrides,
) -> Result<PatchRun, PatchError> {
    let options = overrides.resolve(rule_set.options);
    tracing::debug!(
        "applying {} rule(s) to {} (mode {}, line endings {})",
        rule_set.rules.len(),
        target.path().display(),
        options.default_mode,
        options.line_endings
    );
    Ok(apply(target.content(), &rule_set.rules, &options)?)
}

/// Execute the `apply` command.
///
/// The target is written only after every rule has run, and only when the
/// text changed, the request is not a dry run, and (with `all_or_nothing`)
/// every required rule applied.
pub fn run_apply(request: &ApplyRequest) -> Result<ApplyResponse, PatchError> {
    let rule_set = load_rules(&request.rules)?;
    let target_path = resolve_target(&rule_set, request.target.as_deref())?;
    let target = TargetFile::read(&target_path)?;

    let run = run_rules(&rule_set, &target, &request.overrides)?;

    let blocked = request.all_or_nothing && !run.is_success();
    if blocked && run.is_modified() && !request.dry_run {
        tracing::warn!(
            "not writing {}: {} required rule(s) did not apply",
            target_path.display(),
            run.failures().count()
        );
    }

    let write = !request.dry_run && !blocked && run.is_modified();
    if write {
        target.write(&run.final_text)?;
    }

    let display = target_path.display().to_string();
    let response = ApplyResponse::new(
        display.clone(),
        target.hash().clone(),
        &run,
        request.dry_run,
        write,
    );
    if request.with_diff {
        return Ok(response.with_diff(generate_unified_diff(&display, &run.edits)));
    }
    Ok(response)
}

/// Execute the `check` command: a dry run that classifies the target.
pub fn run_check(
    rules: &Path,
    target: Option<&Path>,
    overrides: &OptionOverrides,
) -> Result<CheckResponse, PatchError> {
    let rule_set = load_rules(rules)?;
    let target_path = resolve_target(&rule_set, target)?;
    let target = TargetFile::read(&target_path)?;

    let run = run_rules(&rule_set, &target, overrides)?;
    Ok(CheckResponse::new(target_path.display().to_string(), &run))
}

/// Execute the `list` command.
pub fn run_list(rules: &Path) -> Result<ListResponse, PatchError> {
    let rule_set = load_rules(rules)?;
    Ok(ListResponse::new(&rule_set))
}

// ============================================================================
// Tests
// ============================================================================
