//! Patch rules: named literal search/replace pairs.
//!
//! A [`PatchRule`] is pure data. Rules are usually loaded from a rule file
//! (see [`crate::config`]) but can be built directly for programmatic use.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Replacement Mode
// ============================================================================

/// How many occurrences of a rule's search pattern get replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplaceMode {
    /// Replace exactly one occurrence (the first).
    #[default]
    FirstOnly,
    /// Replace every non-overlapping occurrence, scanning left to right.
    All,
}

impl ReplaceMode {
    /// The name used in rule files and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplaceMode::FirstOnly => "first-only",
            ReplaceMode::All => "all",
        }
    }
}

impl fmt::Display for ReplaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Rule Errors
// ============================================================================

/// Errors raised when a rule set is structurally invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// A rule has an empty search pattern.
    #[error("rule '{name}' (#{index}) has an empty search pattern")]
    EmptySearch { name: String, index: usize },
}

// ============================================================================
// Patch Rule
// ============================================================================

/// A named literal search/replace pair.
///
/// `search` must be non-empty; [`PatchRule::validate`] checks this and the
/// applier validates the whole rule set before touching any text.
///
/// Fields are public for construction and serde. A rule is treated as
/// immutable once built: the applier only borrows rules and never edits
/// them, so rebuild a rule rather than mutating one between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatchRule {
    /// Identifier shown in reports.
    pub name: String,
    /// Exact, case-sensitive text to find.
    pub search: String,
    /// Text substituted for each replaced occurrence.
    #[serde(alias = "replace")]
    pub replacement: String,
    /// Per-rule mode. Falls back to the run's default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ReplaceMode>,
    /// Literal text located only to build a diagnostic when `search` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    /// Whether a not-found outcome counts against the run.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl PatchRule {
    /// Create a required rule with no mode override and no anchor.
    pub fn new(
        name: impl Into<String>,
        search: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        PatchRule {
            name: name.into(),
            search: search.into(),
            replacement: replacement.into(),
            mode: None,
            anchor: None,
            required: true,
        }
    }

    /// Override the replacement mode for this rule.
    pub fn with_mode(mut self, mode: ReplaceMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the diagnostic anchor.
    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    /// Mark the rule optional: a miss is reported but does not fail the run.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// The mode this rule runs with, given the run default.
    pub fn effective_mode(&self, default: ReplaceMode) -> ReplaceMode {
        self.mode.unwrap_or(default)
    }

    /// Check the rule's invariants. `index` is its position in the rule set.
    pub fn validate(&self, index: usize) -> Result<(), RuleError> {
        if self.search.is_empty() {
            return Err(RuleError::EmptySearch {
                name: self.name.clone(),
                index,
            });
        }
        Ok(())
    }
}

/// Validate every rule in order, stopping at the first invalid one.
pub fn validate_rules(rules: &[PatchRule]) -> Result<(), RuleError> {
    rules
        .iter()
        .enumerate()
        .try_for_each(|(index, rule)| rule.validate(index))
}

// ============================================================================
// Tests
// ============================================================================
