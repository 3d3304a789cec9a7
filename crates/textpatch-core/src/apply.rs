//! The patch applier: an ordered fold of literal replacements over one text.
//!
//! [`apply`] is a pure transformation. It never reads or writes files; the
//! caller owns the target's I/O (see [`crate::file`]).
//!
//! ## Semantics
//!
//! - Rules run strictly in the given order, each seeing the text produced by
//!   the rules before it.
//! - Matching is exact, case-sensitive and literal. There is no fuzzy or
//!   regex fallback: a rule either matches byte-for-byte or is reported as
//!   not applied.
//! - A missing pattern is an outcome, not an error. Only a structurally
//!   invalid rule set (an empty search pattern) fails, and it fails before any
//!   replacement happens.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rule::{validate_rules, PatchRule, ReplaceMode, RuleError};
use crate::text::{byte_offset_to_position, context_window, has_bare_lf, has_crlf, lf_to_crlf};

/// Bytes of context captured either side of a diagnostic anchor.
pub const DIAGNOSTIC_CONTEXT_RADIUS: usize = 100;

// ============================================================================
// Options
// ============================================================================

/// How rule text is reconciled with the target's line endings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineEndings {
    /// Use search and replacement text exactly as written.
    #[default]
    AsWritten,
    /// When the target uses CRLF, rewrite bare `\n` in rule text as `\r\n`
    /// before matching. The target itself is never rewritten.
    MatchFile,
}

impl LineEndings {
    /// The name used in rule files and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEndings::AsWritten => "as-written",
            LineEndings::MatchFile => "match-file",
        }
    }
}

impl fmt::Display for LineEndings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-wide settings for [`apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Mode for rules that do not set their own.
    pub default_mode: ReplaceMode,
    /// Line-ending handling for rule text.
    pub line_endings: LineEndings,
}

impl ApplyOptions {
    /// Options with the given default mode and as-written line endings.
    pub fn with_mode(default_mode: ReplaceMode) -> Self {
        ApplyOptions {
            default_mode,
            ..ApplyOptions::default()
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Why a rule did not apply, with enough context to fix it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Human-readable explanation.
    pub message: String,
    /// 1-indexed line of the anchor, when the anchor was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-indexed column of the anchor, when the anchor was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    /// Text surrounding the anchor, when the anchor was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of one rule in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchResult {
    /// Name of the rule this result belongs to.
    pub rule_name: String,
    /// True if at least one occurrence was replaced.
    pub applied: bool,
    /// Number of occurrences replaced.
    pub replacements: usize,
    /// Mode the rule ran with.
    pub mode: ReplaceMode,
    /// Whether a miss counts against the run.
    pub required: bool,
    /// True when the rule missed but its replacement text is already present.
    /// An empty replacement (a deletion) is always present.
    pub already_patched: bool,
    /// Present only when the rule did not apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl PatchResult {
    /// A required rule that did not apply.
    pub fn is_failure(&self) -> bool {
        self.required && !self.applied
    }
}

/// One concrete replacement, positioned in the text the rule saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEdit {
    /// Rule that produced this edit.
    pub rule_name: String,
    /// Byte offset of the replaced text.
    pub offset: usize,
    /// 1-indexed line of the replaced text.
    pub line: u32,
    /// 1-indexed column of the replaced text.
    pub col: u32,
    /// Text that was removed.
    pub old_text: String,
    /// Text that was inserted.
    pub new_text: String,
}

/// Result of applying a rule sequence to one text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRun {
    /// The text after every rule ran.
    pub final_text: String,
    /// One result per rule, in rule order.
    pub results: Vec<PatchResult>,
    /// Every replacement made, in the order made.
    pub edits: Vec<PatchEdit>,
}

impl PatchRun {
    /// True if every required rule applied.
    pub fn is_success(&self) -> bool {
        !self.results.iter().any(PatchResult::is_failure)
    }

    /// True if every rule, required or not, applied.
    pub fn all_applied(&self) -> bool {
        self.results.iter().all(|r| r.applied)
    }

    /// True if any rule changed the text.
    pub fn is_modified(&self) -> bool {
        !self.edits.is_empty()
    }

    /// Number of rules that applied.
    pub fn applied_count(&self) -> usize {
        self.results.iter().filter(|r| r.applied).count()
    }

    /// Results for required rules that did not apply.
    pub fn failures(&self) -> impl Iterator<Item = &PatchResult> {
        self.results.iter().filter(|r| r.is_failure())
    }
}

// ============================================================================
// Apply
// ============================================================================

/// Apply `rules` in order to `original_text`.
///
/// # Errors
///
/// Returns [`RuleError::EmptySearch`] if any rule has an empty search
/// pattern. The rule set is validated up front, so no replacement has been
/// computed when this error is returned.
pub fn apply(
    original_text: &str,
    rules: &[PatchRule],
    options: &ApplyOptions,
) -> Result<PatchRun, RuleError> {
    validate_rules(rules)?;

    let adapt_crlf = options.line_endings == LineEndings::MatchFile && has_crlf(original_text);
    let mut text = original_text.to_string();
    let mut results = Vec::with_capacity(rules.len());
    let mut edits = Vec::new();

    for rule in rules {
        let mode = rule.effective_mode(options.default_mode);
        let (search, replacement) = rule_text(rule, adapt_crlf);

        let offsets = match_offsets(&text, &search, mode);
        if offsets.is_empty() {
            let diagnostic = not_found_diagnostic(&text, rule, &search);
            let already_patched = text.contains(&*replacement);
            tracing::warn!("rule '{}' not applied: {}", rule.name, diagnostic);
            results.push(PatchResult {
                rule_name: rule.name.clone(),
                applied: false,
                replacements: 0,
                mode,
                required: rule.required,
                already_patched,
                diagnostic: Some(diagnostic),
            });
            continue;
        }

        for &offset in &offsets {
            let (line, col) = byte_offset_to_position(&text, offset);
            edits.push(PatchEdit {
                rule_name: rule.name.clone(),
                offset,
                line,
                col,
                old_text: search.to_string(),
                new_text: replacement.to_string(),
            });
        }
        text = splice(&text, &offsets, search.len(), &replacement);

        tracing::debug!(
            "rule '{}' applied ({} replacement(s), mode {})",
            rule.name,
            offsets.len(),
            mode
        );
        results.push(PatchResult {
            rule_name: rule.name.clone(),
            applied: true,
            replacements: offsets.len(),
            mode,
            required: rule.required,
            already_patched: false,
            diagnostic: None,
        });
    }

    Ok(PatchRun {
        final_text: text,
        results,
        edits,
    })
}

/// The rule's search and replacement, adapted to CRLF when asked.
fn rule_text(rule: &PatchRule, adapt_crlf: bool) -> (Cow<'_, str>, Cow<'_, str>) {
    if adapt_crlf {
        (
            Cow::Owned(lf_to_crlf(&rule.search)),
            Cow::Owned(lf_to_crlf(&rule.replacement)),
        )
    } else {
        (
            Cow::Borrowed(rule.search.as_str()),
            Cow::Borrowed(rule.replacement.as_str()),
        )
    }
}

/// Byte offsets of the occurrences the mode selects.
fn match_offsets(text: &str, search: &str, mode: ReplaceMode) -> Vec<usize> {
    match mode {
        ReplaceMode::FirstOnly => text.find(search).into_iter().collect(),
        ReplaceMode::All => text.match_indices(search).map(|(i, _)| i).collect(),
    }
}

/// Replace `len` bytes at each (ascending, non-overlapping) offset.
fn splice(text: &str, offsets: &[usize], len: usize, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len() + offsets.len() * replacement.len());
    let mut cursor = 0;
    for &offset in offsets {
        out.push_str(&text[cursor..offset]);
        out.push_str(replacement);
        cursor = offset + len;
    }
    out.push_str(&text[cursor..]);
    out
}

fn not_found_diagnostic(text: &str, rule: &PatchRule, search: &str) -> Diagnostic {
    let mut diagnostic = match rule.anchor.as_deref().filter(|a| !a.is_empty()) {
        Some(anchor) => match text.find(anchor) {
            Some(start) => {
                let (line, col) = byte_offset_to_position(text, start);
                Diagnostic {
                    message: format!(
                        "search pattern not found; anchor found at {}:{}",
                        line, col
                    ),
                    line: Some(line),
                    col: Some(col),
                    context: Some(
                        context_window(
                            text,
                            start,
                            start + anchor.len(),
                            DIAGNOSTIC_CONTEXT_RADIUS,
                        )
                        .to_string(),
                    ),
                }
            }
            None => Diagnostic {
                message: format!("search pattern not found; anchor {:?} not found", anchor),
                line: None,
                col: None,
                context: None,
            },
        },
        None => Diagnostic {
            message: "search pattern not found".to_string(),
            line: None,
            col: None,
            context: None,
        },
    };

    if has_crlf(text) && has_bare_lf(search) {
        diagnostic
            .message
            .push_str(" (target uses CRLF line endings, pattern uses LF)");
    }
    diagnostic
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn first_only() -> ApplyOptions {
        ApplyOptions::default()
    }

    mod apply_tests {
        use super::*;

        #[test]
        fn subscribe_block_is_extended() {
            let text = "A.on('x').subscribe();";
            let rules = [PatchRule::new(
                "add-b",
                "A.on('x').subscribe();",
                "A.on('x').subscribe();\nB.on('y').subscribe();",
            )];

            let run = apply(text, &rules, &first_only()).unwrap();

            assert_eq!(
                run.final_text,
                "A.on('x').subscribe();\nB.on('y').subscribe();"
            );
            assert!(run.results[0].applied);
            assert_eq!(run.results[0].replacements, 1);
            assert!(run.results[0].diagnostic.is_none());
            assert!(run.is_success());
        }

        #[test]
        fn missing_pattern_leaves_text_unchanged() {
            let text = "const a = 1;\n";
            let rules = [PatchRule::new("missing", "const b", "const c")];

            let run = apply(text, &rules, &first_only()).unwrap();

            assert_eq!(run.final_text, text);
            assert!(!run.results[0].applied);
            assert_eq!(run.results[0].replacements, 0);
            assert!(run.results[0].diagnostic.is_some());
            assert!(!run.is_success());
            assert!(!run.is_modified());
        }

        #[test]
        fn miss_does_not_block_later_rules() {
            let text = "alpha beta";
            let rules = [
                PatchRule::new("missing", "gamma", "delta"),
                PatchRule::new("beta", "beta", "BETA"),
            ];

            let run = apply(text, &rules, &first_only()).unwrap();

            assert_eq!(run.final_text, "alpha BETA");
            assert!(!run.results[0].applied);
            assert!(run.results[1].applied);
        }

        #[test]
        fn results_follow_rule_order() {
            let rules = [
                PatchRule::new("one", "a", "1"),
                PatchRule::new("two", "zzz", "2"),
                PatchRule::new("three", "c", "3"),
            ];
            let run = apply("abc", &rules, &first_only()).unwrap();
            let names: Vec<_> = run.results.iter().map(|r| r.rule_name.as_str()).collect();
            assert_eq!(names, ["one", "two", "three"]);
        }

        #[test]
        fn matching_is_case_sensitive() {
            let rules = [PatchRule::new("upper", "Foo", "Bar")];
            let run = apply("foo", &rules, &first_only()).unwrap();
            assert!(!run.results[0].applied);
            assert_eq!(run.final_text, "foo");
        }

        #[test]
        fn search_is_literal_not_regex() {
            let rules = [PatchRule::new("dots", "a.c", "X")];
            let run = apply("abc a.c", &rules, &first_only()).unwrap();
            assert_eq!(run.final_text, "abc X");
        }

        #[test]
        fn empty_replacement_deletes() {
            let rules = [PatchRule::new("drop", " // debug", "")];
            let run = apply("x(); // debug\n", &rules, &first_only()).unwrap();
            assert_eq!(run.final_text, "x();\n");
        }

        #[test]
        fn empty_rule_set_is_a_successful_no_op() {
            let run = apply("text", &[], &first_only()).unwrap();
            assert_eq!(run.final_text, "text");
            assert!(run.results.is_empty());
            assert!(run.is_success());
        }
    }

    mod mode_tests {
        use super::*;

        #[test]
        fn first_only_replaces_one_occurrence() {
            let rules = [PatchRule::new("x", "x", "y")];
            let run = apply("x x x", &rules, &first_only()).unwrap();
            assert_eq!(run.final_text, "y x x");
            assert_eq!(run.results[0].replacements, 1);
        }

        #[test]
        fn all_replaces_every_occurrence() {
            let rules = [PatchRule::new("x", "x", "y")];
            let run = apply("x x x", &rules, &ApplyOptions::with_mode(ReplaceMode::All)).unwrap();
            assert_eq!(run.final_text, "y y y");
            assert_eq!(run.results[0].replacements, 3);
            assert_eq!(run.edits.len(), 3);
        }

        #[test]
        fn rule_mode_overrides_default() {
            let rules = [
                PatchRule::new("all-a", "a", "A").with_mode(ReplaceMode::All),
                PatchRule::new("first-b", "b", "B"),
            ];
            let run = apply("a b a b", &rules, &first_only()).unwrap();
            assert_eq!(run.final_text, "A B A b");
            assert_eq!(run.results[0].mode, ReplaceMode::All);
            assert_eq!(run.results[1].mode, ReplaceMode::FirstOnly);
        }

        #[test]
        fn all_mode_does_not_rescan_inserted_text() {
            // replacement contains the search; occurrences are found once up front
            let rules = [PatchRule::new("wrap", "a", "aa")];
            let run = apply("a-a", &rules, &ApplyOptions::with_mode(ReplaceMode::All)).unwrap();
            assert_eq!(run.final_text, "aa-aa");
            assert_eq!(run.results[0].replacements, 2);
        }

        #[test]
        fn all_mode_takes_non_overlapping_matches() {
            let rules = [PatchRule::new("aa", "aa", "b")];
            let run = apply("aaa", &rules, &ApplyOptions::with_mode(ReplaceMode::All)).unwrap();
            assert_eq!(run.final_text, "ba");
        }
    }

    mod ordering_tests {
        use super::*;

        fn chained() -> (PatchRule, PatchRule) {
            (
                PatchRule::new("rule1", "old()", "mid()"),
                PatchRule::new("rule2", "mid()", "new()"),
            )
        }

        #[test]
        fn later_rule_sees_earlier_replacement() {
            let (r1, r2) = chained();
            let run = apply("old();", &[r1, r2], &first_only()).unwrap();
            assert_eq!(run.final_text, "new();");
            assert!(run.all_applied());
        }

        #[test]
        fn reversed_order_reports_dependent_rule_missing() {
            let (r1, r2) = chained();
            let run = apply("old();", &[r2, r1], &first_only()).unwrap();
            assert_eq!(run.final_text, "mid();");
            assert!(!run.results[0].applied);
            assert_eq!(run.results[0].rule_name, "rule2");
            assert!(run.results[1].applied);
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn empty_search_fails_before_any_replacement() {
            let rules = [
                PatchRule::new("fine", "a", "b"),
                PatchRule::new("empty", "", "c"),
            ];
            let err = apply("aaa", &rules, &first_only()).unwrap_err();
            assert_eq!(
                err,
                RuleError::EmptySearch {
                    name: "empty".to_string(),
                    index: 1
                }
            );
        }
    }

    mod idempotence_tests {
        use super::*;

        #[test]
        fn second_run_matches_nothing() {
            let rules = [
                PatchRule::new("counter", "filled_slots + 1", "filled_slots"),
                PatchRule::new("label", "Fechar", "Close"),
            ];
            let first = apply("x = filled_slots + 1; // Fechar", &rules, &first_only()).unwrap();
            assert!(first.all_applied());

            let second = apply(&first.final_text, &rules, &first_only()).unwrap();
            assert_eq!(second.final_text, first.final_text);
            assert_eq!(second.applied_count(), 0);
            assert!(second.results.iter().all(|r| r.already_patched));
        }

        #[test]
        fn rules_are_not_changed_by_a_run() {
            let rules = [
                PatchRule::new("a", "a", "b").with_mode(ReplaceMode::All),
                PatchRule::new("gone", "zzz", "y").with_anchor("b"),
            ];
            let before = rules.clone();
            apply("a a", &rules, &first_only()).unwrap();
            assert_eq!(rules, before);
        }

        #[test]
        fn deletion_rule_is_already_patched_on_second_run() {
            let rules = [PatchRule::new("drop-log", "console.log(x);\n", "")];
            let first = apply("a();\nconsole.log(x);\nb();\n", &rules, &first_only()).unwrap();
            assert_eq!(first.final_text, "a();\nb();\n");

            let second = apply(&first.final_text, &rules, &first_only()).unwrap();
            assert!(!second.results[0].applied);
            assert!(second.results[0].already_patched);
        }

        #[test]
        fn optional_miss_keeps_run_successful() {
            let rules = [PatchRule::new("maybe", "nope", "yes").optional()];
            let run = apply("text", &rules, &first_only()).unwrap();
            assert!(!run.results[0].applied);
            assert!(run.is_success());
            assert!(!run.all_applied());
            assert_eq!(run.failures().count(), 0);
        }
    }

    mod diagnostic_tests {
        use super::*;

        #[test]
        fn anchor_context_is_captured() {
            let text = "line one\n    matchesSubscription.unsubscribe();\n};\n";
            let rule = PatchRule::new("cleanup", "subscription.unsubscribe();\n    }", "x")
                .with_anchor("matchesSubscription.unsubscribe();");

            let run = apply(text, &[rule], &first_only()).unwrap();
            let diag = run.results[0].diagnostic.as_ref().unwrap();

            assert_eq!(diag.line, Some(2));
            assert_eq!(diag.col, Some(5));
            let context = diag.context.as_deref().unwrap();
            assert!(context.contains("matchesSubscription.unsubscribe();"));
            assert!(diag.message.contains("anchor found at 2:5"));
        }

        #[test]
        fn missing_anchor_is_reported() {
            let rule = PatchRule::new("r", "zzz", "x").with_anchor("yyy");
            let run = apply("abc", &[rule], &first_only()).unwrap();
            let diag = run.results[0].diagnostic.as_ref().unwrap();
            assert!(diag.message.contains("\"yyy\" not found"));
            assert!(diag.context.is_none());
        }

        #[test]
        fn crlf_drift_is_hinted() {
            let rule = PatchRule::new("r", "a\nb", "x");
            let run = apply("a\r\nb", &[rule], &first_only()).unwrap();
            let diag = run.results[0].diagnostic.as_ref().unwrap();
            assert!(diag.message.contains("CRLF"));
        }
    }

    mod line_ending_tests {
        use super::*;

        #[test]
        fn match_file_adapts_rule_text_to_crlf() {
            let text = "setMatches(x =>\r\n    y\r\n));\r\nrest";
            let rule = PatchRule::new("crlf", "setMatches(x =>\n    y\n));", "// note\nnext");
            let options = ApplyOptions {
                line_endings: LineEndings::MatchFile,
                ..ApplyOptions::default()
            };

            let run = apply(text, &[rule], &options).unwrap();

            assert!(run.results[0].applied);
            assert_eq!(run.final_text, "// note\r\nnext\r\nrest");
        }

        #[test]
        fn match_file_leaves_lf_targets_alone() {
            let text = "a\nb";
            let rule = PatchRule::new("lf", "a\nb", "c\nd");
            let options = ApplyOptions {
                line_endings: LineEndings::MatchFile,
                ..ApplyOptions::default()
            };
            let run = apply(text, &[rule], &options).unwrap();
            assert_eq!(run.final_text, "c\nd");
        }

        #[test]
        fn as_written_does_not_match_across_line_endings() {
            let rule = PatchRule::new("lf", "a\nb", "c");
            let run = apply("a\r\nb", &[rule], &first_only()).unwrap();
            assert!(!run.results[0].applied);
        }
    }

    mod edit_tests {
        use super::*;

        #[test]
        fn edits_record_position_in_text_seen_by_rule() {
            let rules = [PatchRule::new("b", "b", "B")];
            let run = apply("a\nb\n", &rules, &first_only()).unwrap();
            assert_eq!(run.edits.len(), 1);
            let edit = &run.edits[0];
            assert_eq!(edit.offset, 2);
            assert_eq!((edit.line, edit.col), (2, 1));
            assert_eq!(edit.old_text, "b");
            assert_eq!(edit.new_text, "B");
            assert_eq!(edit.rule_name, "b");
        }
    }
}
