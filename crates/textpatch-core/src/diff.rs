//! Unified diff generation utilities.
//!
//! Renders the edits of a [`PatchRun`](crate::apply::PatchRun) in unified
//! diff style: one file header, then one hunk per replacement. Line numbers
//! refer to the text the producing rule saw, so hunks from later rules are
//! positioned after earlier rules' edits.

use crate::apply::PatchEdit;
use crate::text::line_count;

/// Generate a unified diff for the edits made to one file.
///
/// Returns an empty string when there are no edits.
pub fn generate_unified_diff(file: &str, edits: &[PatchEdit]) -> String {
    if edits.is_empty() {
        return String::new();
    }

    let mut diff = String::new();
    diff.push_str(&format!("--- a/{}\n", file));
    diff.push_str(&format!("+++ b/{}\n", file));

    for edit in edits {
        let old_lines = line_count(&edit.old_text);
        let new_lines = line_count(&edit.new_text);
        diff.push_str(&format!(
            "@@ -{},{} +{},{} @@ {}\n",
            edit.line, old_lines, edit.line, new_lines, edit.rule_name
        ));
        push_prefixed(&mut diff, '-', &edit.old_text);
        push_prefixed(&mut diff, '+', &edit.new_text);
    }

    diff
}

fn push_prefixed(diff: &mut String, prefix: char, text: &str) {
    for line in text.lines() {
        diff.push(prefix);
        diff.push_str(line);
        diff.push('\n');
    }
}

// ============================================================================
// Tests
// ============================================================================
