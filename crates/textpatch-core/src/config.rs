//! Rule files: patch rules as data.
//!
//! A rule file lists an ordered set of [`PatchRule`]s plus run-wide defaults.
//! TOML is the primary format; files ending in `.json` are read as JSON with
//! the same shape.
//!
//! ```toml
//! mode = "first-only"
//! line_endings = "as-written"
//! target = "App.tsx"
//!
//! [[rule]]
//! name = "participants-subscription"
//! search = "matchesSubscription.unsubscribe();"
//! replace = "matchesSubscription.unsubscribe();\nparticipantsSubscription.unsubscribe();"
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::apply::{ApplyOptions, LineEndings};
use crate::rule::{validate_rules, PatchRule, ReplaceMode, RuleError};

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while loading a rule file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The rule file could not be read.
    #[error("failed to read rule file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The rule file is not valid TOML/JSON or does not match the schema.
    #[error("failed to parse rule file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// The rule file defines no rules.
    #[error("rule file {} defines no rules", .path.display())]
    NoRules { path: PathBuf },

    /// A rule has an empty name.
    #[error("rule #{index} has an empty name")]
    EmptyName { index: usize },

    /// Two rules share a name.
    #[error("duplicate rule name '{name}'")]
    DuplicateName { name: String },

    /// A rule violates a rule invariant.
    #[error(transparent)]
    Rule(#[from] RuleError),
}

// ============================================================================
// File Format
// ============================================================================

/// Serialization format of a rule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Toml,
    Json,
}

impl RuleFormat {
    /// Pick the format from the file extension (`.json` is JSON, anything
    /// else is TOML).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RuleFormat::Json,
            _ => RuleFormat::Toml,
        }
    }
}

/// On-disk shape of a rule file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleFile {
    /// Default replacement mode for rules without their own.
    #[serde(default)]
    pub mode: ReplaceMode,

    /// Line-ending handling for rule text.
    #[serde(default)]
    pub line_endings: LineEndings,

    /// Default target path, relative to the rule file's directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,

    /// Ordered rules.
    #[serde(default, rename = "rule", alias = "rules")]
    pub rules: Vec<PatchRule>,
}

impl RuleFile {
    /// Parse rule file text in the given format. `path` is used for errors.
    pub fn parse(content: &str, format: RuleFormat, path: &Path) -> Result<Self, ConfigError> {
        let parsed = match format {
            RuleFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            RuleFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}

// ============================================================================
// Rule Set
// ============================================================================

/// A validated rule file, ready to run.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Path the rules were loaded from.
    pub source: PathBuf,
    /// Run-wide defaults.
    pub options: ApplyOptions,
    /// Default target, already resolved against the rule file's directory.
    pub target: Option<PathBuf>,
    /// Ordered rules.
    pub rules: Vec<PatchRule>,
}

impl RuleSet {
    /// Validate a parsed rule file.
    ///
    /// Checks that at least one rule exists, names are non-empty and unique,
    /// and every rule satisfies [`PatchRule::validate`].
    pub fn from_rule_file(file: RuleFile, source: &Path) -> Result<Self, ConfigError> {
        if file.rules.is_empty() {
            return Err(ConfigError::NoRules {
                path: source.to_path_buf(),
            });
        }

        let mut seen = HashSet::new();
        for (index, rule) in file.rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    name: rule.name.clone(),
                });
            }
        }
        validate_rules(&file.rules)?;

        let base_dir = source.parent().unwrap_or_else(|| Path::new(""));
        let target = file.target.map(|t| {
            if t.is_absolute() {
                t
            } else {
                base_dir.join(t)
            }
        });

        Ok(RuleSet {
            source: source.to_path_buf(),
            options: ApplyOptions {
                default_mode: file.mode,
                line_endings: file.line_endings,
            },
            target,
            rules: file.rules,
        })
    }

    /// Read, parse and validate a rule file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file = RuleFile::parse(&content, RuleFormat::from_path(path), path)?;
        let rule_set = Self::from_rule_file(file, path)?;
        tracing::debug!(
            "loaded {} rule(s) from {}",
            rule_set.rules.len(),
            path.display()
        );
        Ok(rule_set)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TOML: &str = r#"
mode = "all"
line_endings = "match-file"
target = "App.tsx"

[[rule]]
name = "join"
search = "filled_slots + 1"
replace = "filled_slots"

[[rule]]
name = "leave"
search = "filled_slots - 1"
replacement = "filled_slots"
mode = "first-only"
anchor = "handleLeaveMatch"
required = false
"#;

    const ONE_RULE: &str = r#"
[[rule]]
name = "r"
search = "a"
replace = "b"
"#;

    fn parse_toml(content: &str) -> Result<RuleFile, ConfigError> {
        RuleFile::parse(content, RuleFormat::Toml, Path::new("rules.toml"))
    }

    mod format_tests {
        use super::*;

        #[test]
        fn json_extension_selects_json() {
            assert_eq!(RuleFormat::from_path(Path::new("a/b.json")), RuleFormat::Json);
            assert_eq!(RuleFormat::from_path(Path::new("b.JSON")), RuleFormat::Json);
        }

        #[test]
        fn other_extensions_select_toml() {
            assert_eq!(RuleFormat::from_path(Path::new("b.toml")), RuleFormat::Toml);
            assert_eq!(RuleFormat::from_path(Path::new("rules")), RuleFormat::Toml);
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn toml_rule_file_parses_all_fields() {
            let file = parse_toml(SAMPLE_TOML).unwrap();
            assert_eq!(file.mode, ReplaceMode::All);
            assert_eq!(file.line_endings, LineEndings::MatchFile);
            assert_eq!(file.target, Some(PathBuf::from("App.tsx")));
            assert_eq!(file.rules.len(), 2);

            let leave = &file.rules[1];
            assert_eq!(leave.replacement, "filled_slots");
            assert_eq!(leave.mode, Some(ReplaceMode::FirstOnly));
            assert_eq!(leave.anchor.as_deref(), Some("handleLeaveMatch"));
            assert!(!leave.required);
            assert!(file.rules[0].required);
        }

        #[test]
        fn defaults_apply_when_globals_absent() {
            let file = parse_toml(ONE_RULE).unwrap();
            assert_eq!(file.mode, ReplaceMode::FirstOnly);
            assert_eq!(file.line_endings, LineEndings::AsWritten);
            assert!(file.target.is_none());
        }

        #[test]
        fn json_rule_file_parses() {
            let json = r#"{
                "mode": "first-only",
                "rules": [
                    {"name": "r", "search": "a", "replacement": "b", "mode": "all"}
                ]
            }"#;
            let file = RuleFile::parse(json, RuleFormat::Json, Path::new("r.json")).unwrap();
            assert_eq!(file.rules.len(), 1);
            assert_eq!(file.rules[0].mode, Some(ReplaceMode::All));
        }

        #[test]
        fn unknown_mode_is_a_parse_error() {
            let err = parse_toml("mode = \"some\"\n").unwrap_err();
            assert!(matches!(err, ConfigError::Parse { .. }));
        }

        #[test]
        fn unknown_field_is_a_parse_error() {
            let err = parse_toml(&format!("{}regex = true\n", ONE_RULE)).unwrap_err();
            assert!(matches!(err, ConfigError::Parse { .. }));
        }
    }

    mod rule_set_tests {
        use super::*;

        #[test]
        fn target_resolves_against_rule_file_dir() {
            let file = parse_toml(SAMPLE_TOML).unwrap();
            let set = RuleSet::from_rule_file(file, Path::new("patches/rules.toml")).unwrap();
            assert_eq!(set.target, Some(PathBuf::from("patches/App.tsx")));
            assert_eq!(set.options.default_mode, ReplaceMode::All);
            assert_eq!(set.options.line_endings, LineEndings::MatchFile);
        }

        #[test]
        fn empty_rule_list_is_rejected() {
            let err =
                RuleSet::from_rule_file(RuleFile::default(), Path::new("r.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::NoRules { .. }));
        }

        #[test]
        fn duplicate_names_are_rejected() {
            let file = RuleFile {
                rules: vec![PatchRule::new("r", "a", "b"), PatchRule::new("r", "c", "d")],
                ..RuleFile::default()
            };
            let err = RuleSet::from_rule_file(file, Path::new("r.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::DuplicateName { name } if name == "r"));
        }

        #[test]
        fn blank_names_are_rejected() {
            let file = RuleFile {
                rules: vec![PatchRule::new("  ", "a", "b")],
                ..RuleFile::default()
            };
            let err = RuleSet::from_rule_file(file, Path::new("r.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::EmptyName { index: 0 }));
        }

        #[test]
        fn empty_search_surfaces_rule_error() {
            let file = RuleFile {
                rules: vec![PatchRule::new("r", "", "b")],
                ..RuleFile::default()
            };
            let err = RuleSet::from_rule_file(file, Path::new("r.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Rule(RuleError::EmptySearch { .. })));
        }
    }
}
