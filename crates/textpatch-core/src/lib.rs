//! Core infrastructure for textpatch.
//!
//! This crate provides the pieces behind the `textpatch` CLI:
//! - Patch rules and replacement modes
//! - The patch applier (pure text transformation)
//! - Rule file loading (TOML and JSON)
//! - Target file I/O with atomic writes
//! - Error types and error codes
//! - JSON output types for CLI responses
//! - Text position utilities and diff rendering

pub mod apply;
pub mod config;
pub mod diff;
pub mod error;
pub mod file;
pub mod output;
pub mod rule;
pub mod text;

pub use apply::{apply, ApplyOptions, LineEndings, PatchEdit, PatchResult, PatchRun};
pub use rule::{PatchRule, ReplaceMode, RuleError};
