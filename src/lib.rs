//! textpatch: idempotent literal search-and-replace patching.
//!
//! Applies an ordered, named set of exact substring replacements to a text
//! file, reports which rules applied, and writes the result atomically.

// Core infrastructure - re-exported from textpatch-core
pub use textpatch_core::apply;
pub use textpatch_core::config;
pub use textpatch_core::diff;
pub use textpatch_core::error;
pub use textpatch_core::file;
pub use textpatch_core::output;
pub use textpatch_core::rule;
pub use textpatch_core::text;

// Front door
pub mod cli;
