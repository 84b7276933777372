// The `replacement_preserves_value` unit test calls the still-unstable
// `i64::div_ceil` (rust-lang/rust#88581). Gate the feature for test builds
// only so stable `cargo build` is unaffected; tests run under nightly.
#![cfg_attr(test, feature(int_roundings))]

//! Structural pattern-matching and mechanical-rewrite engine for C source.
//!
//! Given a parsed syntax tree, ctidy locates structurally-specific
//! idiomatic anti-patterns -- manual alignment/rounding arithmetic, integer
//! literals implicitly coerced to bool, and raw allocation calls paired
//! with `sizeof` -- and emits a diagnostic plus a textual replacement for
//! each finding. Matching is structural, not textual: it sees through
//! parenthesization and implicit conversions, folds constants to verify
//! the operands actually agree, and abstains whenever the original text
//! cannot be sliced faithfully (macro expansions, multi-file spans).
//!
//! The host parser is tree-sitter; everything downstream of [`lower`]
//! operates on the reduced tagged-variant tree in [`tree`] and is parser
//! agnostic.

pub mod checks;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod eval;
pub mod lower;
pub mod matcher;
pub mod output;
pub mod source;
pub mod tree;

pub use checks::{builtin_checks, Check, CheckCode, CheckOptions};
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Edit, Fix, Severity};
pub use engine::{CheckEngine, EngineConfig, RunSummary};
pub use error::{exit_code, CtidyError, Result};
pub use source::{Range, SourceFile, Span};
pub use tree::{ExprArena, ExprId, TranslationUnit};
