//! Error types for the ctidy analysis driver.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Process exit codes for the ctidy CLI.
///
/// These follow a Unix-style convention where 0 is success and higher
/// values indicate increasingly severe problems.
pub mod exit_code {
    /// No issues found (clean).
    pub const CLEAN: i32 = 0;
    /// Diagnostics were reported.
    pub const FINDINGS: i32 = 1;
    /// Configuration error (bad config file, invalid CLI args).
    pub const CONFIG_ERROR: i32 = 2;
    /// I/O error (file not found, permission denied, etc.).
    pub const IO_ERROR: i32 = 3;
    /// Internal error (bug in ctidy itself).
    pub const INTERNAL_ERROR: i32 = 4;
}

// ---------------------------------------------------------------------------
// Analysis errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading and analyzing a translation unit.
///
/// These are tool-level failures (I/O, encoding, parser setup), not match
/// failures: an unresolvable constant or an unextractable source span is a
/// normal outcome inside a check and never surfaces here.
#[derive(Error, Debug)]
pub enum CtidyError {
    #[error("I/O error reading {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file is not valid UTF-8: {path}")]
    Encoding { path: PathBuf },

    #[error("parse error in {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CtidyError>;
