//! CLI argument definitions and validation for ctidy.
//!
//! Extracted into its own module so that tests can use
//! [`Cli::try_parse_from`] to verify argument validation without spawning
//! a subprocess.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::checks::CheckCode;
use crate::output::{ColorMode, OutputFormat};

/// Validate a comma-separated list of check codes at parse time.
///
/// Each code is checked against [`CheckCode::parse_code`]. If any token is
/// not a known code the parser rejects the whole value immediately, giving
/// the user an actionable error message from clap.
fn validate_check_codes(s: &str) -> Result<String, String> {
    for raw in s.split(',') {
        let code = raw.trim();
        if code.is_empty() {
            continue;
        }
        if CheckCode::parse_code(code).is_none() {
            let valid: Vec<&str> = CheckCode::all().iter().map(|c| c.as_str()).collect();
            return Err(format!(
                "unknown check code '{}'. Valid codes: {}",
                code,
                valid.join(", "),
            ));
        }
    }
    Ok(s.to_string())
}

/// ctidy: structural pattern-matching linter for C.
///
/// Detects hand-written alignment/rounding arithmetic, integer literals
/// coerced to bool, and raw allocation calls sized with sizeof, and
/// proposes mechanical rewrites for each finding.
///
/// Quick start:
///   ctidy check src/            Check files for issues
///   ctidy check src/ --format json
///   ctidy checks                List all available checks
///   ctidy init                  Generate default .ctidy.toml
#[derive(Parser, Debug)]
#[command(name = "ctidy")]
#[command(author)]
#[command(version)]
#[command(about = "Structural pattern-matching linter for C with rewrite suggestions", long_about = None)]
#[command(after_help = "\
CONFIGURATION:\n\
  ctidy looks for a .ctidy.toml config file, searching from the current\n\
  directory up to the nearest .git root. Use `ctidy init` to generate a\n\
  default config. CLI flags always override config file settings.\n\
\n\
EXAMPLES:\n\
  ctidy check src/                          Check all C files under src/\n\
  ctidy check . --select CTD001,CTD003      Only run specific checks\n\
  ctidy check . --exclude CTD002            Skip specific checks\n\
  ctidy check hw.c --show-fixes             Print proposed rewrites\n\
  ctidy check . --only-align-up             Restrict CTD001 to align-up")]
pub struct Cli {
    /// Enable debug logging (sets log level to DEBUG).
    #[arg(short, long, global = true, help_heading = "Global Options")]
    pub debug: bool,

    /// When to use ANSI color in output.
    #[arg(
        long,
        value_enum,
        global = true,
        default_value = "auto",
        help_heading = "Global Options"
    )]
    pub color: ColorMode,

    /// Suppress all non-diagnostic output.
    #[arg(short, long, global = true, help_heading = "Global Options")]
    pub quiet: bool,

    /// Show additional details during execution.
    #[arg(short, long, global = true, help_heading = "Global Options")]
    pub verbose: bool,

    /// Path to a .ctidy.toml config file, overriding discovery.
    #[arg(long, global = true, help_heading = "Global Options")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check C files for rewritable patterns.
    ///
    /// Scans the given paths (files or directories) and runs all enabled
    /// checks. Returns exit code 1 if any issues are found, unless
    /// --exit-zero is used.
    Check {
        /// Files or directories to check (recursive for directories).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Comma-separated check codes to enable (e.g., CTD001,CTD003).
        #[arg(long, value_parser = validate_check_codes)]
        select: Option<String>,

        /// Comma-separated check codes to skip (e.g., CTD002).
        /// Takes precedence over --select. Alias: --ignore.
        #[arg(long, alias = "ignore", value_parser = validate_check_codes)]
        exclude: Option<String>,

        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Print the proposed replacement text under each diagnostic.
        #[arg(long)]
        show_fixes: bool,

        /// Always exit 0, even when issues are found.
        #[arg(long)]
        exit_zero: bool,

        /// CTD001: only detect the full align-up form.
        #[arg(long)]
        only_align_up: bool,

        /// CTD003: only accept sizeof(type) size arguments.
        #[arg(long)]
        only_type_sizeof: bool,
    },

    /// List all available checks.
    Checks,

    /// Generate a default .ctidy.toml in the current directory.
    Init {
        /// Where to write the config file.
        #[arg(long, default_value = ".ctidy.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}
