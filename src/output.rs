//! Output formatting for diagnostics.
//!
//! Three formats:
//! - **Text**: human-readable with optional color and fix previews
//! - **Concise**: one line per diagnostic for editors/scripts
//! - **JSON**: machine-readable with full fix info
//!
//! Color support respects `NO_COLOR`, `FORCE_COLOR`, and terminal
//! detection.

use std::io::{self, IsTerminal, Write};
use std::sync::OnceLock;

use clap::ValueEnum;
use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::engine::RunSummary;
use crate::source::Range;

// ===========================================================================
// COLOR CONFIGURATION
// ===========================================================================

/// Controls when ANSI color codes are emitted.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum ColorMode {
    /// Enable color when stdout is a terminal and `NO_COLOR` is unset.
    #[default]
    Auto,
    /// Always emit ANSI color codes, even when piped.
    Always,
    /// Never emit ANSI color codes.
    Never,
}

/// Resolved color on/off decision with escape-sequence accessors.
#[derive(Debug, Clone, Copy)]
pub struct ColorConfig {
    enabled: bool,
}

impl ColorConfig {
    /// Resolve a `ColorMode` into a concrete on/off decision.
    ///
    /// Precedence: explicit flag, then `FORCE_COLOR`, then `NO_COLOR`,
    /// then TTY detection.
    pub fn from_mode(mode: ColorMode) -> Self {
        let enabled = match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => {
                if let Ok(val) = std::env::var("FORCE_COLOR") {
                    if !val.is_empty() && val != "0" {
                        return Self { enabled: true };
                    }
                }
                if std::env::var_os("NO_COLOR").is_some() {
                    return Self { enabled: false };
                }
                io::stdout().is_terminal()
            }
        };
        Self { enabled }
    }

    pub fn reset(&self) -> &'static str {
        if self.enabled { "\x1b[0m" } else { "" }
    }
    pub fn bold(&self) -> &'static str {
        if self.enabled { "\x1b[1m" } else { "" }
    }
    pub fn dim(&self) -> &'static str {
        if self.enabled { "\x1b[2m" } else { "" }
    }
    pub fn green(&self) -> &'static str {
        if self.enabled { "\x1b[32m" } else { "" }
    }
    pub fn yellow(&self) -> &'static str {
        if self.enabled { "\x1b[33m" } else { "" }
    }
    pub fn cyan(&self) -> &'static str {
        if self.enabled { "\x1b[36m" } else { "" }
    }
}

/// Process-wide color configuration, initialized once at startup.
static COLOR: OnceLock<ColorConfig> = OnceLock::new();

/// Set the global color mode. Call once from `main` before any output.
pub fn init_color(mode: ColorMode) {
    let _ = COLOR.set(ColorConfig::from_mode(mode));
}

/// The active `ColorConfig`, auto-detected if `init_color` was never
/// called.
pub fn color_config() -> &'static ColorConfig {
    COLOR.get_or_init(|| ColorConfig::from_mode(ColorMode::Auto))
}

// ===========================================================================
// OUTPUT FORMAT
// ===========================================================================

/// Output format for check results.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text output with color.
    #[default]
    Text,
    /// Concise one-line-per-diagnostic format.
    Concise,
    /// JSON output with full fix info.
    Json,
}

/// Print diagnostics in the requested format.
pub fn print_diagnostics(
    diagnostics: &[Diagnostic],
    format: OutputFormat,
    show_fixes: bool,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match format {
        OutputFormat::Text => print_text(&mut handle, diagnostics, show_fixes),
        OutputFormat::Concise => print_concise(&mut handle, diagnostics),
        OutputFormat::Json => print_json(&mut handle, diagnostics),
    }
}

/// Print the end-of-run summary line (text formats only; JSON embeds its
/// own counts).
pub fn print_summary(summary: &RunSummary, format: OutputFormat) -> io::Result<()> {
    if matches!(format, OutputFormat::Json) {
        return Ok(());
    }
    let c = color_config();
    let stdout = io::stdout();
    let mut w = stdout.lock();
    if summary.diagnostics.is_empty() {
        writeln!(
            w,
            "{}checked {} file(s), no issues found{}",
            c.green(),
            summary.files_scanned,
            c.reset()
        )?;
    } else {
        writeln!(
            w,
            "{}found {} issue(s) in {} file(s){}",
            c.yellow(),
            summary.diagnostics.len(),
            summary.files_scanned,
            c.reset()
        )?;
    }
    if summary.files_failed > 0 {
        writeln!(w, "{} file(s) could not be analyzed", summary.files_failed)?;
    }
    Ok(())
}

// ===========================================================================
// TEXT FORMAT
// ===========================================================================

fn print_text<W: Write>(w: &mut W, diagnostics: &[Diagnostic], show_fixes: bool) -> io::Result<()> {
    let c = color_config();
    for diag in diagnostics {
        writeln!(
            w,
            "{}{}:{}:{}{}: {}{}{} {}[{} {}]{}",
            c.bold(),
            diag.file.display(),
            diag.range.start_line,
            diag.range.start_col,
            c.reset(),
            c.yellow(),
            diag.message,
            c.reset(),
            c.dim(),
            diag.check,
            diag.check.name(),
            c.reset(),
        )?;
        if show_fixes {
            if let Some(fix) = &diag.fix {
                for edit in &fix.edits {
                    let action = if edit.new_text.is_empty() {
                        format!(
                            "delete {}:{}-{}:{}",
                            edit.range.start_line,
                            edit.range.start_col,
                            edit.range.end_line,
                            edit.range.end_col
                        )
                    } else {
                        format!(
                            "replace {}:{}-{}:{} with `{}`",
                            edit.range.start_line,
                            edit.range.start_col,
                            edit.range.end_line,
                            edit.range.end_col,
                            edit.new_text
                        )
                    };
                    writeln!(w, "    {}fix: {}{}", c.cyan(), action, c.reset())?;
                }
            }
        }
    }
    Ok(())
}

// ===========================================================================
// CONCISE FORMAT
// ===========================================================================

fn print_concise<W: Write>(w: &mut W, diagnostics: &[Diagnostic]) -> io::Result<()> {
    for diag in diagnostics {
        writeln!(
            w,
            "{}:{}:{}: {} [{}] {}",
            diag.file.display(),
            diag.range.start_line,
            diag.range.start_col,
            diag.severity,
            diag.check,
            diag.message,
        )?;
    }
    Ok(())
}

// ===========================================================================
// JSON FORMAT
// ===========================================================================

#[derive(Serialize)]
struct JsonReport<'a> {
    diagnostics: Vec<JsonDiagnostic<'a>>,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    code: &'a str,
    name: &'a str,
    severity: String,
    file: String,
    location: Range,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fix: Option<JsonFix<'a>>,
}

#[derive(Serialize)]
struct JsonFix<'a> {
    message: &'a str,
    edits: Vec<JsonEdit<'a>>,
}

#[derive(Serialize)]
struct JsonEdit<'a> {
    start_byte: usize,
    end_byte: usize,
    location: Range,
    new_text: &'a str,
}

fn print_json<W: Write>(w: &mut W, diagnostics: &[Diagnostic]) -> io::Result<()> {
    let report = JsonReport {
        diagnostics: diagnostics
            .iter()
            .map(|diag| JsonDiagnostic {
                code: diag.check.as_str(),
                name: diag.check.name(),
                severity: diag.severity.to_string(),
                file: diag.file.display().to_string(),
                location: diag.range,
                message: &diag.message,
                fix: diag.fix.as_ref().map(|fix| JsonFix {
                    message: &fix.message,
                    edits: fix
                        .edits
                        .iter()
                        .map(|edit| JsonEdit {
                            start_byte: edit.span.start,
                            end_byte: edit.span.end,
                            location: edit.range,
                            new_text: &edit.new_text,
                        })
                        .collect(),
                }),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(&mut *w, &report)?;
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::CheckCode;
    use crate::diagnostics::{Edit, Fix, Severity};
    use crate::source::Span;
    use std::path::PathBuf;

    fn sample_diag() -> Diagnostic {
        let range = Range {
            start_line: 3,
            start_col: 14,
            end_line: 3,
            end_col: 38,
        };
        Diagnostic {
            check: CheckCode::CTD001,
            severity: Severity::Warning,
            file: PathBuf::from("demo.c"),
            range,
            span: Span::new(40, 64),
            message: "use ROUND_UP instead".to_string(),
            fix: Some(Fix::new(
                "rewrite with ROUND_UP",
                vec![Edit {
                    file: PathBuf::from("demo.c"),
                    span: Span::new(40, 64),
                    range,
                    new_text: "ROUND_UP(a, 4096)".to_string(),
                }],
            )),
        }
    }

    #[test]
    fn concise_format_is_one_line() {
        let mut out = Vec::new();
        print_concise(&mut out, &[sample_diag()]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "demo.c:3:14: warning [CTD001] use ROUND_UP instead\n"
        );
    }

    #[test]
    fn json_format_includes_fix_edits() {
        let mut out = Vec::new();
        print_json(&mut out, &[sample_diag()]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let diag = &value["diagnostics"][0];
        assert_eq!(diag["code"], "CTD001");
        assert_eq!(diag["name"], "round");
        assert_eq!(diag["fix"]["edits"][0]["new_text"], "ROUND_UP(a, 4096)");
        assert_eq!(diag["fix"]["edits"][0]["start_byte"], 40);
    }

    #[test]
    fn fixless_diagnostic_omits_fix_key() {
        let mut diag = sample_diag();
        diag.fix = None;
        let mut out = Vec::new();
        print_json(&mut out, &[diag]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["diagnostics"][0].get("fix").is_none());
    }
}
