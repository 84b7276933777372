//! The analysis driver: file collection, per-translation-unit check runs,
//! and parallel execution across independent units.
//!
//! Within one translation unit everything is synchronous and deterministic:
//! the tree is lowered once, each enabled check runs in registration order,
//! and diagnostics come back sorted by source position. Across units the
//! work is spread over a rayon pool; the only shared state is the
//! diagnostic sink, which serializes appends itself.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::checks::{builtin_checks, Check, CheckCode, CheckOptions};
use crate::diagnostics::{CollectingSink, Diagnostic, DiagnosticSink};
use crate::error::Result;
use crate::lower::lower_file;

/// Directories never scanned when walking a tree of sources.
const SKIP_DIRS: &[&str] = &[".git", ".svn", "build", "node_modules", "target"];

/// Configuration for one engine instance, read once at construction.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Checks to enable; `None` enables all.
    pub select: Option<HashSet<CheckCode>>,
    /// Checks to disable; takes precedence over `select`.
    pub exclude: HashSet<CheckCode>,
    /// Per-check boolean options.
    pub options: CheckOptions,
}

impl EngineConfig {
    /// Parse comma-separated code lists from the CLI/config layer. Unknown
    /// codes are reported on the warning log and skipped.
    pub fn from_code_lists(
        select: Option<&str>,
        exclude: Option<&str>,
        options: CheckOptions,
    ) -> Self {
        Self {
            select: select.map(|list| parse_code_list(list)),
            exclude: exclude.map(|list| parse_code_list(list)).unwrap_or_default(),
            options,
        }
    }

    fn is_enabled(&self, code: CheckCode) -> bool {
        if self.exclude.contains(&code) {
            return false;
        }
        match &self.select {
            Some(selected) => selected.contains(&code),
            None => true,
        }
    }
}

fn parse_code_list(list: &str) -> HashSet<CheckCode> {
    let mut codes = HashSet::new();
    for raw in list.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            continue;
        }
        match CheckCode::parse_code(token) {
            Some(code) => {
                codes.insert(code);
            }
            None => warn!(code = token, "ignoring unknown check code"),
        }
    }
    codes
}

/// Outcome of one engine run over a set of paths.
#[derive(Debug)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub files_failed: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct CheckEngine {
    checks: Vec<Box<dyn Check>>,
}

impl CheckEngine {
    pub fn new(config: EngineConfig) -> Self {
        let checks = builtin_checks(config.options)
            .into_iter()
            .filter(|check| config.is_enabled(check.code()))
            .collect();
        Self { checks }
    }

    pub fn enabled_codes(&self) -> Vec<CheckCode> {
        self.checks.iter().map(|c| c.code()).collect()
    }

    /// Analyze in-memory source text as one translation unit.
    pub fn analyze_source(&self, path: impl AsRef<Path>, text: String) -> Result<Vec<Diagnostic>> {
        let unit = crate::lower::lower_source(path, text)?;
        Ok(self.run_checks(&unit))
    }

    /// Analyze one file on disk.
    pub fn analyze_file(&self, path: impl AsRef<Path>) -> Result<Vec<Diagnostic>> {
        let unit = lower_file(path)?;
        Ok(self.run_checks(&unit))
    }

    fn run_checks(&self, unit: &crate::tree::TranslationUnit) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for check in &self.checks {
            diagnostics.extend(check.check(unit));
        }
        // One deterministic order per unit regardless of check registration.
        diagnostics.sort_by_key(|d| (d.span.start, d.span.end));
        diagnostics
    }

    /// Analyze every C file under `paths`, in parallel, appending into the
    /// sink. A file that fails to read or parse is logged and skipped; it
    /// never aborts the rest of the run.
    pub fn run(&self, paths: &[PathBuf]) -> RunSummary {
        let files = collect_files(paths);
        debug!(count = files.len(), "collected source files");

        let sink = CollectingSink::new();
        let failed = AtomicUsize::new(0);

        files.par_iter().for_each(|path| match self.analyze_file(path) {
            Ok(diagnostics) => {
                for diagnostic in diagnostics {
                    sink.report(diagnostic);
                }
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping file");
                failed.fetch_add(1, Ordering::Relaxed);
            }
        });

        RunSummary {
            files_scanned: files.len(),
            files_failed: failed.load(Ordering::Relaxed),
            diagnostics: sink.into_sorted(),
        }
    }
}

/// Expand paths into the list of C sources to analyze. Explicitly-named
/// files are taken as-is; directories are walked recursively for `.c` and
/// `.h` files. The result is sorted so runs are reproducible.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            walk_dir(path, &mut files);
        } else {
            files.push(path.clone());
        }
    }
    files.sort();
    files.dedup();
    files
}

fn walk_dir(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "cannot read directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if path.is_dir() {
            if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
                continue;
            }
            walk_dir(&path, files);
        } else if matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("c") | Some("h")
        ) {
            files.push(path);
        }
    }
}
