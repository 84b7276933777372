//! ctidy: structural pattern-matching linter for C.
//!
//! # Usage
//!
//! ```bash
//! # Check C files for rewritable patterns
//! ctidy check src/
//!
//! # Machine-readable output with fix info
//! ctidy check src/ --format json
//!
//! # Generate default config
//! ctidy init
//!
//! # Run with debug logging
//! ctidy --debug check src/
//! ```

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ctidy::checks::{print_checks, CheckOptions};
use ctidy::cli::{Cli, Commands};
use ctidy::config::{default_config_text, discover_and_load_config, load_config, FileConfig};
use ctidy::engine::{CheckEngine, EngineConfig};
use ctidy::error::exit_code;
use ctidy::output::{init_color, print_diagnostics, print_summary, OutputFormat};

fn main() {
    let cli = Cli::parse();

    // Initialize color output before anything else writes to stdout.
    init_color(cli.color);

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_ansi(!matches!(cli.color, ctidy::output::ColorMode::Never))
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(exit_code::INTERNAL_ERROR);
    }

    let file_config = match load_file_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(exit_code::CONFIG_ERROR);
        }
    };

    match cli.command {
        Commands::Check {
            paths,
            select,
            exclude,
            format,
            show_fixes,
            exit_zero,
            only_align_up,
            only_type_sizeof,
        } => {
            let code = run_check(
                &file_config,
                paths,
                select,
                exclude,
                format,
                show_fixes,
                cli.quiet,
                only_align_up,
                only_type_sizeof,
            );
            if !exit_zero {
                std::process::exit(code);
            }
        }
        Commands::Checks => print_checks(),
        Commands::Init { output, force } => {
            std::process::exit(run_init(&output, force));
        }
    }
}

fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig, ctidy::error::CtidyError> {
    match explicit {
        Some(path) => load_config(path),
        None => {
            let cwd = std::env::current_dir()?;
            discover_and_load_config(&cwd)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_check(
    file_config: &FileConfig,
    paths: Vec<PathBuf>,
    select: Option<String>,
    exclude: Option<String>,
    format: OutputFormat,
    show_fixes: bool,
    quiet: bool,
    only_align_up: bool,
    only_type_sizeof: bool,
) -> i32 {
    // CLI flags win over the config file.
    let file_options = file_config.check_options();
    let options = CheckOptions {
        only_align_up: only_align_up || file_options.only_align_up,
        only_type_sizeof: only_type_sizeof || file_options.only_type_sizeof,
    };
    let select = select.or_else(|| file_config.select_list());
    let exclude = exclude.or_else(|| file_config.exclude_list());

    let engine = CheckEngine::new(EngineConfig::from_code_lists(
        select.as_deref(),
        exclude.as_deref(),
        options,
    ));
    info!(checks = ?engine.enabled_codes(), "running checks");

    let summary = engine.run(&paths);

    if print_diagnostics(&summary.diagnostics, format, show_fixes).is_err() {
        return exit_code::IO_ERROR;
    }
    if !quiet {
        let _ = print_summary(&summary, format);
    }

    if summary.files_scanned > 0 && summary.files_failed == summary.files_scanned {
        exit_code::IO_ERROR
    } else if summary.diagnostics.is_empty() {
        exit_code::CLEAN
    } else {
        exit_code::FINDINGS
    }
}

fn run_init(output: &Path, force: bool) -> i32 {
    if output.exists() && !force {
        eprintln!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
        return exit_code::CONFIG_ERROR;
    }
    match std::fs::write(output, default_config_text()) {
        Ok(()) => {
            println!("wrote {}", output.display());
            exit_code::CLEAN
        }
        Err(err) => {
            eprintln!("cannot write {}: {}", output.display(), err);
            exit_code::IO_ERROR
        }
    }
}
