//! `.ctidy.toml` configuration file support.
//!
//! Provides deserialization, discovery (walk up to the nearest `.git`
//! root), and merging with CLI flags. CLI flags always take precedence
//! over file config.
//!
//! # Example config
//!
//! ```toml
//! [checks]
//! select = ["CTD001", "CTD003"]
//! exclude = ["CTD002"]
//!
//! [checks.config.CTD001]
//! only_align_up = true
//!
//! [checks.config.CTD003]
//! only_type_sizeof = true
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checks::{CheckCode, CheckOptions};
use crate::error::CtidyError;

/// Name of the configuration file searched for in parent directories.
pub const CONFIG_FILE_NAME: &str = ".ctidy.toml";

/// Top-level `.ctidy.toml` configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub checks: ChecksConfig,
}

/// Check selection and per-check configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ChecksConfig {
    /// Checks to enable. If empty/absent, all checks are enabled.
    #[serde(default)]
    pub select: Vec<String>,

    /// Checks to exclude (takes precedence over `select`).
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Per-check configuration tables keyed by check code. Values are
    /// key-value maps read once at check construction.
    #[serde(default)]
    pub config: HashMap<String, toml::Value>,
}

impl FileConfig {
    /// Read the boolean options the built-in checks understand.
    pub fn check_options(&self) -> CheckOptions {
        CheckOptions {
            only_align_up: self.bool_option(CheckCode::CTD001, "only_align_up"),
            only_type_sizeof: self.bool_option(CheckCode::CTD003, "only_type_sizeof"),
        }
    }

    fn bool_option(&self, code: CheckCode, key: &str) -> bool {
        self.checks
            .config
            .get(code.as_str())
            .and_then(|table| table.get(key))
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Comma-joined select list, or `None` when the config does not
    /// restrict selection.
    pub fn select_list(&self) -> Option<String> {
        if self.checks.select.is_empty() {
            None
        } else {
            Some(self.checks.select.join(","))
        }
    }

    pub fn exclude_list(&self) -> Option<String> {
        if self.checks.exclude.is_empty() {
            None
        } else {
            Some(self.checks.exclude.join(","))
        }
    }
}

/// Load a config file from an explicit path.
pub fn load_config(path: &Path) -> Result<FileConfig, CtidyError> {
    let text = std::fs::read_to_string(path).map_err(|source| CtidyError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text)
        .map_err(|err| CtidyError::Config(format!("{}: {}", path.display(), err)))
}

/// Search for `.ctidy.toml` from `start` upward, stopping at the first
/// directory containing `.git` (inclusive) or the filesystem root.
pub fn discover_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if current.join(".git").exists() {
            return None;
        }
        dir = current.parent();
    }
    None
}

/// Discover and load the effective config for the current directory; a
/// missing config is the default config.
pub fn discover_and_load_config(start: &Path) -> Result<FileConfig, CtidyError> {
    match discover_config(start) {
        Some(path) => {
            debug!(path = %path.display(), "loaded config file");
            load_config(&path)
        }
        None => Ok(FileConfig::default()),
    }
}

/// The default config file contents written by `ctidy init`.
pub fn default_config_text() -> &'static str {
    r#"# ctidy configuration.
#
# All checks are enabled by default; restrict with `select` or `exclude`.

[checks]
# select = ["CTD001", "CTD003"]
# exclude = ["CTD002"]

# Only detect the full align-up rounding form.
[checks.config.CTD001]
only_align_up = false

# Only accept sizeof(type) size arguments in allocation calls.
[checks.config.CTD003]
only_type_sizeof = false
"#
}
