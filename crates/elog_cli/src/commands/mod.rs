//! CLI command implementations.

pub mod delete;
pub mod digests;
pub mod inspect;
pub mod mirror;
pub mod renumber;
pub mod show;
pub mod verify;

use elog_core::{IndexRegistry, Logbook, LogbookConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by the commands themselves.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `--path` was given.
    #[error("logbook path required (use --path)")]
    PathRequired,

    /// The data directory does not exist.
    #[error("no logbook found at {0:?}")]
    NoLogbook(PathBuf),

    /// A flag value is not one of the accepted words.
    #[error("invalid {flag}: {value:?}")]
    InvalidArgument {
        /// Flag name.
        flag: &'static str,
        /// Rejected value.
        value: String,
    },

    /// The command ran but found problems.
    #[error("{0}")]
    Failed(String),
}

/// The logbook a command works on.
#[derive(Debug, Clone)]
pub struct Target {
    path: Option<PathBuf>,
    name: Option<String>,
}

impl Target {
    /// Creates a target from the global flags.
    pub fn new(path: Option<PathBuf>, name: Option<String>) -> Self {
        Self { path, name }
    }

    /// Returns the data directory.
    pub fn path(&self) -> Result<&Path, CliError> {
        self.path.as_deref().ok_or(CliError::PathRequired)
    }

    /// Returns the logbook name: `--logbook`, else the directory name.
    pub fn name(&self) -> Result<String, CliError> {
        if let Some(name) = &self.name {
            return Ok(name.clone());
        }
        let path = self.path()?;
        Ok(path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string()))
    }

    /// Opens the logbook without creating anything.
    pub fn open(&self) -> Result<Logbook, Box<dyn std::error::Error>> {
        let path = self.path()?;
        if !path.is_dir() {
            return Err(CliError::NoLogbook(path.to_path_buf()).into());
        }
        let config = LogbookConfig::new(self.name()?, path).create_if_missing(false);
        Ok(Logbook::open(config, &IndexRegistry::new())?)
    }
}

/// Returns true for `--format json`.
pub fn is_json(format: &str) -> bool {
    format.eq_ignore_ascii_case("json")
}
