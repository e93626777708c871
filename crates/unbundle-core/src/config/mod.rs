//! Configuration.
//!
//! [`Config`] is the runtime configuration of one CLI invocation;
//! [`ProjectConfig`] is the project's `unbundle.config.json`.

mod project;

pub use project::{
    BuildSection, DevSection, MountValue, PackagesSection, ProjectConfig, RawConfig, CONFIG_FILE,
    DEFAULT_META_URL_PATH, DEFAULT_PACKAGE_CACHE,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Runtime configuration for the unbundle CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory.
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,

    /// Explicit project config file (`--config`).
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
            config_file: None,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }

    /// Use an explicit project config file instead of discovery.
    #[must_use]
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Load the project config this invocation points at.
    pub fn load_project(&self) -> Result<ProjectConfig, crate::error::ConfigError> {
        ProjectConfig::load(&self.cwd, self.config_file.as_deref())
    }
}
