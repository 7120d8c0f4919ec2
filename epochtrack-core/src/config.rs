//! Configuration for epochtrack.
//!
//! Uses `figment` for layered configuration: defaults -> user config -> workspace
//! config -> environment -> explicit overrides. Configuration is loaded from
//! `~/.config/epochtrack/config.toml` and/or `.epochtrack/config.toml` in the
//! workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackError};

/// Directory name used for workspace-local configuration and the default repository.
pub const WORKSPACE_DIR: &str = ".epochtrack";

/// Top-level tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Repository directory sessions write to when none is given.
    #[serde(default = "default_repo")]
    pub repo: PathBuf,
    /// Experiment name sessions use when none is given.
    #[serde(default = "default_experiment")]
    pub experiment: String,
    /// Logging configuration (consumed by the CLI).
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            repo: default_repo(),
            experiment: default_experiment(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_repo() -> PathBuf {
    PathBuf::from(WORKSPACE_DIR).join("runs")
}

fn default_experiment() -> String {
    "default".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base filter for the stderr layer when no `-v`/`-q` flag is given.
    #[serde(default = "default_level")]
    pub level: String,
    /// Write structured JSON logs to the data directory.
    #[serde(default = "default_true")]
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json_logs: true,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `EPOCHTRACK_`)
/// 3. Workspace-local config (`.epochtrack/config.toml`)
/// 4. User config (`~/.config/epochtrack/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&TrackerConfig>,
) -> Result<TrackerConfig> {
    let mut figment = Figment::from(Serialized::defaults(TrackerConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // EPOCHTRACK_EXPERIMENT, EPOCHTRACK_LOGGING__LEVEL, ...
    figment = figment.merge(Env::prefixed("EPOCHTRACK_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment
        .extract()
        .map_err(|e| TrackError::from(Box::new(e)))
}

/// Path of the user-level config file, if a home directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "epochtrack", "epochtrack")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_DIR).join("config.toml")
}
