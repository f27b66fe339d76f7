//! Layered configuration for draftcast.
//!
//! Values are resolved from, in increasing precedence:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`--config`, or `draftcast.toml` in the platform config
//!    directory when it exists),
//! 3. `DRAFTCAST_` environment variables, with `__` separating sections from
//!    keys (`DRAFTCAST_AUTOSAVE__DEBOUNCE_MS=800`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use draftcast_autosave::{AutosaveSettings, DivergenceCheck};
use draftcast_history::HistoryOptions;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "DRAFTCAST_";
pub const FILE_NAME: &str = "draftcast.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub autosave: AutosaveConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the device-local store. Defaults to the platform
    /// data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub summary_chars: usize,
}
impl Default for HistoryConfig {
    fn default() -> Self {
        let options = HistoryOptions::default();
        Self { capacity: options.capacity, summary_chars: options.summary_chars }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub retry_backoff_max_ms: u64,
    pub divergence: DivergenceCheck,
}
impl Default for AutosaveConfig {
    fn default() -> Self {
        let settings = AutosaveSettings::default();
        Self {
            debounce_ms: millis(settings.debounce),
            max_attempts: settings.max_attempts,
            retry_backoff_ms: millis(settings.retry_backoff),
            retry_backoff_max_ms: millis(settings.retry_backoff_max),
            divergence: settings.divergence,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl From<&HistoryConfig> for HistoryOptions {
    fn from(config: &HistoryConfig) -> Self {
        Self { capacity: config.capacity, summary_chars: config.summary_chars }
    }
}

impl From<&AutosaveConfig> for AutosaveSettings {
    fn from(config: &AutosaveConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            max_attempts: config.max_attempts,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            retry_backoff_max: Duration::from_millis(config.retry_backoff_max_ms),
            divergence: config.divergence,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "draftcast")
}

impl Config {
    /// Load and validate configuration.
    ///
    /// An explicit `path` must exist; without one, the platform default file
    /// is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::MissingFile(path.display().to_string())),
            Some(path) => Some(path.to_path_buf()),
            None => project_dirs().map(|dirs| dirs.config_dir().join(FILE_NAME)).filter(|path| path.is_file()),
        };
        match &file {
            Some(file) => tracing::debug!(file = %file.display(), "loading configuration"),
            None => tracing::debug!("no configuration file; using defaults and environment"),
        }
        Self::from_figment(Self::figment(file.as_deref()))
    }

    /// The layered sources, before extraction.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().map_err(|err| ErrorKind::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.capacity == 0 {
            exn::bail!(ErrorKind::Invalid("history.capacity must be greater than zero"));
        }
        AutosaveSettings::from(&self.autosave)
            .validate()
            .or_raise(|| ErrorKind::Invalid("autosave settings are unusable"))?;
        Ok(())
    }

    /// The configured data directory, or the platform default.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).ok_or_raise(|| ErrorKind::NoDataDir)
    }

    pub fn history_options(&self) -> HistoryOptions {
        HistoryOptions::from(&self.history)
    }

    pub fn autosave_settings(&self) -> AutosaveSettings {
        AutosaveSettings::from(&self.autosave)
    }
}
