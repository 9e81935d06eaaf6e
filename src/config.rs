use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::models::MAX_CYCLE_LENGTH;
use crate::reminders::DEFAULT_DAYS_BEFORE_PERIOD;
use crate::storage::{self, StorageError};

/// Periods read when refining the average cycle length.
pub const DEFAULT_HISTORY_LIMIT: usize = 6;

/// Runtime settings, read from an optional TOML file and `CHARM_*` variables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Snapshot file; defaults to the platform data directory.
    pub data_path: Option<PathBuf>,
    pub reminder_days_before: u32,
    pub history_limit: usize,
    pub show_fertility: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: None,
            reminder_days_before: DEFAULT_DAYS_BEFORE_PERIOD,
            history_limit: DEFAULT_HISTORY_LIMIT,
            show_fertility: true,
        }
    }
}

impl Settings {
    /// Load settings. Environment variables override the file.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings: Self = builder
            .add_source(config::Environment::with_prefix("CHARM"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), config::ConfigError> {
        if self.reminder_days_before >= MAX_CYCLE_LENGTH.unsigned_abs() {
            return Err(config::ConfigError::Message(format!(
                "reminder_days_before must be below {MAX_CYCLE_LENGTH}, got {}",
                self.reminder_days_before
            )));
        }
        if self.history_limit < 2 {
            return Err(config::ConfigError::Message(format!(
                "history_limit must be at least 2, got {}",
                self.history_limit
            )));
        }
        Ok(())
    }

    pub fn snapshot_path(&self) -> Result<PathBuf, StorageError> {
        match &self.data_path {
            Some(path) => Ok(path.clone()),
            None => storage::default_path(),
        }
    }
}
