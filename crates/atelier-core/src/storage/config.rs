//! TOML-based engine configuration.
//!
//! Stores the knobs scheduling and estimation depend on:
//! - Plan catalog base hours
//! - Default buffer percentage and breakdown ratio
//! - Daily-dedication default and bounds, day capacity ceiling
//! - Optional remote projection endpoint
//!
//! Configuration is stored at `~/.config/atelier/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::data_dir;
use crate::error::{ConfigError, Result, ValidationError};

/// Estimation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Base hours per plan type.
    #[serde(default = "default_plan_hours")]
    pub plan_hours: HashMap<String, f64>,
    /// Default risk margin in percent when a project sets none.
    #[serde(default = "default_buffer_percentage")]
    pub buffer_percentage: f64,
    /// Share of the buffered total reported as technical work.
    #[serde(default = "default_technical_share")]
    pub technical_share: f64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            plan_hours: default_plan_hours(),
            buffer_percentage: default_buffer_percentage(),
            technical_share: default_technical_share(),
        }
    }
}

/// Scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    /// Default hours/day ceiling for new projects.
    #[serde(default = "default_daily_dedication")]
    pub daily_dedication: f64,
    #[serde(default = "default_dedication_min")]
    pub dedication_min: f64,
    #[serde(default = "default_dedication_max")]
    pub dedication_max: f64,
    /// Committed hours above this flag a day as over capacity.
    #[serde(default = "default_max_day_capacity")]
    pub max_day_capacity: f64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            daily_dedication: default_daily_dedication(),
            dedication_min: default_dedication_min(),
            dedication_max: default_dedication_max(),
            max_day_capacity: default_max_day_capacity(),
        }
    }
}

impl SchedulingConfig {
    /// Check a dedication value against the configured bounds.
    pub fn validate_dedication(&self, hours: f64) -> Result<f64, ValidationError> {
        if hours <= 0.0 {
            return Err(ValidationError::NonPositiveDedication { hours });
        }
        if hours < self.dedication_min || hours > self.dedication_max {
            return Err(ValidationError::DedicationOutOfRange {
                hours,
                min: self.dedication_min,
                max: self.dedication_max,
            });
        }
        Ok(hours)
    }
}

/// Remote projection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Endpoint computing forward projections; local-only when unset.
    #[serde(default)]
    pub remote_endpoint: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            remote_endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/atelier/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub estimate: EstimateConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
}

// Default functions
fn default_plan_hours() -> HashMap<String, f64> {
    HashMap::from([
        ("essential".to_string(), 24.0),
        ("standard".to_string(), 40.0),
        ("premium".to_string(), 72.0),
    ])
}
fn default_buffer_percentage() -> f64 {
    30.0
}
fn default_technical_share() -> f64 {
    0.8
}
fn default_daily_dedication() -> f64 {
    4.0
}
fn default_dedication_min() -> f64 {
    0.5
}
fn default_dedication_max() -> f64 {
    12.0
}
fn default_max_day_capacity() -> f64 {
    8.0
}
fn default_timeout_secs() -> u64 {
    10
}

impl EngineConfig {
    /// Path of the configuration file.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load the configuration from disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let config =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Ok(config)
    }

    /// Load the configuration, falling back to defaults when the file does
    /// not exist or cannot be parsed.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist the configuration to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, contents).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}
