//! Parser configuration.
//!
//! Caller policies for the cases the grammar alone cannot decide. Defaults
//! give the strict five-shape grammar.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// What to report when a liquid drug has no bottle size configured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LiquidFallback {
    /// Report the total volume in ml as the quantity
    #[default]
    TotalVolume,
    /// Report zero so the caller asks for a manual quantity
    ManualEntry,
    /// Fail validation
    Reject,
}

/// Parser configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParserConfig {
    /// Accept topical, patch-interval, injectable and custom-hour schedules
    pub extended_schedules: bool,
    /// Whether "1-0-1" needs an explicit duration clause
    pub split_dose_requires_duration: bool,
    /// Behaviour for liquids without a bottle size
    pub liquid_without_bottle: LiquidFallback,
    /// Minimum similarity (0.0 - 1.0) for "did you mean" suggestions
    pub suggestion_threshold: f64,
    /// Upper bound on duration days
    pub max_duration_days: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            extended_schedules: false,
            split_dose_requires_duration: true,
            liquid_without_bottle: LiquidFallback::TotalVolume,
            suggestion_threshold: 0.75,
            max_duration_days: 365,
        }
    }
}

impl ParserConfig {
    /// Configuration with every schedule shape the parser knows enabled.
    pub fn extended() -> Self {
        Self {
            extended_schedules: true,
            ..Self::default()
        }
    }

    /// Parse configuration from JSON. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: ParserConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.suggestion_threshold) {
            return Err(ConfigError::Invalid(format!(
                "suggestion_threshold must be between 0 and 1, got {}",
                self.suggestion_threshold
            )));
        }
        if self.max_duration_days == 0 {
            return Err(ConfigError::Invalid(
                "max_duration_days must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
