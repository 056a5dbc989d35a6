//! Engine configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! `RISKIQ_*` environment variables. The CLI applies its flags last.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use riskiq_core::{Interval, Lookback};

use crate::metrics::VarMethod;

pub const ENV_MODEL_DIR: &str = "RISKIQ_MODEL_DIR";
pub const ENV_VAR_METHOD: &str = "RISKIQ_VAR_METHOD";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("invalid value for {name}: {message}")]
    InvalidEnv { name: &'static str, message: String },
}

/// GARCH(1,1) fitting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GarchConfig {
    pub min_returns: usize,
    /// Grid resolution per axis of the (alpha, beta) search.
    pub grid_steps: usize,
    /// Coordinate-refinement passes after the grid search.
    pub refinement_rounds: usize,
}

impl Default for GarchConfig {
    fn default() -> Self {
        Self {
            min_returns: 30,
            grid_steps: 20,
            refinement_rounds: 40,
        }
    }
}

/// Gradient-boosted forecaster settings, used for feature extraction and
/// for the in-process fit when no pretrained artifact is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostedConfig {
    /// Rolling window of the volatility and mean features.
    pub window: usize,
    /// Number of future returns whose std is the training target.
    pub horizon: usize,
    pub n_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub subsample: f64,
    pub min_training_rows: usize,
    pub seed: u64,
}

impl Default for BoostedConfig {
    fn default() -> Self {
        Self {
            window: 20,
            horizon: 5,
            n_trees: 50,
            max_depth: 3,
            learning_rate: 0.1,
            subsample: 0.8,
            min_training_rows: 10,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub seq_len: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self { seq_len: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub var_method: VarMethod,
    pub garch: GarchConfig,
    pub boosted: BoostedConfig,
    pub sequence: SequenceConfig,
    /// Directory holding `xgb_vol_model.json` and `lstm_vol_model.json`.
    pub model_dir: PathBuf,
    /// Trailing points reported as chart history in each assessment.
    pub history_points: usize,
    pub lookback: Lookback,
    pub interval: Interval,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            var_method: VarMethod::default(),
            garch: GarchConfig::default(),
            boosted: BoostedConfig::default(),
            sequence: SequenceConfig::default(),
            model_dir: PathBuf::from("models"),
            history_points: 252,
            lookback: Lookback::default(),
            interval: Interval::default(),
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;

        serde_json::from_str(&raw).map_err(|error| ConfigError::Parse {
            path: path.display().to_string(),
            message: error.to_string(),
        })
    }

    /// Overlay `RISKIQ_MODEL_DIR` and `RISKIQ_VAR_METHOD` from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|name| std::env::var(name).ok())
    }

    pub fn with_env_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup(ENV_MODEL_DIR).filter(|value| !value.trim().is_empty()) {
            self.model_dir = PathBuf::from(dir);
        }

        if let Some(method) = lookup(ENV_VAR_METHOD) {
            self.var_method = method
                .parse()
                .map_err(|message| ConfigError::InvalidEnv {
                    name: ENV_VAR_METHOD,
                    message,
                })?;
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"var_method": "parametric", "boosted": {{"n_trees": 10}}, "interval": "1wk"}}"#
        )
        .expect("write config");

        let config = EngineConfig::from_file(file.path()).expect("config");
        assert_eq!(config.var_method, VarMethod::Parametric);
        assert_eq!(config.boosted.n_trees, 10);
        assert_eq!(config.boosted.window, 20);
        assert_eq!(config.interval, Interval::OneWeek);
        assert_eq!(config.history_points, 252);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "{{not json").expect("write config");

        let err = EngineConfig::from_file(file.path()).expect_err("must fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let config = EngineConfig::default()
            .with_env_from(|name| match name {
                ENV_MODEL_DIR => Some(String::from("/opt/riskiq/models")),
                ENV_VAR_METHOD => Some(String::from("parametric")),
                _ => None,
            })
            .expect("config");

        assert_eq!(config.model_dir, PathBuf::from("/opt/riskiq/models"));
        assert_eq!(config.var_method, VarMethod::Parametric);
    }

    #[test]
    fn invalid_environment_value_is_rejected() {
        let err = EngineConfig::default()
            .with_env_from(|name| (name == ENV_VAR_METHOD).then(|| String::from("bogus")))
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::InvalidEnv { name: ENV_VAR_METHOD, .. }));
    }
}
