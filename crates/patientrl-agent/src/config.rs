//! Agent configuration: learning hyperparameters, reward constants and
//! severity markers, loadable from a JSON file.

use patientrl_core::{RewardTable, SeverityMarkers};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::error::ConfigError;

/// Learning rate, discount factor and exploration rate, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

fn default_alpha() -> f64 {
    0.1
}

fn default_gamma() -> f64 {
    0.9
}

fn default_epsilon() -> f64 {
    0.2
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            gamma: default_gamma(),
            epsilon: default_epsilon(),
        }
    }
}

impl Hyperparameters {
    pub fn new(alpha: f64, gamma: f64, epsilon: f64) -> Result<Self, ConfigError> {
        let params = Self {
            alpha,
            gamma,
            epsilon,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("alpha", self.alpha)?;
        check_unit("gamma", self.gamma)?;
        check_unit("epsilon", self.epsilon)?;
        Ok(())
    }
}

pub(crate) fn check_unit(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange { name, value })
    }
}

/// Defaults applied to every agent a registry creates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(flatten)]
    pub params: Hyperparameters,
    #[serde(default)]
    pub rewards: RewardTable,
    #[serde(default)]
    pub markers: SeverityMarkers,
}

impl AgentConfig {
    /// Reads and validates a JSON config file. Missing fields keep their
    /// defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AgentConfig = serde_json::from_reader(file)?;
        config.params.validate()?;
        Ok(config)
    }
}
