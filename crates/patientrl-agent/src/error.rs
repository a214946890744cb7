use patientrl_core::Action;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Reward must be finite, got {0}")]
    InvalidReward(f64),
    #[error("Reward {reward} drives the value of action {action} in {state} out of range")]
    NonFiniteValue {
        state: String,
        action: Action,
        reward: f64,
    },
    #[error("Value of action {action} in {key} is not finite")]
    CorruptTable { key: String, action: String },
    #[error("Snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("Agent for {0:?} was evicted; fetch a fresh handle from the registry")]
    Evicted(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored model is not valid JSON: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Patient id cannot be used as a store key: {0:?}")]
    InvalidKey(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{name} must be a finite value in [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

pub type Result<T> = std::result::Result<T, AgentError>;
