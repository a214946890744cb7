#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Per-patient ε-greedy Q-learning over `(category, severity)` states.
//!
//! [`QLearner`] holds the learned values, [`PatientAgent`] adds load/save
//! through a [`ModelStore`], and [`AgentRegistry`] caches one agent per
//! patient with per-patient locking.

#[macro_use]
mod telemetry;

pub mod agent;
pub mod config;
pub mod error;
pub mod learner;
pub mod qtable;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use agent::{PatientAgent, Persistence, UpdateReport};
pub use config::{AgentConfig, Hyperparameters};
pub use error::{AgentError, ConfigError, Result, StoreError};
pub use learner::QLearner;
pub use qtable::{ActionValues, QTable};
pub use registry::{AgentHandle, AgentRegistry};
pub use snapshot::{LoadReport, ModelSnapshot};
pub use store::{FileStore, MemoryStore, ModelStore};
