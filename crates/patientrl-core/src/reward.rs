//! Reward shaping for outcome feedback.

use serde::{Deserialize, Serialize};

use crate::state::Severity;

/// Reward constants. The defaults are `+3` for a working outcome, `-3` for a
/// failure on a severe case and `-1` for any other failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTable {
    #[serde(default = "default_success")]
    pub success: i32,
    #[serde(default = "default_fail_severe")]
    pub fail_severe: i32,
    #[serde(default = "default_fail_other")]
    pub fail_other: i32,
}

fn default_success() -> i32 {
    3
}

fn default_fail_severe() -> i32 {
    -3
}

fn default_fail_other() -> i32 {
    -1
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            success: default_success(),
            fail_severe: default_fail_severe(),
            fail_other: default_fail_other(),
        }
    }
}

impl RewardTable {
    #[must_use]
    pub fn reward(&self, outcome_works: bool, severity: Severity) -> i32 {
        if outcome_works {
            self.success
        } else if severity == Severity::Severe {
            self.fail_severe
        } else {
            self.fail_other
        }
    }
}

/// Reward for an outcome using the default table.
#[must_use]
pub fn calculate_reward(outcome_works: bool, severity: Severity) -> i32 {
    RewardTable::default().reward(outcome_works, severity)
}
