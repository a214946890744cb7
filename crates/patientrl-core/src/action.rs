use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejected action id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("action {0} is outside the action space {{0, 1}}")]
    OutOfRange(i64),
    #[error("action is not an integer: {0:?}")]
    NotAnInteger(String),
}

/// One of the two response strategies.
///
/// What each id means downstream is decided by the caller; this type only
/// guarantees that no value outside `{0, 1}` can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Action(u8);

impl Action {
    /// Size of the action space.
    pub const COUNT: usize = 2;
    /// Every action, in index order.
    pub const ALL: [Action; Action::COUNT] = [Action(0), Action(1)];

    /// Position of this action in per-state value arrays.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<i64> for Action {
    type Error = ActionError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            0 | 1 => Ok(Action(v as u8)),
            other => Err(ActionError::OutOfRange(other)),
        }
    }
}

impl From<Action> for u8 {
    fn from(a: Action) -> Self {
        a.0
    }
}

impl FromStr for Action {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v: i64 = s
            .trim()
            .parse()
            .map_err(|_| ActionError::NotAnInteger(s.to_string()))?;
        Action::try_from(v)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn only_zero_and_one_are_valid() {
        assert_eq!(Action::try_from(0).unwrap().index(), 0);
        assert_eq!(Action::try_from(1).unwrap().index(), 1);
        assert_eq!(Action::try_from(2), Err(ActionError::OutOfRange(2)));
        assert_eq!(Action::try_from(-1), Err(ActionError::OutOfRange(-1)));
    }

    #[test]
    fn parses_from_cli_strings() {
        assert_eq!("1".parse::<Action>().unwrap(), Action::ALL[1]);
        assert!(matches!("x".parse::<Action>(), Err(ActionError::NotAnInteger(_))));
        assert!(matches!("5".parse::<Action>(), Err(ActionError::OutOfRange(5))));
    }

    #[test]
    fn serde_rejects_out_of_range() {
        assert_eq!(serde_json::to_string(&Action::ALL[0]).unwrap(), "0");
        assert_eq!(serde_json::from_str::<Action>("1").unwrap(), Action::ALL[1]);
        assert!(serde_json::from_str::<Action>("2").is_err());
    }
}
