//! Node lifecycle.

use serde::{Deserialize, Serialize};

/// Lifecycle of a node entity.
///
/// Flag writes are only accepted while a node is not `Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    /// Node is provisioned and running workloads.
    Alive,

    /// Node is being torn down but still accepts coordination requests.
    Dying,

    /// Terminal. The node no longer takes part in reboot coordination.
    Dead,
}

impl Life {
    pub fn is_dead(&self) -> bool {
        matches!(self, Life::Dead)
    }

    /// Life only moves forward: Alive → Dying → Dead.
    pub fn can_transition_to(&self, target: Life) -> bool {
        use Life::*;
        matches!(
            (self, target),
            (Alive, _) | (Dying, Dying) | (Dying, Dead) | (Dead, Dead)
        )
    }

    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Life::Alive => "alive",
            Life::Dying => "dying",
            Life::Dead => "dead",
        }
    }
}

impl std::str::FromStr for Life {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(Life::Alive),
            "dying" => Ok(Life::Dying),
            "dead" => Ok(Life::Dead),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Life {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
