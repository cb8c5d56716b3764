//! Host state machine configuration.

use serde::{Deserialize, Serialize};

use crate::state::HostState;
use crate::{Result, StateError};

/// Host state machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineConfig {
    /// Reject transitions that are not in the table
    #[serde(default = "default_true")]
    pub validate_transitions: bool,

    /// Number of transitions kept in history
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// State the machine starts in
    #[serde(default)]
    pub initial_state: HostState,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            validate_transitions: true,
            max_history: default_max_history(),
            initial_state: HostState::Initial,
        }
    }
}

impl StateMachineConfig {
    /// Permissive configuration for test harnesses.
    pub fn permissive() -> Self {
        Self {
            validate_transitions: false,
            ..Default::default()
        }
    }

    /// Parse a configuration from TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| StateError::Config(e.to_string()))
    }
}

fn default_true() -> bool {
    true
}

fn default_max_history() -> usize {
    50
}
