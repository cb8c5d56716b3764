//! Event bus configuration.

use serde::{Deserialize, Serialize};

use crate::{EventError, Result};

/// Event bus configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBusConfig {
    /// Whether the bus starts enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Listener count per event above which a warning is logged (0 = unlimited)
    #[serde(default = "default_max_listeners")]
    pub max_listeners: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_listeners: default_max_listeners(),
        }
    }
}

impl EventBusConfig {
    /// Parse a configuration from TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| EventError::Config(e.to_string()))
    }

    /// Whether `count` listeners on one event exceeds the configured limit.
    pub fn exceeds_limit(&self, count: usize) -> bool {
        self.max_listeners > 0 && count > self.max_listeners
    }
}

fn default_true() -> bool {
    true
}

fn default_max_listeners() -> usize {
    100
}
