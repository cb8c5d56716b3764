//! Registry-level events published by the plugin manager.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Manager event names.
pub mod names {
    /// A plugin was registered.
    pub const REGISTER: &str = "register";
    /// A registration was removed.
    pub const UNREGISTER: &str = "unregister";
    /// A plugin instance was created.
    pub const READY: &str = "ready";
    /// A plugin instance was destroyed.
    pub const DESTROY: &str = "destroy";
    /// A non-fatal problem.
    pub const WARNING: &str = "warning";
    /// A contained failure.
    pub const ERROR: &str = "error";
}

/// Payload carried on the manager bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginEvent {
    /// Plugin registered
    Registered { plugin: String },

    /// Registration removed
    Unregistered { plugin: String },

    /// Instance created and wired
    Ready { plugin: String },

    /// Instance destroyed
    Destroyed { plugin: String },

    /// Plugin destroyed while others still depend on it
    Warning {
        plugin: String,
        message: String,
        dependents: Vec<String>,
    },

    /// Contained failure
    Error { plugin: String, message: String },

    /// Host-defined event
    Custom { name: String, payload: Value },
}

impl PluginEvent {
    /// Event name this payload is published under.
    pub fn name(&self) -> &str {
        match self {
            Self::Registered { .. } => names::REGISTER,
            Self::Unregistered { .. } => names::UNREGISTER,
            Self::Ready { .. } => names::READY,
            Self::Destroyed { .. } => names::DESTROY,
            Self::Warning { .. } => names::WARNING,
            Self::Error { .. } => names::ERROR,
            Self::Custom { name, .. } => name,
        }
    }

    /// Plugin the event is about.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::Registered { plugin }
            | Self::Unregistered { plugin }
            | Self::Ready { plugin }
            | Self::Destroyed { plugin }
            | Self::Warning { plugin, .. }
            | Self::Error { plugin, .. } => Some(plugin),
            Self::Custom { .. } => None,
        }
    }
}
