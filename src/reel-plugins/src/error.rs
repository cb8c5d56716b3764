//! Plugin runtime error types.

use thiserror::Error;

use crate::hooks::HookPoint;
use crate::lifecycle::LifecyclePhase;

/// Plugin runtime errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    /// No registration under this name.
    #[error("Plugin not registered: {0}")]
    NotRegistered(String),

    /// A registration under this name already exists.
    #[error("Plugin already registered: {0}")]
    AlreadyRegistered(String),

    /// No live instance under this name.
    #[error("Plugin not instantiated: {0}")]
    NotInstantiated(String),

    /// A live instance under this name already exists.
    #[error("Plugin already instantiated: {0}")]
    AlreadyInstantiated(String),

    /// A validator rejected the registration.
    #[error("Validation failed for plugin '{plugin}': {reason}")]
    Validation { plugin: String, reason: String },

    /// A declared dependency has no registration.
    #[error("Plugin '{plugin}' depends on unregistered plugin '{dependency}'")]
    DependencyNotFound { plugin: String, dependency: String },

    /// The declared dependencies form a cycle.
    #[error("Circular dependency: {}", chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    /// A resolved dependency has no live instance.
    #[error("Plugin '{plugin}' requires '{dependency}' to be created first")]
    MissingDependency { plugin: String, dependency: String },

    /// A lifecycle operation was called in the wrong phase.
    #[error("Cannot {operation} plugin '{plugin}' in phase {phase}")]
    InvalidPhase {
        plugin: String,
        operation: String,
        phase: LifecyclePhase,
    },

    /// A lifecycle hook failed.
    #[error("Hook {hook} failed in '{plugin}': {message}")]
    HookError {
        plugin: String,
        hook: HookPoint,
        message: String,
    },

    /// The plugin's own lifecycle work failed.
    #[error("Plugin '{plugin}' failed to {operation}: {message}")]
    LifecycleError {
        plugin: String,
        operation: String,
        message: String,
    },

    /// The factory could not build the plugin.
    #[error("Failed to construct plugin '{plugin}': {message}")]
    ConstructionError { plugin: String, message: String },

    /// A creation middleware failed.
    #[error("Middleware failed for plugin '{plugin}': {message}")]
    MiddlewareError { plugin: String, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PluginError {
    /// Create a validation error.
    pub fn validation(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Create a dependency-not-found error.
    pub fn dependency_not_found(plugin: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::DependencyNotFound {
            plugin: plugin.into(),
            dependency: dependency.into(),
        }
    }

    /// Create a missing-dependency error.
    pub fn missing_dependency(plugin: impl Into<String>, dependency: impl Into<String>) -> Self {
        Self::MissingDependency {
            plugin: plugin.into(),
            dependency: dependency.into(),
        }
    }

    /// Create an invalid phase error.
    pub fn invalid_phase(
        plugin: impl Into<String>,
        operation: impl Into<String>,
        phase: LifecyclePhase,
    ) -> Self {
        Self::InvalidPhase {
            plugin: plugin.into(),
            operation: operation.into(),
            phase,
        }
    }

    /// Create a hook error.
    pub fn hook_error(plugin: impl Into<String>, hook: HookPoint, message: impl Into<String>) -> Self {
        Self::HookError {
            plugin: plugin.into(),
            hook,
            message: message.into(),
        }
    }

    /// Create a lifecycle error.
    pub fn lifecycle_error(
        plugin: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::LifecycleError {
            plugin: plugin.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a construction error.
    pub fn construction_error(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConstructionError {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create a middleware error.
    pub fn middleware_error(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MiddlewareError {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Name of the plugin this error is about, if any.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::NotRegistered(plugin)
            | Self::AlreadyRegistered(plugin)
            | Self::NotInstantiated(plugin)
            | Self::AlreadyInstantiated(plugin) => Some(plugin),
            Self::Validation { plugin, .. }
            | Self::DependencyNotFound { plugin, .. }
            | Self::MissingDependency { plugin, .. }
            | Self::InvalidPhase { plugin, .. }
            | Self::HookError { plugin, .. }
            | Self::LifecycleError { plugin, .. }
            | Self::ConstructionError { plugin, .. }
            | Self::MiddlewareError { plugin, .. } => Some(plugin),
            Self::DependencyCycle { chain } => chain.first().map(String::as_str),
            Self::ConfigError(_) | Self::SerializationError(_) => None,
        }
    }
}

impl From<toml::de::Error> for PluginError {
    fn from(err: toml::de::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for PluginError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Result type alias for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginError::NotRegistered("subtitles".to_string());
        assert_eq!(err.to_string(), "Plugin not registered: subtitles");
    }

    #[test]
    fn test_cycle_display() {
        let err = PluginError::DependencyCycle {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Circular dependency: a -> b -> a");
        assert_eq!(err.plugin(), Some("a"));
    }

    #[test]
    fn test_invalid_phase() {
        let err = PluginError::invalid_phase("overlay", "mount", LifecyclePhase::Created);
        assert!(err.to_string().contains("overlay"));
        assert!(err.to_string().contains("created"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PluginError = json_err.into();
        assert!(matches!(err, PluginError::SerializationError(_)));
    }
}
