//! Plugin manager configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use reel_events::EventBusConfig;

use crate::{PluginError, Result};

/// Plugin manager configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManagerConfig {
    /// Initialize plugins as part of `create`
    #[serde(default = "default_true")]
    pub auto_init: bool,

    /// Plugins disabled right after creation
    #[serde(default)]
    pub disabled_plugins: Vec<String>,

    /// Plugin-specific configurations
    #[serde(default)]
    pub plugin_configs: HashMap<String, Value>,

    /// Manager event bus
    #[serde(default)]
    pub events: EventBusConfig,
}

impl Default for PluginManagerConfig {
    fn default() -> Self {
        Self {
            auto_init: true,
            disabled_plugins: Vec::new(),
            plugin_configs: HashMap::new(),
            events: EventBusConfig::default(),
        }
    }
}

impl PluginManagerConfig {
    /// Parse a configuration from TOML.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| PluginError::ConfigError(e.to_string()))
    }

    /// Check if a plugin is disabled.
    pub fn is_plugin_disabled(&self, name: &str) -> bool {
        self.disabled_plugins.iter().any(|n| n == name)
    }

    /// Get configuration for a specific plugin.
    pub fn get_plugin_config(&self, name: &str) -> Option<&Value> {
        self.plugin_configs.get(name)
    }

    /// Set configuration for a specific plugin.
    pub fn set_plugin_config(&mut self, name: &str, config: Value) {
        self.plugin_configs.insert(name.to_string(), config);
    }

    /// Disable a plugin.
    pub fn disable_plugin(&mut self, name: &str) {
        if !self.is_plugin_disabled(name) {
            self.disabled_plugins.push(name.to_string());
        }
    }

    /// Enable a plugin.
    pub fn enable_plugin(&mut self, name: &str) {
        self.disabled_plugins.retain(|n| n != name);
    }
}

fn default_true() -> bool {
    true
}

/// Deep-merge `overlay` into `base`.
///
/// Objects merge key by key; any other overlay value replaces the base
/// value. A `null` overlay leaves `base` untouched.
pub fn merge_config(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => merge_config(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = PluginManagerConfig::default();
        assert!(config.auto_init);
        assert!(config.disabled_plugins.is_empty());
        assert!(config.events.enabled);
    }

    #[test]
    fn test_from_toml() {
        let config = PluginManagerConfig::from_toml_str(
            r#"
            auto_init = false
            disabled_plugins = ["analytics"]

            [plugin_configs.subtitles]
            language = "fr"
            style = { size = 20 }

            [events]
            max_listeners = 5
            "#,
        )
        .unwrap();

        assert!(!config.auto_init);
        assert!(config.is_plugin_disabled("analytics"));
        assert_eq!(
            config.get_plugin_config("subtitles"),
            Some(&json!({ "language": "fr", "style": { "size": 20 } }))
        );
        assert_eq!(config.events.max_listeners, 5);
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = PluginManagerConfig::from_toml_str("auto_init = \"sometimes\"");
        assert!(matches!(result, Err(PluginError::ConfigError(_))));
    }

    #[test]
    fn test_enable_disable_plugin() {
        let mut config = PluginManagerConfig::default();
        config.disable_plugin("pip");
        config.disable_plugin("pip");
        assert_eq!(config.disabled_plugins, vec!["pip"]);
        config.enable_plugin("pip");
        assert!(!config.is_plugin_disabled("pip"));
    }

    #[test]
    fn test_merge_config_deep() {
        let mut base = json!({ "style": { "size": 16, "color": "white" }, "enabled": true });
        merge_config(&mut base, &json!({ "style": { "size": 20 }, "language": "de" }));
        assert_eq!(
            base,
            json!({
                "style": { "size": 20, "color": "white" },
                "enabled": true,
                "language": "de"
            })
        );
    }

    #[test]
    fn test_merge_config_replaces_non_objects() {
        let mut base = json!({ "tracks": [1, 2] });
        merge_config(&mut base, &json!({ "tracks": [3] }));
        assert_eq!(base, json!({ "tracks": [3] }));

        merge_config(&mut base, &Value::Null);
        assert_eq!(base, json!({ "tracks": [3] }));
    }
}
