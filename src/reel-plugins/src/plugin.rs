//! Core plugin types and traits.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::PluginContext;
use crate::hooks::LifecycleHooks;

/// What a plugin contributes to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// Renders UI into a container
    #[default]
    Ui,
    /// Drives playback behavior without UI
    Behavior,
    /// Observes and reports
    Analytics,
    /// Anything else
    Other,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ui => write!(f, "ui"),
            Self::Behavior => write!(f, "behavior"),
            Self::Analytics => write!(f, "analytics"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Registration metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique plugin name
    pub name: String,

    /// Version string
    #[serde(default = "default_version")]
    pub version: String,

    /// Plugin kind
    #[serde(default)]
    pub kind: PluginKind,

    /// Ordering hint for sorters, higher first by convention
    #[serde(default)]
    pub priority: i32,

    /// Names of plugins this one requires
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl PluginMetadata {
    /// Metadata with every field defaulted.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            kind: PluginKind::default(),
            priority: 0,
            dependencies: Vec::new(),
            description: None,
            author: None,
        }
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Trait for plugin implementations.
///
/// The lifecycle itself is driven by [`ManagedPlugin`](crate::ManagedPlugin);
/// implementors only supply the work done at each step.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    /// Prepare resources. Runs once, before mounting.
    async fn on_init(&mut self, ctx: &mut PluginContext) -> anyhow::Result<()>;

    /// Render into `ctx.container`. Place the owned element in `ctx.element`.
    async fn on_mount(&mut self, ctx: &mut PluginContext) -> anyhow::Result<()>;

    /// Stop rendering.
    async fn on_unmount(&mut self, ctx: &mut PluginContext) -> anyhow::Result<()>;

    /// Release everything.
    async fn on_destroy(&mut self, ctx: &mut PluginContext) -> anyhow::Result<()>;

    /// Configuration the plugin starts from before any override is merged.
    fn default_config(&self) -> Value {
        Value::Object(serde_json::Map::new())
    }

    /// Optional lifecycle hooks.
    fn hooks(&self) -> LifecycleHooks {
        LifecycleHooks::default()
    }
}

/// Builds a fresh plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Plugin>> + Send + Sync>;
