//! Per-plugin lifecycle context.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use reel_events::{EventBus, EventScope};
use reel_host::{Container, ElementHandle, HostStateMachine, MediaHost};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::{LifecyclePhase, PluginHandle};
use crate::plugin::PluginMetadata;

/// Host resources shared with every plugin.
#[derive(Clone)]
pub struct HostLink {
    /// Bus carrying host events
    pub bus: Arc<EventBus<Value>>,
    /// Playback primitives
    pub host: Option<Arc<dyn MediaHost>>,
    /// Host state machine
    pub state: Option<Arc<HostStateMachine>>,
}

impl HostLink {
    /// Link to a bus with no host attached.
    pub fn new(bus: Arc<EventBus<Value>>) -> Self {
        Self {
            bus,
            host: None,
            state: None,
        }
    }

    /// Link with a private bus and no host.
    pub fn detached() -> Self {
        Self::new(Arc::new(EventBus::new()))
    }

    /// Link to a state machine, sharing its bus.
    pub fn from_state_machine(state: Arc<HostStateMachine>) -> Self {
        Self {
            bus: state.bus().clone(),
            host: None,
            state: Some(state),
        }
    }

    /// Attach playback primitives.
    pub fn with_host(mut self, host: Arc<dyn MediaHost>) -> Self {
        self.host = Some(host);
        self
    }
}

impl Default for HostLink {
    fn default() -> Self {
        Self::detached()
    }
}

impl fmt::Debug for HostLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLink")
            .field("host", &self.host.is_some())
            .field("state", &self.state.as_ref().map(|s| s.current()))
            .finish()
    }
}

/// Activity status, independent of the lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    /// Not initialized yet
    #[default]
    Inactive,
    /// Initialized and enabled
    Active,
    /// Switched off by the host
    Disabled,
}

/// Everything a plugin sees of the runtime.
///
/// Passed to every hook and every [`Plugin`](crate::Plugin) callback.
pub struct PluginContext {
    name: String,
    metadata: PluginMetadata,
    link: HostLink,
    events: EventScope<Value>,
    dependencies: IndexMap<String, PluginHandle>,
    pub(crate) phase: LifecyclePhase,
    pub(crate) activity: ActivityState,
    pub(crate) visible: bool,
    pub(crate) ready: bool,

    /// Resolved configuration
    pub config: Value,
    /// Container the plugin is mounted into
    pub container: Option<Container>,
    /// Element the plugin owns inside its container
    pub element: Option<ElementHandle>,
}

impl PluginContext {
    pub(crate) fn new(metadata: PluginMetadata, config: Value, link: HostLink) -> Self {
        let name = metadata.name.clone();
        let events = EventScope::new(name.clone(), link.bus.clone());
        Self {
            name,
            metadata,
            link,
            events,
            dependencies: IndexMap::new(),
            phase: LifecyclePhase::Created,
            activity: ActivityState::Inactive,
            visible: true,
            ready: false,
            config,
            container: None,
            element: None,
        }
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registration metadata.
    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Activity status.
    pub fn activity(&self) -> ActivityState {
        self.activity
    }

    /// Whether the plugin is initialized and not disabled.
    pub fn is_enabled(&self) -> bool {
        self.activity == ActivityState::Active
    }

    /// Whether the plugin is shown.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether initialization completed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Playback primitives, when a host is attached.
    pub fn host(&self) -> Option<&Arc<dyn MediaHost>> {
        self.link.host.as_ref()
    }

    /// Host state machine, when attached.
    pub fn host_state(&self) -> Option<&Arc<HostStateMachine>> {
        self.link.state.as_ref()
    }

    /// Host event scope.
    ///
    /// Listeners installed here are released when the plugin is destroyed.
    pub fn events(&self) -> &EventScope<Value> {
        &self.events
    }

    /// Read a typed configuration value by top-level key.
    pub fn config_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// A wired dependency.
    pub fn dependency(&self, name: &str) -> Option<&PluginHandle> {
        self.dependencies.get(name)
    }

    /// Names of wired dependencies, in wiring order.
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies.keys().cloned().collect()
    }

    pub(crate) fn dependencies_mut(&mut self) -> &mut IndexMap<String, PluginHandle> {
        &mut self.dependencies
    }

    pub(crate) fn link(&self) -> &HostLink {
        &self.link
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("activity", &self.activity)
            .field("visible", &self.visible)
            .field("ready", &self.ready)
            .field("dependencies", &self.dependencies.keys().collect::<Vec<_>>())
            .finish()
    }
}
