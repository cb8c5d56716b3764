//! Plugin lifecycle driver.
//!
//! [`ManagedPlugin`] owns one [`Plugin`] and walks it through the linear
//! phase sequence:
//!
//! ```text
//! created -> initializing -> initialized -> mounting -> mounted
//!         -> unmounting -> unmounted -> destroyed
//! ```
//!
//! Any failure while a transition is in flight forces the `error` phase,
//! unless the plugin's `error_captured` hook marks it handled.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use reel_host::Container;

use crate::context::{ActivityState, HostLink, PluginContext};
use crate::hooks::{HookPoint, LifecycleHooks};
use crate::plugin::{Plugin, PluginMetadata};
use crate::{PluginError, Result};

/// Lifecycle phase of one plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    #[default]
    Created,
    Initializing,
    Initialized,
    Mounting,
    Mounted,
    Unmounting,
    Unmounted,
    Destroyed,
    /// Unusable until destroyed
    Error,
}

impl LifecyclePhase {
    /// Whether a transition is in flight or complete and not yet torn down.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Created | Self::Destroyed | Self::Error)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initializing => write!(f, "initializing"),
            Self::Initialized => write!(f, "initialized"),
            Self::Mounting => write!(f, "mounting"),
            Self::Mounted => write!(f, "mounted"),
            Self::Unmounting => write!(f, "unmounting"),
            Self::Unmounted => write!(f, "unmounted"),
            Self::Destroyed => write!(f, "destroyed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A plugin together with its context and hooks.
pub struct ManagedPlugin {
    name: String,
    plugin: Box<dyn Plugin>,
    hooks: LifecycleHooks,
    context: PluginContext,
}

impl ManagedPlugin {
    /// Wrap a freshly built plugin.
    ///
    /// Runs `before_create` and `created`; the instance starts in
    /// [`LifecyclePhase::Created`].
    pub fn create(
        plugin: Box<dyn Plugin>,
        metadata: PluginMetadata,
        config: Value,
        link: HostLink,
    ) -> Result<Self> {
        let hooks = plugin.hooks();
        let name = metadata.name.clone();
        let context = PluginContext::new(metadata, config, link);
        let mut managed = Self {
            name,
            plugin,
            hooks,
            context,
        };

        let outcome = managed
            .run_hook(HookPoint::BeforeCreate)
            .and_then(|()| managed.run_hook(HookPoint::Created));
        if let Err(e) = outcome {
            managed.discard();
            return Err(e);
        }

        tracing::debug!(plugin = %managed.name, "Plugin created");
        Ok(managed)
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current phase.
    pub fn phase(&self) -> LifecyclePhase {
        self.context.phase
    }

    /// Plugin context.
    pub fn context(&self) -> &PluginContext {
        &self.context
    }

    /// Mutable plugin context.
    pub fn context_mut(&mut self) -> &mut PluginContext {
        &mut self.context
    }

    /// Whether the plugin is initialized and not disabled.
    pub fn is_enabled(&self) -> bool {
        self.context.is_enabled()
    }

    /// Whether the plugin is shown.
    pub fn is_visible(&self) -> bool {
        self.context.visible
    }

    /// Whether initialization completed.
    pub fn is_ready(&self) -> bool {
        self.context.ready
    }

    // ========== Lifecycle ==========

    /// Initialize the plugin. Legal only from `created`.
    pub async fn init(&mut self) -> Result<()> {
        self.require(LifecyclePhase::Created, "init")?;
        let outcome = self.run_init().await;
        self.settle(outcome)
    }

    async fn run_init(&mut self) -> Result<()> {
        self.enter(LifecyclePhase::Initializing);
        self.run_hook(HookPoint::BeforeInit)?;
        let work = self.plugin.on_init(&mut self.context).await;
        self.contain("init", work)?;
        self.enter(LifecyclePhase::Initialized);
        self.run_hook(HookPoint::Initialized)?;
        self.context.ready = true;
        if self.context.activity != ActivityState::Disabled {
            self.context.activity = ActivityState::Active;
        }
        tracing::info!(plugin = %self.name, "Plugin initialized");
        Ok(())
    }

    /// Mount the plugin. Legal only from `initialized`.
    ///
    /// Without an explicit container the previously recorded one is reused,
    /// falling back to the host's root container.
    pub async fn mount(&mut self, container: Option<Container>) -> Result<()> {
        self.require(LifecyclePhase::Initialized, "mount")?;
        if let Some(container) = container {
            self.context.container = Some(container);
        } else if self.context.container.is_none() {
            self.context.container = self.context.link().host.as_ref().and_then(|h| h.container());
        }
        let outcome = self.run_mount().await;
        self.settle(outcome)
    }

    async fn run_mount(&mut self) -> Result<()> {
        self.enter(LifecyclePhase::Mounting);
        self.run_hook(HookPoint::BeforeMount)?;
        let work = self.plugin.on_mount(&mut self.context).await;
        self.contain("mount", work)?;
        self.enter(LifecyclePhase::Mounted);
        if let (Some(container), Some(element)) = (&self.context.container, &self.context.element) {
            container.attach(element);
        }
        self.run_hook(HookPoint::Mounted)?;
        tracing::info!(plugin = %self.name, "Plugin mounted");
        Ok(())
    }

    /// Unmount the plugin. A no-op unless mounted.
    pub async fn unmount(&mut self) -> Result<()> {
        if self.context.phase != LifecyclePhase::Mounted {
            tracing::debug!(plugin = %self.name, phase = %self.context.phase, "Unmount skipped");
            return Ok(());
        }
        let outcome = self.run_unmount().await;
        self.settle(outcome)
    }

    async fn run_unmount(&mut self) -> Result<()> {
        self.enter(LifecyclePhase::Unmounting);
        self.run_hook(HookPoint::BeforeUnmount)?;
        let work = self.plugin.on_unmount(&mut self.context).await;
        self.contain("unmount", work)?;
        self.enter(LifecyclePhase::Unmounted);
        self.run_hook(HookPoint::Unmounted)?;
        tracing::info!(plugin = %self.name, "Plugin unmounted");
        Ok(())
    }

    /// Tear the plugin down. Idempotent.
    ///
    /// Listeners, dependency references and the owned element are released
    /// even when teardown fails; the error is still returned and the phase
    /// is forced to `error`.
    pub async fn destroy(&mut self) -> Result<()> {
        if self.context.phase == LifecyclePhase::Destroyed {
            return Ok(());
        }
        let outcome = self.run_destroy().await;
        if outcome.is_err() {
            self.discard();
            self.context.ready = false;
        }
        self.settle(outcome)
    }

    async fn run_destroy(&mut self) -> Result<()> {
        self.run_hook(HookPoint::BeforeDestroy)?;
        if self.context.phase == LifecyclePhase::Mounted {
            self.run_unmount().await?;
        }
        let work = self.plugin.on_destroy(&mut self.context).await;
        self.contain("destroy", work)?;
        self.discard();
        self.context.ready = false;
        self.enter(LifecyclePhase::Destroyed);
        self.run_hook(HookPoint::Destroyed)?;
        tracing::info!(plugin = %self.name, "Plugin destroyed");
        Ok(())
    }

    /// Release listeners, dependency references and the owned element.
    pub(crate) fn discard(&mut self) {
        let released = self.context.events().release();
        if released > 0 {
            tracing::debug!(plugin = %self.name, released, "Released plugin listeners");
        }
        self.context.dependencies_mut().clear();
        if let Some(element) = self.context.element.take() {
            if let Some(container) = &self.context.container {
                container.detach(&element);
            }
        }
    }

    // ========== Flags ==========

    /// Mark the plugin active. Has no effect before initialization.
    pub fn enable(&mut self) {
        if self.context.ready {
            self.context.activity = ActivityState::Active;
        } else if self.context.activity == ActivityState::Disabled {
            self.context.activity = ActivityState::Inactive;
        }
    }

    /// Mark the plugin disabled.
    pub fn disable(&mut self) {
        self.context.activity = ActivityState::Disabled;
    }

    /// Show the plugin.
    pub fn show(&mut self) {
        self.context.visible = true;
    }

    /// Hide the plugin.
    pub fn hide(&mut self) {
        self.context.visible = false;
    }

    /// Flip visibility. Returns the new value.
    pub fn toggle(&mut self) -> bool {
        self.context.visible = !self.context.visible;
        self.context.visible
    }

    // ========== Dependencies ==========

    /// Wire a dependency instance.
    pub fn add_dependency(&mut self, name: impl Into<String>, handle: PluginHandle) {
        self.context.dependencies_mut().insert(name.into(), handle);
    }

    /// A wired dependency.
    pub fn dependency(&self, name: &str) -> Option<&PluginHandle> {
        self.context.dependency(name)
    }

    /// Drop a wired dependency.
    pub fn remove_dependency(&mut self, name: &str) -> Option<PluginHandle> {
        self.context.dependencies_mut().shift_remove(name)
    }

    // ========== Internals ==========

    fn require(&self, expected: LifecyclePhase, operation: &str) -> Result<()> {
        if self.context.phase != expected {
            return Err(PluginError::invalid_phase(
                &self.name,
                operation,
                self.context.phase,
            ));
        }
        Ok(())
    }

    fn enter(&mut self, phase: LifecyclePhase) {
        tracing::debug!(plugin = %self.name, from = %self.context.phase, to = %phase, "Lifecycle phase");
        self.context.phase = phase;
    }

    fn settle(&mut self, outcome: Result<()>) -> Result<()> {
        if let Err(e) = &outcome {
            tracing::error!(plugin = %self.name, error = %e, "Lifecycle transition failed");
            self.context.phase = LifecyclePhase::Error;
        }
        outcome
    }

    fn run_hook(&mut self, point: HookPoint) -> Result<()> {
        let Some(hook) = self.hooks.get(point) else {
            return Ok(());
        };
        match hook(&mut self.context) {
            Ok(()) => Ok(()),
            Err(e) => self.capture(PluginError::hook_error(&self.name, point, e.to_string())),
        }
    }

    fn contain(&mut self, operation: &str, work: anyhow::Result<()>) -> Result<()> {
        match work {
            Ok(()) => Ok(()),
            Err(e) => self.capture(PluginError::lifecycle_error(
                &self.name,
                operation,
                e.to_string(),
            )),
        }
    }

    fn capture(&mut self, err: PluginError) -> Result<()> {
        if let Some(handler) = self.hooks.error_captured.clone() {
            if handler(&mut self.context, &err) {
                tracing::warn!(plugin = %self.name, error = %err, "Lifecycle error handled by plugin");
                return Ok(());
            }
        }
        Err(err)
    }
}

impl fmt::Debug for ManagedPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedPlugin")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Shared handle to a live plugin.
#[derive(Clone)]
pub struct PluginHandle {
    name: Arc<str>,
    inner: Arc<tokio::sync::RwLock<ManagedPlugin>>,
}

impl PluginHandle {
    /// Create a new plugin handle.
    pub fn new(plugin: ManagedPlugin) -> Self {
        Self {
            name: Arc::from(plugin.name()),
            inner: Arc::new(tokio::sync::RwLock::new(plugin)),
        }
    }

    /// Plugin name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get read access to the plugin.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, ManagedPlugin> {
        self.inner.read().await
    }

    /// Get write access to the plugin.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, ManagedPlugin> {
        self.inner.write().await
    }

    /// Get the current phase.
    pub async fn phase(&self) -> LifecyclePhase {
        self.inner.read().await.phase()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PluginHandle").field(&self.name).finish()
    }
}
