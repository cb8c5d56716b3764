//! Plugin manager - the main interface for the plugin runtime.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use serde_json::Value;

use reel_events::{EventBus, Listener};
use reel_host::Container;

use crate::config::{PluginManagerConfig, merge_config};
use crate::context::HostLink;
use crate::events::PluginEvent;
use crate::lifecycle::{ManagedPlugin, PluginHandle};
use crate::plugin::{Plugin, PluginFactory, PluginKind, PluginMetadata};
use crate::resolver;
use crate::{PluginError, Result};

/// Registration validator. `Err` carries the rejection reason.
pub type PluginValidator =
    dyn Fn(&str, &PluginMetadata) -> std::result::Result<(), String> + Send + Sync;

/// Creation middleware, run in installation order before initialization.
///
/// Returning without calling [`MiddlewareNext::run`] skips the rest of the
/// chain; creation itself still proceeds.
pub type PluginMiddleware = dyn for<'a> Fn(&'a str, &mut ManagedPlugin, MiddlewareNext<'a>) -> anyhow::Result<()>
    + Send
    + Sync;

/// Continuation handed to each creation middleware.
pub struct MiddlewareNext<'a> {
    name: &'a str,
    chain: &'a [Arc<PluginMiddleware>],
}

impl<'a> MiddlewareNext<'a> {
    fn new(name: &'a str, chain: &'a [Arc<PluginMiddleware>]) -> Self {
        Self { name, chain }
    }

    /// Name of the plugin being created.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Run the rest of the chain over `plugin`.
    pub fn run(self, plugin: &mut ManagedPlugin) -> anyhow::Result<()> {
        match self.chain.split_first() {
            Some((middleware, rest)) => middleware(self.name, plugin, Self::new(self.name, rest)),
            None => Ok(()),
        }
    }
}

/// Selects the instances bulk operations act on.
pub type PluginFilter = dyn Fn(&PluginMetadata) -> bool + Send + Sync;

/// Orders instances for listing and bulk operations.
pub type PluginSorter = dyn Fn(&PluginMetadata, &PluginMetadata) -> Ordering + Send + Sync;

/// Per-plugin outcome of a bulk operation.
pub type BatchResult = Vec<(String, Result<()>)>;

/// Caller-supplied registration details.
///
/// Anything left unset falls back to the [`PluginMetadata`] defaults.
#[derive(Debug, Clone, Default)]
pub struct RegisterOptions {
    version: Option<String>,
    kind: Option<PluginKind>,
    priority: Option<i32>,
    dependencies: Vec<String>,
    description: Option<String>,
    author: Option<String>,
    config: Value,
}

impl RegisterOptions {
    /// Options with every field defaulted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the plugin kind.
    pub fn kind(mut self, kind: PluginKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Set the ordering priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Declare dependencies.
    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Registration-level configuration.
    pub fn config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    fn into_parts(self, name: &str) -> (PluginMetadata, Value) {
        let defaults = PluginMetadata::new(name);
        let metadata = PluginMetadata {
            name: name.to_string(),
            version: self.version.unwrap_or(defaults.version),
            kind: self.kind.unwrap_or(defaults.kind),
            priority: self.priority.unwrap_or(defaults.priority),
            dependencies: self.dependencies,
            description: self.description,
            author: self.author,
        };
        (metadata, self.config)
    }
}

struct Registration {
    factory: PluginFactory,
    metadata: PluginMetadata,
    config: Value,
}

struct InstanceRecord {
    handle: PluginHandle,
    metadata: PluginMetadata,
    config: Value,
    /// Resolved dependency closure, dependencies first
    dependencies: Vec<String>,
    dependents: IndexSet<String>,
}

/// Plugin manager - the main entry point for the plugin runtime.
///
/// The manager handles:
/// - Plugin registration and validation
/// - Instantiation with dependency resolution and wiring
/// - Bulk lifecycle (mount, unmount, enable, disable)
/// - Registry-level events on a private bus
pub struct PluginManager {
    /// Configuration
    config: PluginManagerConfig,

    /// Host resources handed to every plugin
    link: HostLink,

    /// Registrations by name, in registration order
    registrations: RwLock<IndexMap<String, Registration>>,

    /// Live instances by name, in creation order
    instances: RwLock<IndexMap<String, InstanceRecord>>,

    validators: RwLock<Vec<Arc<PluginValidator>>>,
    middlewares: RwLock<Vec<Arc<PluginMiddleware>>>,
    filter: RwLock<Option<Arc<PluginFilter>>>,
    sorter: RwLock<Option<Arc<PluginSorter>>>,

    /// Registry-level event bus
    events: EventBus<PluginEvent>,
}

impl PluginManager {
    /// Create a manager with no host attached.
    pub fn new(config: PluginManagerConfig) -> Self {
        Self::with_host(config, HostLink::detached())
    }

    /// Create a manager whose plugins see `link`.
    pub fn with_host(config: PluginManagerConfig, link: HostLink) -> Self {
        let events = EventBus::with_config(config.events.clone());
        Self {
            config,
            link,
            registrations: RwLock::new(IndexMap::new()),
            instances: RwLock::new(IndexMap::new()),
            validators: RwLock::new(Vec::new()),
            middlewares: RwLock::new(Vec::new()),
            filter: RwLock::new(None),
            sorter: RwLock::new(None),
            events,
        }
    }

    /// Get configuration.
    pub fn config(&self) -> &PluginManagerConfig {
        &self.config
    }

    /// Host resources shared with plugins.
    pub fn host(&self) -> &HostLink {
        &self.link
    }

    // ========== Registration ==========

    /// Register a plugin factory under `name`. Does not instantiate.
    pub fn register<F>(&self, name: &str, factory: F, options: RegisterOptions) -> Result<()>
    where
        F: Fn() -> anyhow::Result<Box<dyn Plugin>> + Send + Sync + 'static,
    {
        if self.is_registered(name) {
            return Err(PluginError::AlreadyRegistered(name.to_string()));
        }

        let (metadata, config) = options.into_parts(name);
        let validators = self.validators.read().clone();
        for validator in &validators {
            validator(name, &metadata).map_err(|reason| PluginError::validation(name, reason))?;
        }

        {
            let mut registrations = self.registrations.write();
            if registrations.contains_key(name) {
                return Err(PluginError::AlreadyRegistered(name.to_string()));
            }
            tracing::info!(plugin = %name, version = %metadata.version, "Registered plugin");
            registrations.insert(
                name.to_string(),
                Registration {
                    factory: Arc::new(factory),
                    metadata,
                    config,
                },
            );
        }

        self.notify(PluginEvent::Registered {
            plugin: name.to_string(),
        });
        Ok(())
    }

    /// Remove a registration, destroying its live instance first.
    pub async fn unregister(&self, name: &str) -> Result<()> {
        if !self.is_registered(name) {
            return Err(PluginError::NotRegistered(name.to_string()));
        }

        if let Err(e) = self.destroy(name).await {
            tracing::warn!(plugin = %name, error = %e, "Instance teardown failed during unregister");
        }

        self.registrations.write().shift_remove(name);
        tracing::info!(plugin = %name, "Unregistered plugin");
        self.notify(PluginEvent::Unregistered {
            plugin: name.to_string(),
        });
        Ok(())
    }

    // ========== Instances ==========

    /// Instantiate a registered plugin.
    ///
    /// Every dependency must already have a live instance. `overrides` is
    /// merged last over the plugin defaults, the registration config and
    /// the manager's per-plugin config.
    pub async fn create(&self, name: &str, overrides: Option<Value>) -> Result<PluginHandle> {
        match self.instantiate(name, overrides).await {
            Ok(handle) => {
                tracing::info!(plugin = %name, "Plugin ready");
                self.notify(PluginEvent::Ready {
                    plugin: name.to_string(),
                });
                Ok(handle)
            }
            Err(e) => {
                self.report(name, "create", &e);
                Err(e)
            }
        }
    }

    async fn instantiate(&self, name: &str, overrides: Option<Value>) -> Result<PluginHandle> {
        let (factory, metadata, registration_config) = self
            .registrations
            .read()
            .get(name)
            .map(|r| (r.factory.clone(), r.metadata.clone(), r.config.clone()))
            .ok_or_else(|| PluginError::NotRegistered(name.to_string()))?;

        if self.has(name) {
            return Err(PluginError::AlreadyInstantiated(name.to_string()));
        }

        let dependencies = self.resolve_dependencies(name)?;
        let wired: Vec<(String, PluginHandle)> = {
            let instances = self.instances.read();
            dependencies
                .iter()
                .map(|dep| {
                    instances
                        .get(dep)
                        .map(|r| (dep.clone(), r.handle.clone()))
                        .ok_or_else(|| PluginError::missing_dependency(name, dep))
                })
                .collect::<Result<_>>()?
        };

        let plugin = factory().map_err(|e| PluginError::construction_error(name, e.to_string()))?;

        let mut config = plugin.default_config();
        merge_config(&mut config, &registration_config);
        if let Some(manager_config) = self.config.get_plugin_config(name) {
            merge_config(&mut config, manager_config);
        }
        if let Some(overrides) = &overrides {
            merge_config(&mut config, overrides);
        }

        let mut managed =
            ManagedPlugin::create(plugin, metadata.clone(), config.clone(), self.link.clone())?;
        for (dep, handle) in wired {
            managed.add_dependency(dep, handle);
        }

        if let Err(e) = self.prepare(name, &mut managed).await {
            managed.discard();
            return Err(e);
        }

        let handle = PluginHandle::new(managed);
        {
            let mut instances = self.instances.write();
            if instances.contains_key(name) {
                return Err(PluginError::AlreadyInstantiated(name.to_string()));
            }
            for dep in &dependencies {
                if let Some(record) = instances.get_mut(dep) {
                    record.dependents.insert(name.to_string());
                }
            }
            // Live plugins that declared this one survive a destroy/create cycle.
            let dependents: IndexSet<String> = instances
                .iter()
                .filter(|(_, record)| record.dependencies.iter().any(|d| d == name))
                .map(|(other, _)| other.clone())
                .collect();
            instances.insert(
                name.to_string(),
                InstanceRecord {
                    handle: handle.clone(),
                    metadata,
                    config,
                    dependencies,
                    dependents,
                },
            );
        }

        Ok(handle)
    }

    /// Middleware chain, initialization and the disabled list.
    async fn prepare(&self, name: &str, managed: &mut ManagedPlugin) -> Result<()> {
        let middlewares = self.middlewares.read().clone();
        MiddlewareNext::new(name, &middlewares)
            .run(managed)
            .map_err(|e| PluginError::middleware_error(name, e.to_string()))?;

        if self.config.auto_init {
            managed.init().await?;
        }

        if self.config.is_plugin_disabled(name) {
            tracing::debug!(plugin = %name, "Plugin disabled by configuration");
            managed.disable();
        }
        Ok(())
    }

    /// Destroy a live instance. A no-op if there is none.
    ///
    /// Destroying a plugin others still depend on is allowed; it logs and
    /// emits a `warning`, and dependents keep their reference to the
    /// destroyed instance. Recreating the plugin does not rewire them.
    ///
    /// The record is dropped even when teardown fails. A failed teardown
    /// emits `error` instead of `destroy`.
    pub async fn destroy(&self, name: &str) -> Result<()> {
        let record = self
            .instances
            .read()
            .get(name)
            .map(|r| (r.handle.clone(), r.dependencies.clone()));
        let Some((handle, dependencies)) = record else {
            return Ok(());
        };

        let dependents: Vec<String> = {
            let mut instances = self.instances.write();
            for dep in &dependencies {
                if let Some(record) = instances.get_mut(dep) {
                    record.dependents.shift_remove(name);
                }
            }
            instances
                .get(name)
                .map(|r| {
                    r.dependents
                        .iter()
                        .filter(|d| instances.contains_key(*d))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        if !dependents.is_empty() {
            let message = format!("still required by {}", dependents.join(", "));
            tracing::warn!(plugin = %name, dependents = ?dependents, "Destroying plugin with live dependents");
            self.notify(PluginEvent::Warning {
                plugin: name.to_string(),
                message,
                dependents,
            });
        }

        let result = handle.write().await.destroy().await;
        self.instances.write().shift_remove(name);

        match &result {
            Ok(()) => self.notify(PluginEvent::Destroyed {
                plugin: name.to_string(),
            }),
            Err(e) => self.report(name, "destroy", e),
        }
        result
    }

    // ========== Queries ==========

    /// Get a live instance.
    pub fn get(&self, name: &str) -> Option<PluginHandle> {
        self.instances.read().get(name).map(|r| r.handle.clone())
    }

    /// Check if a live instance exists.
    pub fn has(&self, name: &str) -> bool {
        self.instances.read().contains_key(name)
    }

    /// Check if a plugin is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.registrations.read().contains_key(name)
    }

    /// Live instances, ordered by the sorter or by creation.
    pub fn list(&self) -> Vec<PluginHandle> {
        self.ordered(false)
    }

    /// Registered names, in registration order.
    pub fn registered_names(&self) -> Vec<String> {
        self.registrations.read().keys().cloned().collect()
    }

    /// Registration metadata.
    pub fn metadata(&self, name: &str) -> Option<PluginMetadata> {
        self.registrations
            .read()
            .get(name)
            .map(|r| r.metadata.clone())
    }

    /// Resolved configuration of a live instance.
    pub fn resolved_config(&self, name: &str) -> Option<Value> {
        self.instances.read().get(name).map(|r| r.config.clone())
    }

    /// Live plugins wired to `name` as a dependency.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        self.instances
            .read()
            .get(name)
            .map(|r| r.dependents.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live instances.
    pub fn count(&self) -> usize {
        self.instances.read().len()
    }

    // ========== Activation ==========

    /// Enable a live instance.
    pub async fn enable(&self, name: &str) -> Result<()> {
        let handle = self
            .get(name)
            .ok_or_else(|| PluginError::NotInstantiated(name.to_string()))?;
        handle.write().await.enable();
        Ok(())
    }

    /// Disable a live instance.
    pub async fn disable(&self, name: &str) -> Result<()> {
        let handle = self
            .get(name)
            .ok_or_else(|| PluginError::NotInstantiated(name.to_string()))?;
        handle.write().await.disable();
        Ok(())
    }

    /// Enable every live instance.
    pub async fn enable_all(&self) {
        for handle in self.list() {
            handle.write().await.enable();
        }
    }

    /// Disable every live instance.
    pub async fn disable_all(&self) {
        for handle in self.list() {
            handle.write().await.disable();
        }
    }

    // ========== Bulk lifecycle ==========

    /// Mount the filtered, sorted instances.
    ///
    /// A failure is logged and reported; the batch continues.
    pub async fn mount_all(&self, container: Option<Container>) -> BatchResult {
        let mut results = Vec::new();
        for handle in self.ordered(true) {
            let result = handle.write().await.mount(container.clone()).await;
            if let Err(e) = &result {
                self.report(handle.name(), "mount", e);
            }
            results.push((handle.name().to_string(), result));
        }
        results
    }

    /// Unmount the filtered, sorted instances in reverse mount order.
    pub async fn unmount_all(&self) -> BatchResult {
        let mut results = Vec::new();
        for handle in self.ordered(true).into_iter().rev() {
            let result = handle.write().await.unmount().await;
            if let Err(e) = &result {
                self.report(handle.name(), "unmount", e);
            }
            results.push((handle.name().to_string(), result));
        }
        results
    }

    // ========== Dependencies ==========

    /// Transitive dependencies of `name`, dependencies first.
    pub fn resolve_dependencies(&self, name: &str) -> Result<Vec<String>> {
        let registrations = self.registrations.read();
        resolver::resolve(name, |n| {
            registrations.get(n).map(|r| r.metadata.dependencies.clone())
        })
    }

    /// Whether every resolved dependency of `name` has a live instance.
    pub fn check_dependencies(&self, name: &str) -> bool {
        match self.resolve_dependencies(name) {
            Ok(dependencies) => {
                let instances = self.instances.read();
                dependencies.iter().all(|d| instances.contains_key(d))
            }
            Err(_) => false,
        }
    }

    // ========== Extension points ==========

    /// Add a registration validator.
    pub fn add_validator<F>(&self, validator: F)
    where
        F: Fn(&str, &PluginMetadata) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validators.write().push(Arc::new(validator));
    }

    /// Add a creation middleware.
    pub fn add_middleware<F>(&self, middleware: F)
    where
        F: for<'a> Fn(&'a str, &mut ManagedPlugin, MiddlewareNext<'a>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.middlewares.write().push(Arc::new(middleware));
    }

    /// Install the bulk-operation filter, replacing any previous one.
    pub fn set_filter<F>(&self, filter: F)
    where
        F: Fn(&PluginMetadata) -> bool + Send + Sync + 'static,
    {
        *self.filter.write() = Some(Arc::new(filter));
    }

    /// Install the sorter, replacing any previous one.
    pub fn set_sorter<F>(&self, sorter: F)
    where
        F: Fn(&PluginMetadata, &PluginMetadata) -> Ordering + Send + Sync + 'static,
    {
        *self.sorter.write() = Some(Arc::new(sorter));
    }

    /// Destroy every instance and drop every registration and extension.
    pub async fn clear(&self) {
        let names: Vec<String> = self.instances.read().keys().rev().cloned().collect();
        for name in names {
            if let Err(e) = self.destroy(&name).await {
                tracing::error!(plugin = %name, error = %e, "Failed to destroy plugin during clear");
            }
        }

        self.registrations.write().clear();
        self.validators.write().clear();
        self.middlewares.write().clear();
        *self.filter.write() = None;
        *self.sorter.write() = None;
        self.events.reset();
        tracing::info!("Plugin manager cleared");
    }

    // ========== Events ==========

    /// Subscribe to a manager event.
    pub fn on(&self, event: &str, listener: &Listener<PluginEvent>) {
        self.events.on(event, listener);
    }

    /// Subscribe to the next occurrence of a manager event.
    pub fn once(&self, event: &str, listener: &Listener<PluginEvent>) {
        self.events.once(event, listener);
    }

    /// Unsubscribe one listener, or every listener when `None`.
    pub fn off(&self, event: &str, listener: Option<&Listener<PluginEvent>>) {
        self.events.off(event, listener);
    }

    /// Publish on the manager bus.
    pub fn emit(&self, event: &str, data: PluginEvent) -> usize {
        self.events.emit(event, data)
    }

    /// Get the manager bus.
    pub fn events(&self) -> &EventBus<PluginEvent> {
        &self.events
    }

    // ========== Internals ==========

    fn notify(&self, event: PluginEvent) {
        let name = event.name().to_string();
        self.events.emit(&name, event);
    }

    fn report(&self, name: &str, operation: &str, err: &PluginError) {
        tracing::error!(plugin = %name, operation = %operation, error = %err, "Plugin operation failed");
        self.notify(PluginEvent::Error {
            plugin: name.to_string(),
            message: err.to_string(),
        });
    }

    fn ordered(&self, apply_filter: bool) -> Vec<PluginHandle> {
        let mut entries: Vec<(PluginMetadata, PluginHandle)> = self
            .instances
            .read()
            .values()
            .map(|r| (r.metadata.clone(), r.handle.clone()))
            .collect();

        let filter = self.filter.read().clone();
        if let (true, Some(filter)) = (apply_filter, filter) {
            entries.retain(|(metadata, _)| filter(metadata));
        }
        let sorter = self.sorter.read().clone();
        if let Some(sorter) = sorter {
            entries.sort_by(|a, b| sorter(&a.0, &b.0));
        }

        entries.into_iter().map(|(_, handle)| handle).collect()
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new(PluginManagerConfig::default())
    }
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("registered", &self.registered_names())
            .field("instances", &self.instances.read().keys().collect::<Vec<_>>())
            .finish()
    }
}
