//! Scoped access to a shared bus.
//!
//! An [`EventScope`] records every listener installed through it so the owner
//! can release all of them at once, independently of listeners other parties
//! registered on the same bus.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::EventBus;
use crate::listener::Listener;

/// Listener bookkeeping for one owner of a shared bus.
pub struct EventScope<E = serde_json::Value> {
    owner: String,
    bus: Arc<EventBus<E>>,
    installed: Mutex<Vec<(String, Listener<E>)>>,
}

impl<E> EventScope<E> {
    /// Create a scope over `bus` on behalf of `owner`.
    pub fn new(owner: impl Into<String>, bus: Arc<EventBus<E>>) -> Self {
        Self {
            owner: owner.into(),
            bus,
            installed: Mutex::new(Vec::new()),
        }
    }

    /// Name of the owner this scope tracks listeners for.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The underlying shared bus.
    pub fn bus(&self) -> &Arc<EventBus<E>> {
        &self.bus
    }

    /// Register a durable listener and track it.
    pub fn on(&self, event: &str, listener: &Listener<E>) {
        self.bus.on(event, listener);
        self.track(event, listener);
    }

    /// Register a one-shot listener and track it.
    pub fn once(&self, event: &str, listener: &Listener<E>) {
        self.bus.once(event, listener);
        self.track(event, listener);
    }

    /// Remove a listener previously installed through this scope.
    pub fn off(&self, event: &str, listener: &Listener<E>) {
        self.bus.off(event, Some(listener));
        self.installed
            .lock()
            .retain(|(name, l)| !(name == event && l == listener));
    }

    /// Publish on the shared bus.
    pub fn emit(&self, event: &str, data: E) -> usize {
        self.bus.emit(event, data)
    }

    /// Number of listeners currently tracked by this scope.
    pub fn tracked(&self) -> usize {
        self.installed.lock().len()
    }

    /// Deregister every listener installed through this scope.
    pub fn release(&self) -> usize {
        let installed = std::mem::take(&mut *self.installed.lock());
        for (event, listener) in &installed {
            self.bus.off(event, Some(listener));
        }
        if !installed.is_empty() {
            tracing::debug!(owner = %self.owner, count = installed.len(), "Released scoped listeners");
        }
        installed.len()
    }

    fn track(&self, event: &str, listener: &Listener<E>) {
        let mut installed = self.installed.lock();
        if !installed.iter().any(|(name, l)| name == event && l == listener) {
            installed.push((event.to_string(), listener.clone()));
        }
    }
}
