//! Event bus for publishing and subscribing to named events.
//!
//! Every `emit` runs the pipeline once (filter, middleware chain, transformer)
//! and then delivers synchronously to the listeners that were registered when
//! `emit` was called. Listener failures are logged and never reach the emitter.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EventBusConfig;
use crate::listener::Listener;
use crate::pipeline::{FilterFn, MiddlewareFn, Next, TransformFn};

/// Emit and listener counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    /// Number of emits that passed the filter
    pub total_emits: u64,
    /// Emits per event name
    pub event_counts: HashMap<String, u64>,
    /// Current listeners per event name
    pub listener_counts: HashMap<String, usize>,
}

/// Installed delivery entry for one listener handle.
struct Registration<E> {
    listener: Listener<E>,
    once: bool,
    consumed: Arc<AtomicBool>,
}

impl<E> Clone for Registration<E> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            once: self.once,
            consumed: Arc::clone(&self.consumed),
        }
    }
}

struct BusState<E> {
    enabled: bool,
    /// event name -> (handle id -> registration)
    registrations: HashMap<String, IndexMap<Uuid, Registration<E>>>,
    middlewares: Vec<Arc<MiddlewareFn<E>>>,
    filter: Option<Arc<FilterFn<E>>>,
    transform: Option<Arc<TransformFn<E>>>,
    total_emits: u64,
    event_counts: HashMap<String, u64>,
}

impl<E> BusState<E> {
    fn new(enabled: bool) -> Self {
        Self {
            enabled,
            registrations: HashMap::new(),
            middlewares: Vec::new(),
            filter: None,
            transform: None,
            total_emits: 0,
            event_counts: HashMap::new(),
        }
    }
}

/// Event bus for publishing and subscribing to events.
pub struct EventBus<E = serde_json::Value> {
    config: EventBusConfig,
    state: Mutex<BusState<E>>,
}

impl<E> EventBus<E> {
    /// Create a new event bus.
    pub fn new() -> Self {
        Self::with_config(EventBusConfig::default())
    }

    /// Create an event bus with explicit configuration.
    pub fn with_config(config: EventBusConfig) -> Self {
        let state = Mutex::new(BusState::new(config.enabled));
        Self { config, state }
    }

    /// Get the configuration.
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    // ========== Registration ==========

    /// Register a durable listener. Registering the same handle twice for
    /// one event is a no-op.
    pub fn on(&self, event: &str, listener: &Listener<E>) {
        self.install(event, listener, false);
    }

    /// Register a listener that is removed after its first delivery.
    pub fn once(&self, event: &str, listener: &Listener<E>) {
        self.install(event, listener, true);
    }

    fn install(&self, event: &str, listener: &Listener<E>, once: bool) {
        let mut state = self.state.lock();
        if !state.enabled {
            tracing::debug!(event = %event, "Event bus disabled, ignoring registration");
            return;
        }

        let entries = state.registrations.entry(event.to_string()).or_default();
        if entries.contains_key(&listener.id()) {
            return;
        }
        entries.insert(
            listener.id(),
            Registration {
                listener: listener.clone(),
                once,
                consumed: Arc::new(AtomicBool::new(false)),
            },
        );

        let count = entries.len();
        if self.config.exceeds_limit(count) {
            tracing::warn!(
                event = %event,
                count,
                limit = self.config.max_listeners,
                "Possible listener leak detected"
            );
        }
    }

    /// Remove one listener, or every listener of `event` when `listener` is `None`.
    pub fn off(&self, event: &str, listener: Option<&Listener<E>>) {
        let mut state = self.state.lock();
        match listener {
            Some(listener) => {
                let now_empty = match state.registrations.get_mut(event) {
                    Some(entries) => {
                        entries.shift_remove(&listener.id());
                        entries.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    state.registrations.remove(event);
                }
            }
            None => {
                state.registrations.remove(event);
            }
        }
    }

    /// Remove the listeners of one event, or of every event.
    pub fn remove_all_listeners(&self, event: Option<&str>) {
        let mut state = self.state.lock();
        match event {
            Some(event) => {
                state.registrations.remove(event);
            }
            None => state.registrations.clear(),
        }
    }

    // ========== Introspection ==========

    /// Number of listeners currently registered for `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .registrations
            .get(event)
            .map_or(0, IndexMap::len)
    }

    /// Listener handles currently registered for `event`, in registration order.
    pub fn listeners(&self, event: &str) -> Vec<Listener<E>> {
        self.state
            .lock()
            .registrations
            .get(event)
            .map(|entries| entries.values().map(|r| r.listener.clone()).collect())
            .unwrap_or_default()
    }

    /// Names of events that have at least one listener.
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().registrations.keys().cloned().collect();
        names.sort();
        names
    }

    /// Emit and listener counters.
    pub fn stats(&self) -> EventStats {
        let state = self.state.lock();
        EventStats {
            total_emits: state.total_emits,
            event_counts: state.event_counts.clone(),
            listener_counts: state
                .registrations
                .iter()
                .map(|(name, entries)| (name.clone(), entries.len()))
                .collect(),
        }
    }

    // ========== Pipeline ==========

    /// Append a middleware to the chain.
    pub fn use_middleware<F>(&self, middleware: F)
    where
        F: for<'a> Fn(&'a str, E, Next<'a, E>) + Send + Sync + 'static,
    {
        self.state.lock().middlewares.push(Arc::new(middleware));
    }

    /// Install the dispatch filter, replacing any previous one.
    pub fn filter<F>(&self, filter: F)
    where
        F: Fn(&str, &E) -> bool + Send + Sync + 'static,
    {
        self.state.lock().filter = Some(Arc::new(filter));
    }

    /// Remove the dispatch filter.
    pub fn clear_filter(&self) {
        self.state.lock().filter = None;
    }

    /// Install the payload transformer, replacing any previous one.
    pub fn transform<F>(&self, transform: F)
    where
        F: Fn(&str, E) -> E + Send + Sync + 'static,
    {
        self.state.lock().transform = Some(Arc::new(transform));
    }

    /// Remove the payload transformer.
    pub fn clear_transform(&self) {
        self.state.lock().transform = None;
    }

    // ========== Kill switch ==========

    /// Resume registrations and deliveries.
    pub fn enable(&self) {
        self.state.lock().enabled = true;
    }

    /// Suppress registrations and deliveries. Existing listeners are kept.
    pub fn disable(&self) {
        self.state.lock().enabled = false;
    }

    /// Whether the bus currently delivers events.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Drop listeners, pipeline stages and counters.
    pub fn reset(&self) {
        *self.state.lock() = BusState::new(self.config.enabled);
    }

    // ========== Dispatch ==========

    /// Publish an event. Returns the number of listeners invoked.
    pub fn emit(&self, event: &str, data: E) -> usize {
        let (snapshot, middlewares, filter, transform) = {
            let state = self.state.lock();
            if !state.enabled {
                return 0;
            }
            let snapshot: Vec<Registration<E>> = state
                .registrations
                .get(event)
                .map(|entries| entries.values().cloned().collect())
                .unwrap_or_default();
            (
                snapshot,
                state.middlewares.clone(),
                state.filter.clone(),
                state.transform.clone(),
            )
        };

        if let Some(filter) = &filter {
            if !filter(event, &data) {
                tracing::debug!(event = %event, "Event dropped by filter");
                return 0;
            }
        }

        {
            let mut state = self.state.lock();
            state.total_emits += 1;
            *state.event_counts.entry(event.to_string()).or_insert(0) += 1;
        }

        let mut delivered = 0;
        let mut sink = |payload: E| {
            let payload = match &transform {
                Some(transform) => transform(event, payload),
                None => payload,
            };
            delivered = self.deliver(event, &payload, &snapshot);
        };
        Next::new(event, &middlewares, &mut sink).run(data);

        delivered
    }

    fn deliver(&self, event: &str, data: &E, snapshot: &[Registration<E>]) -> usize {
        let mut invoked = 0;

        for registration in snapshot {
            if registration.once {
                if registration.consumed.swap(true, Ordering::SeqCst) {
                    continue;
                }
                self.remove_consumed(event, registration);
            }

            invoked += 1;
            match catch_unwind(AssertUnwindSafe(|| registration.listener.call(data))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(event = %event, error = %e, "Event listener failed");
                }
                Err(_) => {
                    tracing::error!(event = %event, "Event listener panicked");
                }
            }
        }

        invoked
    }

    fn remove_consumed(&self, event: &str, registration: &Registration<E>) {
        let mut state = self.state.lock();
        let now_empty = match state.registrations.get_mut(event) {
            Some(entries) => {
                let installed = entries
                    .get(&registration.listener.id())
                    .is_some_and(|r| Arc::ptr_eq(&r.consumed, &registration.consumed));
                if installed {
                    entries.shift_remove(&registration.listener.id());
                }
                entries.is_empty()
            }
            None => false,
        };
        if now_empty {
            state.registrations.remove(event);
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
