//! Host state machine.
//!
//! Tracks the coarse playback state of one host, validates every transition
//! against [`HostState::allowed_transitions`], keeps a bounded history and
//! broadcasts each applied transition as `statechange` on the host bus.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reel_events::{EventBus, EventScope, Listener};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::StateMachineConfig;
use crate::host::events;
use crate::state::{HostState, StateTransition};
use crate::{Result, StateError};

/// Maps a host event to the state it implies.
type Transition = fn(&HostStateMachine) -> HostState;

/// Callback notified when a particular state is entered.
pub type StateListener = Arc<dyn Fn(&StateTransition) + Send + Sync>;

/// Transition statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStats {
    /// Times each state was entered
    pub transition_counts: HashMap<HostState, u64>,
    /// Time spent in each state, including the running current state
    pub durations: HashMap<HostState, Duration>,
    /// Transitions applied since creation or the last reset
    pub total_transitions: u64,
    /// Current state
    pub current: HostState,
    /// State before the last transition
    pub previous: Option<HostState>,
}

struct MachineState {
    current: HostState,
    previous: Option<HostState>,
    current_since: DateTime<Utc>,
    history: VecDeque<StateTransition>,
    entered_at: HashMap<HostState, Instant>,
    transition_counts: HashMap<HostState, u64>,
    durations: HashMap<HostState, Duration>,
    total_transitions: u64,
    state_listeners: HashMap<HostState, Vec<StateListener>>,
    waiters: Vec<(HostState, oneshot::Sender<StateTransition>)>,
}

impl MachineState {
    fn seeded(initial: HostState) -> Self {
        let mut entered_at = HashMap::new();
        entered_at.insert(initial, Instant::now());
        Self {
            current: initial,
            previous: None,
            current_since: Utc::now(),
            history: VecDeque::new(),
            entered_at,
            transition_counts: HashMap::new(),
            durations: HashMap::new(),
            total_transitions: 0,
            state_listeners: HashMap::new(),
            waiters: Vec::new(),
        }
    }

    /// Record describing how the current state was entered.
    fn current_record(&self) -> StateTransition {
        match self.history.back() {
            Some(last) if last.to == self.current => last.clone(),
            _ => StateTransition {
                from: self.previous.unwrap_or(self.current),
                to: self.current,
                timestamp: self.current_since,
                reason: None,
            },
        }
    }
}

/// State machine for the media host.
pub struct HostStateMachine {
    config: StateMachineConfig,
    bus: Arc<EventBus<Value>>,
    scope: EventScope<Value>,
    inner: Mutex<MachineState>,
}

impl HostStateMachine {
    /// Create a state machine broadcasting on `bus`.
    pub fn new(bus: Arc<EventBus<Value>>) -> Self {
        Self::with_config(bus, StateMachineConfig::default())
    }

    /// Create a state machine with explicit configuration.
    pub fn with_config(bus: Arc<EventBus<Value>>, config: StateMachineConfig) -> Self {
        let inner = Mutex::new(MachineState::seeded(config.initial_state));
        let scope = EventScope::new("host-state", bus.clone());
        Self {
            config,
            bus,
            scope,
            inner,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &StateMachineConfig {
        &self.config
    }

    /// The bus transitions are broadcast on.
    pub fn bus(&self) -> &Arc<EventBus<Value>> {
        &self.bus
    }

    // ========== Queries ==========

    /// Current state.
    pub fn current(&self) -> HostState {
        self.inner.lock().current
    }

    /// State before the last transition.
    pub fn previous(&self) -> Option<HostState> {
        self.inner.lock().previous
    }

    /// Whether the machine is in `state`.
    pub fn is(&self, state: HostState) -> bool {
        self.current() == state
    }

    /// Whether the machine is in any of `states`.
    pub fn is_one_of(&self, states: &[HostState]) -> bool {
        states.contains(&self.current())
    }

    /// Whether `set_state(next)` would be accepted right now.
    pub fn can_transition(&self, next: HostState) -> bool {
        let current = self.current();
        current == next || !self.config.validate_transitions || current.can_transition_to(next)
    }

    /// Snapshot of the transition history, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Time since `state` (or the current state) was last entered.
    pub fn state_duration(&self, state: Option<HostState>) -> Duration {
        let inner = self.inner.lock();
        let state = state.unwrap_or(inner.current);
        inner
            .entered_at
            .get(&state)
            .map_or(Duration::ZERO, Instant::elapsed)
    }

    /// Transition statistics.
    pub fn stats(&self) -> StateStats {
        let inner = self.inner.lock();
        let mut durations = inner.durations.clone();
        if let Some(entered) = inner.entered_at.get(&inner.current) {
            *durations.entry(inner.current).or_default() += entered.elapsed();
        }
        StateStats {
            transition_counts: inner.transition_counts.clone(),
            durations,
            total_transitions: inner.total_transitions,
            current: inner.current,
            previous: inner.previous,
        }
    }

    // ========== Transitions ==========

    /// Apply a transition.
    ///
    /// Re-entering the current state succeeds without side effects. A
    /// transition missing from the table fails and leaves the state untouched.
    pub fn set_state(&self, next: HostState, reason: Option<&str>) -> Result<()> {
        let (record, listeners, waiters) = {
            let mut inner = self.inner.lock();
            let from = inner.current;
            if from == next {
                return Ok(());
            }
            if self.config.validate_transitions && !from.can_transition_to(next) {
                tracing::warn!(from = %from, to = %next, "Rejected host state transition");
                return Err(StateError::InvalidTransition { from, to: next });
            }

            let now = Instant::now();
            if let Some(entered) = inner.entered_at.get(&from).copied() {
                *inner.durations.entry(from).or_default() += now.duration_since(entered);
            }

            let record = StateTransition {
                from,
                to: next,
                timestamp: Utc::now(),
                reason: reason.map(str::to_string),
            };

            inner.previous = Some(from);
            inner.current = next;
            inner.current_since = record.timestamp;
            inner.entered_at.insert(next, now);
            *inner.transition_counts.entry(next).or_insert(0) += 1;
            inner.total_transitions += 1;

            inner.history.push_back(record.clone());
            while inner.history.len() > self.config.max_history {
                inner.history.pop_front();
            }

            let listeners = inner
                .state_listeners
                .get(&next)
                .cloned()
                .unwrap_or_default();

            let (ready, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.waiters)
                .into_iter()
                .partition(|(state, _)| *state == next);
            inner.waiters = pending;

            (record, listeners, ready)
        };

        tracing::debug!(from = %record.from, to = %record.to, "Host state changed");

        for listener in &listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(&record))).is_err() {
                tracing::error!(state = %record.to, "State listener panicked");
            }
        }

        for (_, waiter) in waiters {
            let _ = waiter.send(record.clone());
        }

        match serde_json::to_value(&record) {
            Ok(payload) => {
                self.bus.emit(events::STATE_CHANGE, payload);
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize state transition"),
        }

        Ok(())
    }

    /// Register a callback for every future entry into `state`.
    pub fn on_state<F>(&self, state: HostState, listener: F)
    where
        F: Fn(&StateTransition) + Send + Sync + 'static,
    {
        self.inner
            .lock()
            .state_listeners
            .entry(state)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Wait until `state` is entered.
    ///
    /// Resolves immediately with the record of the current state when the
    /// machine is already there. A [`reset`](Self::reset) into `state` also
    /// resolves it.
    pub async fn wait_for_state(
        &self,
        state: HostState,
        timeout: Option<Duration>,
    ) -> Result<StateTransition> {
        let receiver = {
            let mut inner = self.inner.lock();
            if inner.current == state {
                return Ok(inner.current_record());
            }
            inner.waiters.retain(|(_, sender)| !sender.is_closed());
            let (sender, receiver) = oneshot::channel();
            inner.waiters.push((state, sender));
            receiver
        };

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, receiver)
                .await
                .map_err(|_| StateError::Timeout {
                    state,
                    timeout_ms: limit.as_millis() as u64,
                })?,
            None => receiver.await,
        };

        received.map_err(|_| StateError::Cancelled(state))
    }

    /// Clear history, statistics and per-state listeners and restart in `initial`.
    ///
    /// Pending waiters are kept; those waiting for `initial` resolve now.
    pub fn reset(&self, initial: HostState) {
        let (record, ready) = {
            let mut inner = self.inner.lock();
            let waiters = std::mem::take(&mut inner.waiters);
            *inner = MachineState::seeded(initial);
            let (ready, pending): (Vec<_>, Vec<_>) = waiters
                .into_iter()
                .partition(|(state, _)| *state == initial);
            inner.waiters = pending;
            (inner.current_record(), ready)
        };
        tracing::debug!(state = %initial, "Host state machine reset");

        for (_, waiter) in ready {
            let _ = waiter.send(record.clone());
        }
    }

    // ========== Host event binding ==========

    /// Drive the machine from host events on the shared bus.
    ///
    /// Host events that imply a transition the table rejects are logged and
    /// ignored.
    pub fn bind(self: &Arc<Self>) {
        let mapping: [(&'static str, Transition); 11] = [
            (events::LOAD_START, |_| HostState::Loading),
            (events::CAN_PLAY, |_| HostState::Ready),
            (events::PLAY, |_| HostState::Playing),
            (events::PLAYING, |_| HostState::Playing),
            (events::PAUSE, |_| HostState::Paused),
            (events::SEEKING, |_| HostState::Seeking),
            (events::SEEKED, HostStateMachine::resume_target),
            (events::WAITING, |_| HostState::Buffering),
            (events::ENDED, |_| HostState::Ended),
            (events::ERROR, |_| HostState::Error),
            (events::DESTROY, |_| HostState::Destroyed),
        ];

        for (event, target) in mapping {
            self.bind_event(event, target);
        }
    }

    /// Stop reacting to host events.
    pub fn unbind(&self) -> usize {
        self.scope.release()
    }

    fn bind_event(self: &Arc<Self>, event: &'static str, target: Transition) {
        let machine: Weak<Self> = Arc::downgrade(self);
        let listener = Listener::from_fn(move |_: &Value| {
            if let Some(machine) = machine.upgrade() {
                let next = target(&machine);
                let reason = format!("host event: {event}");
                let _ = machine.set_state(next, Some(&reason));
            }
        });
        self.scope.on(event, &listener);
    }

    /// Where playback lands after a seek completes.
    fn resume_target(&self) -> HostState {
        match self.previous() {
            Some(HostState::Playing) => HostState::Playing,
            _ => HostState::Paused,
        }
    }
}
