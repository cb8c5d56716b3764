//! Host playback states and the fixed transition table.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Coarse-grained state of the media host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostState {
    /// Created, nothing loaded yet
    #[default]
    Initial,
    /// Source is loading
    Loading,
    /// Enough data to start playback
    Ready,
    /// Playing
    Playing,
    /// Paused by the user or the host
    Paused,
    /// Seek in progress
    Seeking,
    /// Stalled waiting for data
    Buffering,
    /// Reached the end of the media
    Ended,
    /// Unrecoverable media error
    Error,
    /// Host torn down; absorbing
    Destroyed,
}

impl HostState {
    /// Every state, in declaration order.
    pub const ALL: [HostState; 10] = [
        HostState::Initial,
        HostState::Loading,
        HostState::Ready,
        HostState::Playing,
        HostState::Paused,
        HostState::Seeking,
        HostState::Buffering,
        HostState::Ended,
        HostState::Error,
        HostState::Destroyed,
    ];

    /// States reachable from `self` in one step.
    pub fn allowed_transitions(self) -> &'static [HostState] {
        use HostState::*;
        match self {
            Initial => &[Loading, Error, Destroyed],
            Loading => &[Ready, Error, Destroyed],
            Ready => &[Playing, Loading, Error, Destroyed],
            Playing => &[Paused, Seeking, Buffering, Ended, Error, Destroyed],
            Paused => &[Playing, Seeking, Ended, Error, Destroyed],
            Seeking => &[Playing, Paused, Buffering, Error, Destroyed],
            Buffering => &[Playing, Paused, Error, Destroyed],
            Ended => &[Playing, Loading, Error, Destroyed],
            Error => &[Loading, Ready, Destroyed],
            Destroyed => &[],
        }
    }

    /// Whether the table allows `self -> next`.
    pub fn can_transition_to(self, next: HostState) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Whether no transition leaves this state.
    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Loading => write!(f, "loading"),
            Self::Ready => write!(f, "ready"),
            Self::Playing => write!(f, "playing"),
            Self::Paused => write!(f, "paused"),
            Self::Seeking => write!(f, "seeking"),
            Self::Buffering => write!(f, "buffering"),
            Self::Ended => write!(f, "ended"),
            Self::Error => write!(f, "error"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// One applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTransition {
    /// State that was left
    pub from: HostState,
    /// State that was entered
    pub to: HostState,
    /// When the transition was applied
    pub timestamp: DateTime<Utc>,
    /// Optional caller-supplied reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
