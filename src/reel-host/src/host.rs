//! Interfaces the media host exposes to the runtime.
//!
//! The host itself (decoding, rendering, network) lives outside this
//! workspace; these traits are the only surface plugins and the runtime see.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Host event names.
pub mod events {
    /// Playback requested.
    pub const PLAY: &str = "play";
    /// Playback actually started or resumed after buffering.
    pub const PLAYING: &str = "playing";
    /// Playback paused.
    pub const PAUSE: &str = "pause";
    /// A seek started.
    pub const SEEKING: &str = "seeking";
    /// A seek finished.
    pub const SEEKED: &str = "seeked";
    /// Playback stalled waiting for data.
    pub const WAITING: &str = "waiting";
    /// End of media reached.
    pub const ENDED: &str = "ended";
    /// Media error.
    pub const ERROR: &str = "error";
    /// Source started loading.
    pub const LOAD_START: &str = "loadstart";
    /// Enough data to play.
    pub const CAN_PLAY: &str = "canplay";
    /// Playback position changed.
    pub const TIME_UPDATE: &str = "timeupdate";
    /// Host state machine applied a transition.
    pub const STATE_CHANGE: &str = "statechange";
    /// Host is being torn down.
    pub const DESTROY: &str = "destroy";
}

/// Opaque reference to a UI element a plugin owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(String);

impl ElementHandle {
    /// Create a handle with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Element identifier.
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A container plugins are mounted into.
pub trait MountTarget: Send + Sync + fmt::Debug {
    /// Container identifier.
    fn id(&self) -> &str;

    /// Insert a plugin-owned element.
    fn attach(&self, element: &ElementHandle);

    /// Remove a plugin-owned element.
    fn detach(&self, element: &ElementHandle);
}

/// Shared container reference.
pub type Container = Arc<dyn MountTarget>;

/// Playback primitives of the media host.
pub trait MediaHost: Send + Sync {
    /// Start or resume playback.
    fn play(&self) -> anyhow::Result<()>;

    /// Pause playback.
    fn pause(&self) -> anyhow::Result<()>;

    /// Move the playback position.
    fn seek(&self, position: Duration) -> anyhow::Result<()>;

    /// Current playback position.
    fn current_time(&self) -> Duration;

    /// Media duration, if known.
    fn duration(&self) -> Option<Duration>;

    /// Root container the host renders into.
    fn container(&self) -> Option<Container> {
        None
    }
}
