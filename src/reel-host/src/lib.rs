//! # Reel Host
//!
//! Host-side contracts for the plugin runtime:
//!
//! - [`HostState`] and its fixed transition table
//! - [`HostStateMachine`], which validates transitions, keeps history and
//!   broadcasts `statechange` on the host bus
//! - [`MediaHost`] and [`MountTarget`], the playback and container surface
//!   plugins are handed
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use reel_events::EventBus;
//! use reel_host::{HostState, HostStateMachine};
//!
//! let machine = HostStateMachine::new(Arc::new(EventBus::new()));
//! machine.set_state(HostState::Loading, Some("source set")).unwrap();
//! machine.set_state(HostState::Ready, None).unwrap();
//!
//! assert!(machine.set_state(HostState::Ended, None).is_err());
//! assert!(machine.is(HostState::Ready));
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod machine;
pub mod state;

pub use config::StateMachineConfig;
pub use error::{Result, StateError};
pub use host::{Container, ElementHandle, MediaHost, MountTarget, events};
pub use machine::{HostStateMachine, StateListener, StateStats};
pub use state::{HostState, StateTransition};
