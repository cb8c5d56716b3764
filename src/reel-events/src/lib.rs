//! # Reel Event Bus
//!
//! Typed publish/subscribe primitive shared by the host and its plugins.
//!
//! ## Dispatch pipeline
//!
//! Every `emit` runs, in order:
//!
//! 1. the filter (a `false` result drops the event silently),
//! 2. the middleware chain (a middleware that never calls `next` halts it),
//! 3. the transformer (rewrites the payload),
//! 4. synchronous delivery to the listeners registered when `emit` was called.
//!
//! ## Example
//!
//! ```rust
//! use reel_events::{EventBus, Listener};
//!
//! let bus: EventBus<f64> = EventBus::new();
//! let listener = Listener::from_fn(|time: &f64| println!("time = {time}"));
//!
//! bus.on("timeupdate", &listener);
//! bus.emit("timeupdate", 12.5);
//! bus.off("timeupdate", Some(&listener));
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod listener;
pub mod pipeline;
pub mod scope;

pub use bus::{EventBus, EventStats};
pub use config::EventBusConfig;
pub use error::{EventError, Result};
pub use listener::{Listener, ListenerFn};
pub use pipeline::{FilterFn, MiddlewareFn, Next, TransformFn};
pub use scope::EventScope;
