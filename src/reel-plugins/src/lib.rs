//! # Reel Plugin Runtime
//!
//! Lets independently written player features (subtitles, overlays,
//! quality switchers, playlists) be registered, instantiated, wired to the
//! host and walked through a well-defined lifecycle.
//!
//! ## Features
//!
//! - **Lifecycle driver**: one linear phase machine for every plugin, with
//!   optional hooks and `error_captured` containment
//! - **Dependencies**: declared by name, resolved depth-first with cycle
//!   detection, wired in both directions
//! - **Bulk lifecycle**: mount and unmount every plugin honoring a filter
//!   and a sorter, with per-plugin failure containment
//! - **Events**: registry-level events on the manager bus; host events on
//!   each plugin's scoped listener set
//!
//! ## Example
//!
//! ```rust,ignore
//! use reel_plugins::{PluginManager, PluginManagerConfig, RegisterOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let manager = PluginManager::new(PluginManagerConfig::default());
//!
//!     manager.register("theme", || Ok(Box::new(Theme::default())), RegisterOptions::new())?;
//!     manager.register(
//!         "controls",
//!         || Ok(Box::new(Controls::default())),
//!         RegisterOptions::new().depends_on(["theme"]),
//!     )?;
//!
//!     manager.create("theme", None).await?;
//!     manager.create("controls", None).await?;
//!
//!     for (name, result) in manager.mount_all(None).await {
//!         println!("{name}: {result:?}");
//!     }
//!
//!     manager.clear().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod hooks;
pub mod lifecycle;
pub mod manager;
pub mod plugin;
pub mod resolver;

// Re-exports for convenience
pub use config::{PluginManagerConfig, merge_config};
pub use context::{ActivityState, HostLink, PluginContext};
pub use error::{PluginError, Result};
pub use events::PluginEvent;
pub use hooks::{ErrorCapturedFn, HookFn, HookPoint, LifecycleHooks};
pub use lifecycle::{LifecyclePhase, ManagedPlugin, PluginHandle};
pub use manager::{
    BatchResult, MiddlewareNext, PluginFilter, PluginManager, PluginMiddleware, PluginSorter,
    PluginValidator, RegisterOptions,
};
pub use plugin::{Plugin, PluginFactory, PluginKind, PluginMetadata};
