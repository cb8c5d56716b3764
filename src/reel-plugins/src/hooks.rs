//! Optional lifecycle hooks.
//!
//! A plugin opts into hooks by returning a [`LifecycleHooks`] record from
//! [`Plugin::hooks`](crate::Plugin::hooks). Every field is optional and is
//! checked for presence before it is invoked.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::PluginContext;
use crate::error::PluginError;

/// Synchronous hook run at a lifecycle boundary.
pub type HookFn = Arc<dyn Fn(&mut PluginContext) -> anyhow::Result<()> + Send + Sync>;

/// Error handler. Returning `true` marks the error handled.
pub type ErrorCapturedFn = Arc<dyn Fn(&mut PluginContext, &PluginError) -> bool + Send + Sync>;

/// Lifecycle boundaries a hook can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    BeforeCreate,
    Created,
    BeforeInit,
    Initialized,
    BeforeMount,
    Mounted,
    BeforeUnmount,
    Unmounted,
    BeforeDestroy,
    Destroyed,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeforeCreate => "before_create",
            Self::Created => "created",
            Self::BeforeInit => "before_init",
            Self::Initialized => "initialized",
            Self::BeforeMount => "before_mount",
            Self::Mounted => "mounted",
            Self::BeforeUnmount => "before_unmount",
            Self::Unmounted => "unmounted",
            Self::BeforeDestroy => "before_destroy",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Record of optional lifecycle hooks.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub before_create: Option<HookFn>,
    pub created: Option<HookFn>,
    pub before_init: Option<HookFn>,
    pub initialized: Option<HookFn>,
    pub before_mount: Option<HookFn>,
    pub mounted: Option<HookFn>,
    pub before_unmount: Option<HookFn>,
    pub unmounted: Option<HookFn>,
    pub before_destroy: Option<HookFn>,
    pub destroyed: Option<HookFn>,
    pub error_captured: Option<ErrorCapturedFn>,
}

impl LifecycleHooks {
    /// Empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook for `point`.
    pub fn with<F>(mut self, point: HookPoint, hook: F) -> Self
    where
        F: Fn(&mut PluginContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        *self.slot(point) = Some(Arc::new(hook));
        self
    }

    /// Set the error handler.
    pub fn with_error_captured<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut PluginContext, &PluginError) -> bool + Send + Sync + 'static,
    {
        self.error_captured = Some(Arc::new(handler));
        self
    }

    /// Hook installed for `point`, if any.
    pub fn get(&self, point: HookPoint) -> Option<HookFn> {
        let slot = match point {
            HookPoint::BeforeCreate => &self.before_create,
            HookPoint::Created => &self.created,
            HookPoint::BeforeInit => &self.before_init,
            HookPoint::Initialized => &self.initialized,
            HookPoint::BeforeMount => &self.before_mount,
            HookPoint::Mounted => &self.mounted,
            HookPoint::BeforeUnmount => &self.before_unmount,
            HookPoint::Unmounted => &self.unmounted,
            HookPoint::BeforeDestroy => &self.before_destroy,
            HookPoint::Destroyed => &self.destroyed,
        };
        slot.clone()
    }

    fn slot(&mut self, point: HookPoint) -> &mut Option<HookFn> {
        match point {
            HookPoint::BeforeCreate => &mut self.before_create,
            HookPoint::Created => &mut self.created,
            HookPoint::BeforeInit => &mut self.before_init,
            HookPoint::Initialized => &mut self.initialized,
            HookPoint::BeforeMount => &mut self.before_mount,
            HookPoint::Mounted => &mut self.mounted,
            HookPoint::BeforeUnmount => &mut self.before_unmount,
            HookPoint::Unmounted => &mut self.unmounted,
            HookPoint::BeforeDestroy => &mut self.before_destroy,
            HookPoint::Destroyed => &mut self.destroyed,
        }
    }

    /// Number of installed hooks, the error handler included.
    pub fn len(&self) -> usize {
        let hooks = [
            HookPoint::BeforeCreate,
            HookPoint::Created,
            HookPoint::BeforeInit,
            HookPoint::Initialized,
            HookPoint::BeforeMount,
            HookPoint::Mounted,
            HookPoint::BeforeUnmount,
            HookPoint::Unmounted,
            HookPoint::BeforeDestroy,
            HookPoint::Destroyed,
        ]
        .into_iter()
        .filter(|point| self.get(*point).is_some())
        .count();
        hooks + usize::from(self.error_captured.is_some())
    }

    /// Whether no hook is installed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("installed", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_point_display() {
        assert_eq!(HookPoint::BeforeUnmount.to_string(), "before_unmount");
        assert_eq!(HookPoint::Created.to_string(), "created");
    }

    #[test]
    fn test_builder_sets_fields() {
        let hooks = LifecycleHooks::new()
            .with(HookPoint::BeforeInit, |_| Ok(()))
            .with(HookPoint::Destroyed, |_| Ok(()))
            .with_error_captured(|_, _| true);

        assert!(hooks.before_init.is_some());
        assert!(hooks.get(HookPoint::Destroyed).is_some());
        assert!(hooks.get(HookPoint::Mounted).is_none());
        assert_eq!(hooks.len(), 3);
    }

    #[test]
    fn test_default_is_empty() {
        assert!(LifecycleHooks::default().is_empty());
    }
}
