//! Listener handles.
//!
//! A [`Listener`] is the value callers hand to `on`/`once`/`off`. Its identity
//! is a UUID assigned at construction and shared by clones, so the same handle
//! can later be used to deregister what it installed.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Callback signature shared by every listener.
pub type ListenerFn<E> = dyn Fn(&E) -> anyhow::Result<()> + Send + Sync;

/// Opaque, cloneable listener handle.
pub struct Listener<E> {
    id: Uuid,
    callback: Arc<ListenerFn<E>>,
}

impl<E> Listener<E> {
    /// Wrap a callback into a new listener with a fresh identity.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            callback: Arc::new(callback),
        }
    }

    /// Wrap an infallible callback.
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        Self::new(move |data| {
            callback(data);
            Ok(())
        })
    }

    /// Identity of this handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn call(&self, data: &E) -> anyhow::Result<()> {
        (self.callback)(data)
    }
}

impl<E> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<E> PartialEq for Listener<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Listener<E> {}

impl<E> fmt::Debug for Listener<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}
