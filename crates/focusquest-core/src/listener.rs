//! Listener fan-out shared by every emitting component.
//!
//! Each emitter owns a [`Listeners`] registry of `Arc<L>` handles, where `L` is one
//! of the listener traits (`dyn TimerListener`, `dyn SessionListener`, ...).
//! Delivery snapshots the registry and then walks the snapshot in registration
//! order, so listeners may register or unregister concurrently with delivery,
//! including from inside a callback.
//!
//! A listener that panics is caught, logged and skipped; the remaining listeners
//! still receive the event.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Handle returned by registration, used to unregister later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Ordered registry of listener handles.
pub struct Listeners<L: ?Sized> {
    entries: RwLock<Vec<(ListenerId, Arc<L>)>>,
    next_id: AtomicU64,
}

impl<L: ?Sized> Listeners<L> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener. It receives every event emitted after this returns.
    pub fn add(&self, listener: Arc<L>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, listener));
        id
    }

    /// Unregister a listener. Returns `false` if the id was not registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Deliver to every listener registered at the time of the call.
    ///
    /// `event` is only used to label log records. Returns how many listeners
    /// panicked during delivery.
    pub fn notify<F>(&self, event: &str, deliver: F) -> usize
    where
        F: Fn(&L),
    {
        let snapshot: Vec<(ListenerId, Arc<L>)> = self.entries.read().clone();
        let mut failures = 0;
        for (id, listener) in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| deliver(listener.as_ref())));
            if let Err(payload) = outcome {
                failures += 1;
                tracing::error!(
                    listener = %id,
                    event,
                    "listener failed: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
        failures
    }
}

impl<L: ?Sized> Default for Listeners<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ?Sized> std::fmt::Debug for Listeners<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
