//! Path-keyed listener registry with upward bubbling.

use crate::error::StoreError;
use crate::state::StatePath;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

use super::types::{remove_entry, Listener, ListenerEntry, ListenerId, ListenerTable, Subscription};

/// Maps paths to the listeners registered on them.
///
/// A mutation at `p` notifies listeners on `p` and then on every ancestor of
/// `p`, nearest first. Listeners on descendants of `p` are not notified.
pub struct ListenerRegistry {
    /// Listeners by exact path, in registration order.
    table: Arc<ListenerTable>,
    /// Counter for generating listener IDs.
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            table: Arc::new(ListenerTable::new(HashMap::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback on an exact path.
    pub fn subscribe<F>(&self, path: StatePath, callback: F) -> Subscription
    where
        F: Fn(&Value, &StatePath) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let entry = ListenerEntry {
            id,
            callback: Arc::new(callback) as Listener,
        };

        self.table
            .write()
            .entry(path.clone())
            .or_default()
            .push(entry);
        debug!(path = %path, listener = %id, "listener registered");

        Subscription {
            id,
            path,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Remove a listener by path and id.
    pub fn unsubscribe(&self, path: &StatePath, id: ListenerId) -> bool {
        remove_entry(&self.table, path, id)
    }

    /// Total number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.table.read().values().map(Vec::len).sum()
    }

    /// Number of listeners on an exact path.
    pub fn listeners_on(&self, path: &StatePath) -> usize {
        self.table.read().get(path).map_or(0, Vec::len)
    }

    /// Notify listeners about a mutation at `path`.
    ///
    /// Exact-path listeners receive `value`. Ancestor listeners receive
    /// whatever `current` reports for their own path at the moment they run.
    /// Callbacks run with no lock held. Panicking callbacks are logged and
    /// returned as `StoreError::Listener`; the rest still run.
    pub fn notify<F>(&self, path: &StatePath, value: &Value, current: F) -> Vec<StoreError>
    where
        F: Fn(&StatePath) -> Option<Value>,
    {
        let mut failures = Vec::new();

        for entry in self.entries_for(path) {
            if let Err(e) = invoke(&entry, value, path) {
                failures.push(e);
            }
        }

        for ancestor in path.ancestors() {
            let entries = self.entries_for(&ancestor);
            if entries.is_empty() {
                continue;
            }
            for entry in entries {
                let ancestor_value = current(&ancestor).unwrap_or(Value::Null);
                if let Err(e) = invoke(&entry, &ancestor_value, path) {
                    failures.push(e);
                }
            }
        }

        failures
    }

    fn entries_for(&self, path: &StatePath) -> Vec<ListenerEntry> {
        self.table.read().get(path).cloned().unwrap_or_default()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke(entry: &ListenerEntry, value: &Value, path: &StatePath) -> Result<(), StoreError> {
    let callback = &entry.callback;
    panic::catch_unwind(AssertUnwindSafe(|| callback(value, path))).map_err(|payload| {
        let err = StoreError::Listener {
            path: path.to_string(),
            listener: entry.id.0,
            message: panic_message(payload.as_ref()),
        };
        error!(path = %path, listener = %entry.id, error = %err, "listener failed");
        err
    })
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
