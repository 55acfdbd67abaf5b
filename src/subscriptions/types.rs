//! Listener types.

use crate::state::StatePath;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Callback invoked with the new value and the path that was mutated.
pub type Listener = Arc<dyn Fn(&Value, &StatePath) + Send + Sync>;

/// Unique identifier for a registered listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) callback: Listener,
}

pub(crate) type ListenerTable = RwLock<HashMap<StatePath, Vec<ListenerEntry>>>;

/// Handle returned by `subscribe`.
///
/// Dropping the handle leaves the listener registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[must_use = "keep the handle to be able to unsubscribe"]
pub struct Subscription {
    pub(crate) id: ListenerId,
    pub(crate) path: StatePath,
    pub(crate) table: Weak<ListenerTable>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn path(&self) -> &StatePath {
        &self.path
    }

    /// Remove exactly this listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        remove_entry(&table, &self.path, self.id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .finish()
    }
}

pub(crate) fn remove_entry(table: &Arc<ListenerTable>, path: &StatePath, id: ListenerId) -> bool {
    let mut table = table.write();
    let Some(entries) = table.get_mut(path) else {
        return false;
    };
    let before = entries.len();
    entries.retain(|entry| entry.id != id);
    let removed = entries.len() != before;
    if entries.is_empty() {
        table.remove(path);
    }
    removed
}
