//! Notification list manipulation and expiry timers.

use crate::error::{Result, StoreError};
use crate::store::Store;
use crate::types::{Notification, NotificationId, NotificationKind, Timestamp};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Time-based notification id generator.
///
/// Ids are microseconds since the epoch, bumped past the previous id when
/// two notifications land in the same microsecond.
pub struct NotificationIds {
    last: AtomicU64,
}

impl NotificationIds {
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> NotificationId {
        let now = Timestamp::now().0.max(0) as u64;
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, candidate, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return NotificationId(candidate),
                Err(actual) => prev = actual,
            }
        }
    }
}

impl Default for NotificationIds {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure operations on the `ui.notifications` array.
pub struct NotificationQueue;

impl NotificationQueue {
    /// Build a notification with a fresh id.
    pub fn create(
        ids: &NotificationIds,
        message: impl Into<String>,
        kind: NotificationKind,
        duration: Duration,
    ) -> Notification {
        Notification {
            id: ids.next(),
            message: message.into(),
            kind,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            created_at: Timestamp::now(),
        }
    }

    /// The list with `encoded` appended. A missing or non-array list starts
    /// over as an empty one.
    pub fn appended(current: Option<&Value>, encoded: Value) -> Value {
        let mut items = match current {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        items.push(encoded);
        Value::Array(items)
    }

    /// The list without the notification `id`.
    pub fn without(current: Option<&Value>, id: NotificationId) -> Value {
        let items = match current {
            Some(Value::Array(items)) => items
                .iter()
                .filter(|item| item.get("id").and_then(Value::as_u64) != Some(id.0))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
        Value::Array(items)
    }

    /// Decode the list, skipping entries that do not parse.
    pub fn decode(current: Option<&Value>) -> Vec<Notification> {
        match current {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The runtime expiry timers will be spawned on.
    pub fn runtime() -> Result<Handle> {
        Handle::try_current().map_err(|e| StoreError::NoRuntime(e.to_string()))
    }

    /// Remove `id` from the store once `after` has elapsed.
    ///
    /// The timer only holds a weak reference; if the store is gone the
    /// removal is skipped.
    pub(crate) fn schedule_removal(
        runtime: &Handle,
        store: Weak<Store>,
        id: NotificationId,
        after: Duration,
    ) {
        runtime.spawn(async move {
            tokio::time::sleep(after).await;
            match store.upgrade() {
                Some(store) => {
                    if let Err(e) = store.remove_notification(id) {
                        warn!(notification = %id, error = %e, "failed to expire notification");
                    }
                }
                None => debug!(notification = %id, "store dropped before notification expired"),
            }
        });
    }
}
