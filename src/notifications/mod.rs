//! Self-expiring user notifications.
//!
//! Notifications live in the state tree at `ui.notifications`, so the render
//! collaborator sees them like any other state. Each one carries its own
//! timer; when it fires the notification removes itself by id.

mod queue;

pub use queue::{NotificationIds, NotificationQueue};
