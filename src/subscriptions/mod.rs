//! Path-based change listeners.
//!
//! Listeners are registered on an exact [`StatePath`](crate::StatePath) and
//! fire synchronously inside the mutation that triggered them:
//! - Listeners on the mutated path get the new value
//! - Listeners on each ancestor get the ancestor's current value
//! - Listeners on descendants are never notified (bubbling is upward only)
//!
//! Callbacks must be short. A slow callback delays the caller of `set_state`
//! and every mutation queued behind it; heavy work belongs in a spawned task.
//!
//! # Example
//!
//! ```ignore
//! let store = Store::new(StoreConfig::default());
//!
//! let sub = store.subscribe("data", |value, changed| {
//!     println!("{changed} changed, data is now {value}");
//! })?;
//!
//! store.set_state("data.ingresos", json!([]))?;
//! sub.unsubscribe();
//! ```

mod manager;
mod types;

pub use manager::ListenerRegistry;
pub(crate) use manager::panic_message;
pub use types::{Listener, ListenerId, Subscription};
