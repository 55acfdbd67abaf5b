//! # Cashflow Store
//!
//! The reactive state store behind a personal finance client: income,
//! expenses and credit simulations synchronized from a remote backend.
//!
//! ## Core Concepts
//!
//! - **State tree**: One nested JSON tree, addressed by dot-delimited paths
//! - **Listeners**: Path subscriptions that bubble upward to ancestors
//! - **Cache**: Loader results, invalidated when `data` changes
//! - **Notifications**: Self-expiring user messages kept in the tree
//! - **Loader**: Concurrent fetches with per-fetch failure isolation
//!
//! ## Example
//!
//! ```ignore
//! use cashflow_store::{Identity, Store, StoreConfig};
//!
//! let store = Store::builder(StoreConfig::default())
//!     .renderer(|snapshot: &serde_json::Value| println!("{snapshot}"))
//!     .data_source(Arc::new(my_backend))
//!     .build();
//!
//! let sub = store.subscribe("data", |data, changed| {
//!     println!("{changed} updated");
//! })?;
//!
//! store.sign_in(Identity::new("42")).await;
//! store.notify_success("Datos actualizados")?;
//! ```

pub mod cache;
pub mod error;
pub mod loader;
pub mod notifications;
pub mod state;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use cache::Cache;
pub use error::{Result, StoreError};
pub use loader::{
    Collection, CollectionData, CreditSimulation, DataLoader, DataSource, LoadReport, LoadTarget,
    MonthTotals, Movement, Summary,
};
pub use notifications::{NotificationIds, NotificationQueue};
pub use state::{paths, StatePath, StateTree};
pub use store::{Renderer, Store, StoreBuilder, StoreConfig};
pub use subscriptions::{Listener, ListenerId, ListenerRegistry, Subscription};
pub use types::*;
