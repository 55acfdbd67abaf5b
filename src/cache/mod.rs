//! Cache for loader results.
//!
//! Entries have no TTL. They are dropped wholesale when data they may
//! derive from changes, never refreshed in place.

mod storage;

pub use storage::{Cache, PROFILE_KIND};
