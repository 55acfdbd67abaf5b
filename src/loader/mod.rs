//! Populating the state tree from the remote backend.
//!
//! A load fans out one fetch per target (profile plus every tracked
//! [`Collection`]), joins on all of them, and commits each success to its
//! tree path. Failures are isolated: a rejected fetch is logged and its path
//! keeps its previous value. Raw records are validated into typed
//! [`Movement`]s and [`CreditSimulation`]s before they reach the tree.

mod orchestrator;
mod records;
mod source;
mod summary;

pub use orchestrator::{DataLoader, LoadReport, LoadTarget};
pub use records::{CollectionData, CreditSimulation, Movement};
pub use source::{Collection, DataSource};
pub use summary::{MonthTotals, Summary};
