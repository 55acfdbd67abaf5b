//! The state tree and its path-based addressing.
//!
//! Every field of client state lives in one nested JSON tree and is reached
//! through a validated, dot-delimited [`StatePath`].

pub mod accessor;
mod path;
mod tree;

pub use path::{paths, StatePath};
pub use tree::StateTree;
