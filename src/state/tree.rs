//! The single nested state tree.

use super::accessor;
use super::path::StatePath;
use serde_json::{json, Value};

/// Root container for all client state.
///
/// Owned exclusively by the [`Store`](crate::Store); everything else sees
/// cloned snapshots.
#[derive(Clone, Debug, PartialEq)]
pub struct StateTree {
    root: Value,
}

impl StateTree {
    /// A tree in its signed-out default shape.
    pub fn new() -> Self {
        Self {
            root: Self::defaults(),
        }
    }

    /// The default shape. `null` under `data` means "not yet loaded".
    pub fn defaults() -> Value {
        json!({
            "auth": {"user": null, "profile": null},
            "loading": false,
            "ui": {"notifications": []},
            "data": {
                "ingresos": null,
                "gastos": null,
                "simulaciones": null,
                "resumen": null
            }
        })
    }

    pub fn get(&self, path: &StatePath) -> Option<&Value> {
        accessor::get(&self.root, path)
    }

    pub fn set(&mut self, path: &StatePath, value: Value) -> Option<Value> {
        accessor::set(&mut self.root, path, value)
    }

    /// Restore the default shape.
    pub fn reset(&mut self) {
        self.root = Self::defaults();
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn snapshot(&self) -> Value {
        self.root.clone()
    }
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}
