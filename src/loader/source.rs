//! The data-access collaborator.

use crate::state::paths;
use crate::types::Identity;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// A remote collection tracked by the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Incomes,
    Expenses,
    CreditSimulations,
}

impl Collection {
    /// Every tracked collection, in load order.
    pub const ALL: [Collection; 3] = [
        Collection::Incomes,
        Collection::Expenses,
        Collection::CreditSimulations,
    ];

    /// Where the collection lives in the state tree.
    pub fn path(self) -> &'static str {
        match self {
            Collection::Incomes => paths::DATA_INCOMES,
            Collection::Expenses => paths::DATA_EXPENSES,
            Collection::CreditSimulations => paths::DATA_SIMULATIONS,
        }
    }

    /// Remote collection name.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Incomes => "ingresos",
            Collection::Expenses => "gastos",
            Collection::CreditSimulations => "simulaciones",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read access to the remote backend, keyed by the signed-in identity.
///
/// An `Ok(vec![])` means the collection is empty; the store keeps "not yet
/// loaded" (`null`) distinct from that. Timeouts and retries, if wanted,
/// belong in the implementation.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_profile(&self, identity: &Identity) -> anyhow::Result<Value>;

    async fn fetch_collection(
        &self,
        identity: &Identity,
        collection: Collection,
    ) -> anyhow::Result<Vec<Value>>;
}
