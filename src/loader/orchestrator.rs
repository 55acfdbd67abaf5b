//! Fan-out/fan-in loading of a user's data into the store.

use super::records::CollectionData;
use super::source::{Collection, DataSource};
use super::summary::Summary;
use crate::cache::{Cache, PROFILE_KIND};
use crate::error::StoreError;
use crate::state::paths;
use crate::store::Store;
use crate::types::Identity;
use futures::future::join_all;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One fetch issued by a load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadTarget {
    Profile,
    Collection(Collection),
}

impl fmt::Display for LoadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadTarget::Profile => f.write_str("profile"),
            LoadTarget::Collection(c) => write!(f, "{}", c),
        }
    }
}

/// Outcome of a `load_user_data` run.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Generation number of this run (1 for the first load).
    pub generation: u64,
    /// Targets whose results were written to the tree.
    pub succeeded: Vec<LoadTarget>,
    /// Targets that failed, with the logged error.
    pub failed: Vec<(LoadTarget, StoreError)>,
    pub profile_from_cache: bool,
    pub summary_written: bool,
    /// True when a newer run superseded this one and its results were dropped.
    pub discarded: bool,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.discarded
    }

    pub fn failed_targets(&self) -> Vec<LoadTarget> {
        self.failed.iter().map(|(t, _)| *t).collect()
    }
}

/// Loads a user's profile and collections through a [`DataSource`].
pub struct DataLoader {
    source: Arc<dyn DataSource>,
    /// Bumped at the start of every run.
    generation: AtomicU64,
    discard_superseded: bool,
}

impl DataLoader {
    pub fn new(source: Arc<dyn DataSource>, discard_superseded: bool) -> Self {
        Self {
            source,
            generation: AtomicU64::new(0),
            discard_superseded,
        }
    }

    /// Generation of the most recently started run.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Fetch everything for `identity` and commit it to `store`.
    ///
    /// All fetches start before any is awaited. Each failed fetch is logged
    /// and leaves its previous tree value in place. `loading` is true for the
    /// duration and reset on every exit path. Never returns an error.
    pub async fn load_user_data(&self, store: &Store, identity: &Identity) -> LoadReport {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _loading = LoadingGuard::engage(store, self, generation);
        let mut report = LoadReport {
            generation,
            ..Default::default()
        };

        info!(user = %identity.id, generation, "loading user data");

        let profile_key = Cache::key_for(PROFILE_KIND, &identity.id);
        let cached_profile = store.cache().get(&profile_key);
        report.profile_from_cache = cached_profile.is_some();

        let profile = async {
            match cached_profile {
                Some(profile) => Ok(profile),
                None => self
                    .source
                    .fetch_profile(identity)
                    .await
                    .map_err(|source| StoreError::Fetch {
                        target: LoadTarget::Profile.to_string(),
                        source,
                    }),
            }
        };
        let collections = join_all(
            Collection::ALL
                .iter()
                .map(|&collection| async move { (collection, self.fetch(identity, collection).await) }),
        );

        let (profile, collections) = futures::join!(profile, collections);

        if self.is_superseded(generation) {
            info!(user = %identity.id, generation, "load superseded, discarding results");
            report.discarded = true;
            return report;
        }

        let profile = match profile {
            Ok(profile) => {
                commit(store, paths::AUTH_PROFILE, profile.clone());
                report.succeeded.push(LoadTarget::Profile);
                Some(profile)
            }
            Err(e) => {
                warn!(user = %identity.id, fetch = "profile", error = %e, "fetch failed, keeping previous value");
                report.failed.push((LoadTarget::Profile, e));
                None
            }
        };

        let mut incomes = None;
        let mut expenses = None;
        for (collection, result) in collections {
            let target = LoadTarget::Collection(collection);
            let data = match result.and_then(|data| data.to_value().map(|value| (data, value))) {
                Ok((data, value)) => {
                    debug!(collection = %collection, records = data.len(), "collection loaded");
                    commit(store, collection.path(), value);
                    report.succeeded.push(target);
                    data
                }
                Err(e) => {
                    warn!(user = %identity.id, collection = %collection, error = %e, "fetch failed, keeping previous value");
                    report.failed.push((target, e));
                    continue;
                }
            };
            match collection {
                Collection::Incomes => incomes = Some(data),
                Collection::Expenses => expenses = Some(data),
                Collection::CreditSimulations => {}
            }
        }

        let movements = (
            incomes.as_ref().and_then(CollectionData::movements),
            expenses.as_ref().and_then(CollectionData::movements),
        );
        match movements {
            (Some(incomes), Some(expenses)) => {
                let summary = Summary::compute(incomes, expenses);
                match serde_json::to_value(&summary) {
                    Ok(value) => {
                        commit(store, paths::DATA_SUMMARY, value);
                        report.summary_written = true;
                    }
                    Err(e) => error!(error = %e, "failed to encode summary"),
                }
            }
            _ => warn!(user = %identity.id, "summary not recomputed, a source collection failed to load"),
        }

        // After the data writes, which invalidate this identity's entries.
        if let Some(profile) = profile {
            store.cache().set(profile_key, profile);
        }

        info!(
            user = %identity.id,
            generation,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "user data loaded"
        );
        report
    }

    async fn fetch(&self, identity: &Identity, collection: Collection) -> Result<CollectionData, StoreError> {
        let raw = self
            .source
            .fetch_collection(identity, collection)
            .await
            .map_err(|source| StoreError::Fetch {
                target: collection.to_string(),
                source,
            })?;
        CollectionData::from_raw(collection, &raw)
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.discard_superseded && self.current_generation() != generation
    }
}

fn commit(store: &Store, path: &str, value: Value) {
    if let Err(e) = store.set_state(path, value) {
        error!(path, error = %e, "failed to commit loaded value");
    }
}

/// Holds `loading` at true until dropped.
struct LoadingGuard<'a> {
    store: &'a Store,
    loader: &'a DataLoader,
    generation: u64,
}

impl<'a> LoadingGuard<'a> {
    fn engage(store: &'a Store, loader: &'a DataLoader, generation: u64) -> Self {
        commit(store, paths::LOADING, Value::Bool(true));
        Self {
            store,
            loader,
            generation,
        }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        // A superseded run leaves the flag to the newer one.
        if self.loader.is_superseded(self.generation) {
            return;
        }
        commit(self.store, paths::LOADING, Value::Bool(false));
    }
}
