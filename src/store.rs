//! Main Store struct tying all components together.

use crate::cache::Cache;
use crate::error::Result;
use crate::loader::{DataLoader, DataSource, LoadReport};
use crate::notifications::{NotificationIds, NotificationQueue};
use crate::state::{paths, StatePath, StateTree};
use crate::subscriptions::{panic_message, ListenerRegistry, Subscription};
use crate::types::{Identity, Notification, NotificationId, NotificationKind};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum number of cache entries.
    pub cache_capacity: usize,

    /// Lifetime of notifications created through the shortcut helpers.
    pub notification_duration_ms: u64,

    /// Message shown when an unexpected error reaches the store.
    pub unexpected_error_message: String,

    /// Drop the results of a load once a newer load has started.
    pub discard_superseded_loads: bool,
}

impl StoreConfig {
    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            notification_duration_ms: 3000,
            unexpected_error_message: "Ha ocurrido un error inesperado".to_string(),
            discard_superseded_loads: false,
        }
    }
}

/// The render collaborator, called with a full snapshot after every mutation.
pub trait Renderer: Send + Sync {
    fn render(&self, snapshot: &Value);
}

impl<F> Renderer for F
where
    F: Fn(&Value) + Send + Sync,
{
    fn render(&self, snapshot: &Value) {
        self(snapshot)
    }
}

/// Builder for a [`Store`] with optional collaborators.
pub struct StoreBuilder {
    config: StoreConfig,
    renderer: Option<Arc<dyn Renderer>>,
    source: Option<Arc<dyn DataSource>>,
}

impl StoreBuilder {
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn data_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn build(self) -> Arc<Store> {
        let StoreBuilder {
            config,
            renderer,
            source,
        } = self;

        Arc::new_cyclic(|this| Store {
            this: this.clone(),
            tree: RwLock::new(StateTree::new()),
            listeners: ListenerRegistry::new(),
            cache: Cache::new(config.cache_capacity),
            notification_ids: NotificationIds::new(),
            loader: source.map(|s| DataLoader::new(s, config.discard_superseded_loads)),
            renderer,
            config,
        })
    }
}

/// The state store.
///
/// Provides a unified interface for:
/// - Reading and writing the state tree by path
/// - Subscribing to changes with upward bubbling
/// - Caching loader results
/// - Queueing self-expiring notifications
/// - Loading a user's data on sign-in
///
/// Each instance is independent; share it with `Arc`.
pub struct Store {
    /// Weak self-reference handed to timers and spawned tasks.
    this: Weak<Store>,

    config: StoreConfig,

    /// The single state tree.
    tree: RwLock<StateTree>,

    listeners: ListenerRegistry,

    cache: Cache,

    notification_ids: NotificationIds,

    loader: Option<DataLoader>,

    renderer: Option<Arc<dyn Renderer>>,
}

impl Store {
    /// Create a store with no collaborators.
    pub fn new(config: StoreConfig) -> Arc<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: StoreConfig) -> StoreBuilder {
        StoreBuilder {
            config,
            renderer: None,
            source: None,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn loader(&self) -> Option<&DataLoader> {
        self.loader.as_ref()
    }

    // --- State Operations ---

    /// Get a copy of the value at `path`. `Ok(None)` if nothing is there.
    pub fn get_state(&self, path: &str) -> Result<Option<Value>> {
        let path = StatePath::parse(path)?;
        Ok(self.get_state_at(&path))
    }

    pub fn get_state_at(&self, path: &StatePath) -> Option<Value> {
        self.tree.read().get(path).cloned()
    }

    /// A copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.tree.read().snapshot()
    }

    /// Write `value` at `path`, then notify listeners and render.
    pub fn set_state(&self, path: &str, value: Value) -> Result<()> {
        let path = StatePath::parse(path)?;
        self.set_state_at(&path, value);
        Ok(())
    }

    pub fn set_state_at(&self, path: &StatePath, value: Value) {
        self.tree.write().set(path, value.clone());
        self.after_mutation(path, &value);
    }

    /// Atomically replace the value at `path` with `update(current)`.
    ///
    /// `update` runs under the tree lock and must not call back into the store.
    pub fn update_state<F>(&self, path: &str, update: F) -> Result<()>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let path = StatePath::parse(path)?;
        let value = {
            let mut tree = self.tree.write();
            let value = update(tree.get(&path));
            tree.set(&path, value.clone());
            value
        };
        self.after_mutation(&path, &value);
        Ok(())
    }

    /// Register `callback` on `path`.
    pub fn subscribe<F>(&self, path: &str, callback: F) -> Result<Subscription>
    where
        F: Fn(&Value, &StatePath) + Send + Sync + 'static,
    {
        let path = StatePath::parse(path)?;
        Ok(self.listeners.subscribe(path, callback))
    }

    /// Restore the default tree, notifying listeners on every top-level key.
    ///
    /// Only top-level listeners hear about the reset. A listener on a nested
    /// path such as `data.ingresos` is not called even though its value goes
    /// back to the default.
    pub fn reset_state(&self) {
        let root = {
            let mut tree = self.tree.write();
            tree.reset();
            tree.snapshot()
        };

        if let Value::Object(map) = &root {
            for (key, value) in map {
                if let Ok(path) = StatePath::parse(key) {
                    self.listeners.notify(&path, value, |p| self.get_state_at(p));
                }
            }
        }
        self.render();
    }

    fn after_mutation(&self, path: &StatePath, value: &Value) {
        debug!(path = %path, "state updated");

        if path.is_under(paths::DATA) {
            self.invalidate_identity_cache();
        }

        self.listeners
            .notify(path, value, |ancestor| self.get_state_at(ancestor));
        self.render();
    }

    fn invalidate_identity_cache(&self) {
        match self.current_identity_id() {
            Some(id) => {
                self.cache.invalidate_identity(&id);
            }
            None => self.cache.clear(),
        }
    }

    /// Id of the signed-in user, read from `auth.user.id`.
    pub fn current_identity_id(&self) -> Option<String> {
        match self.get_state(paths::AUTH_USER_ID).ok().flatten()? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// A panicking renderer is logged and the mutation still completes.
    /// Nothing is rendered while the thread is already unwinding.
    fn render(&self) {
        let Some(renderer) = &self.renderer else {
            return;
        };
        if std::thread::panicking() {
            return;
        }
        let snapshot = self.snapshot();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| renderer.render(&snapshot))) {
            error!(error = %panic_message(payload.as_ref()), "renderer panicked");
        }
    }

    // --- Session ---

    /// Start from defaults, render once, and sign in if a session exists.
    pub async fn init(&self, session: Option<Identity>) -> Option<LoadReport> {
        self.reset_state();
        match session {
            Some(identity) => self.sign_in(identity).await,
            None => None,
        }
    }

    /// Entry point for the session collaborator.
    pub async fn on_session_change(&self, session: Option<Identity>) -> Option<LoadReport> {
        match session {
            Some(identity) => self.sign_in(identity).await,
            None => {
                self.sign_out();
                None
            }
        }
    }

    /// Record the user and load their data.
    pub async fn sign_in(&self, identity: Identity) -> Option<LoadReport> {
        info!(user = %identity.id, "signed in");
        match serde_json::to_value(&identity) {
            Ok(user) => self.commit(paths::AUTH_USER, user),
            Err(e) => error!(user = %identity.id, error = %e, "failed to encode identity"),
        }
        self.load_user_data(&identity).await
    }

    /// Reset the tree to defaults and empty the cache.
    pub fn sign_out(&self) {
        info!("signed out");
        self.cache.clear();
        self.reset_state();
    }

    /// Load profile and collections for `identity`.
    ///
    /// Returns `None` when the store has no data source.
    pub async fn load_user_data(&self, identity: &Identity) -> Option<LoadReport> {
        match &self.loader {
            Some(loader) => Some(loader.load_user_data(self, identity).await),
            None => {
                warn!(user = %identity.id, "no data source configured, skipping load");
                None
            }
        }
    }

    fn commit(&self, path: &str, value: Value) {
        if let Err(e) = self.set_state(path, value) {
            error!(path, error = %e, "failed to commit value");
        }
    }

    // --- Notifications ---

    /// Append a notification that removes itself after `duration`.
    ///
    /// A zero duration keeps it until [`remove_notification`](Self::remove_notification).
    /// Expiry needs a Tokio runtime; without one nothing is queued.
    pub fn add_notification(
        &self,
        message: impl Into<String>,
        kind: NotificationKind,
        duration: Duration,
    ) -> Result<NotificationId> {
        let runtime = if duration.is_zero() {
            None
        } else {
            Some(NotificationQueue::runtime()?)
        };

        let notification =
            NotificationQueue::create(&self.notification_ids, message, kind, duration);
        let id = notification.id;
        let encoded = serde_json::to_value(&notification)?;

        self.update_state(paths::UI_NOTIFICATIONS, |current| {
            NotificationQueue::appended(current, encoded)
        })?;
        debug!(notification = %id, ?kind, "notification added");

        if let Some(runtime) = runtime {
            NotificationQueue::schedule_removal(&runtime, self.this.clone(), id, duration);
        }
        Ok(id)
    }

    /// Remove a notification by id. Unknown ids are ignored.
    pub fn remove_notification(&self, id: NotificationId) -> Result<()> {
        self.update_state(paths::UI_NOTIFICATIONS, |current| {
            NotificationQueue::without(current, id)
        })
    }

    /// Notifications currently queued.
    pub fn notifications(&self) -> Vec<Notification> {
        let tree = self.tree.read();
        let path = StatePath::parse(paths::UI_NOTIFICATIONS).ok();
        NotificationQueue::decode(path.as_ref().and_then(|p| tree.get(p)))
    }

    pub fn notify_success(&self, message: impl Into<String>) -> Result<NotificationId> {
        self.add_notification(message, NotificationKind::Success, self.config.notification_duration())
    }

    pub fn notify_error(&self, message: impl Into<String>) -> Result<NotificationId> {
        self.add_notification(message, NotificationKind::Error, self.config.notification_duration())
    }

    // --- Unexpected Errors ---

    /// Log an unexpected error and show the generic error notification.
    ///
    /// Outside a Tokio runtime the notification is sticky, since there is
    /// no timer to expire it.
    pub fn report_unexpected(&self, err: &dyn fmt::Display) {
        error!(error = %err, "unexpected error");
        let duration = match NotificationQueue::runtime() {
            Ok(_) => self.config.notification_duration(),
            Err(_) => Duration::ZERO,
        };
        let message = self.config.unexpected_error_message.clone();
        if let Err(e) = self.add_notification(message, NotificationKind::Error, duration) {
            warn!(error = %e, "could not show unexpected-error notification");
        }
    }

    /// Run a fallible task on the current runtime; its error goes to
    /// [`report_unexpected`](Self::report_unexpected).
    pub fn spawn_reported<F>(&self, task: F) -> Result<JoinHandle<()>>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let runtime = NotificationQueue::runtime()?;
        let store = self.this.clone();
        Ok(runtime.spawn(async move {
            if let Err(e) = task.await {
                let message = format!("{:#}", e);
                match store.upgrade() {
                    Some(store) => store.report_unexpected(&message),
                    None => error!(error = %message, "task failed after store was dropped"),
                }
            }
        }))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("config", &self.config)
            .field("listeners", &self.listeners.listener_count())
            .field("cache_entries", &self.cache.len())
            .field("has_loader", &self.loader.is_some())
            .field("has_renderer", &self.renderer.is_some())
            .finish()
    }
}
