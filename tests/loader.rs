//! Loader tests against an in-memory data source.

use async_trait::async_trait;
use cashflow_store::{
    Collection, DataSource, Identity, LoadTarget, Store, StoreConfig, StoreError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Canned responses per collection, with optional per-user latency.
#[derive(Default)]
struct MockSource {
    profile: Mutex<Option<Value>>,
    collections: Mutex<HashMap<Collection, Result<Vec<Value>, String>>>,
    delays: Mutex<HashMap<String, Duration>>,
    /// Collection name returns its data tagged with the user id when set.
    tag_with_user: bool,
    /// Collection whose fetch panics instead of returning.
    panic_on: Option<Collection>,
    profile_fetches: AtomicUsize,
    events: Mutex<Vec<String>>,
}

impl MockSource {
    fn healthy() -> Self {
        let source = Self::default();
        *source.profile.lock() = Some(json!({"name": "Ana", "currency": "EUR"}));
        source.set(
            Collection::Incomes,
            Ok(vec![
                json!({"id": "i1", "amount": 1000, "date": "2024-01-31"}),
                json!({"id": "i2", "amount": "250.5", "date": "2024-02-10"}),
            ]),
        );
        source.set(
            Collection::Expenses,
            Ok(vec![json!({"id": "e1", "amount": 300, "date": "2024-01-15", "category": "rent"})]),
        );
        source.set(
            Collection::CreditSimulations,
            Ok(vec![json!({
                "id": "s1", "amount": 5000, "annualRate": 9.5, "termMonths": 24, "date": "2024-01-02"
            })]),
        );
        source
    }

    fn set(&self, collection: Collection, result: Result<Vec<Value>, String>) {
        self.collections.lock().insert(collection, result);
    }

    fn delay_for(&self, user: &str, delay: Duration) {
        self.delays.lock().insert(user.to_string(), delay);
    }

    async fn pause(&self, identity: &Identity) {
        let delay = self.delays.lock().get(&identity.id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn fetch_profile(&self, identity: &Identity) -> anyhow::Result<Value> {
        self.profile_fetches.fetch_add(1, Ordering::SeqCst);
        self.events.lock().push("start:profile".to_string());
        self.pause(identity).await;
        self.events.lock().push("end:profile".to_string());
        let profile = self.profile.lock().clone();
        profile.ok_or_else(|| anyhow::anyhow!("profile unavailable"))
    }

    async fn fetch_collection(
        &self,
        identity: &Identity,
        collection: Collection,
    ) -> anyhow::Result<Vec<Value>> {
        self.events.lock().push(format!("start:{}", collection));
        self.pause(identity).await;
        self.events.lock().push(format!("end:{}", collection));

        let result = self
            .collections
            .lock()
            .get(&collection)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()));
        if self.panic_on == Some(collection) {
            panic!("{} backend crashed", collection);
        }
        let mut records = result.map_err(|e| anyhow::anyhow!(e))?;
        if self.tag_with_user {
            for r in &mut records {
                r["description"] = json!(identity.id.clone());
            }
        }
        Ok(records)
    }
}

fn store_with(source: Arc<MockSource>, config: StoreConfig) -> Arc<Store> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Store::builder(config).data_source(source).build()
}

// --- Happy Path ---

#[tokio::test]
async fn test_sign_in_loads_everything() {
    let source = Arc::new(MockSource::healthy());
    let store = store_with(Arc::clone(&source), StoreConfig::default());

    let report = store.sign_in(Identity::new("42")).await.unwrap();

    assert!(report.is_complete());
    assert!(report.summary_written);
    assert_eq!(report.succeeded.len(), 4);

    assert_eq!(store.get_state("auth.user.id").unwrap(), Some(json!("42")));
    assert_eq!(store.get_state("auth.profile.name").unwrap(), Some(json!("Ana")));
    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));

    let incomes = store.get_state("data.ingresos").unwrap().unwrap();
    assert_eq!(incomes.as_array().map(Vec::len), Some(2));
    // Validated and normalized at the boundary.
    assert_eq!(incomes[1]["amount"], json!(250.5));
    assert_eq!(incomes[1]["date"], json!("2024-02-10"));

    let summary = store.get_state("data.resumen").unwrap().unwrap();
    assert_eq!(summary["totalIncome"], json!(1250.5));
    assert_eq!(summary["totalExpenses"], json!(300.0));
    assert_eq!(summary["balance"], json!(950.5));
    assert_eq!(summary["byMonth"]["2024-01"], json!({"income": 1000.0, "expenses": 300.0}));

    let sims = store.get_state("data.simulaciones").unwrap().unwrap();
    assert_eq!(sims[0]["termMonths"], json!(24));
}

#[tokio::test]
async fn test_loading_flag_brackets_the_load() {
    let source = Arc::new(MockSource::healthy());
    let store = store_with(source, StoreConfig::default());
    let flags: Arc<Mutex<Vec<Value>>> = Arc::default();

    let f = Arc::clone(&flags);
    let _sub = store
        .subscribe("loading", move |v, _| f.lock().push(v.clone()))
        .unwrap();

    store.load_user_data(&Identity::new("1")).await;

    assert_eq!(*flags.lock(), vec![json!(true), json!(false)]);
}

#[tokio::test(start_paused = true)]
async fn test_fetches_fan_out_before_any_completes() {
    let source = Arc::new(MockSource::healthy());
    source.delay_for("1", Duration::from_millis(20));
    let store = store_with(Arc::clone(&source), StoreConfig::default());

    store.load_user_data(&Identity::new("1")).await;

    let events = source.events.lock().clone();
    assert_eq!(events.len(), 8);
    let first_end = events.iter().position(|e| e.starts_with("end:")).unwrap();
    assert_eq!(first_end, 4, "all four fetches start before any finishes: {:?}", events);
}

// --- Partial Failure ---

#[tokio::test]
async fn test_failed_fetch_keeps_previous_value() {
    let source = Arc::new(MockSource::healthy());
    source.set(Collection::Expenses, Err("backend timeout".to_string()));
    let store = store_with(Arc::clone(&source), StoreConfig::default());
    store.set_state("data.gastos", json!([])).unwrap();

    let report = store.load_user_data(&Identity::new("1")).await.unwrap();

    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));
    assert_eq!(
        store.get_state("data.ingresos").unwrap().unwrap().as_array().map(Vec::len),
        Some(2)
    );
    assert_eq!(
        store.get_state("data.simulaciones").unwrap().unwrap().as_array().map(Vec::len),
        Some(1)
    );
    assert_eq!(store.get_state("data.gastos").unwrap(), Some(json!([])));

    assert_eq!(
        report.failed_targets(),
        vec![LoadTarget::Collection(Collection::Expenses)]
    );
    assert!(matches!(report.failed[0].1, StoreError::Fetch { .. }));
    // Summary needs both incomes and expenses.
    assert!(!report.summary_written);
    assert_eq!(store.get_state("data.resumen").unwrap(), Some(Value::Null));
}

#[tokio::test]
async fn test_malformed_record_fails_only_its_collection() {
    let source = Arc::new(MockSource::healthy());
    source.set(
        Collection::Incomes,
        Ok(vec![json!({"id": "bad", "amount": "lots", "date": "2024-01-01"})]),
    );
    let store = store_with(Arc::clone(&source), StoreConfig::default());

    let report = store.load_user_data(&Identity::new("1")).await.unwrap();

    assert_eq!(
        report.failed_targets(),
        vec![LoadTarget::Collection(Collection::Incomes)]
    );
    assert!(report.failed[0].1.is_validation());
    // Never loaded, so still "not loaded" rather than a NaN-tainted list.
    assert_eq!(store.get_state("data.ingresos").unwrap(), Some(Value::Null));
    assert!(store.get_state("data.gastos").unwrap().unwrap().is_array());
}

#[tokio::test]
async fn test_everything_failing_still_resets_loading() {
    let source = Arc::new(MockSource::default());
    for c in Collection::ALL {
        source.set(c, Err("down".to_string()));
    }
    let store = store_with(Arc::clone(&source), StoreConfig::default());

    let report = store.load_user_data(&Identity::new("1")).await.unwrap();

    assert_eq!(report.failed.len(), 4);
    assert!(report.succeeded.is_empty());
    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));
    assert_eq!(store.get_state("auth.profile").unwrap(), Some(Value::Null));
}

#[tokio::test]
async fn test_empty_collection_is_distinct_from_not_loaded() {
    let source = Arc::new(MockSource::healthy());
    source.set(Collection::Expenses, Ok(Vec::new()));
    let store = store_with(Arc::clone(&source), StoreConfig::default());

    assert_eq!(store.get_state("data.gastos").unwrap(), Some(Value::Null));
    store.load_user_data(&Identity::new("1")).await;
    assert_eq!(store.get_state("data.gastos").unwrap(), Some(json!([])));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_load_resets_loading() {
    let source = Arc::new(MockSource::healthy());
    source.delay_for("1", Duration::from_secs(10));
    let store = store_with(Arc::clone(&source), StoreConfig::default());

    let identity = Identity::new("1");
    let result = tokio::time::timeout(
        Duration::from_millis(5),
        store.load_user_data(&identity),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));
}

#[tokio::test]
async fn test_panicking_renderer_during_load() {
    let source: Arc<dyn DataSource> = Arc::new(MockSource::healthy());
    let store = Store::builder(StoreConfig::default())
        .renderer(|snapshot: &Value| {
            if snapshot["data"]["ingresos"].is_array() {
                panic!("renderer cannot draw incomes");
            }
        })
        .data_source(source)
        .build();

    let task_store = Arc::clone(&store);
    let report = tokio::spawn(async move { task_store.load_user_data(&Identity::new("1")).await })
        .await
        .unwrap()
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));
    assert!(store.get_state("data.ingresos").unwrap().unwrap().is_array());
    assert!(store.get_state("data.resumen").unwrap().unwrap().is_object());
}

#[tokio::test]
async fn test_panicking_source_still_resets_loading() {
    let mut source = MockSource::healthy();
    source.panic_on = Some(Collection::Expenses);
    let frames = Arc::new(Mutex::new(0usize));
    let f = Arc::clone(&frames);
    let store = Store::builder(StoreConfig::default())
        .renderer(move |_: &Value| *f.lock() += 1)
        .data_source(Arc::new(source))
        .build();

    let task_store = Arc::clone(&store);
    let result = tokio::spawn(async move { task_store.load_user_data(&Identity::new("1")).await }).await;

    assert!(result.unwrap_err().is_panic());
    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));
    // One frame for `loading = true`; none while unwinding.
    assert_eq!(*frames.lock(), 1);
}

// --- Cache ---

#[tokio::test]
async fn test_profile_served_from_cache_until_data_changes() {
    let source = Arc::new(MockSource::healthy());
    let store = store_with(Arc::clone(&source), StoreConfig::default());
    let identity = Identity::new("42");

    let first = store.sign_in(identity.clone()).await.unwrap();
    assert!(!first.profile_from_cache);
    assert!(store.cache().has("profile_42"));

    let second = store.load_user_data(&identity).await.unwrap();
    assert!(second.profile_from_cache);
    assert_eq!(source.profile_fetches.load(Ordering::SeqCst), 1);

    store.set_state("data.gastos", json!([])).unwrap();
    assert!(!store.cache().has("profile_42"));

    let third = store.load_user_data(&identity).await.unwrap();
    assert!(!third.profile_from_cache);
    assert_eq!(source.profile_fetches.load(Ordering::SeqCst), 2);
}

// --- Session ---

#[tokio::test]
async fn test_init_and_session_changes() {
    let source = Arc::new(MockSource::healthy());
    let store = store_with(Arc::clone(&source), StoreConfig::default());

    assert!(store.init(None).await.is_none());
    assert_eq!(store.get_state("auth.user").unwrap(), Some(Value::Null));

    let report = store.on_session_change(Some(Identity::new("7"))).await;
    assert!(report.is_some());
    assert!(store.get_state("data.ingresos").unwrap().unwrap().is_array());

    assert!(store.on_session_change(None).await.is_none());
    assert_eq!(store.get_state("data.ingresos").unwrap(), Some(Value::Null));
    assert!(store.cache().is_empty());
}

#[tokio::test]
async fn test_store_without_source_skips_load() {
    let store = Store::new(StoreConfig::default());
    assert!(store.sign_in(Identity::new("1")).await.is_none());
    assert_eq!(store.get_state("auth.user.id").unwrap(), Some(json!("1")));
    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));
}

// --- Overlapping Loads ---

fn racing_source() -> Arc<MockSource> {
    let mut source = MockSource::healthy();
    source.tag_with_user = true;
    source.delay_for("slow", Duration::from_millis(100));
    source.delay_for("fast", Duration::from_millis(10));
    Arc::new(source)
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_loads_last_write_wins_by_default() {
    let store = store_with(racing_source(), StoreConfig::default());
    let slow = Identity::new("slow");
    let fast = Identity::new("fast");

    let (a, b) = tokio::join!(store.load_user_data(&slow), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        store.load_user_data(&fast).await
    });

    assert!(!a.unwrap().discarded);
    assert!(!b.unwrap().discarded);
    // The earlier, slower run landed last.
    assert_eq!(
        store.get_state("data.ingresos.0.description").unwrap(),
        Some(json!("slow"))
    );
    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));
}

#[tokio::test(start_paused = true)]
async fn test_superseded_load_is_discarded_when_enabled() {
    let config = StoreConfig {
        discard_superseded_loads: true,
        ..Default::default()
    };
    let store = store_with(racing_source(), config);
    let slow = Identity::new("slow");
    let fast = Identity::new("fast");

    let (a, b) = tokio::join!(store.load_user_data(&slow), async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        store.load_user_data(&fast).await
    });

    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a.discarded);
    assert!(!b.discarded);
    assert_eq!(b.generation, a.generation + 1);
    assert_eq!(
        store.get_state("data.ingresos.0.description").unwrap(),
        Some(json!("fast"))
    );
    assert_eq!(store.get_state("loading").unwrap(), Some(json!(false)));
}
