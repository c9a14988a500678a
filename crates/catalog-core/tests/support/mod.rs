//! Shared fakes for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use catalog_cache::{
    CatalogError, CatalogRecord, MemoryRecordStore, RecordId, RecordStore, RemoteCatalogClient,
    Result, VersionToken,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn record(id: &str, name: &str) -> Value {
    json!({"id": id, "primaryName": name, "popularityCount": 0})
}

pub fn record_with_popularity(id: &str, name: &str, popularity: u64) -> Value {
    json!({"id": id, "primaryName": name, "popularityCount": popularity})
}

pub fn retire(id: &str) -> Value {
    json!({"id": id, "status": "RETIRED"})
}

pub fn updates_body(version: &str, updates: Vec<Value>) -> Value {
    json!({"data": {"version": version, "updates": updates}})
}

struct FakeState {
    version: String,
    records: BTreeMap<String, Value>,
    updates: HashMap<String, Value>,
    failing_pages: HashSet<u32>,
    page_overrides: HashMap<u32, Value>,
    fail_version: bool,
}

/// Scriptable in-process catalog server.
///
/// Serves pages sorted by id from its current catalog. `publish` advances the
/// catalog and registers the matching delta batch for the previous version.
pub struct FakeRemote {
    state: Mutex<FakeState>,
    pub version_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
    pub update_calls: AtomicUsize,
    hold_pages: AtomicBool,
}

impl FakeRemote {
    pub fn new(version: &str, records: Vec<Value>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (id_of(&r), r))
            .collect();
        Self {
            state: Mutex::new(FakeState {
                version: version.to_string(),
                records,
                updates: HashMap::new(),
                failing_pages: HashSet::new(),
                page_overrides: HashMap::new(),
                fail_version: false,
            }),
            version_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            hold_pages: AtomicBool::new(false),
        }
    }

    /// `n` records named "Item 0000".. with ids "0000"..
    pub fn with_generated(version: &str, n: usize) -> Self {
        let records = (0..n)
            .map(|i| record(&format!("{:04}", i), &format!("Item {:04}", i)))
            .collect();
        Self::new(version, records)
    }

    /// Apply `updates` to the catalog, move to `version`, and serve the batch
    /// to clients at the previous version.
    pub fn publish(&self, version: &str, updates: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        for entry in &updates {
            let id = id_of(entry);
            let retired = entry.get("status").and_then(Value::as_str) == Some("RETIRED");
            if retired {
                state.records.remove(&id);
            } else {
                state.records.insert(id, entry.clone());
            }
        }
        let previous = std::mem::replace(&mut state.version, version.to_string());
        state.updates.insert(previous, updates_body(version, updates));
    }

    /// Serve `body` verbatim for updates requested since `since`.
    pub fn set_updates_body(&self, since: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .updates
            .insert(since.to_string(), body);
    }

    /// Fail every request for `page` with a network error until cleared.
    pub fn fail_page(&self, page: u32) {
        self.state.lock().unwrap().failing_pages.insert(page);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_pages.clear();
        state.fail_version = false;
    }

    pub fn fail_version(&self) {
        self.state.lock().unwrap().fail_version = true;
    }

    pub fn override_page(&self, page: u32, body: Value) {
        self.state.lock().unwrap().page_overrides.insert(page, body);
    }

    /// Keep page requests pending until `release_pages` is called.
    pub fn hold_pages(&self) {
        self.hold_pages.store(true, Ordering::SeqCst);
    }

    pub fn release_pages(&self) {
        self.hold_pages.store(false, Ordering::SeqCst);
    }

    pub fn catalog(&self) -> BTreeMap<String, Value> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn version(&self) -> String {
        self.state.lock().unwrap().version.clone()
    }
}

fn id_of(value: &Value) -> String {
    match &value["id"] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn network_error(what: &str) -> CatalogError {
    CatalogError::Network {
        message: format!("{} unreachable", what),
        cause: None,
    }
}

#[async_trait]
impl RemoteCatalogClient for FakeRemote {
    async fn fetch_version(&self) -> Result<Value> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let state = self.state.lock().unwrap();
        if state.fail_version {
            return Err(network_error("version"));
        }
        Ok(json!({"version": state.version, "count": state.records.len()}))
    }

    async fn fetch_page(&self, page: u32, limit: u32) -> Result<Value> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        while self.hold_pages.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        tokio::task::yield_now().await;

        let state = self.state.lock().unwrap();
        if state.failing_pages.contains(&page) {
            return Err(network_error(&format!("page {}", page)));
        }
        if let Some(body) = state.page_overrides.get(&page) {
            return Ok(body.clone());
        }

        let total = state.records.len();
        let start = (page as usize - 1) * limit as usize;
        let data: Vec<Value> = state
            .records
            .values()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect();
        let has_more = start + data.len() < total;
        Ok(json!({"data": data, "pagination": {"total": total, "hasMore": has_more}}))
    }

    async fn fetch_updates(&self, since: &VersionToken) -> Result<Value> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        let state = self.state.lock().unwrap();
        match state.updates.get(since.as_str()) {
            Some(body) => Ok(body.clone()),
            None => Err(CatalogError::HttpStatus {
                url: format!("fake://updates?since={}", since),
                status: 410,
            }),
        }
    }
}

/// Memory store that fails `upsert_many` once a call budget is used up.
pub struct FailingStore {
    inner: MemoryRecordStore,
    upserts_left: Mutex<Option<usize>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            upserts_left: Mutex::new(None),
        }
    }

    /// Allow `n` more successful upserts, then fail.
    pub fn fail_upserts_after(&self, n: usize) {
        *self.upserts_left.lock().unwrap() = Some(n);
    }

    pub fn heal(&self) {
        *self.upserts_left.lock().unwrap() = None;
    }
}

impl RecordStore for FailingStore {
    fn get(&self, id: &RecordId) -> Result<Option<CatalogRecord>> {
        self.inner.get(id)
    }

    fn upsert_many(&self, records: &[CatalogRecord]) -> Result<()> {
        let mut left = self.upserts_left.lock().unwrap();
        match left.as_mut() {
            Some(0) => {
                return Err(CatalogError::Storage {
                    message: "disk full".to_string(),
                })
            }
            Some(n) => *n -= 1,
            None => {}
        }
        self.inner.upsert_many(records)
    }

    fn increment_popularity(&self, id: &RecordId) -> Result<Option<u64>> {
        self.inner.increment_popularity(id)
    }

    fn delete_many(&self, ids: &[RecordId]) -> Result<()> {
        self.inner.delete_many(ids)
    }

    fn count(&self) -> Result<u64> {
        self.inner.count()
    }

    fn scan_all(&self) -> Result<Vec<CatalogRecord>> {
        self.inner.scan_all()
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

/// Memory store that parks the next point read or popularity bump of one id
/// on the calling thread until `release` is called. A read parks after it has
/// fetched the row; a bump parks before it touches the row.
pub struct GatedStore {
    inner: MemoryRecordStore,
    gated: Mutex<Option<RecordId>>,
    entered: AtomicBool,
    released: AtomicBool,
}

impl GatedStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            gated: Mutex::new(None),
            entered: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn gate(&self, id: &str) {
        self.released.store(false, Ordering::SeqCst);
        self.entered.store(false, Ordering::SeqCst);
        *self.gated.lock().unwrap() = Some(RecordId::from(id));
    }

    /// Wait until a caller is parked at the gate.
    pub async fn wait_entered(&self) {
        while !self.entered.load(Ordering::SeqCst) {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn park_if_gated(&self, id: &RecordId) {
        let hit = {
            let mut gated = self.gated.lock().unwrap();
            if gated.as_ref() == Some(id) {
                *gated = None;
                true
            } else {
                false
            }
        };
        if hit {
            self.entered.store(true, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        }
    }
}

impl RecordStore for GatedStore {
    fn get(&self, id: &RecordId) -> Result<Option<CatalogRecord>> {
        let record = self.inner.get(id)?;
        self.park_if_gated(id);
        Ok(record)
    }

    fn upsert_many(&self, records: &[CatalogRecord]) -> Result<()> {
        self.inner.upsert_many(records)
    }

    fn increment_popularity(&self, id: &RecordId) -> Result<Option<u64>> {
        self.park_if_gated(id);
        self.inner.increment_popularity(id)
    }

    fn delete_many(&self, ids: &[RecordId]) -> Result<()> {
        self.inner.delete_many(ids)
    }

    fn count(&self) -> Result<u64> {
        self.inner.count()
    }

    fn scan_all(&self) -> Result<Vec<CatalogRecord>> {
        self.inner.scan_all()
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

/// Store contents as `id -> primary name`.
pub fn names(store: &dyn RecordStore) -> BTreeMap<String, String> {
    store
        .scan_all()
        .unwrap()
        .into_iter()
        .map(|r| (r.id.to_string(), r.primary_name))
        .collect()
}

/// Catalog contents as `id -> primary name`.
pub fn catalog_names(remote: &FakeRemote) -> BTreeMap<String, String> {
    remote
        .catalog()
        .into_iter()
        .map(|(id, r)| (id, r["primaryName"].as_str().unwrap_or_default().to_string()))
        .collect()
}
