use super::change::{Change, ChangeKind};
use super::{CatalogStore, Collection, OpKind, Payload, UPLOAD_FIELD};
use crate::core::{RemoteId, StoreError, StoreResult, Value};
use crate::model::record::{self, Record};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Injected failure for calls matching a collection and operation.
#[derive(Debug, Clone)]
pub struct FaultRule {
    collection: Collection,
    /// `OpKind::List` matches fetch and list calls
    op: OpKind,
    /// Resource identity for updates/deletes/fetches, parent identity for creates/lists
    target: Option<RemoteId>,
    field: Option<(String, Value)>,
    remaining: Option<usize>,
    error: StoreError,
}

impl FaultRule {
    /// Fail every `op` call against `collection`
    pub fn new(collection: Collection, op: OpKind) -> Self {
        Self {
            collection,
            op,
            target: None,
            field: None,
            remaining: None,
            error: StoreError::rejected(500, "injected failure"),
        }
    }

    /// Fail fetch and list calls against `collection`
    pub fn reads(collection: Collection) -> Self {
        Self::new(collection, OpKind::List)
    }

    pub fn target(mut self, id: RemoteId) -> Self {
        self.target = Some(id);
        self
    }

    /// Only match payloads carrying `key = value`
    pub fn when_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.field = Some((key.to_string(), value.into()));
        self
    }

    /// Stop matching after `n` failures
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    pub fn error(mut self, error: StoreError) -> Self {
        self.error = error;
        self
    }

    fn matches(&self, collection: Collection, op: OpKind, target: Option<RemoteId>, payload: Option<&Payload>) -> bool {
        if self.collection != collection || self.op != op {
            return false;
        }
        if self.target.is_some() && self.target != target {
            return false;
        }
        match (&self.field, payload) {
            (None, _) => true,
            (Some((key, value)), Some(payload)) => payload.get(key) == Some(value),
            (Some(_), None) => false,
        }
    }
}

#[derive(Debug, Clone)]
struct Row {
    parent: Option<RemoteId>,
    record: Record,
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<RemoteId, Row>,
}

impl Table {
    fn children_of(&self, parent: RemoteId) -> Vec<RemoteId> {
        self.rows
            .iter()
            .filter(|(_, row)| row.parent == Some(parent))
            .map(|(id, _)| *id)
            .collect()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store kept entirely in memory.
///
/// Behaves like the HTTP API for the engine's purposes: parent identities
/// are checked, color deletes cascade to images, uploads get a media path.
/// Every accepted mutation lands in a journal; latency and failures can be
/// injected.
pub struct InMemoryStore {
    /// Tables with individual locks
    tables: HashMap<Collection, Arc<RwLock<Table>>>,
    journal: RwLock<Vec<Change>>,
    faults: Mutex<Vec<FaultRule>>,
    next_id: AtomicI64,
    seq: AtomicU64,
    calls: AtomicUsize,
    reads: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    latency: Duration,
}

impl InMemoryStore {
    pub fn new() -> Self {
        let tables = [
            Collection::Products,
            Collection::Colors,
            Collection::ColorImages,
            Collection::Sizes,
            Collection::Features,
            Collection::Categories,
        ]
        .into_iter()
        .map(|collection| (collection, Arc::new(RwLock::new(Table::default()))))
        .collect();

        Self {
            tables,
            journal: RwLock::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            seq: AtomicU64::new(1),
            calls: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Delay applied to every call, so concurrent calls overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn table(&self, collection: Collection) -> StoreResult<Arc<RwLock<Table>>> {
        self.tables
            .get(&collection)
            .cloned()
            .ok_or_else(|| StoreError::Unsupported(format!("no table for {}", collection)))
    }

    pub async fn inject(&self, rule: FaultRule) {
        self.faults.lock().await.push(rule);
    }

    pub async fn clear_faults(&self) {
        self.faults.lock().await.clear();
    }

    /// Accepted mutations in completion order
    pub async fn journal(&self) -> Vec<Change> {
        self.journal.read().await.clone()
    }

    pub async fn clear_journal(&self) {
        self.journal.write().await.clear();
    }

    /// Total calls received, failed ones and reads included
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.reads.store(0, Ordering::SeqCst);
        self.peak_in_flight.store(0, Ordering::SeqCst);
    }

    /// Inserts a record directly, bypassing journal, faults and latency
    pub async fn seed(&self, collection: Collection, parent: Option<RemoteId>, fields: JsonValue) -> StoreResult<RemoteId> {
        let mut record = match fields {
            JsonValue::Object(record) => record,
            _ => return Err(StoreError::decode("seed record must be an object")),
        };
        let id = RemoteId(self.next_id.fetch_add(1, Ordering::SeqCst));
        record.insert("id".to_string(), JsonValue::from(id.get()));
        if let (Some(parent_id), Some(key)) = (parent, parent_key(collection)) {
            record.insert(key.to_string(), JsonValue::from(parent_id.get()));
        }

        let table = self.table(collection)?;
        table.write().await.rows.insert(id, Row { parent, record });
        Ok(id)
    }

    /// Current record of a resource, without counting as a call
    pub async fn record(&self, collection: Collection, id: RemoteId) -> Option<Record> {
        let table = self.table(collection).ok()?;
        let table = table.read().await;
        table.rows.get(&id).map(|row| row.record.clone())
    }

    /// Current children of `parent`, ordered like a list call, without counting as a call
    pub async fn records(&self, collection: Collection, parent: Option<RemoteId>) -> Vec<Record> {
        match self.table(collection) {
            Ok(table) => sorted_records(&*table.read().await, parent),
            Err(_) => Vec::new(),
        }
    }

    fn enter(&self) -> InFlight<'_> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(&self.in_flight)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn check_fault(
        &self,
        collection: Collection,
        op: OpKind,
        target: Option<RemoteId>,
        payload: Option<&Payload>,
    ) -> StoreResult<()> {
        let mut faults = self.faults.lock().await;
        let Some(index) = faults
            .iter()
            .position(|rule| rule.matches(collection, op, target, payload))
        else {
            return Ok(());
        };

        let error = faults[index].error.clone();
        if let Some(remaining) = faults[index].remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                faults.remove(index);
            }
        }
        Err(error)
    }

    async fn require_parent(&self, collection: Collection, parent: Option<RemoteId>) -> StoreResult<()> {
        let Some(parent_collection) = collection.parent() else {
            return Ok(());
        };
        let parent_id = parent.ok_or_else(|| {
            StoreError::Unsupported(format!("{} requires a parent identity", collection))
        })?;
        let table = self.table(parent_collection)?;
        if table.read().await.rows.contains_key(&parent_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("{}/{}", parent_collection, parent_id)))
        }
    }

    async fn log(&self, kind: ChangeKind, collection: Collection, id: RemoteId, parent: Option<RemoteId>, payload: Option<&Payload>, started: u64) {
        let finished = self.seq.fetch_add(1, Ordering::SeqCst);
        let (fields, values, with_upload) = match payload {
            Some(payload) => (
                payload.field_names().into_iter().map(str::to_string).collect(),
                payload
                    .fields
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.clone()))
                    .collect(),
                payload.upload.is_some(),
            ),
            None => (Vec::new(), Vec::new(), false),
        };

        self.journal.write().await.push(Change {
            kind,
            collection,
            id,
            parent,
            fields,
            values,
            with_upload,
            started,
            finished,
            recorded_at: Utc::now(),
        });
    }

    async fn remove_cascade(&self, collection: Collection, id: RemoteId) -> StoreResult<()> {
        let children: &[Collection] = match collection {
            Collection::Products => &[Collection::Colors, Collection::Sizes, Collection::Features],
            Collection::Colors => &[Collection::ColorImages],
            _ => &[],
        };

        for child in children {
            let ids = self.table(*child)?.read().await.children_of(id);
            for child_id in ids {
                Box::pin(self.remove_cascade(*child, child_id)).await?;
            }
        }

        self.table(collection)?.write().await.rows.remove(&id);
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn parent_key(collection: Collection) -> Option<&'static str> {
    match collection.parent()? {
        Collection::Products => Some("product"),
        Collection::Colors => Some("color"),
        _ => None,
    }
}

fn media_path(collection: Collection, file_name: &str) -> String {
    format!("media/{}/{}-{}", collection, uuid::Uuid::new_v4().simple(), file_name)
}

fn sorted_records(table: &Table, parent: Option<RemoteId>) -> Vec<Record> {
    let mut rows: Vec<(Option<usize>, RemoteId, &Record)> = table
        .rows
        .iter()
        .filter(|(_, row)| parent.is_none() || row.parent == parent)
        .map(|(id, row)| (record::position(&row.record), *id, &row.record))
        .collect();
    rows.sort_by_key(|(position, id, _)| (position.unwrap_or(usize::MAX), *id));
    rows.into_iter().map(|(_, _, record)| record.clone()).collect()
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn fetch(&self, collection: Collection, id: RemoteId) -> StoreResult<Record> {
        let _guard = self.enter();
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_fault(collection, OpKind::List, Some(id), None).await?;

        self.record(collection, id)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))
    }

    async fn list(&self, collection: Collection, parent: Option<RemoteId>) -> StoreResult<Vec<Record>> {
        let _guard = self.enter();
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_fault(collection, OpKind::List, parent, None).await?;
        self.require_parent(collection, parent).await?;

        let table = self.table(collection)?;
        let table = table.read().await;
        Ok(sorted_records(&table, parent))
    }

    async fn create(&self, collection: Collection, parent: Option<RemoteId>, payload: &Payload) -> StoreResult<Record> {
        let _guard = self.enter();
        let started = self.seq.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_fault(collection, OpKind::Create, parent, Some(payload))
            .await?;
        self.require_parent(collection, parent).await?;

        let mut record = payload.to_record();
        if let Some(upload) = &payload.upload {
            record.insert(
                UPLOAD_FIELD.to_string(),
                JsonValue::String(media_path(collection, &upload.file_name)),
            );
        }
        let id = RemoteId(self.next_id.fetch_add(1, Ordering::SeqCst));
        record.insert("id".to_string(), JsonValue::from(id.get()));
        if let (Some(parent_id), Some(key)) = (parent, parent_key(collection)) {
            record.insert(key.to_string(), JsonValue::from(parent_id.get()));
        }

        self.table(collection)?.write().await.rows.insert(
            id,
            Row {
                parent,
                record: record.clone(),
            },
        );
        self.log(ChangeKind::Create, collection, id, parent, Some(payload), started)
            .await;
        Ok(record)
    }

    async fn update(&self, collection: Collection, id: RemoteId, payload: &Payload) -> StoreResult<Record> {
        let _guard = self.enter();
        let started = self.seq.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_fault(collection, OpKind::Update, Some(id), Some(payload))
            .await?;

        let record = {
            let table = self.table(collection)?;
            let mut table = table.write().await;
            let row = table
                .rows
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, id)))?;
            for (key, value) in payload.to_record() {
                row.record.insert(key, value);
            }
            if let Some(upload) = &payload.upload {
                row.record.insert(
                    UPLOAD_FIELD.to_string(),
                    JsonValue::String(media_path(collection, &upload.file_name)),
                );
            }
            row.record.clone()
        };

        self.log(ChangeKind::Update, collection, id, None, Some(payload), started)
            .await;
        Ok(record)
    }

    async fn delete(&self, collection: Collection, id: RemoteId) -> StoreResult<()> {
        let _guard = self.enter();
        let started = self.seq.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.check_fault(collection, OpKind::Delete, Some(id), None)
            .await?;

        if !self.table(collection)?.read().await.rows.contains_key(&id) {
            return Err(StoreError::NotFound(format!("{}/{}", collection, id)));
        }
        self.remove_cascade(collection, id).await?;

        self.log(ChangeKind::Delete, collection, id, None, None, started)
            .await;
        Ok(())
    }
}
