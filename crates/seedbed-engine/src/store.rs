use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::info;

use seedbed_core::record::{id_key, keys_match, next_timestamp, now_timestamp};
use seedbed_core::{
    CREATED_AT_FIELD, CollectionDefinition, Filter, ID_FIELD, Query, QueryResult, Record,
    UPDATED_AT_FIELD,
};

use crate::engine::EngineShared;
use crate::errors::{EngineError, Result};
use crate::model::{IdStrategy, PersistMode, SeedReport, SeedSource};
use crate::seeder::ReferentialSeeder;

enum Change<'a> {
    Created(&'a Record),
    Updated(&'a Record),
    Deleted(&'a Value),
    Cleared,
}

/// Record table for one collection.
///
/// Every operation awaits [`CollectionStore::initialize`] first, so no caller
/// observes the table before its seed (or load) has completed.
#[derive(Debug)]
pub struct CollectionStore {
    definition: CollectionDefinition,
    records: RwLock<Vec<Record>>,
    ready: Mutex<Arc<OnceCell<()>>>,
    report: RwLock<Option<SeedReport>>,
    next_sequence: AtomicU64,
    /// Serializes each mutation together with its persistence call.
    write_gate: tokio::sync::Mutex<()>,
}

impl CollectionStore {
    pub fn new(definition: CollectionDefinition) -> Self {
        Self {
            definition,
            records: RwLock::new(Vec::new()),
            ready: Mutex::new(Arc::new(OnceCell::new())),
            report: RwLock::new(None),
            next_sequence: AtomicU64::new(0),
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &CollectionDefinition {
        &self.definition
    }

    pub fn is_initialized(&self) -> bool {
        self.current_cell().initialized()
    }

    pub fn seed_report(&self) -> Option<SeedReport> {
        self.report
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Seed or load the table exactly once.
    ///
    /// Concurrent callers share the same in-flight initialization. A failed
    /// attempt leaves the store uninitialized and the next call retries.
    pub(crate) fn initialize<'a>(&'a self, shared: &'a EngineShared) -> BoxFuture<'a, Result<()>> {
        let cell = self.current_cell();
        async move {
            cell.get_or_try_init(|| self.seed_or_load(shared)).await?;
            Ok(())
        }
        .boxed()
    }

    async fn seed_or_load(&self, shared: &EngineShared) -> Result<()> {
        let name = self.name();
        let persist = shared.options.persist_mode != PersistMode::Off;

        if persist
            && let Some(records) = shared.persistence.load(name).await?
            && !records.is_empty()
        {
            self.observe_ids(&records);
            let rows = records.len() as u64;
            *self.write_records() = records;
            let mut report = SeedReport::new(name, SeedSource::Loaded);
            report.rows = rows;
            *self.report.write().unwrap_or_else(PoisonError::into_inner) = Some(report);
            info!(collection = %name, rows, "collection loaded");
            return Ok(());
        }

        let seeded = ReferentialSeeder::new(shared).seed(&self.definition).await?;
        let records: Vec<Record> = seeded
            .records
            .into_iter()
            .map(|record| self.stamp_new(record, shared.options.id_strategy, &[]))
            .collect();

        if persist {
            shared.persistence.save(name, &records).await?;
        }

        let rows = records.len() as u64;
        *self.write_records() = records;
        let mut report = SeedReport::new(name, SeedSource::Synthesized);
        report.rows = rows;
        report.issues = seeded.issues;
        let issues = report.issues.len();
        *self.report.write().unwrap_or_else(PoisonError::into_inner) = Some(report);
        info!(collection = %name, rows, issues, "collection seeded");
        Ok(())
    }

    pub(crate) async fn query(&self, shared: &EngineShared, query: &Query) -> Result<QueryResult> {
        let (result, _) = self.query_with_matches(shared, query).await?;
        Ok(result)
    }

    /// Page plus the full filtered (unpaginated) set it was cut from.
    pub(crate) async fn query_with_matches(
        &self,
        shared: &EngineShared,
        query: &Query,
    ) -> Result<(QueryResult, Vec<Record>)> {
        self.initialize(shared).await?;
        let matched = query.select(&self.read_records());
        let result = query.paginate(&matched, shared.options.default_page_limit);
        Ok((result, matched))
    }

    pub(crate) async fn get(&self, shared: &EngineShared, id: &Value) -> Result<Option<Record>> {
        self.initialize(shared).await?;
        Ok(self.find(id))
    }

    pub(crate) async fn all(&self, shared: &EngineShared) -> Result<Vec<Record>> {
        self.initialize(shared).await?;
        Ok(self.snapshot())
    }

    pub(crate) async fn count(&self, shared: &EngineShared, filter: Option<&Filter>) -> Result<u64> {
        self.initialize(shared).await?;
        let records = self.read_records();
        let count = match filter {
            Some(filter) => records.iter().filter(|record| filter.matches(record)).count(),
            None => records.len(),
        };
        Ok(count as u64)
    }

    /// Store a new record, assigning an id when absent and stamping timestamps.
    pub(crate) async fn insert(&self, shared: &EngineShared, record: Record) -> Result<Record> {
        self.initialize(shared).await?;
        let _gate = self.write_gate.lock().await;
        if let Some(id) = record.id()
            && !matches!(id, Value::String(_) | Value::Number(_))
        {
            return Err(EngineError::InvalidRecord(format!(
                "id must be a string or a number, got {id}"
            )));
        }

        let created = {
            let mut records = self.write_records();
            if let Some(id) = record.id()
                && records.iter().any(|existing| existing.has_id(id))
            {
                return Err(EngineError::DuplicateId {
                    collection: self.name().to_string(),
                    id: id.to_string(),
                });
            }
            let created = self.stamp_new(record, shared.options.id_strategy, &records);
            records.push(created.clone());
            created
        };

        self.persist(shared, Change::Created(&created)).await?;
        Ok(created)
    }

    /// Merge `partial` into the record; `None` when the id is absent.
    pub(crate) async fn update(
        &self,
        shared: &EngineShared,
        id: &Value,
        partial: Record,
    ) -> Result<Option<Record>> {
        self.initialize(shared).await?;
        let _gate = self.write_gate.lock().await;
        let updated = {
            let mut records = self.write_records();
            let Some(existing) = records.iter_mut().find(|record| record.has_id(id)) else {
                return Ok(None);
            };
            existing.merge(partial);
            let updated_at = next_timestamp(existing.updated_at());
            existing.insert(UPDATED_AT_FIELD, Value::String(updated_at));
            existing.clone()
        };

        self.persist(shared, Change::Updated(&updated)).await?;
        Ok(Some(updated))
    }

    /// Replace every caller-owned field; id and createdAt survive.
    pub(crate) async fn replace(
        &self,
        shared: &EngineShared,
        id: &Value,
        full: Record,
    ) -> Result<Option<Record>> {
        self.initialize(shared).await?;
        let _gate = self.write_gate.lock().await;
        let replaced = {
            let mut records = self.write_records();
            let Some(existing) = records.iter_mut().find(|record| record.has_id(id)) else {
                return Ok(None);
            };
            let mut replacement = Record::new();
            for field in [ID_FIELD, CREATED_AT_FIELD] {
                if let Some(value) = existing.get(field) {
                    replacement.insert(field, value.clone());
                }
            }
            replacement.merge(full);
            let updated_at = next_timestamp(existing.updated_at());
            replacement.insert(UPDATED_AT_FIELD, Value::String(updated_at));
            *existing = replacement;
            existing.clone()
        };

        self.persist(shared, Change::Updated(&replaced)).await?;
        Ok(Some(replaced))
    }

    /// Remove a record; `false` when it did not exist.
    pub(crate) async fn delete(&self, shared: &EngineShared, id: &Value) -> Result<bool> {
        self.initialize(shared).await?;
        let _gate = self.write_gate.lock().await;
        let removed = {
            let mut records = self.write_records();
            let before = records.len();
            records.retain(|record| !record.has_id(id));
            records.len() != before
        };

        if removed {
            self.persist(shared, Change::Deleted(id)).await?;
        }
        Ok(removed)
    }

    /// Empty the table; it stays initialized and is not re-seeded.
    pub(crate) async fn clear(&self, shared: &EngineShared) -> Result<()> {
        self.initialize(shared).await?;
        let _gate = self.write_gate.lock().await;
        self.write_records().clear();
        self.persist(shared, Change::Cleared).await?;
        info!(collection = %self.name(), "collection cleared");
        Ok(())
    }

    /// Drop all records and re-arm seeding for the next access.
    pub fn reset(&self) {
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(OnceCell::new());
        self.write_records().clear();
        *self.report.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.next_sequence.store(0, Ordering::Release);
    }

    pub(crate) fn find(&self, id: &Value) -> Option<Record> {
        self.read_records()
            .iter()
            .find(|record| record.has_id(id))
            .cloned()
    }

    /// Records whose `field` matches `key`.
    pub(crate) fn find_by(&self, field: &str, key: &Value, first_only: bool) -> Vec<Record> {
        let records = self.read_records();
        let mut matches = records
            .iter()
            .filter(|record| keys_match(record.value(field), key))
            .cloned();
        if first_only {
            matches.next().into_iter().collect()
        } else {
            matches.collect()
        }
    }

    /// Distinct non-null values of `field`, in record order.
    pub(crate) fn column_values(&self, field: &str) -> Vec<Value> {
        let records = self.read_records();
        let mut values: Vec<Value> = Vec::with_capacity(records.len());
        for record in records.iter() {
            let value = record.value(field);
            if value.is_null() || values.iter().any(|seen| keys_match(seen, value)) {
                continue;
            }
            values.push(value.clone());
        }
        values
    }

    pub(crate) fn snapshot(&self) -> Vec<Record> {
        self.read_records().clone()
    }

    /// Stamp timestamps and assign an id not used by any of `taken`.
    fn stamp_new(&self, mut record: Record, strategy: IdStrategy, taken: &[Record]) -> Record {
        for field in [CREATED_AT_FIELD, UPDATED_AT_FIELD] {
            record.remove(field);
        }
        match record.id().cloned() {
            Some(id) => self.observe_id(&id),
            None => {
                let mut id = self.generate_id(strategy);
                while taken.iter().any(|existing| existing.has_id(&id)) {
                    id = self.generate_id(strategy);
                }
                record.insert(ID_FIELD, id);
            }
        }
        let now = now_timestamp();
        record.insert(CREATED_AT_FIELD, Value::String(now.clone()));
        record.insert(UPDATED_AT_FIELD, Value::String(now));
        record
    }

    fn generate_id(&self, strategy: IdStrategy) -> Value {
        match strategy {
            IdStrategy::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            IdStrategy::Sequential => {
                Value::from(self.next_sequence.fetch_add(1, Ordering::AcqRel) + 1)
            }
        }
    }

    fn observe_id(&self, id: &Value) {
        if let Some(value) = id_key(id).and_then(|key| key.parse::<u64>().ok()) {
            self.next_sequence.fetch_max(value, Ordering::AcqRel);
        }
    }

    fn observe_ids(&self, records: &[Record]) {
        for id in records.iter().filter_map(Record::id) {
            self.observe_id(id);
        }
    }

    async fn persist(&self, shared: &EngineShared, change: Change<'_>) -> Result<()> {
        let name = self.name();
        let persistence = &shared.persistence;
        match (shared.options.persist_mode, change) {
            (PersistMode::Off, _) => Ok(()),
            (PersistMode::Snapshot, _) | (PersistMode::Streaming, Change::Cleared) => {
                let records = self.snapshot();
                persistence.save(name, &records).await
            }
            (PersistMode::Streaming, Change::Created(record)) => {
                persistence.on_create(name, record).await
            }
            (PersistMode::Streaming, Change::Updated(record)) => {
                persistence.on_update(name, record).await
            }
            (PersistMode::Streaming, Change::Deleted(id)) => persistence.on_delete(name, id).await,
        }
    }

    fn current_cell(&self) -> Arc<OnceCell<()>> {
        Arc::clone(&self.ready.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn read_records(&self) -> RwLockReadGuard<'_, Vec<Record>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_records(&self) -> RwLockWriteGuard<'_, Vec<Record>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}
