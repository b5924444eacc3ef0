//! Persistence seam and the shipped implementations.

use std::collections::BTreeMap;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use seedbed_core::Record;

use crate::errors::{EngineError, Result};

/// Storage collaborator for collection record sets.
///
/// The incremental hooks default to a load-modify-save cycle, so a backend
/// only has to implement `load` and `save`.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Stored records for `collection`, or `None` when nothing is stored.
    async fn load(&self, collection: &str) -> Result<Option<Vec<Record>>>;

    async fn save(&self, collection: &str, records: &[Record]) -> Result<()>;

    async fn on_create(&self, collection: &str, record: &Record) -> Result<()> {
        let mut records = self.load(collection).await?.unwrap_or_default();
        records.push(record.clone());
        self.save(collection, &records).await
    }

    async fn on_update(&self, collection: &str, record: &Record) -> Result<()> {
        let mut records = self.load(collection).await?.unwrap_or_default();
        let Some(id) = record.id() else {
            return Ok(());
        };
        match records.iter_mut().find(|existing| existing.has_id(id)) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        self.save(collection, &records).await
    }

    async fn on_delete(&self, collection: &str, id: &Value) -> Result<()> {
        let mut records = self.load(collection).await?.unwrap_or_default();
        records.retain(|existing| !existing.has_id(id));
        self.save(collection, &records).await
    }
}

/// Keeps nothing; every collection is seeded fresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersistence;

#[async_trait]
impl Persistence for NoopPersistence {
    async fn load(&self, _collection: &str) -> Result<Option<Vec<Record>>> {
        Ok(None)
    }

    async fn save(&self, _collection: &str, _records: &[Record]) -> Result<()> {
        Ok(())
    }

    async fn on_create(&self, _collection: &str, _record: &Record) -> Result<()> {
        Ok(())
    }

    async fn on_update(&self, _collection: &str, _record: &Record) -> Result<()> {
        Ok(())
    }

    async fn on_delete(&self, _collection: &str, _id: &Value) -> Result<()> {
        Ok(())
    }
}

/// Process-local store, useful to share data between engine instances.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    collections: Mutex<BTreeMap<String, Vec<Record>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload records for a collection.
    pub fn with_records(self, collection: impl Into<String>, records: Vec<Record>) -> Self {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.into(), records);
        self
    }

    pub fn snapshot(&self, collection: &str) -> Option<Vec<Record>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .cloned()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn load(&self, collection: &str) -> Result<Option<Vec<Record>>> {
        Ok(self.snapshot(collection))
    }

    async fn save(&self, collection: &str, records: &[Record]) -> Result<()> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection.to_string(), records.to_vec());
        Ok(())
    }
}

/// One pretty-printed JSON array per collection under a directory.
#[derive(Debug, Clone)]
pub struct JsonDirPersistence {
    dir: PathBuf,
}

impl JsonDirPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }
}

#[async_trait]
impl Persistence for JsonDirPersistence {
    async fn load(&self, collection: &str) -> Result<Option<Vec<Record>>> {
        let path = self.path_for(collection);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let records: Vec<Record> = serde_json::from_slice(&bytes)?;
        Ok(Some(records))
    }

    async fn save(&self, collection: &str, records: &[Record]) -> Result<()> {
        let path = self.path_for(collection);
        let data = serde_json::to_vec_pretty(records)?;
        tokio::task::spawn_blocking(move || write_bytes_atomic(&path, &data))
            .await
            .map_err(|err| EngineError::Persistence(err.to_string()))??;
        Ok(())
    }
}

/// Write via a sibling temp file and rename, syncing the directory.
pub fn write_bytes_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;

    std::fs::rename(&tmp_path, path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            sync_dir(parent)?;
        }
    }

    Ok(())
}

fn temp_path(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| EngineError::Persistence("invalid path for atomic write".to_string()))?;
    let tmp_name = format!(
        "{}.{}.tmp",
        file_name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    );
    Ok(path.with_file_name(tmp_name))
}

fn sync_dir(path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(path)?;
    dir.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).expect("object")
    }

    fn temp_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("seedbed_persistence_{label}_{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn json_dir_round_trips_and_reports_missing() {
        let dir = temp_dir("roundtrip");
        let persistence = JsonDirPersistence::new(&dir);
        assert!(persistence.load("users").await.unwrap().is_none());

        let records = vec![record(json!({ "id": 1, "name": "Ada" }))];
        persistence.save("users", &records).await.unwrap();
        assert_eq!(persistence.load("users").await.unwrap(), Some(records));
        let leftovers = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn default_hooks_apply_incremental_changes() {
        let persistence = MemoryPersistence::new();
        persistence
            .on_create("users", &record(json!({ "id": 1, "name": "Ada" })))
            .await
            .unwrap();
        persistence
            .on_create("users", &record(json!({ "id": 2, "name": "Bob" })))
            .await
            .unwrap();
        persistence
            .on_update("users", &record(json!({ "id": 1, "name": "Ada L." })))
            .await
            .unwrap();
        persistence.on_delete("users", &json!(2)).await.unwrap();

        let stored = persistence.snapshot("users").unwrap();
        assert_eq!(stored, vec![record(json!({ "id": 1, "name": "Ada L." }))]);
    }
}
