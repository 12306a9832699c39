use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::Id;
use crate::store::{LedgerStore, RecordKey, RecordKind, VersionedValue};

#[derive(Debug, Clone)]
struct Versioned {
    version: u64,
    value: Value,
}

/// An in-memory [`LedgerStore`] with per-record version counters.
///
/// `commit` takes the write lock for its whole duration, so a commit is
/// all-or-nothing: either every staged write lands with its version bump,
/// or (on any version mismatch) nothing does. The applied-write counter
/// lets callers assert that an operation performed zero persisted writes.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordKey, Versioned>>,
    writes_applied: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total record writes applied since construction, transactional or not.
    pub fn writes_applied(&self) -> u64 {
        self.writes_applied.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn fetch(&self, kind: RecordKind, id: &Id) -> Result<Option<VersionedValue>> {
        let records = self.records.read().await;
        Ok(records.get(&(kind, id.clone())).map(|rec| VersionedValue {
            version: rec.version,
            value: rec.value.clone(),
        }))
    }

    async fn find_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> Result<Vec<VersionedValue>> {
        let records = self.records.read().await;
        let mut results = Vec::new();
        for ((record_kind, _), rec) in records.iter() {
            if *record_kind != kind {
                continue;
            }
            if rec.value.get(field).and_then(Value::as_str) == Some(value) {
                results.push(VersionedValue {
                    version: rec.version,
                    value: rec.value.clone(),
                });
            }
        }
        Ok(results)
    }

    async fn put(&self, kind: RecordKind, id: &Id, value: Value) -> Result<()> {
        let mut records = self.records.write().await;
        let entry = records
            .entry((kind, id.clone()))
            .or_insert_with(|| Versioned {
                version: 0,
                value: Value::Null,
            });
        entry.version += 1;
        entry.value = value;
        self.writes_applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn commit(
        &self,
        reads: Vec<(RecordKey, u64)>,
        writes: Vec<(RecordKey, Value)>,
    ) -> Result<()> {
        let mut records = self.records.write().await;

        // Validate the whole read set before touching anything.
        for (key, observed) in &reads {
            let current = records.get(key).map(|rec| rec.version).unwrap_or(0);
            if current != *observed {
                return Err(Error::conflict(format!(
                    "{}/{} changed: observed version {observed}, now {current}",
                    key.0.as_str(),
                    key.1
                )));
            }
        }

        let write_count = writes.len() as u64;
        for (key, value) in writes {
            let entry = records.entry(key).or_insert_with(|| Versioned {
                version: 0,
                value: Value::Null,
            });
            entry.version += 1;
            entry.value = value;
        }
        self.writes_applied.fetch_add(write_count, Ordering::SeqCst);
        Ok(())
    }
}
