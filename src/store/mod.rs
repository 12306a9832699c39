//! The ledger store abstraction.
//!
//! The engine is written against [`LedgerStore`], a small document-store
//! interface: versioned point reads, equality queries, and an atomic
//! conditional commit. [`Transaction`] layers typed access on top and
//! provides the optimistic read-modify-write discipline that resolution
//! relies on: every record read through a transaction records the version
//! observed, and `commit` applies the staged writes only if none of those
//! versions have moved since.

mod memory;

pub use memory::MemoryStore;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::model::{Election, Id, Membership, Proposal, TokenSettings, Vote};

/// The named record collections the engine touches.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Elections,
    Proposals,
    Votes,
    Memberships,
    TokenSettings,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elections => "elections",
            Self::Proposals => "proposals",
            Self::Votes => "votes",
            Self::Memberships => "memberships",
            Self::TokenSettings => "token_settings",
        }
    }
}

/// A type that can be directly inserted/read to/from the ledger store.
pub trait LedgerRecord: Serialize + DeserializeOwned {
    /// The collection this record lives in.
    const KIND: RecordKind;

    /// The record's identity within its collection.
    fn record_id(&self) -> &Id;
}

impl LedgerRecord for Election {
    const KIND: RecordKind = RecordKind::Elections;

    fn record_id(&self) -> &Id {
        &self.id
    }
}

impl LedgerRecord for Proposal {
    const KIND: RecordKind = RecordKind::Proposals;

    fn record_id(&self) -> &Id {
        &self.id
    }
}

impl LedgerRecord for Vote {
    const KIND: RecordKind = RecordKind::Votes;

    fn record_id(&self) -> &Id {
        &self.id
    }
}

impl LedgerRecord for Membership {
    const KIND: RecordKind = RecordKind::Memberships;

    fn record_id(&self) -> &Id {
        &self.id
    }
}

impl LedgerRecord for TokenSettings {
    const KIND: RecordKind = RecordKind::TokenSettings;

    /// Settings are stored under their group's id.
    fn record_id(&self) -> &Id {
        &self.group_id
    }
}

/// A record value paired with the version observed when it was read.
/// Version 0 is reserved for "record absent".
#[derive(Debug, Clone)]
pub struct VersionedValue {
    pub version: u64,
    pub value: Value,
}

/// Identifies one record across collections.
pub type RecordKey = (RecordKind, Id);

/// A document/key-value store with optimistic concurrency control.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Point read. `None` if the record does not exist.
    async fn fetch(&self, kind: RecordKind, id: &Id) -> Result<Option<VersionedValue>>;

    /// Equality query over a top-level string field.
    async fn find_by_field(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
    ) -> Result<Vec<VersionedValue>>;

    /// Unconditional point write, outside any transaction.
    async fn put(&self, kind: RecordKind, id: &Id, value: Value) -> Result<()>;

    /// Atomically apply `writes` iff every record in `reads` still has the
    /// version observed at read time. Fails with
    /// [`Error::Conflict`](crate::error::Error::Conflict), applying
    /// nothing, otherwise.
    async fn commit(
        &self,
        reads: Vec<(RecordKey, u64)>,
        writes: Vec<(RecordKey, Value)>,
    ) -> Result<()>;
}

/// Typed convenience read against a bare store.
pub async fn get_record<S, T>(store: &S, id: &Id) -> Result<Option<T>>
where
    S: LedgerStore + ?Sized,
    T: LedgerRecord,
{
    match store.fetch(T::KIND, id).await? {
        Some(versioned) => Ok(Some(serde_json::from_value(versioned.value)?)),
        None => Ok(None),
    }
}

/// Typed convenience write against a bare store.
pub async fn put_record<S, T>(store: &S, record: &T) -> Result<()>
where
    S: LedgerStore + ?Sized,
    T: LedgerRecord,
{
    store
        .put(T::KIND, record.record_id(), serde_json::to_value(record)?)
        .await
}

/// A transactional read-modify-write session over a [`LedgerStore`].
///
/// Reads record the version they observed; writes are staged in memory.
/// Repeated writes to the same record collapse into a single committed
/// write, so a debit and a regeneration credit to one membership never
/// produce an observable intermediate balance.
pub struct Transaction<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    reads: HashMap<RecordKey, u64>,
    writes: HashMap<RecordKey, Value>,
}

impl<'a, S: LedgerStore + ?Sized> Transaction<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            writes: HashMap::new(),
        }
    }

    /// Read one record, observing its version. Staged writes are visible
    /// to subsequent reads within the same transaction.
    pub async fn get<T: LedgerRecord>(&mut self, id: &Id) -> Result<Option<T>> {
        let key = (T::KIND, id.clone());
        if let Some(staged) = self.writes.get(&key) {
            return Ok(Some(serde_json::from_value(staged.clone())?));
        }
        match self.store.fetch(T::KIND, id).await? {
            Some(versioned) => {
                self.reads.entry(key).or_insert(versioned.version);
                Ok(Some(serde_json::from_value(versioned.value)?))
            }
            None => {
                self.reads.entry(key).or_insert(0);
                Ok(None)
            }
        }
    }

    /// Equality query; every returned record joins the read set.
    pub async fn query<T: LedgerRecord>(&mut self, field: &str, value: &str) -> Result<Vec<T>> {
        let results = self.store.find_by_field(T::KIND, field, value).await?;
        let mut records = Vec::with_capacity(results.len());
        for versioned in results {
            let record: T = serde_json::from_value(versioned.value)?;
            let key = (T::KIND, record.record_id().clone());
            self.reads.entry(key).or_insert(versioned.version);
            records.push(record);
        }
        Ok(records)
    }

    /// Stage a write. Nothing is persisted until [`Self::commit`].
    pub fn set<T: LedgerRecord>(&mut self, record: &T) -> Result<()> {
        let key = (T::KIND, record.record_id().clone());
        self.writes.insert(key, serde_json::to_value(record)?);
        Ok(())
    }

    /// Number of distinct records staged for writing.
    pub fn staged_writes(&self) -> usize {
        self.writes.len()
    }

    /// Atomically apply the staged writes, verifying the read set.
    pub async fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        self.store
            .commit(
                self.reads.into_iter().collect(),
                self.writes.into_iter().collect(),
            )
            .await
    }
}
