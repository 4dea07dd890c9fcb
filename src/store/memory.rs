use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::LedgerError;

use super::{DurableStore, WriteItem};

/// How the store should misbehave, for failure-path tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    #[default]
    None,
    /// Every write fails with a durable-write error.
    FailWrites,
    /// Writes to one collection fail; everything else succeeds. Models a
    /// durable op that commits its first document and dies on the second.
    FailWritesTo(&'static str),
    /// Every read fails with a store error.
    FailReads,
    /// Every read is rejected with permission-denied, as a strict access rule
    /// does for documents that do not exist yet.
    DenyReads,
}

/// In-memory durable store with last-write-wins semantics.
///
/// The reference backend for tests: supports failure injection and counts
/// operations so deduplication can be asserted. Every operation yields once,
/// so callers interleave at the same suspension points a real store would
/// impose.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<(String, String), Value>>,
    failure: Mutex<FailureMode>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failure(&self, mode: FailureMode) {
        *self.failure.lock() = mode;
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn contains(&self, collection: &str, id: &str) -> bool {
        self.docs
            .lock()
            .contains_key(&(collection.to_string(), id.to_string()))
    }

    fn check_read(&self, collection: &str, id: &str) -> Result<(), LedgerError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match *self.failure.lock() {
            FailureMode::FailReads => Err(LedgerError::WriteFailed(format!(
                "simulated read failure: {collection}/{id}"
            ))),
            FailureMode::DenyReads => Err(LedgerError::permission_denied(collection, id)),
            _ => Ok(()),
        }
    }

    fn check_write(&self, collection: &str, id: &str) -> Result<(), LedgerError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let failed = match *self.failure.lock() {
            FailureMode::FailWrites => true,
            FailureMode::FailWritesTo(target) => target == collection,
            _ => false,
        };
        if failed {
            return Err(LedgerError::WriteFailed(format!(
                "simulated write failure: {collection}/{id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, LedgerError> {
        tokio::task::yield_now().await;
        self.check_read(collection, id)?;
        Ok(self
            .docs
            .lock()
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn put(&self, collection: &str, id: &str, data: Value) -> Result<(), LedgerError> {
        tokio::task::yield_now().await;
        self.check_write(collection, id)?;
        self.docs
            .lock()
            .insert((collection.to_string(), id.to_string()), data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), LedgerError> {
        tokio::task::yield_now().await;
        self.check_write(collection, id)?;
        let mut docs = self.docs.lock();
        let key = (collection.to_string(), id.to_string());
        let existing = docs
            .get(&key)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(collection, id))?;
        docs.insert(key, merge(existing, patch));
        Ok(())
    }

    async fn batch_write(&self, writes: Vec<WriteItem>) -> Result<(), LedgerError> {
        tokio::task::yield_now().await;
        for item in writes {
            self.check_write(&item.collection, &item.id)?;
            self.docs
                .lock()
                .insert((item.collection, item.id), item.data);
        }
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        filters: &[(String, Value)],
    ) -> Result<Vec<(String, Value)>, LedgerError> {
        tokio::task::yield_now().await;
        self.check_read(collection, "*")?;
        let docs = self.docs.lock();
        let mut hits: Vec<(String, Value)> = docs
            .iter()
            .filter(|((coll, _), doc)| {
                coll == collection
                    && filters
                        .iter()
                        .all(|(field, expected)| doc.get(field) == Some(expected))
            })
            .map(|((_, id), doc)| (id.clone(), doc.clone()))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(hits)
    }
}

/// Shallow merge: top-level fields of `patch` replace those of `base`.
fn merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}
