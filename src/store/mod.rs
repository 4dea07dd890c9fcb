//! Durable store seam: a document-oriented key/value interface with
//! last-write-wins semantics and no multi-document transactions.

pub mod docs;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::PeriodOrdinal;
use crate::errors::LedgerError;

pub use memory::{FailureMode, MemoryStore};

pub const PERIODS: &str = "periods";
pub const LEDGERS: &str = "ledgers";

/// One document write within a batch.
#[derive(Debug, Clone)]
pub struct WriteItem {
    pub collection: String,
    pub id: String,
    pub data: Value,
}

impl WriteItem {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            data,
        }
    }
}

/// Abstraction over the durable document store.
///
/// All operations are eventually consistent from the caller's perspective;
/// nothing in the core relies on multi-document atomicity.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, LedgerError>;
    async fn put(&self, collection: &str, id: &str, data: Value) -> Result<(), LedgerError>;
    /// Shallow-merges `patch` into the existing document.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), LedgerError>;
    async fn batch_write(&self, writes: Vec<WriteItem>) -> Result<(), LedgerError>;
    /// Equality filters over top-level document fields.
    async fn query(
        &self,
        collection: &str,
        filters: &[(String, Value)],
    ) -> Result<Vec<(String, Value)>, LedgerError>;
}

/// Document id of a period within the periods collection.
pub fn period_doc_id(ledger_id: Uuid, ordinal: PeriodOrdinal) -> String {
    format!("{ledger_id}_{ordinal}")
}
