//! Ledger-level reads and creation.

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::{AggregatesSlot, LedgerCache};
use crate::domain::{Ledger, LedgerAggregates};
use crate::errors::LedgerError;
use crate::store::{docs, DurableStore, LEDGERS};

pub struct LedgerService {
    store: Arc<dyn DurableStore>,
    cache: Arc<LedgerCache>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn DurableStore>, cache: Arc<LedgerCache>) -> Self {
        Self { store, cache }
    }

    pub async fn create(&self, name: impl Into<String>) -> Result<Ledger, LedgerError> {
        let ledger = Ledger::new(name);
        docs::put_ledger(self.store.as_ref(), &ledger).await?;
        self.cache.set(
            &AggregatesSlot {
                ledger_id: ledger.id,
            },
            ledger.aggregates.clone(),
        );
        Ok(ledger)
    }

    pub async fn get(&self, ledger_id: Uuid) -> Result<Option<Ledger>, LedgerError> {
        docs::fetch_ledger(self.store.as_ref(), ledger_id).await
    }

    /// The cross-period "current" balances shown outside any single month.
    pub async fn aggregates(&self, ledger_id: Uuid) -> Result<LedgerAggregates, LedgerError> {
        let slot = AggregatesSlot { ledger_id };
        if let Some(aggregates) = self.cache.get_fresh(&slot) {
            return Ok(aggregates);
        }
        let ledger = docs::fetch_ledger(self.store.as_ref(), ledger_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(LEDGERS, ledger_id.to_string()))?;
        self.cache.set(&slot, ledger.aggregates.clone());
        Ok(ledger.aggregates)
    }
}
