//! Entry-level edits on periods, wired through the optimistic mutation
//! protocol end to end.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::cache::{LedgerCache, PeriodSlot};
use crate::config::EngineConfig;
use crate::core::mutation::MutationBuilder;
use crate::core::recalc::Recalculator;
use crate::domain::{BalanceSnapshot, EntryEdit, Period, PeriodOrdinal};
use crate::engine::{self, retotal::retotal_in_place};
use crate::errors::LedgerError;
use crate::store::{docs, DurableStore, LEDGERS};

pub struct PeriodService {
    store: Arc<dyn DurableStore>,
    cache: Arc<LedgerCache>,
    recalc: Arc<Recalculator>,
    config: EngineConfig,
}

impl PeriodService {
    pub fn new(
        store: Arc<dyn DurableStore>,
        cache: Arc<LedgerCache>,
        recalc: Arc<Recalculator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            cache,
            recalc,
            config,
        }
    }

    /// Cache-first period read; absent means the month has not been used yet.
    pub async fn get_period(
        &self,
        ledger_id: Uuid,
        ordinal: PeriodOrdinal,
    ) -> Result<Option<Period>, LedgerError> {
        let slot = PeriodSlot { ledger_id, ordinal };
        if let Some(period) = self.cache.get_fresh(&slot) {
            return Ok(Some(period));
        }
        match docs::fetch_period(self.store.as_ref(), ledger_id, ordinal).await? {
            Some(period) => {
                self.cache.set(&slot, period.clone());
                Ok(Some(period))
            }
            None => Ok(None),
        }
    }

    /// Applies one edit to a period.
    ///
    /// The cache sees the transformed period synchronously, before the
    /// durable write is issued; a failed write rolls the cache back and
    /// surfaces the error. Recalculation of downstream periods runs after the
    /// commit as a best-effort secondary step.
    pub async fn apply_edit(
        &self,
        ledger_id: Uuid,
        ordinal: PeriodOrdinal,
        edit: EntryEdit,
    ) -> Result<Period, LedgerError> {
        let (loaded, register) = self.load_or_create(ledger_id, ordinal).await?;

        let mut optimistic = loaded.clone();
        if !optimistic.apply_edit(&edit) {
            return Err(LedgerError::Invalid(format!(
                "edit targets a missing entry in {ledger_id}/{ordinal}"
            )));
        }
        retotal_in_place(&mut optimistic);

        let slot = PeriodSlot { ledger_id, ordinal };
        let store = Arc::clone(&self.store);
        let durable_period = optimistic.clone();
        let transform_base = loaded;
        let transform_edit = edit;
        MutationBuilder::new(slot)
            .transform(move |current: Option<Period>| {
                // Applied to whatever is cached when the mutation starts, so
                // interleaved same-key mutations stack instead of clobbering.
                let mut period = current.unwrap_or(transform_base);
                period.apply_edit(&transform_edit);
                retotal_in_place(&mut period);
                period
            })
            .durable(move || async move {
                docs::put_period(store.as_ref(), &durable_period).await?;
                if register {
                    register_period(store.as_ref(), ledger_id, ordinal).await?;
                }
                Ok(())
            })
            .run(&self.cache)
            .await?;

        if let Err(err) = self.recalc.recalculate(ledger_id, Some(ordinal)).await {
            tracing::warn!(%ledger_id, %ordinal, error = %err, "post-edit recalculation failed");
        }
        Ok(self.cache.get(&slot).unwrap_or(optimistic))
    }

    /// Loads the period, creating it lazily. The returned flag says whether
    /// this edit's durable write must also register the ordinal in the
    /// ledger's index.
    ///
    /// Registration need is derived from actual index membership, not from
    /// whether this call created the period: a stored period missing from the
    /// index means an earlier registration was interrupted, and the next edit
    /// repairs it.
    async fn load_or_create(
        &self,
        ledger_id: Uuid,
        ordinal: PeriodOrdinal,
    ) -> Result<(Period, bool), LedgerError> {
        let ledger = docs::fetch_ledger(self.store.as_ref(), ledger_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(LEDGERS, ledger_id.to_string()))?;
        let indexed = ledger.period_index.binary_search(&ordinal).is_ok();

        if let Some(period) = self.get_period(ledger_id, ordinal).await? {
            return Ok((period, !indexed));
        }

        self.check_creation_window(ordinal)?;

        // Seed from the latest existing period before this one, so balances
        // carry forward from day one.
        let seed = match ledger.period_index.iter().rev().find(|o| **o < ordinal) {
            Some(previous) => docs::fetch_period(self.store.as_ref(), ledger_id, *previous)
                .await?
                .map(|p| engine::extract_snapshot(&p))
                .unwrap_or_default(),
            None => BalanceSnapshot::default(),
        };
        let period = engine::recalc_period(&Period::new(ledger_id, ordinal), &seed);
        Ok((period, true))
    }

    fn check_creation_window(&self, ordinal: PeriodOrdinal) -> Result<(), LedgerError> {
        let current = PeriodOrdinal::from_date(Utc::now().date_naive());
        let distance = ordinal.months_since(&current);
        if distance < -(self.config.past_window_months as i64)
            || distance > self.config.future_window_months as i64
        {
            return Err(LedgerError::Invalid(format!(
                "period {ordinal} is outside the creation window around {current}"
            )));
        }
        Ok(())
    }
}

/// Adds a period to the ledger's index. Idempotent: an already-indexed
/// ordinal writes nothing. Patches only the index fields, so a concurrent
/// aggregates refresh on the same document is never clobbered.
async fn register_period(
    store: &dyn DurableStore,
    ledger_id: Uuid,
    ordinal: PeriodOrdinal,
) -> Result<(), LedgerError> {
    let mut ledger = docs::fetch_ledger(store, ledger_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(LEDGERS, ledger_id.to_string()))?;
    if ledger.index_insert(ordinal) {
        docs::update_ledger_index(store, ledger_id, &ledger.period_index).await?;
    }
    Ok(())
}
