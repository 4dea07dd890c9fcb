//! Recalculation orchestrator: decides which periods need chaining, fetches
//! them cache-first, runs the chain engine, persists the results, and
//! refreshes ledger aggregates. Concurrent runs per ledger are deduplicated.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::cache::{AggregatesSlot, LedgerCache, PeriodSlot};
use crate::config::EngineConfig;
use crate::domain::{LedgerAggregates, PeriodOrdinal};
use crate::engine::{self, BaseProvenance};
use crate::errors::LedgerError;
use crate::store::{docs, DurableStore, LEDGERS};

/// What a recalculation pass did.
#[derive(Debug, Clone)]
pub struct RecalcOutcome {
    pub ledger_id: Uuid,
    /// Ordinals whose balances were recomputed and written, oldest first.
    pub chained: Vec<PeriodOrdinal>,
    pub provenance: BaseProvenance,
    pub aggregates: LedgerAggregates,
}

type SharedRecalc = Shared<BoxFuture<'static, Result<RecalcOutcome, Arc<LedgerError>>>>;

/// Per-ledger in-flight map. One registry per service instance, never a
/// module-level global, so tests can construct and drop it freely.
#[derive(Default)]
pub struct RecalcRegistry {
    in_flight: Mutex<HashMap<Uuid, SharedRecalc>>,
}

impl RecalcRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn reset(&self) {
        self.in_flight.lock().clear();
    }
}

pub struct Recalculator {
    store: Arc<dyn DurableStore>,
    cache: Arc<LedgerCache>,
    config: EngineConfig,
    registry: RecalcRegistry,
}

impl Recalculator {
    pub fn new(store: Arc<dyn DurableStore>, cache: Arc<LedgerCache>, config: EngineConfig) -> Self {
        Self {
            store,
            cache,
            config,
            registry: RecalcRegistry::new(),
        }
    }

    pub fn registry(&self) -> &RecalcRegistry {
        &self.registry
    }

    /// Recalculates every period whose start balance may depend on a change
    /// in `changed` (or the whole chain when `None`).
    ///
    /// Deduplicated per ledger id: a second call while a pass is in flight
    /// joins that pass and observes its result instead of starting a
    /// duplicate. Safe to retry after any failure; the pass is idempotent.
    pub async fn recalculate(
        self: &Arc<Self>,
        ledger_id: Uuid,
        changed: Option<PeriodOrdinal>,
    ) -> Result<RecalcOutcome, LedgerError> {
        let pass = {
            let mut in_flight = self.registry.in_flight.lock();
            if let Some(existing) = in_flight.get(&ledger_id) {
                tracing::debug!(%ledger_id, "joining in-flight recalculation");
                existing.clone()
            } else {
                let this = Arc::clone(self);
                let pass: SharedRecalc = async move {
                    let result = this.run_pass(ledger_id, changed).await.map_err(Arc::new);
                    this.registry.in_flight.lock().remove(&ledger_id);
                    result
                }
                .boxed()
                .shared();
                in_flight.insert(ledger_id, pass.clone());
                pass
            }
        };
        pass.await.map_err(LedgerError::Shared)
    }

    async fn run_pass(
        &self,
        ledger_id: Uuid,
        changed: Option<PeriodOrdinal>,
    ) -> Result<RecalcOutcome, LedgerError> {
        let store = self.store.as_ref();
        let ledger = docs::fetch_ledger(store, ledger_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(LEDGERS, ledger_id.to_string()))?;

        if ledger.period_index.is_empty() {
            let aggregates = LedgerAggregates::default();
            docs::update_ledger_aggregates(store, ledger_id, &aggregates).await?;
            self.cache.set(&AggregatesSlot { ledger_id }, aggregates.clone());
            return Ok(RecalcOutcome {
                ledger_id,
                chained: Vec::new(),
                provenance: BaseProvenance::Empty,
                aggregates,
            });
        }

        // Minimal fetch set: the period immediately before the first one
        // needing work, then everything from there forward.
        let fetch_from = match changed {
            Some(changed) => {
                let pos = ledger.period_index.partition_point(|o| *o < changed);
                pos.min(ledger.period_index.len() - 1).saturating_sub(1)
            }
            None => 0,
        };
        let window = &ledger.period_index[fetch_from..];
        if let (Some(changed), Some(start)) = (changed, window.first()) {
            if *start > changed {
                return Err(LedgerError::InvariantViolation(format!(
                    "chain start {start} is after the changed period {changed}"
                )));
            }
        }

        let mut periods = Vec::with_capacity(window.len());
        for ordinal in window {
            let slot = PeriodSlot {
                ledger_id,
                ordinal: *ordinal,
            };
            let period = match self.cache.get_fresh(&slot) {
                Some(period) => period,
                None => match docs::fetch_period(store, ledger_id, *ordinal).await? {
                    Some(period) => {
                        self.cache.set(&slot, period.clone());
                        period
                    }
                    None => {
                        tracing::warn!(%ledger_id, %ordinal, "indexed period missing from store");
                        continue;
                    }
                },
            };
            periods.push(period);
        }

        let base = engine::resolve_base_snapshot(
            store,
            ledger_id,
            periods.first(),
            fetch_from > 0,
            self.config.walk_back_limit,
        )
        .await?;

        let result = engine::chain_periods(periods, &base.snapshot);
        let chained = result.chained();
        if !chained.is_empty() {
            let writes = chained
                .iter()
                .map(docs::period_write_item)
                .collect::<Result<Vec<_>, _>>()?;
            store.batch_write(writes).await?;
        }

        let mut aggregates = engine::aggregates_at_boundary(&result, &ledger.aggregates);
        engine::extend_category_aggregates(&mut aggregates, result.drafts());
        docs::update_ledger_aggregates(store, ledger_id, &aggregates).await?;

        for period in chained {
            let slot = PeriodSlot {
                ledger_id,
                ordinal: period.ordinal,
            };
            self.cache.set(&slot, period.clone());
        }
        self.cache.set(&AggregatesSlot { ledger_id }, aggregates.clone());

        let chained: Vec<PeriodOrdinal> = chained.iter().map(|p| p.ordinal).collect();
        tracing::info!(
            %ledger_id,
            chained = chained.len(),
            provenance = ?base.provenance,
            "recalculation pass complete"
        );
        Ok(RecalcOutcome {
            ledger_id,
            chained,
            provenance: base.provenance,
            aggregates,
        })
    }
}
