use uuid::Uuid;

use crate::domain::{
    is_sentinel, AccountBalance, BalanceSnapshot, CategoryBalance, LedgerAggregates, Period,
    PeriodOrdinal,
};
use crate::errors::LedgerError;
use crate::store::{docs, DurableStore};

use super::retotal::retotal_in_place;

/// Where the base snapshot for a chaining pass came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseProvenance {
    /// The oldest loaded period already carried a non-zero start balance.
    StoredStart,
    /// Found by walking backward through the durable store; the ordinal is
    /// the period whose end balances seeded the chain.
    WalkBack(PeriodOrdinal),
    /// No earlier history exists; the ledger genuinely starts from zero.
    Empty,
    /// The walk-back bound was exhausted without finding a base. Recoverable
    /// but suspicious: may mask a genuinely missing base.
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct ResolvedBase {
    pub snapshot: BalanceSnapshot,
    pub provenance: BaseProvenance,
}

/// Result of a forward chaining pass.
#[derive(Debug)]
pub struct ChainResult {
    pub periods: Vec<Period>,
    /// Index of the latest finalized period; everything after it was left
    /// untouched.
    pub boundary: Option<usize>,
    /// Snapshot extracted from the boundary period, or the base when nothing
    /// was chained.
    pub final_snapshot: BalanceSnapshot,
}

impl ChainResult {
    /// The chained slice: periods whose balances were recomputed.
    pub fn chained(&self) -> &[Period] {
        match self.boundary {
            Some(boundary) => &self.periods[..=boundary],
            None => &[],
        }
    }

    /// Draft periods after the finalization boundary, untouched by the pass.
    pub fn drafts(&self) -> &[Period] {
        match self.boundary {
            Some(boundary) => &self.periods[boundary + 1..],
            None => &self.periods,
        }
    }
}

/// Extracts the end-of-period balances that feed the next period.
pub fn extract_snapshot(period: &Period) -> BalanceSnapshot {
    let mut snapshot = BalanceSnapshot {
        income_cents: period.total_income_cents,
        ..BalanceSnapshot::default()
    };
    for row in &period.account_balances {
        if !is_sentinel(row.account_id) {
            snapshot.accounts.insert(row.account_id, row.end_balance_cents);
        }
    }
    for row in &period.category_balances {
        if !is_sentinel(row.category_id) {
            snapshot
                .categories
                .insert(row.category_id, row.end_balance_cents);
        }
    }
    snapshot
}

/// Recomputes one period against the previous period's snapshot.
///
/// Every row's start balance is taken from `prev` (0 for unseen ids), deltas
/// and end balances are rebuilt as in retotal, and entities that carried a
/// non-zero balance into this period keep a row even with no entries.
pub fn recalc_period(period: &Period, prev: &BalanceSnapshot) -> Period {
    let mut next = period.clone();

    let mut account_rows: Vec<AccountBalance> = next
        .account_balances
        .iter()
        .filter(|row| !is_sentinel(row.account_id))
        .map(|row| {
            let mut seeded = row.clone();
            seeded.start_balance_cents = prev.account_balance(row.account_id);
            seeded
        })
        .collect();
    for (id, cents) in &prev.accounts {
        if *cents != 0 && !account_rows.iter().any(|row| row.account_id == *id) {
            account_rows.push(AccountBalance::carried(*id, *cents));
        }
    }

    let mut category_rows: Vec<CategoryBalance> = next
        .category_balances
        .iter()
        .filter(|row| !is_sentinel(row.category_id))
        .map(|row| {
            let mut seeded = row.clone();
            seeded.start_balance_cents = prev.category_balance(row.category_id);
            seeded
        })
        .collect();
    for (id, cents) in &prev.categories {
        if *cents != 0 && !category_rows.iter().any(|row| row.category_id == *id) {
            category_rows.push(CategoryBalance::carried(*id, *cents));
        }
    }

    next.account_balances = account_rows;
    next.category_balances = category_rows;
    retotal_in_place(&mut next);
    next
}

/// Chains an ordered (oldest to newest) sequence of periods forward from a
/// base snapshot.
///
/// Only periods up to and including the latest finalized one are recomputed;
/// trailing drafts keep their previously stored balances so they never
/// pollute committed state.
pub fn chain_periods(periods: Vec<Period>, base: &BalanceSnapshot) -> ChainResult {
    let boundary = periods.iter().rposition(|p| p.allocations_finalized);
    let mut snapshot = base.clone();
    let mut out = Vec::with_capacity(periods.len());
    for (index, period) in periods.into_iter().enumerate() {
        match boundary {
            Some(b) if index <= b => {
                let chained = recalc_period(&period, &snapshot);
                snapshot = extract_snapshot(&chained);
                out.push(chained);
            }
            _ => out.push(period),
        }
    }
    ChainResult {
        periods: out,
        boundary,
        final_snapshot: snapshot,
    }
}

/// Ledger aggregates as of the finalization boundary: the end balances of the
/// latest finalized chained period. When nothing was chained, the previously
/// stored aggregates stand.
pub fn aggregates_at_boundary(
    result: &ChainResult,
    previous: &LedgerAggregates,
) -> LedgerAggregates {
    match result.boundary {
        Some(boundary) => {
            let period = &result.periods[boundary];
            let mut aggregates = LedgerAggregates::default();
            for row in &period.account_balances {
                aggregates
                    .accounts
                    .insert(row.account_id, row.end_balance_cents);
            }
            for row in &period.category_balances {
                aggregates
                    .categories
                    .insert(row.category_id, row.end_balance_cents);
            }
            aggregates
        }
        None => previous.clone(),
    }
}

/// Folds finalized periods beyond the chaining window into the category
/// aggregates.
///
/// Only their allocated and spent effects count; account balances stay at the
/// last chained finalized period's end, and unfinalized periods contribute
/// nothing.
pub fn extend_category_aggregates<'a>(
    aggregates: &mut LedgerAggregates,
    later: impl IntoIterator<Item = &'a Period>,
) {
    for period in later {
        if !period.allocations_finalized {
            continue;
        }
        for row in &period.category_balances {
            if is_sentinel(row.category_id) {
                continue;
            }
            *aggregates.categories.entry(row.category_id).or_default() +=
                row.allocated_cents + row.spent_cents;
        }
    }
}

/// Resolves the base snapshot for a chaining pass.
///
/// A stored non-zero start balance on the oldest loaded period wins outright.
/// Otherwise the durable store is walked backward one month at a time, up to
/// `limit` months, until a period with a non-zero start balance is found; its
/// end balances become the base. Exhausting the bound is reported as a
/// distinct outcome rather than being conflated with a history-free ledger.
pub async fn resolve_base_snapshot(
    store: &dyn DurableStore,
    ledger_id: Uuid,
    first: Option<&Period>,
    has_earlier_history: bool,
    limit: u32,
) -> Result<ResolvedBase, LedgerError> {
    let first = match first {
        Some(period) => period,
        None => {
            return Ok(ResolvedBase {
                snapshot: BalanceSnapshot::default(),
                provenance: BaseProvenance::Empty,
            })
        }
    };

    if has_stored_start(first) {
        return Ok(ResolvedBase {
            snapshot: snapshot_from_starts(first),
            provenance: BaseProvenance::StoredStart,
        });
    }

    if !has_earlier_history {
        return Ok(ResolvedBase {
            snapshot: BalanceSnapshot::default(),
            provenance: BaseProvenance::Empty,
        });
    }

    let mut cursor = first.ordinal.prev();
    for _ in 0..limit {
        if let Some(candidate) = docs::fetch_period(store, ledger_id, cursor).await? {
            if has_stored_start(&candidate) {
                return Ok(ResolvedBase {
                    snapshot: extract_snapshot(&candidate),
                    provenance: BaseProvenance::WalkBack(cursor),
                });
            }
        }
        cursor = cursor.prev();
    }

    tracing::warn!(
        %ledger_id,
        from = %first.ordinal,
        limit,
        "walk-back exhausted without finding a base snapshot; chaining from zero"
    );
    Ok(ResolvedBase {
        snapshot: BalanceSnapshot::default(),
        provenance: BaseProvenance::Exhausted,
    })
}

fn has_stored_start(period: &Period) -> bool {
    period
        .account_balances
        .iter()
        .any(|row| row.start_balance_cents != 0)
        || period
            .category_balances
            .iter()
            .any(|row| row.start_balance_cents != 0)
}

fn snapshot_from_starts(period: &Period) -> BalanceSnapshot {
    let mut snapshot = BalanceSnapshot::default();
    for row in &period.account_balances {
        if !is_sentinel(row.account_id) {
            snapshot
                .accounts
                .insert(row.account_id, row.start_balance_cents);
        }
    }
    for row in &period.category_balances {
        if !is_sentinel(row.category_id) {
            snapshot
                .categories
                .insert(row.category_id, row.start_balance_cents);
        }
    }
    snapshot
}
