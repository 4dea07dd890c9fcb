//! Orchestrator behavior: per-ledger deduplication, base-snapshot
//! resolution, invariant enforcement, and retry after failure.

use std::sync::Arc;

use uuid::Uuid;

use ledger_core::cache::LedgerCache;
use ledger_core::config::EngineConfig;
use ledger_core::core::Recalculator;
use ledger_core::domain::{AccountBalance, Ledger, Period, PeriodOrdinal};
use ledger_core::engine::BaseProvenance;
use ledger_core::errors::LedgerError;
use ledger_core::store::{docs, FailureMode, MemoryStore};

fn ordinal(year: i32, month: u32) -> PeriodOrdinal {
    PeriodOrdinal::new(year, month).unwrap()
}

fn recalculator(store: &Arc<MemoryStore>, config: EngineConfig) -> Arc<Recalculator> {
    let cache = Arc::new(LedgerCache::new(config.cache_staleness()));
    Arc::new(Recalculator::new(store.clone(), cache, config))
}

/// Seeds a ledger whose periods live only in the store, never in the cache.
async fn seed_ledger(store: &MemoryStore, ledger_id: Uuid, periods: &[Period]) -> Ledger {
    let mut ledger = Ledger::new("Seeded");
    ledger.id = ledger_id;
    for period in periods {
        ledger.index_insert(period.ordinal);
        docs::put_period(store, period).await.unwrap();
    }
    docs::put_ledger(store, &ledger).await.unwrap();
    ledger
}

fn finalized_month(ledger_id: Uuid, year: i32, month: u32) -> Period {
    let mut period = Period::new(ledger_id, ordinal(year, month));
    period.allocations_finalized = true;
    period
}

#[tokio::test]
async fn concurrent_calls_share_one_pass() {
    let store = Arc::new(MemoryStore::new());
    let ledger_id = Uuid::new_v4();
    let periods = vec![
        finalized_month(ledger_id, 2024, 1),
        finalized_month(ledger_id, 2024, 2),
    ];
    let ledger = seed_ledger(&store, ledger_id, &periods).await;

    let recalc = recalculator(&store, EngineConfig::default());
    let writes_before = store.write_count();
    let (a, b) = tokio::join!(
        recalc.recalculate(ledger.id, None),
        recalc.recalculate(ledger.id, None)
    );
    let a = a.unwrap();
    let b = b.unwrap();
    assert_eq!(a.chained, b.chained);

    // One batch item per chained period plus one aggregates update; a
    // duplicated pass would double this.
    let expected = a.chained.len() + 1;
    assert_eq!(store.write_count() - writes_before, expected);
    assert_eq!(recalc.registry().in_flight_count(), 0);
}

#[tokio::test]
async fn walk_back_finds_a_distant_base() {
    let store = Arc::new(MemoryStore::new());
    let ledger_id = Uuid::new_v4();
    let account = Uuid::new_v4();

    // January carries a stored non-zero start; April and May do not, and
    // February/March were never created.
    let mut january = finalized_month(ledger_id, 2024, 1);
    january
        .account_balances
        .push(AccountBalance::carried(account, 30_000));
    let periods = vec![
        january,
        finalized_month(ledger_id, 2024, 4),
        finalized_month(ledger_id, 2024, 5),
    ];
    seed_ledger(&store, ledger_id, &periods).await;

    let recalc = recalculator(&store, EngineConfig::default());
    let outcome = recalc
        .recalculate(ledger_id, Some(ordinal(2024, 5)))
        .await
        .unwrap();

    assert_eq!(outcome.provenance, BaseProvenance::WalkBack(ordinal(2024, 1)));
    assert_eq!(outcome.chained, vec![ordinal(2024, 4), ordinal(2024, 5)]);
    assert_eq!(outcome.aggregates.account_balance(account), 30_000);

    let may = docs::fetch_period(&*store, ledger_id, ordinal(2024, 5))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        may.account_balance(account).unwrap().end_balance_cents,
        30_000
    );
}

#[tokio::test]
async fn exhausted_walk_back_is_reported_not_hidden() {
    let store = Arc::new(MemoryStore::new());
    let ledger_id = Uuid::new_v4();
    let periods = vec![
        finalized_month(ledger_id, 2024, 3),
        finalized_month(ledger_id, 2024, 4),
        finalized_month(ledger_id, 2024, 5),
    ];
    seed_ledger(&store, ledger_id, &periods).await;

    let config = EngineConfig {
        walk_back_limit: 5,
        ..EngineConfig::default()
    };
    let recalc = recalculator(&store, config);
    let outcome = recalc
        .recalculate(ledger_id, Some(ordinal(2024, 5)))
        .await
        .unwrap();
    assert_eq!(outcome.provenance, BaseProvenance::Exhausted);
}

#[tokio::test]
async fn ledger_without_periods_has_zero_aggregates() {
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new("Fresh");
    docs::put_ledger(&*store, &ledger).await.unwrap();

    let recalc = recalculator(&store, EngineConfig::default());
    let outcome = recalc.recalculate(ledger.id, None).await.unwrap();
    assert_eq!(outcome.provenance, BaseProvenance::Empty);
    assert!(outcome.chained.is_empty());
    assert!(outcome.aggregates.accounts.is_empty());
    assert!(outcome.aggregates.categories.is_empty());
}

#[tokio::test]
async fn chain_start_after_the_trigger_fails_loudly() {
    let store = Arc::new(MemoryStore::new());
    let ledger_id = Uuid::new_v4();
    let may = finalized_month(ledger_id, 2024, 5);
    seed_ledger(&store, ledger_id, std::slice::from_ref(&may)).await;

    let recalc = recalculator(&store, EngineConfig::default());
    let err = recalc
        .recalculate(ledger_id, Some(ordinal(2024, 1)))
        .await
        .expect_err("a chain start after the trigger is a bug");
    assert!(
        matches!(err.root(), LedgerError::InvariantViolation(_)),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn failed_pass_leaves_no_in_flight_entry_and_retries_cleanly() {
    let store = Arc::new(MemoryStore::new());
    let ledger_id = Uuid::new_v4();
    let periods = vec![
        finalized_month(ledger_id, 2024, 1),
        finalized_month(ledger_id, 2024, 2),
    ];
    seed_ledger(&store, ledger_id, &periods).await;

    let recalc = recalculator(&store, EngineConfig::default());
    store.set_failure(FailureMode::FailWrites);
    let err = recalc
        .recalculate(ledger_id, None)
        .await
        .expect_err("writes are failing");
    assert!(
        matches!(err.root(), LedgerError::WriteFailed(_)),
        "unexpected error: {err:?}"
    );
    assert_eq!(recalc.registry().in_flight_count(), 0);

    // The pass is idempotent, so a retry from the same state succeeds.
    store.set_failure(FailureMode::None);
    let outcome = recalc.recalculate(ledger_id, None).await.unwrap();
    assert_eq!(outcome.chained.len(), 2);
}

#[tokio::test]
async fn unknown_ledger_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let recalc = recalculator(&store, EngineConfig::default());
    let err = recalc
        .recalculate(Uuid::new_v4(), None)
        .await
        .expect_err("no such ledger");
    assert!(err.root().is_not_found(), "unexpected error: {err:?}");
}
