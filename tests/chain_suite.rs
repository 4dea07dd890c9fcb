//! End-to-end chaining behavior through the services: balances propagate
//! forward, drafts stay out of committed state, aggregates follow the
//! finalization rules.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use ledger_core::cache::LedgerCache;
use ledger_core::config::EngineConfig;
use ledger_core::core::{LedgerService, PeriodService, Recalculator};
use ledger_core::domain::{EntryEdit, ExpenseEntry, IncomeEntry, PeriodOrdinal};
use ledger_core::store::{FailureMode, MemoryStore, LEDGERS};

struct Harness {
    store: Arc<MemoryStore>,
    ledgers: LedgerService,
    periods: PeriodService,
}

fn harness() -> Harness {
    // Wide creation window so fixtures can use fixed historical months.
    let config = EngineConfig {
        past_window_months: 10_000,
        future_window_months: 10_000,
        ..EngineConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(LedgerCache::new(config.cache_staleness()));
    let recalc = Arc::new(Recalculator::new(
        store.clone(),
        cache.clone(),
        config.clone(),
    ));
    Harness {
        store: store.clone(),
        ledgers: LedgerService::new(store.clone(), cache.clone()),
        periods: PeriodService::new(store, cache, recalc, config),
    }
}

fn ordinal(year: i32, month: u32) -> PeriodOrdinal {
    PeriodOrdinal::new(year, month).unwrap()
}

fn date(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 10).unwrap()
}

#[tokio::test]
async fn balances_chain_through_empty_finalized_months() {
    let h = harness();
    let ledger = h.ledgers.create("Household").await.unwrap();
    let account = Uuid::new_v4();

    h.periods
        .apply_edit(
            ledger.id,
            ordinal(2024, 1),
            EntryEdit::AddIncome(IncomeEntry::new(account, 50_000, date(2024, 1))),
        )
        .await
        .unwrap();
    for month in 1..=3 {
        h.periods
            .apply_edit(ledger.id, ordinal(2024, month), EntryEdit::SetFinalized(true))
            .await
            .unwrap();
    }

    for month in 1..=3 {
        let period = h
            .periods
            .get_period(ledger.id, ordinal(2024, month))
            .await
            .unwrap()
            .expect("period exists");
        assert_eq!(
            period.account_balance(account).unwrap().end_balance_cents,
            50_000,
            "balance must carry through 2024-{month:02}"
        );
    }
    // Adjacent months agree on the hand-off.
    let feb = h
        .periods
        .get_period(ledger.id, ordinal(2024, 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        feb.account_balance(account).unwrap().start_balance_cents,
        50_000
    );

    let aggregates = h.ledgers.aggregates(ledger.id).await.unwrap();
    assert_eq!(aggregates.account_balance(account), 50_000);
}

#[tokio::test]
async fn income_and_expense_settle_account_and_category() {
    let h = harness();
    let ledger = h.ledgers.create("Scenario").await.unwrap();
    let account = Uuid::new_v4();
    let category = Uuid::new_v4();
    let month = ordinal(2024, 5);

    h.periods
        .apply_edit(
            ledger.id,
            month,
            EntryEdit::AddIncome(IncomeEntry::new(account, 100_000, date(2024, 5))),
        )
        .await
        .unwrap();
    let period = h
        .periods
        .apply_edit(
            ledger.id,
            month,
            EntryEdit::AddExpense(ExpenseEntry::new(
                account,
                category,
                -20_000,
                date(2024, 5),
            )),
        )
        .await
        .unwrap();

    assert_eq!(
        period.account_balance(account).unwrap().end_balance_cents,
        80_000
    );
    assert_eq!(
        period.category_balance(category).unwrap().end_balance_cents,
        -20_000
    );
}

#[tokio::test]
async fn unfinalized_allocations_never_reach_aggregates() {
    let h = harness();
    let ledger = h.ledgers.create("Budgets").await.unwrap();
    let account = Uuid::new_v4();
    let category = Uuid::new_v4();

    h.periods
        .apply_edit(
            ledger.id,
            ordinal(2024, 1),
            EntryEdit::SetAllocation {
                category_id: category,
                amount_cents: 10_000,
            },
        )
        .await
        .unwrap();
    h.periods
        .apply_edit(
            ledger.id,
            ordinal(2024, 1),
            EntryEdit::AddExpense(ExpenseEntry::new(account, category, -2_000, date(2024, 1))),
        )
        .await
        .unwrap();
    h.periods
        .apply_edit(ledger.id, ordinal(2024, 1), EntryEdit::SetFinalized(true))
        .await
        .unwrap();
    // February allocates more but stays a draft.
    h.periods
        .apply_edit(
            ledger.id,
            ordinal(2024, 2),
            EntryEdit::SetAllocation {
                category_id: category,
                amount_cents: 5_000,
            },
        )
        .await
        .unwrap();

    let aggregates = h.ledgers.aggregates(ledger.id).await.unwrap();
    assert_eq!(aggregates.category_balance(category), 8_000);
}

#[tokio::test]
async fn draft_balances_survive_upstream_edits_untouched() {
    let h = harness();
    let ledger = h.ledgers.create("Drafts").await.unwrap();
    let account = Uuid::new_v4();

    h.periods
        .apply_edit(
            ledger.id,
            ordinal(2024, 1),
            EntryEdit::AddIncome(IncomeEntry::new(account, 10_000, date(2024, 1))),
        )
        .await
        .unwrap();
    h.periods
        .apply_edit(ledger.id, ordinal(2024, 1), EntryEdit::SetFinalized(true))
        .await
        .unwrap();
    // A draft month with activity.
    h.periods
        .apply_edit(
            ledger.id,
            ordinal(2024, 2),
            EntryEdit::AddIncome(IncomeEntry::new(account, 5_000, date(2024, 2))),
        )
        .await
        .unwrap();
    let draft_before = h
        .periods
        .get_period(ledger.id, ordinal(2024, 2))
        .await
        .unwrap()
        .unwrap();

    // Upstream edit re-chains January only.
    h.periods
        .apply_edit(
            ledger.id,
            ordinal(2024, 1),
            EntryEdit::AddIncome(IncomeEntry::new(account, 1_000, date(2024, 1))),
        )
        .await
        .unwrap();

    let draft_after = h
        .periods
        .get_period(ledger.id, ordinal(2024, 2))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(draft_after.account_balances, draft_before.account_balances);
    assert_eq!(draft_after.category_balances, draft_before.category_balances);

    let january = h
        .periods
        .get_period(ledger.id, ordinal(2024, 1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        january.account_balance(account).unwrap().end_balance_cents,
        11_000
    );
}

#[tokio::test]
async fn new_periods_seed_from_their_predecessor() {
    let h = harness();
    let ledger = h.ledgers.create("Seeding").await.unwrap();
    let account = Uuid::new_v4();

    h.periods
        .apply_edit(
            ledger.id,
            ordinal(2024, 3),
            EntryEdit::AddIncome(IncomeEntry::new(account, 7_500, date(2024, 3))),
        )
        .await
        .unwrap();
    h.periods
        .apply_edit(ledger.id, ordinal(2024, 3), EntryEdit::SetFinalized(true))
        .await
        .unwrap();

    // First touch of June creates it, carrying March's end balances.
    let june = h
        .periods
        .apply_edit(ledger.id, ordinal(2024, 6), EntryEdit::SetFinalized(false))
        .await
        .unwrap();
    assert_eq!(
        june.account_balance(account).unwrap().start_balance_cents,
        7_500
    );
    assert!(h
        .store
        .contains("periods", &format!("{}_{}", ledger.id, "202406")));
}

#[tokio::test]
async fn interrupted_registration_is_repaired_by_the_next_edit() {
    let h = harness();
    let ledger = h.ledgers.create("Recovery").await.unwrap();
    let account = Uuid::new_v4();
    let month = ordinal(2024, 1);

    // The period document commits, then the index registration dies.
    h.store.set_failure(FailureMode::FailWritesTo(LEDGERS));
    let err = h
        .periods
        .apply_edit(
            ledger.id,
            month,
            EntryEdit::AddIncome(IncomeEntry::new(account, 6_000, date(2024, 1))),
        )
        .await
        .expect_err("index registration is failing");
    assert!(
        matches!(
            err.root(),
            ledger_core::errors::LedgerError::WriteFailed(_)
        ),
        "unexpected error: {err:?}"
    );
    assert!(h
        .store
        .contains("periods", &format!("{}_{}", ledger.id, "202401")));

    // A retried edit finds the stored-but-unindexed period and registers it.
    h.store.set_failure(FailureMode::None);
    h.periods
        .apply_edit(ledger.id, month, EntryEdit::SetFinalized(true))
        .await
        .unwrap();

    let stored = h.ledgers.get(ledger.id).await.unwrap().unwrap();
    assert!(stored.period_index.contains(&month));
    let aggregates = h.ledgers.aggregates(ledger.id).await.unwrap();
    assert_eq!(aggregates.account_balance(account), 6_000);
}

#[tokio::test]
async fn period_creation_outside_the_window_is_rejected() {
    let config = EngineConfig::default();
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(LedgerCache::new(config.cache_staleness()));
    let recalc = Arc::new(Recalculator::new(
        store.clone(),
        cache.clone(),
        config.clone(),
    ));
    let ledgers = LedgerService::new(store.clone(), cache.clone());
    let periods = PeriodService::new(store, cache, recalc, config);

    let ledger = ledgers.create("Bounded").await.unwrap();
    let err = periods
        .apply_edit(
            ledger.id,
            ordinal(1999, 1),
            EntryEdit::SetFinalized(false),
        )
        .await
        .expect_err("creation far in the past must fail");
    assert!(
        matches!(err, ledger_core::errors::LedgerError::Invalid(_)),
        "unexpected error: {err:?}"
    );
}
