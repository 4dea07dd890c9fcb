//! Ledger domain models: periods, entries, balance rows, snapshots.

pub mod balance;
pub mod entry;
pub mod ledger;
pub mod ordinal;
pub mod period;
pub mod snapshot;

pub use balance::{AccountBalance, CategoryBalance};
pub use entry::{
    is_sentinel, sentinel_id, AdjustmentEntry, EntryEdit, ExpenseEntry, IncomeEntry,
    TransferEntry,
};
pub use ledger::{Ledger, LedgerAggregates, LEDGER_SCHEMA_VERSION};
pub use ordinal::PeriodOrdinal;
pub use period::{Period, PERIOD_SCHEMA_VERSION};
pub use snapshot::BalanceSnapshot;
