use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder id meaning "no account" or "no category".
///
/// Entries may reference it when they intentionally affect no real balance;
/// it must never acquire a balance row of its own.
pub fn sentinel_id() -> Uuid {
    Uuid::nil()
}

pub fn is_sentinel(id: Uuid) -> bool {
    id.is_nil()
}

/// Money received into an account. Amounts are cents, positive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomeEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount_cents: i64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl IncomeEntry {
    pub fn new(account_id: Uuid, amount_cents: i64, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount_cents,
            date,
            memo: None,
        }
    }
}

/// Money spent from an account against a category.
///
/// Amounts are signed cents; a negative amount is an outflow, a positive one a
/// refund.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpenseEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub amount_cents: i64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl ExpenseEntry {
    pub fn new(account_id: Uuid, category_id: Uuid, amount_cents: i64, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            category_id,
            amount_cents,
            date,
            memo: None,
        }
    }
}

/// Movement between two accounts; debits `from_account`, credits `to_account`.
/// Amounts are cents, positive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferEntry {
    pub id: Uuid,
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub amount_cents: i64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl TransferEntry {
    pub fn new(from_account: Uuid, to_account: Uuid, amount_cents: i64, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_account,
            to_account,
            amount_cents,
            date,
            memo: None,
        }
    }
}

/// Manual correction applied to whichever non-sentinel account and/or category
/// it references. Signed cents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdjustmentEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category_id: Uuid,
    pub amount_cents: i64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl AdjustmentEntry {
    pub fn new(account_id: Uuid, category_id: Uuid, amount_cents: i64, date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            category_id,
            amount_cents,
            date,
            memo: None,
        }
    }
}

/// One entry-level edit applied to a period through the optimistic protocol.
#[derive(Debug, Clone)]
pub enum EntryEdit {
    AddIncome(IncomeEntry),
    UpdateIncome(IncomeEntry),
    RemoveIncome(Uuid),
    AddExpense(ExpenseEntry),
    UpdateExpense(ExpenseEntry),
    RemoveExpense(Uuid),
    AddTransfer(TransferEntry),
    UpdateTransfer(TransferEntry),
    RemoveTransfer(Uuid),
    AddAdjustment(AdjustmentEntry),
    UpdateAdjustment(AdjustmentEntry),
    RemoveAdjustment(Uuid),
    /// Sets a category's allocation for the period, creating its row if needed.
    SetAllocation {
        category_id: Uuid,
        amount_cents: i64,
    },
    SetFinalized(bool),
    /// Periods are never deleted, only emptied.
    ClearContents,
}
