use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::balance::{AccountBalance, CategoryBalance};
use super::entry::{
    is_sentinel, AdjustmentEntry, EntryEdit, ExpenseEntry, IncomeEntry, TransferEntry,
};
use super::ordinal::PeriodOrdinal;

pub const PERIOD_SCHEMA_VERSION: u8 = 2;

/// One calendar month of a ledger: raw entry lists plus derived balances.
///
/// Owned exclusively by its ledger. Created lazily on first access, seeded
/// from the previous period's end balances; never deleted, only emptied.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Period {
    pub ledger_id: Uuid,
    pub ordinal: PeriodOrdinal,
    #[serde(default)]
    pub income: Vec<IncomeEntry>,
    #[serde(default)]
    pub expenses: Vec<ExpenseEntry>,
    #[serde(default)]
    pub transfers: Vec<TransferEntry>,
    #[serde(default)]
    pub adjustments: Vec<AdjustmentEntry>,
    #[serde(default)]
    pub allocations_finalized: bool,
    #[serde(default)]
    pub account_balances: Vec<AccountBalance>,
    #[serde(default)]
    pub category_balances: Vec<CategoryBalance>,
    #[serde(default)]
    pub total_income_cents: i64,
    #[serde(default)]
    pub total_expenses_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "Period::schema_version_default")]
    pub schema_version: u8,
}

impl Period {
    pub fn new(ledger_id: Uuid, ordinal: PeriodOrdinal) -> Self {
        let now = Utc::now();
        Self {
            ledger_id,
            ordinal,
            income: Vec::new(),
            expenses: Vec::new(),
            transfers: Vec::new(),
            adjustments: Vec::new(),
            allocations_finalized: false,
            account_balances: Vec::new(),
            category_balances: Vec::new(),
            total_income_cents: 0,
            total_expenses_cents: 0,
            created_at: now,
            updated_at: now,
            schema_version: PERIOD_SCHEMA_VERSION,
        }
    }

    pub fn account_balance(&self, account_id: Uuid) -> Option<&AccountBalance> {
        self.account_balances
            .iter()
            .find(|row| row.account_id == account_id)
    }

    pub fn category_balance(&self, category_id: Uuid) -> Option<&CategoryBalance> {
        self.category_balances
            .iter()
            .find(|row| row.category_id == category_id)
    }

    /// Applies an entry-level edit to the raw lists. Returns `false` when the
    /// edit targets an entry that does not exist; derived balances are not
    /// touched here, callers retotal afterwards.
    pub fn apply_edit(&mut self, edit: &EntryEdit) -> bool {
        let applied = match edit {
            EntryEdit::AddIncome(entry) => {
                self.income.push(entry.clone());
                true
            }
            EntryEdit::UpdateIncome(entry) => {
                replace_by_id(&mut self.income, entry.id, |e| *e = entry.clone())
            }
            EntryEdit::RemoveIncome(id) => remove_by_id(&mut self.income, *id, |e| e.id),
            EntryEdit::AddExpense(entry) => {
                self.expenses.push(entry.clone());
                true
            }
            EntryEdit::UpdateExpense(entry) => {
                replace_by_id(&mut self.expenses, entry.id, |e| *e = entry.clone())
            }
            EntryEdit::RemoveExpense(id) => remove_by_id(&mut self.expenses, *id, |e| e.id),
            EntryEdit::AddTransfer(entry) => {
                self.transfers.push(entry.clone());
                true
            }
            EntryEdit::UpdateTransfer(entry) => {
                replace_by_id(&mut self.transfers, entry.id, |e| *e = entry.clone())
            }
            EntryEdit::RemoveTransfer(id) => remove_by_id(&mut self.transfers, *id, |e| e.id),
            EntryEdit::AddAdjustment(entry) => {
                self.adjustments.push(entry.clone());
                true
            }
            EntryEdit::UpdateAdjustment(entry) => {
                replace_by_id(&mut self.adjustments, entry.id, |e| *e = entry.clone())
            }
            EntryEdit::RemoveAdjustment(id) => remove_by_id(&mut self.adjustments, *id, |e| e.id),
            EntryEdit::SetAllocation {
                category_id,
                amount_cents,
            } => self.set_allocation(*category_id, *amount_cents),
            EntryEdit::SetFinalized(flag) => {
                self.allocations_finalized = *flag;
                true
            }
            EntryEdit::ClearContents => {
                self.income.clear();
                self.expenses.clear();
                self.transfers.clear();
                self.adjustments.clear();
                true
            }
        };
        if applied {
            self.touch();
        }
        applied
    }

    fn set_allocation(&mut self, category_id: Uuid, amount_cents: i64) -> bool {
        if is_sentinel(category_id) {
            return false;
        }
        match self
            .category_balances
            .iter_mut()
            .find(|row| row.category_id == category_id)
        {
            Some(row) => row.allocated_cents = amount_cents,
            None => {
                let mut row = CategoryBalance::carried(category_id, 0);
                row.allocated_cents = amount_cents;
                self.category_balances.push(row);
            }
        }
        true
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        PERIOD_SCHEMA_VERSION
    }
}

fn replace_by_id<T, F>(entries: &mut [T], id: Uuid, apply: F) -> bool
where
    T: HasEntryId,
    F: FnOnce(&mut T),
{
    match entries.iter_mut().find(|e| e.entry_id() == id) {
        Some(entry) => {
            apply(entry);
            true
        }
        None => false,
    }
}

fn remove_by_id<T, F>(entries: &mut Vec<T>, id: Uuid, key: F) -> bool
where
    F: Fn(&T) -> Uuid,
{
    let before = entries.len();
    entries.retain(|e| key(e) != id);
    entries.len() != before
}

trait HasEntryId {
    fn entry_id(&self) -> Uuid;
}

impl HasEntryId for IncomeEntry {
    fn entry_id(&self) -> Uuid {
        self.id
    }
}

impl HasEntryId for ExpenseEntry {
    fn entry_id(&self) -> Uuid {
        self.id
    }
}

impl HasEntryId for TransferEntry {
    fn entry_id(&self) -> Uuid {
        self.id
    }
}

impl HasEntryId for AdjustmentEntry {
    fn entry_id(&self) -> Uuid {
        self.id
    }
}
