use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One account's position within a period.
///
/// Entirely derived: rebuilt whole on every retotal or chain pass, never
/// patched incrementally. `start_balance_cents` is owned by the chain engine;
/// the retotal engine only recomputes the deltas and the end balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountBalance {
    pub account_id: Uuid,
    pub start_balance_cents: i64,
    #[serde(default)]
    pub income_cents: i64,
    #[serde(default)]
    pub expenses_cents: i64,
    #[serde(default)]
    pub transfers_cents: i64,
    #[serde(default)]
    pub adjustments_cents: i64,
    pub end_balance_cents: i64,
}

impl AccountBalance {
    /// A row carried forward from a previous period, with no activity yet.
    pub fn carried(account_id: Uuid, start_balance_cents: i64) -> Self {
        Self {
            account_id,
            start_balance_cents,
            income_cents: 0,
            expenses_cents: 0,
            transfers_cents: 0,
            adjustments_cents: 0,
            end_balance_cents: start_balance_cents,
        }
    }

    pub fn net_change_cents(&self) -> i64 {
        self.income_cents + self.expenses_cents + self.transfers_cents + self.adjustments_cents
    }
}

/// One category's position within a period.
///
/// `allocated_cents` is user-set and preserved across retotals; `spent_cents`
/// and `adjustments_cents` are derived from the entry lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryBalance {
    pub category_id: Uuid,
    pub start_balance_cents: i64,
    #[serde(default)]
    pub allocated_cents: i64,
    #[serde(default)]
    pub spent_cents: i64,
    #[serde(default)]
    pub adjustments_cents: i64,
    pub end_balance_cents: i64,
}

impl CategoryBalance {
    pub fn carried(category_id: Uuid, start_balance_cents: i64) -> Self {
        Self {
            category_id,
            start_balance_cents,
            allocated_cents: 0,
            spent_cents: 0,
            adjustments_cents: 0,
            end_balance_cents: start_balance_cents,
        }
    }

    pub fn net_change_cents(&self) -> i64 {
        self.allocated_cents + self.spent_cents + self.adjustments_cents
    }
}
