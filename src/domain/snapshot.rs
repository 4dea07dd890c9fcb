use std::collections::BTreeMap;

use uuid::Uuid;

/// End-of-period balances handed from one chaining step to the next.
///
/// Transient by design: never persisted, never cached. It is the sole channel
/// through which one period's result feeds the next period's computation,
/// which keeps chaining independent of how many periods are in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub accounts: BTreeMap<Uuid, i64>,
    pub categories: BTreeMap<Uuid, i64>,
    /// Income total of the period this snapshot was extracted from.
    pub income_cents: i64,
}

impl BalanceSnapshot {
    pub fn account_balance(&self, account_id: Uuid) -> i64 {
        self.accounts.get(&account_id).copied().unwrap_or(0)
    }

    pub fn category_balance(&self, category_id: Uuid) -> i64 {
        self.categories.get(&category_id).copied().unwrap_or(0)
    }
}
