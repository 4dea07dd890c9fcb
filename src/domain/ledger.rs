use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ordinal::PeriodOrdinal;

pub const LEDGER_SCHEMA_VERSION: u8 = 2;

/// Per-entity "current" balances shown outside any single period's view.
///
/// Defined as the end balances of the latest finalized period, plus (for
/// categories only) the allocated and spent effects of any strictly later
/// finalized periods. Unfinalized periods never contribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerAggregates {
    #[serde(default)]
    pub accounts: BTreeMap<Uuid, i64>,
    #[serde(default)]
    pub categories: BTreeMap<Uuid, i64>,
}

impl LedgerAggregates {
    pub fn account_balance(&self, account_id: Uuid) -> i64 {
        self.accounts.get(&account_id).copied().unwrap_or(0)
    }

    pub fn category_balance(&self, category_id: Uuid) -> i64 {
        self.categories.get(&category_id).copied().unwrap_or(0)
    }
}

/// Ledger document: the period index plus cross-period aggregate balances.
///
/// The index holds ordinals only, so the orchestrator can bound its work
/// without fetching full period documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub period_index: Vec<PeriodOrdinal>,
    #[serde(default)]
    pub aggregates: LedgerAggregates,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "Ledger::schema_version_default")]
    pub schema_version: u8,
}

impl Ledger {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            period_index: Vec::new(),
            aggregates: LedgerAggregates::default(),
            created_at: now,
            updated_at: now,
            schema_version: LEDGER_SCHEMA_VERSION,
        }
    }

    /// Inserts an ordinal into the index, keeping it sorted and deduplicated.
    /// Returns `true` when the ordinal was not already present.
    pub fn index_insert(&mut self, ordinal: PeriodOrdinal) -> bool {
        match self.period_index.binary_search(&ordinal) {
            Ok(_) => false,
            Err(pos) => {
                self.period_index.insert(pos, ordinal);
                self.touch();
                true
            }
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn schema_version_default() -> u8 {
        LEDGER_SCHEMA_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_insert_keeps_order_and_rejects_duplicates() {
        let mut ledger = Ledger::new("Household");
        let feb = PeriodOrdinal::new(2024, 2).unwrap();
        let jan = PeriodOrdinal::new(2024, 1).unwrap();
        assert!(ledger.index_insert(feb));
        assert!(ledger.index_insert(jan));
        assert!(!ledger.index_insert(feb));
        assert_eq!(ledger.period_index, vec![jan, feb]);
    }
}
