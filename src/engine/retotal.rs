use std::collections::BTreeMap;

use uuid::Uuid;

use crate::domain::{
    is_sentinel, AccountBalance, CategoryBalance, Period,
};

/// Recomputes a period's derived balance rows and totals from its raw entry
/// lists.
///
/// Pure and idempotent: `retotal(retotal(p)) == retotal(p)`. Every row's
/// `start_balance_cents` is preserved unchanged (the chain engine owns it), as
/// is every category row's `allocated_cents`. Rows are rebuilt whole, never
/// patched, and ids that appear only in prior balances are kept with zeroed
/// deltas. The sentinel id never acquires a row.
pub fn retotal(period: &Period) -> Period {
    let mut next = period.clone();
    retotal_in_place(&mut next);
    next
}

pub(crate) fn retotal_in_place(period: &mut Period) {
    period.account_balances = rebuild_account_rows(period);
    period.category_balances = rebuild_category_rows(period);
    period.total_income_cents = period.income.iter().map(|e| e.amount_cents).sum();
    period.total_expenses_cents = period.expenses.iter().map(|e| e.amount_cents).sum();
}

fn rebuild_account_rows(period: &Period) -> Vec<AccountBalance> {
    // Union of ids referenced by any entry plus ids already holding a row.
    let mut starts: BTreeMap<Uuid, i64> = BTreeMap::new();
    for row in &period.account_balances {
        if !is_sentinel(row.account_id) {
            starts.insert(row.account_id, row.start_balance_cents);
        }
    }
    let mut ids: Vec<Uuid> = starts.keys().copied().collect();
    ids.extend(period.income.iter().map(|e| e.account_id));
    ids.extend(period.expenses.iter().map(|e| e.account_id));
    ids.extend(period.transfers.iter().map(|e| e.from_account));
    ids.extend(period.transfers.iter().map(|e| e.to_account));
    ids.extend(period.adjustments.iter().map(|e| e.account_id));
    ids.retain(|id| !is_sentinel(*id));
    ids.sort();
    ids.dedup();

    ids.into_iter()
        .map(|account_id| {
            let start = starts.get(&account_id).copied().unwrap_or(0);
            let income: i64 = period
                .income
                .iter()
                .filter(|e| e.account_id == account_id)
                .map(|e| e.amount_cents)
                .sum();
            let expenses: i64 = period
                .expenses
                .iter()
                .filter(|e| e.account_id == account_id)
                .map(|e| e.amount_cents)
                .sum();
            let transfers: i64 = period
                .transfers
                .iter()
                .map(|e| {
                    let mut delta = 0;
                    if e.to_account == account_id {
                        delta += e.amount_cents;
                    }
                    if e.from_account == account_id {
                        delta -= e.amount_cents;
                    }
                    delta
                })
                .sum();
            let adjustments: i64 = period
                .adjustments
                .iter()
                .filter(|e| e.account_id == account_id)
                .map(|e| e.amount_cents)
                .sum();
            let mut row = AccountBalance {
                account_id,
                start_balance_cents: start,
                income_cents: income,
                expenses_cents: expenses,
                transfers_cents: transfers,
                adjustments_cents: adjustments,
                end_balance_cents: 0,
            };
            row.end_balance_cents = row.start_balance_cents + row.net_change_cents();
            row
        })
        .collect()
}

fn rebuild_category_rows(period: &Period) -> Vec<CategoryBalance> {
    // Prior rows own both the start balance and the user-set allocation.
    let mut prior: BTreeMap<Uuid, (i64, i64)> = BTreeMap::new();
    for row in &period.category_balances {
        if !is_sentinel(row.category_id) {
            prior.insert(row.category_id, (row.start_balance_cents, row.allocated_cents));
        }
    }
    let mut ids: Vec<Uuid> = prior.keys().copied().collect();
    ids.extend(period.expenses.iter().map(|e| e.category_id));
    ids.extend(period.adjustments.iter().map(|e| e.category_id));
    ids.retain(|id| !is_sentinel(*id));
    ids.sort();
    ids.dedup();

    ids.into_iter()
        .map(|category_id| {
            let (start, allocated) = prior.get(&category_id).copied().unwrap_or((0, 0));
            let spent: i64 = period
                .expenses
                .iter()
                .filter(|e| e.category_id == category_id)
                .map(|e| e.amount_cents)
                .sum();
            let adjustments: i64 = period
                .adjustments
                .iter()
                .filter(|e| e.category_id == category_id)
                .map(|e| e.amount_cents)
                .sum();
            let mut row = CategoryBalance {
                category_id,
                start_balance_cents: start,
                allocated_cents: allocated,
                spent_cents: spent,
                adjustments_cents: adjustments,
                end_balance_cents: 0,
            };
            row.end_balance_cents = row.start_balance_cents + row.net_change_cents();
            row
        })
        .collect()
}
