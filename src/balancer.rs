use crate::error::{LedgerError, Result};
use crate::{Direction, LedgerEntry};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub entry: LedgerEntry,
    /// Account balance immediately before this entry took effect
    pub balance_before: Decimal,
    /// Account balance immediately after this entry took effect
    pub balance_after: Decimal,
}

/// Transaction history of one account with the balance after every entry.
///
/// A projection recomputed on every query: rows are newest first and the
/// first row's `balance_after` equals `current_balance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountLedgerView {
    pub current_balance: Decimal,
    pub rows: Vec<LedgerRow>,
}

impl AccountLedgerView {
    /// Builds the view from entries given oldest first.
    pub fn from_oldest_first(
        current_balance: Decimal,
        mut entries: Vec<LedgerEntry>,
    ) -> Result<Self> {
        entries.reverse();
        compute_running_balances(current_balance, entries)
    }

    /// Balance before the oldest entry in the view.
    pub fn opening_balance(&self) -> Decimal {
        self.rows
            .last()
            .map_or(self.current_balance, |row| row.balance_before)
    }

    pub fn total_inflow(&self) -> Result<Decimal> {
        checked_total(
            self.rows
                .iter()
                .map(|row| &row.entry)
                .filter(|entry| entry.direction == Direction::Income),
        )
    }

    pub fn total_outflow(&self) -> Result<Decimal> {
        checked_total(
            self.rows
                .iter()
                .map(|row| &row.entry)
                .filter(|entry| entry.direction == Direction::Expense),
        )
    }

    pub fn oldest_first(&self) -> impl Iterator<Item = &LedgerRow> {
        self.rows.iter().rev()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn overflow(entry: &LedgerEntry) -> LedgerError {
    LedgerError::AmountOverflow {
        entry_id: entry.id.clone(),
    }
}

fn apply(balance: Decimal, entry: &LedgerEntry) -> Result<Decimal> {
    balance
        .checked_add(entry.signed_amount())
        .ok_or_else(|| overflow(entry))
}

fn undo(balance: Decimal, entry: &LedgerEntry) -> Result<Decimal> {
    balance
        .checked_sub(entry.signed_amount())
        .ok_or_else(|| overflow(entry))
}

/// Sums entry amounts, failing instead of panicking past `Decimal::MAX`.
pub(crate) fn checked_total<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> Result<Decimal> {
    entries.into_iter().try_fold(Decimal::ZERO, |total, entry| {
        total.checked_add(entry.amount).ok_or_else(|| overflow(entry))
    })
}

fn differs(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    a.checked_sub(b).map_or(true, |diff| diff.abs() > tolerance)
}

/// Derives historical balances by walking backward from a known current
/// balance.
///
/// `entries_newest_first` must be ordered newest first: the balance after the
/// newest entry is `current_balance`, and each entry's effect is undone to
/// obtain the balance before it, which is the balance after the next older
/// entry. Callers holding oldest-first data use
/// [`AccountLedgerView::from_oldest_first`]. Fails with
/// [`LedgerError::AmountOverflow`] when a balance leaves the `Decimal` range.
pub fn compute_running_balances(
    current_balance: Decimal,
    entries_newest_first: Vec<LedgerEntry>,
) -> Result<AccountLedgerView> {
    let mut rows = Vec::with_capacity(entries_newest_first.len());
    let mut balance_after = current_balance;

    for entry in entries_newest_first {
        let balance_before = undo(balance_after, &entry)?;
        rows.push(LedgerRow {
            entry,
            balance_before,
            balance_after,
        });
        balance_after = balance_before;
    }

    debug!(
        "Computed {} running balances back from {}",
        rows.len(),
        current_balance
    );

    Ok(AccountLedgerView {
        current_balance,
        rows,
    })
}

/// Checks that every row is internally consistent and chains into its
/// neighbour, within `tolerance`.
pub fn verify_running_balances(view: &AccountLedgerView, tolerance: Decimal) -> Result<()> {
    let mut expected_after = view.current_balance;

    for row in &view.rows {
        if differs(row.balance_after, expected_after, tolerance) {
            return Err(LedgerError::BalanceMismatch {
                entry_id: row.entry.id.clone(),
                expected: expected_after,
                actual: row.balance_after,
            });
        }

        let reapplied = apply(row.balance_before, &row.entry)?;
        if differs(reapplied, row.balance_after, tolerance) {
            return Err(LedgerError::BalanceMismatch {
                entry_id: row.entry.id.clone(),
                expected: row.balance_after,
                actual: reapplied,
            });
        }

        expected_after = row.balance_before;
    }

    Ok(())
}
