use crate::{Category, Direction, LedgerEntry};
use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use std::collections::HashSet;

/// The fields two entries must share to be considered the same event, e.g. a
/// deposit surfaced by both the payments and bank transaction sources.
///
/// Coarse: unrelated same-day transactions with identical labels and amounts
/// merge, and descriptions differing by one character do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Decimal,
    pub direction: Direction,
    pub category: Category,
}

impl DedupeKey {
    pub fn of(entry: &LedgerEntry) -> Self {
        Self {
            date: entry.date,
            description: entry.description.clone(),
            // 100 and 100.00 are the same amount
            amount: entry.amount.normalize(),
            direction: entry.direction,
            category: entry.category,
        }
    }
}

/// Keeps the first entry for each [`DedupeKey`], preserving input order.
pub fn dedupe(entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    dedupe_with_report(entries).0
}

/// Like [`dedupe`], but also returns the entries that were dropped.
pub fn dedupe_with_report(entries: Vec<LedgerEntry>) -> (Vec<LedgerEntry>, Vec<LedgerEntry>) {
    let mut seen: HashSet<DedupeKey> = HashSet::with_capacity(entries.len());
    let mut kept = Vec::with_capacity(entries.len());
    let mut dropped = Vec::new();

    for entry in entries {
        if seen.insert(DedupeKey::of(&entry)) {
            kept.push(entry);
        } else {
            debug!("Dropping duplicate entry {} ({})", entry.id, entry.description);
            dropped.push(entry);
        }
    }

    (kept, dropped)
}
