use crate::balancer::checked_total;
use crate::error::Result;
use crate::{Category, Direction, LedgerEntry};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub total: Decimal,
    pub count: usize,
}

/// Income and expense totals per category over an aggregated feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowStatement {
    pub income: Vec<CategoryTotal>,
    pub expenses: Vec<CategoryTotal>,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub net_cashflow: Decimal,
}

impl CashflowStatement {
    /// Fails with [`crate::LedgerError::AmountOverflow`] when a total leaves
    /// the `Decimal` range.
    pub fn from_entries(entries: &[LedgerEntry]) -> Result<Self> {
        let total_income = checked_total(entries.iter().filter(|e| e.is_income()))?;
        let total_expense = checked_total(entries.iter().filter(|e| !e.is_income()))?;

        // Category lines are subsets of the totals above and cannot overflow
        let mut income: BTreeMap<Category, CategoryTotal> = BTreeMap::new();
        let mut expenses: BTreeMap<Category, CategoryTotal> = BTreeMap::new();

        for entry in entries {
            let section = match entry.direction {
                Direction::Income => &mut income,
                Direction::Expense => &mut expenses,
            };

            let line = section.entry(entry.category).or_insert_with(|| CategoryTotal {
                category: entry.category,
                total: Decimal::ZERO,
                count: 0,
            });
            line.total += entry.amount;
            line.count += 1;
        }

        Ok(Self {
            income: income.into_values().collect(),
            expenses: expenses.into_values().collect(),
            total_income,
            total_expense,
            net_cashflow: total_income - total_expense,
        })
    }

    pub fn category_total(&self, direction: Direction, category: Category) -> Decimal {
        let section = match direction {
            Direction::Income => &self.income,
            Direction::Expense => &self.expenses,
        };
        section
            .iter()
            .find(|l| l.category == category)
            .map_or(Decimal::ZERO, |l| l.total)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
