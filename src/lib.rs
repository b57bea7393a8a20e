//! # Ledger Reconciliation
//!
//! A library that turns the heterogeneous money-movement records of an ERP
//! back-office (customer payments, partner investments and withdrawals, loan
//! repayments, vendor payments, expenses, bank transactions) into ledger views
//! a host application can render directly.
//!
//! ## Core Concepts
//!
//! - **Normalization**: Every source record becomes one canonical [`LedgerEntry`]
//! - **Deduplication**: The same economic event surfaced by two sources is counted once
//! - **Chronological Ordering**: Entries sort by business date, then creation time
//! - **Running Balances**: Historical balances are derived backward from a known current balance
//! - **Payment Status**: Paid / partial / unpaid, with waive-offs settling but reported apart from cash
//!
//! ## Example
//!
//! ```rust,ignore
//! use ledger_reconciliation::*;
//! use chrono::{NaiveDate, Utc};
//!
//! let query = CashflowQuery {
//!     range: DateRange::between(
//!         NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
//!     ),
//!     sort_order: SortOrder::Descending,
//!     ..Default::default()
//! };
//!
//! let collections = vec![SourceCollection::loaded(
//!     SourceType::Payment,
//!     vec![SourceRecord::Payment(PaymentRecord {
//!         id: "8f2c".to_string(),
//!         customer_name: Some("Ravi Traders".to_string()),
//!         amount: Some(RawAmount::from("12,500.00")),
//!         payment_date: Some("15/02/2024".to_string()),
//!         ..Default::default()
//!     })],
//! )];
//!
//! let report = CashflowAggregator::new(query, Utc::now()).aggregate_collections(collections);
//! let statement = CashflowStatement::from_entries(&report.entries)?;
//! ```

pub mod balancer;
pub mod dedupe;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod ordering;
pub mod report;
pub mod schema;
pub mod status;
pub mod utils;

pub use balancer::{compute_running_balances, verify_running_balances, AccountLedgerView, LedgerRow};
pub use dedupe::{dedupe, dedupe_with_report, DedupeKey};
pub use engine::{
    aggregate_cashflow, CashflowAggregator, CashflowReport, CashflowTotals, FetchFailure,
    SourceCollection, SourceFailure, SourceFetch,
};
pub use error::{LedgerError, Result};
pub use ingestion::{normalize, normalize_batch, NormalizeContext, NormalizedBatch, SkippedRecord};
pub use ordering::{sort_entries, sort_in_place};
pub use report::{CashflowStatement, CategoryTotal};
pub use schema::*;
pub use status::{
    resolve, resolve_obligations, resolve_settlements, Obligation, ObligationStatus,
    PaymentStatus, Settlement, SettlementKind,
};
pub use utils::{parse_business_date, parse_timestamp};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Money coming in (deposit, credit)
    Income,
    /// Money going out (withdrawal, debit)
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Payment,
    Investment,
    Withdrawal,
    Expense,
    VendorPayment,
    LiabilityPayment,
    LoanSetup,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Payment => "payment",
            Category::Investment => "investment",
            Category::Withdrawal => "withdrawal",
            Category::Expense => "expense",
            Category::VendorPayment => "vendor_payment",
            Category::LiabilityPayment => "liability_payment",
            Category::LoanSetup => "loan_setup",
        }
    }

    /// Human readable label, used when a record carries no description.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Payment => "Payment",
            Category::Investment => "Investment",
            Category::Withdrawal => "Withdrawal",
            Category::Expense => "Expense",
            Category::VendorPayment => "Vendor payment",
            Category::LiabilityPayment => "Loan payment",
            Category::LoanSetup => "Loan received",
        }
    }

    /// Matches a loosely formatted category name ("Vendor Payment", "vendor-payment").
    pub fn from_hint(hint: &str) -> Option<Category> {
        let normalized: String = hint
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "payment" => Some(Category::Payment),
            "investment" => Some(Category::Investment),
            "withdrawal" => Some(Category::Withdrawal),
            "expense" => Some(Category::Expense),
            "vendor_payment" => Some(Category::VendorPayment),
            "liability_payment" | "loan_payment" => Some(Category::LiabilityPayment),
            "loan_setup" => Some(Category::LoanSetup),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized money-movement record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Namespaced by source type, e.g. `payment-<id>`
    pub id: String,
    /// Business (effective) date, not ingestion time
    pub date: NaiveDate,
    /// Only used to order entries sharing a business date
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub direction: Direction,
    pub category: Category,
    pub subcategory: Option<String>,
    /// Always non-negative; `direction` carries the sign
    pub amount: Decimal,
    pub payment_method: String,
    pub reference: Option<String>,
    pub related_party_name: Option<String>,
    pub source_type: SourceType,
    pub source_record_id: String,
}

impl LedgerEntry {
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Income => self.amount,
            Direction::Expense => -self.amount,
        }
    }

    pub fn is_income(&self) -> bool {
        self.direction == Direction::Income
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    /// Builds an entry with sensible defaults for unit tests.
    pub fn entry(
        id: &str,
        date: (i32, u32, u32),
        direction: Direction,
        category: Category,
        amount: Decimal,
    ) -> LedgerEntry {
        let date = NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap();
        LedgerEntry {
            id: id.to_string(),
            date,
            created_at: Utc.from_utc_datetime(&date.and_hms_opt(12, 0, 0).unwrap()),
            description: format!("{} {}", category.label(), id),
            direction,
            category,
            subcategory: None,
            amount,
            payment_method: "cash".to_string(),
            reference: None,
            related_party_name: None,
            source_type: SourceType::Payment,
            source_record_id: id.to_string(),
        }
    }
}
