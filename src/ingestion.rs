use crate::error::{LedgerError, Result};
use crate::schema::{
    BankTransactionRecord, ExpenseRecord, InvestmentRecord, LiabilityPaymentRecord,
    LoanSetupRecord, PaymentRecord, RawAmount, SourceRecord, SourceType, VendorPaymentRecord,
    WithdrawalRecord,
};
use crate::utils::{non_blank, parse_business_date, parse_timestamp};
use crate::{Category, Direction, LedgerEntry};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const DEFAULT_PAYMENT_METHOD: &str = "cash";
const MISSING_AMOUNT: &str = "amount is missing or not numeric";

/// Inputs the normalizer would otherwise read from the wall clock.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext {
    /// Substituted for missing dates and creation timestamps
    pub as_of: DateTime<Utc>,
}

impl NormalizeContext {
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self { as_of }
    }

    pub fn today(&self) -> NaiveDate {
        self.as_of.date_naive()
    }
}

/// A record the normalizer had to drop, kept so the host can tell the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub source_type: SourceType,
    pub record_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub entries: Vec<LedgerEntry>,
    pub skipped: Vec<SkippedRecord>,
}

// Common shape every source record is reduced to before validation
struct Draft<'a> {
    source_type: SourceType,
    record_id: &'a str,
    direction: Direction,
    category: Category,
    // Err carries the validation details
    amount: std::result::Result<Decimal, &'static str>,
    date: Option<&'a str>,
    created_at: Option<&'a str>,
    description: String,
    subcategory: Option<String>,
    payment_method: Option<&'a str>,
    reference: Option<&'a str>,
    related_party: Option<&'a str>,
}

impl Draft<'_> {
    fn finish(self, ctx: &NormalizeContext) -> Result<LedgerEntry> {
        if self.record_id.trim().is_empty() {
            return Err(LedgerError::Validation {
                record_id: self.record_id.to_string(),
                details: "record id is blank".to_string(),
            });
        }

        let amount = self.amount.map_err(|details| LedgerError::Validation {
            record_id: self.record_id.to_string(),
            details: details.to_string(),
        })?;
        if amount < Decimal::ZERO {
            return Err(LedgerError::Validation {
                record_id: self.record_id.to_string(),
                details: format!("amount {} is negative", amount),
            });
        }

        let date = match self.date {
            Some(raw) => parse_business_date(raw).ok_or_else(|| LedgerError::MalformedDate {
                record_id: self.record_id.to_string(),
                value: raw.to_string(),
            })?,
            None => {
                debug!(
                    "{} record {} has no date, using {}",
                    self.source_type,
                    self.record_id,
                    ctx.today()
                );
                ctx.today()
            }
        };

        let created_at = self
            .created_at
            .and_then(parse_timestamp)
            .unwrap_or(ctx.as_of);

        Ok(LedgerEntry {
            id: format!("{}-{}", self.source_type.id_prefix(), self.record_id),
            date,
            created_at,
            description: self.description,
            direction: self.direction,
            category: self.category,
            subcategory: self.subcategory,
            amount: amount.abs(),
            payment_method: self
                .payment_method
                .unwrap_or(DEFAULT_PAYMENT_METHOD)
                .to_string(),
            reference: self.reference.map(str::to_string),
            related_party_name: self.related_party.map(str::to_string),
            source_type: self.source_type,
            source_record_id: self.record_id.to_string(),
        })
    }
}

fn coerce(amount: &Option<RawAmount>) -> Option<Decimal> {
    amount.as_ref().and_then(RawAmount::coerce)
}

fn required(amount: &Option<RawAmount>) -> std::result::Result<Decimal, &'static str> {
    coerce(amount).ok_or(MISSING_AMOUNT)
}

fn describe(explicit: &Option<String>, fallback: impl FnOnce() -> String) -> String {
    non_blank(explicit).map(str::to_string).unwrap_or_else(fallback)
}

fn party_label<'a>(name: Option<&'a str>, fallback: &'a str) -> &'a str {
    name.unwrap_or(fallback)
}

/// Converts a single source record into a ledger entry.
///
/// Missing optional fields fall back to defaults (`ctx.as_of` for dates, a
/// category label for descriptions, `"cash"` for the payment method). Fails
/// with [`LedgerError::Validation`] when the record id is blank or no
/// non-negative amount can be recovered, and [`LedgerError::MalformedDate`]
/// when a date is present but unrecognised.
pub fn normalize(record: &SourceRecord, ctx: &NormalizeContext) -> Result<LedgerEntry> {
    let draft = match record {
        SourceRecord::Payment(r) => payment_draft(r),
        SourceRecord::Investment(r) => investment_draft(r),
        SourceRecord::Withdrawal(r) => withdrawal_draft(r),
        SourceRecord::LiabilityPayment(r) => liability_draft(r),
        SourceRecord::VendorPayment(r) => vendor_draft(r),
        SourceRecord::BankTransaction(r) => bank_draft(r),
        SourceRecord::Expense(r) => expense_draft(r),
        SourceRecord::LoanSetup(r) => loan_setup_draft(r),
    };
    draft.finish(ctx)
}

/// Normalizes a batch, dropping (and reporting) records that fail instead of
/// aborting the whole batch.
pub fn normalize_batch(records: &[SourceRecord], ctx: &NormalizeContext) -> NormalizedBatch {
    let mut batch = NormalizedBatch {
        entries: Vec::with_capacity(records.len()),
        skipped: Vec::new(),
    };

    for record in records {
        match normalize(record, ctx) {
            Ok(entry) => batch.entries.push(entry),
            Err(e) => {
                warn!(
                    "Skipping {} record {}: {}",
                    record.source_type(),
                    record.record_id(),
                    e
                );
                batch.skipped.push(SkippedRecord {
                    source_type: record.source_type(),
                    record_id: record.record_id().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    batch
}

fn payment_draft(r: &PaymentRecord) -> Draft<'_> {
    let customer = non_blank(&r.customer_name);
    Draft {
        source_type: SourceType::Payment,
        record_id: &r.id,
        direction: Direction::Income,
        category: Category::Payment,
        amount: required(&r.amount),
        date: non_blank(&r.payment_date),
        created_at: non_blank(&r.created_at),
        description: format!("Payment from {}", party_label(customer, "customer")),
        subcategory: non_blank(&r.order_number).map(|n| format!("order {}", n)),
        payment_method: non_blank(&r.payment_method),
        reference: non_blank(&r.reference),
        related_party: customer,
    }
}

fn investment_draft(r: &InvestmentRecord) -> Draft<'_> {
    let partner = non_blank(&r.partner_name);
    Draft {
        source_type: SourceType::Investment,
        record_id: &r.id,
        direction: Direction::Income,
        category: Category::Investment,
        amount: required(&r.amount),
        date: non_blank(&r.investment_date),
        created_at: non_blank(&r.created_at),
        description: describe(&r.description, || {
            format!("Investment by {}", party_label(partner, "partner"))
        }),
        subcategory: None,
        payment_method: non_blank(&r.payment_method),
        reference: non_blank(&r.reference),
        related_party: partner,
    }
}

fn withdrawal_draft(r: &WithdrawalRecord) -> Draft<'_> {
    let partner = non_blank(&r.partner_name);
    Draft {
        source_type: SourceType::Withdrawal,
        record_id: &r.id,
        direction: Direction::Expense,
        category: Category::Withdrawal,
        amount: required(&r.amount),
        date: non_blank(&r.withdrawal_date),
        created_at: non_blank(&r.created_at),
        description: describe(&r.description, || {
            format!("Withdrawal by {}", party_label(partner, "partner"))
        }),
        subcategory: non_blank(&r.withdrawal_type).map(str::to_string),
        payment_method: non_blank(&r.payment_method),
        reference: non_blank(&r.reference),
        related_party: partner,
    }
}

fn liability_draft(r: &LiabilityPaymentRecord) -> Draft<'_> {
    let lender = non_blank(&r.lender_name);
    let principal = coerce(&r.principal_amount);
    let interest = coerce(&r.interest_amount);

    let amount = match (principal, interest) {
        (Some(p), Some(i)) => p
            .checked_add(i)
            .ok_or("principal plus interest overflows"),
        _ => coerce(&r.total_amount).or(principal).ok_or(MISSING_AMOUNT),
    };

    Draft {
        source_type: SourceType::LiabilityPayment,
        record_id: &r.id,
        direction: Direction::Expense,
        category: Category::LiabilityPayment,
        amount,
        date: non_blank(&r.payment_date),
        created_at: non_blank(&r.created_at),
        description: describe(&r.description, || {
            format!("Loan payment to {}", party_label(lender, "lender"))
        }),
        subcategory: None,
        payment_method: non_blank(&r.payment_method),
        reference: non_blank(&r.reference),
        related_party: lender,
    }
}

fn vendor_draft(r: &VendorPaymentRecord) -> Draft<'_> {
    let vendor = non_blank(&r.vendor_name);
    Draft {
        source_type: SourceType::VendorPayment,
        record_id: &r.id,
        direction: Direction::Expense,
        category: Category::VendorPayment,
        amount: required(&r.amount),
        date: non_blank(&r.payment_date),
        created_at: non_blank(&r.created_at),
        description: describe(&r.description, || {
            format!("Payment to {}", party_label(vendor, "vendor"))
        }),
        subcategory: non_blank(&r.bill_number).map(|n| format!("bill {}", n)),
        payment_method: non_blank(&r.payment_method),
        reference: non_blank(&r.reference),
        related_party: vendor,
    }
}

fn bank_draft(r: &BankTransactionRecord) -> Draft<'_> {
    let kind = non_blank(&r.transaction_type).map(str::to_lowercase);
    let direction = match kind.as_deref() {
        Some("deposit") | Some("credit") => Direction::Income,
        _ => Direction::Expense,
    };

    let category = non_blank(&r.category)
        .and_then(Category::from_hint)
        .unwrap_or(match direction {
            Direction::Income => Category::Payment,
            Direction::Expense => Category::Withdrawal,
        });

    Draft {
        source_type: SourceType::BankTransaction,
        record_id: &r.id,
        direction,
        category,
        amount: required(&r.amount),
        date: non_blank(&r.transaction_date),
        created_at: non_blank(&r.created_at),
        description: describe(&r.description, || match direction {
            Direction::Income => "Bank deposit".to_string(),
            Direction::Expense => "Bank withdrawal".to_string(),
        }),
        subcategory: non_blank(&r.bank_account_name).map(str::to_string),
        payment_method: non_blank(&r.payment_method),
        reference: non_blank(&r.reference),
        related_party: non_blank(&r.related_party_name),
    }
}

fn expense_draft(r: &ExpenseRecord) -> Draft<'_> {
    let head = non_blank(&r.category);
    Draft {
        source_type: SourceType::Expense,
        record_id: &r.id,
        direction: Direction::Expense,
        category: Category::Expense,
        amount: required(&r.amount),
        date: non_blank(&r.expense_date),
        created_at: non_blank(&r.created_at),
        description: describe(&r.description, || match head {
            Some(head) => format!("Expense: {}", head),
            None => Category::Expense.label().to_string(),
        }),
        subcategory: head.map(str::to_string),
        payment_method: non_blank(&r.payment_method),
        reference: non_blank(&r.reference),
        related_party: non_blank(&r.paid_to),
    }
}

fn loan_setup_draft(r: &LoanSetupRecord) -> Draft<'_> {
    let lender = non_blank(&r.lender_name);
    Draft {
        source_type: SourceType::LoanSetup,
        record_id: &r.id,
        direction: Direction::Income,
        category: Category::LoanSetup,
        amount: required(&r.principal_amount),
        date: non_blank(&r.disbursement_date),
        created_at: non_blank(&r.created_at),
        description: describe(&r.description, || {
            format!("Loan received from {}", party_label(lender, "lender"))
        }),
        subcategory: None,
        payment_method: non_blank(&r.payment_method),
        reference: non_blank(&r.reference),
        related_party: lender,
    }
}
