use crate::error::{LedgerError, Result};
use crate::utils::{is_all_sentinel, parse_business_date, ALL_DATES};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[schemars(description = "Customer payments against orders or invoices")]
    Payment,
    #[schemars(description = "Capital brought in by a partner")]
    Investment,
    #[schemars(description = "Capital or drawings taken out by a partner")]
    Withdrawal,
    #[schemars(description = "Repayments of loans and other liabilities (principal and interest)")]
    LiabilityPayment,
    #[schemars(description = "Payments made to vendors against purchase bills")]
    VendorPayment,
    #[schemars(description = "Deposits and withdrawals recorded on a bank account")]
    BankTransaction,
    #[schemars(description = "General operating expenses")]
    Expense,
    #[schemars(description = "Loan principal received when a liability is set up")]
    LoanSetup,
}

impl SourceType {
    pub const ALL: [SourceType; 8] = [
        SourceType::Payment,
        SourceType::Investment,
        SourceType::Withdrawal,
        SourceType::LiabilityPayment,
        SourceType::VendorPayment,
        SourceType::BankTransaction,
        SourceType::Expense,
        SourceType::LoanSetup,
    ];

    /// Namespace used in ledger entry ids so ids never collide across sources.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            SourceType::Payment => "payment",
            SourceType::Investment => "investment",
            SourceType::Withdrawal => "withdrawal",
            SourceType::LiabilityPayment => "liability",
            SourceType::VendorPayment => "vendor",
            SourceType::BankTransaction => "bank",
            SourceType::Expense => "expense",
            SourceType::LoanSetup => "loan",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Payment => "payment",
            SourceType::Investment => "investment",
            SourceType::Withdrawal => "withdrawal",
            SourceType::LiabilityPayment => "liability_payment",
            SourceType::VendorPayment => "vendor_payment",
            SourceType::BankTransaction => "bank_transaction",
            SourceType::Expense => "expense",
            SourceType::LoanSetup => "loan_setup",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An amount as upstream APIs deliver it: a JSON number, a decimal string, or
/// a formatted string such as `"1,250.00"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawAmount {
    Number(Decimal),
    Text(String),
}

impl RawAmount {
    /// Coerces the raw value into a decimal. Returns `None` when nothing
    /// numeric can be recovered.
    pub fn coerce(&self) -> Option<Decimal> {
        match self {
            RawAmount::Number(value) => Some(*value),
            RawAmount::Text(text) => {
                let cleaned: String = text
                    .trim()
                    .chars()
                    .filter(|c| !matches!(c, ',' | '_' | ' '))
                    .collect();
                if cleaned.is_empty() {
                    return None;
                }
                Decimal::from_str(&cleaned)
                    .or_else(|_| Decimal::from_scientific(&cleaned))
                    .ok()
            }
        }
    }
}

impl From<Decimal> for RawAmount {
    fn from(value: Decimal) -> Self {
        RawAmount::Number(value)
    }
}

impl From<i64> for RawAmount {
    fn from(value: i64) -> Self {
        RawAmount::Number(Decimal::from(value))
    }
}

impl From<&str> for RawAmount {
    fn from(value: &str) -> Self {
        RawAmount::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PaymentRecord {
    pub id: String,
    pub customer_name: Option<String>,
    pub amount: Option<RawAmount>,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    #[schemars(description = "Cheque number, UPI reference or bank transaction id")]
    pub reference: Option<String>,
    pub order_number: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct InvestmentRecord {
    pub id: String,
    pub partner_name: Option<String>,
    pub amount: Option<RawAmount>,
    pub investment_date: Option<String>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct WithdrawalRecord {
    pub id: String,
    pub partner_name: Option<String>,
    pub amount: Option<RawAmount>,
    pub withdrawal_date: Option<String>,
    #[schemars(description = "Free-text kind of withdrawal, e.g. 'drawings' or 'profit_share'")]
    pub withdrawal_type: Option<String>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LiabilityPaymentRecord {
    pub id: String,
    pub lender_name: Option<String>,
    pub principal_amount: Option<RawAmount>,
    pub interest_amount: Option<RawAmount>,
    #[schemars(description = "Used only when principal and interest are not both present")]
    pub total_amount: Option<RawAmount>,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VendorPaymentRecord {
    pub id: String,
    pub vendor_name: Option<String>,
    pub amount: Option<RawAmount>,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub bill_number: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BankTransactionRecord {
    pub id: String,
    pub bank_account_name: Option<String>,
    #[schemars(description = "'deposit' or 'credit' for inflows; 'withdrawal' or 'debit' for outflows")]
    pub transaction_type: Option<String>,
    pub amount: Option<RawAmount>,
    pub transaction_date: Option<String>,
    pub description: Option<String>,
    #[schemars(description = "Optional ledger category hint, e.g. 'payment' or 'vendor_payment'")]
    pub category: Option<String>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub related_party_name: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExpenseRecord {
    pub id: String,
    #[schemars(description = "Expense head such as 'rent' or 'salaries'")]
    pub category: Option<String>,
    pub amount: Option<RawAmount>,
    pub expense_date: Option<String>,
    pub description: Option<String>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub paid_to: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoanSetupRecord {
    pub id: String,
    pub lender_name: Option<String>,
    pub principal_amount: Option<RawAmount>,
    pub disbursement_date: Option<String>,
    pub payment_method: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<String>,
}

/// One raw record from any upstream source.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "source_type", rename_all = "snake_case")]
pub enum SourceRecord {
    Payment(PaymentRecord),
    Investment(InvestmentRecord),
    Withdrawal(WithdrawalRecord),
    LiabilityPayment(LiabilityPaymentRecord),
    VendorPayment(VendorPaymentRecord),
    BankTransaction(BankTransactionRecord),
    Expense(ExpenseRecord),
    LoanSetup(LoanSetupRecord),
}

impl SourceRecord {
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceRecord::Payment(_) => SourceType::Payment,
            SourceRecord::Investment(_) => SourceType::Investment,
            SourceRecord::Withdrawal(_) => SourceType::Withdrawal,
            SourceRecord::LiabilityPayment(_) => SourceType::LiabilityPayment,
            SourceRecord::VendorPayment(_) => SourceType::VendorPayment,
            SourceRecord::BankTransaction(_) => SourceType::BankTransaction,
            SourceRecord::Expense(_) => SourceType::Expense,
            SourceRecord::LoanSetup(_) => SourceType::LoanSetup,
        }
    }

    pub fn record_id(&self) -> &str {
        match self {
            SourceRecord::Payment(r) => &r.id,
            SourceRecord::Investment(r) => &r.id,
            SourceRecord::Withdrawal(r) => &r.id,
            SourceRecord::LiabilityPayment(r) => &r.id,
            SourceRecord::VendorPayment(r) => &r.id,
            SourceRecord::BankTransaction(r) => &r.id,
            SourceRecord::Expense(r) => &r.id,
            SourceRecord::LoanSetup(r) => &r.id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[schemars(description = "Oldest first")]
    Ascending,
    #[default]
    #[schemars(description = "Newest first (default, as ledgers are displayed)")]
    Descending,
}

/// One side of a date range: either a calendar day or the "all" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateBound {
    #[default]
    All,
    On(NaiveDate),
}

impl DateBound {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateBound::All => None,
            DateBound::On(date) => Some(*date),
        }
    }
}

impl FromStr for DateBound {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        if is_all_sentinel(s) {
            return Ok(DateBound::All);
        }
        parse_business_date(s)
            .map(DateBound::On)
            .ok_or_else(|| LedgerError::MalformedDate {
                record_id: "date range".to_string(),
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for DateBound {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DateBound> for String {
    fn from(bound: DateBound) -> Self {
        bound.to_string()
    }
}

impl From<NaiveDate> for DateBound {
    fn from(date: NaiveDate) -> Self {
        DateBound::On(date)
    }
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateBound::All => f.write_str(ALL_DATES),
            DateBound::On(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// Inclusive calendar-day range. `to` covers its entire day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    #[serde(default)]
    #[schemars(
        with = "String",
        description = "First business day to include, as YYYY-MM-DD or DD/MM/YYYY, or 'all' for no lower bound"
    )]
    pub from: DateBound,

    #[serde(default)]
    #[schemars(
        with = "String",
        description = "Last business day to include (the whole day counts), as YYYY-MM-DD or DD/MM/YYYY, or 'all' for no upper bound"
    )]
    pub to: DateBound,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: DateBound::On(from),
            to: DateBound::On(to),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from == DateBound::All && self.to == DateBound::All
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let after_start = self.from.date().map_or(true, |from| date >= from);
        let before_end = self.to.date().map_or(true, |to| date <= to);
        after_start && before_end
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.from.date(), self.to.date()) {
            if from > to {
                return Err(LedgerError::InvalidDateRange {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CashflowQuery {
    #[serde(default)]
    #[schemars(description = "Inclusive business-date window. Both bounds 'all' disables filtering.")]
    pub range: DateRange,

    #[serde(default)]
    #[schemars(description = "Order of the resulting feed: 'ascending' or 'descending'")]
    pub sort_order: SortOrder,

    #[serde(default)]
    #[schemars(description = "Source types to include. Empty means every source type.")]
    pub sources: Vec<SourceType>,

    #[serde(default)]
    #[schemars(description = "Optional per-source fetch timeout in seconds. A source that exceeds it contributes no entries.")]
    pub fetch_timeout_secs: Option<u64>,
}

impl CashflowQuery {
    pub fn includes(&self, source_type: SourceType) -> bool {
        self.sources.is_empty() || self.sources.contains(&source_type)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.range.validate()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let query: CashflowQuery = serde_json::from_str(json)?;
        query.validate()?;
        Ok(query)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CashflowQuery)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_raw_amount_coercion() {
        assert_eq!(RawAmount::from(dec!(12.50)).coerce(), Some(dec!(12.50)));
        assert_eq!(RawAmount::from("1,250.00").coerce(), Some(dec!(1250.00)));
        assert_eq!(RawAmount::from(" 300 ").coerce(), Some(dec!(300)));
        assert_eq!(RawAmount::from("").coerce(), None);
        assert_eq!(RawAmount::from("n/a").coerce(), None);
    }

    #[test]
    fn test_raw_amount_deserializes_numbers_and_strings() {
        let record: PaymentRecord =
            serde_json::from_str(r#"{"id": "p1", "amount": 150.25}"#).unwrap();
        assert_eq!(record.amount.unwrap().coerce(), Some(dec!(150.25)));

        let record: PaymentRecord =
            serde_json::from_str(r#"{"id": "p2", "amount": "2,000"}"#).unwrap();
        assert_eq!(record.amount.unwrap().coerce(), Some(dec!(2000)));
    }

    #[test]
    fn test_source_record_tagging() {
        let json = r#"{"source_type": "vendor_payment", "id": "v9", "vendor_name": "Acme"}"#;
        let record: SourceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source_type(), SourceType::VendorPayment);
        assert_eq!(record.record_id(), "v9");
    }

    #[test]
    fn test_date_bound_parsing() {
        assert_eq!("all".parse::<DateBound>().unwrap(), DateBound::All);
        assert_eq!(
            "01/02/2024".parse::<DateBound>().unwrap(),
            DateBound::On(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())
        );
        assert!("someday".parse::<DateBound>().is_err());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let range = DateRange::between(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        );
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(range.contains(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()));
    }

    #[test]
    fn test_half_open_range() {
        let range = DateRange {
            from: DateBound::On(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
            to: DateBound::All,
        };
        assert!(!range.is_unbounded());
        assert!(range.contains(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()));
    }

    #[test]
    fn test_query_from_json() {
        let json = r#"{
            "range": {"from": "2024-01-01", "to": "all"},
            "sort_order": "ascending",
            "sources": ["payment", "bank_transaction"],
            "fetch_timeout_secs": 5
        }"#;
        let query = CashflowQuery::from_json(json).unwrap();
        assert_eq!(query.sort_order, SortOrder::Ascending);
        assert!(query.includes(SourceType::Payment));
        assert!(!query.includes(SourceType::Expense));
        assert_eq!(query.fetch_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(query.range.to, DateBound::All);
    }

    #[test]
    fn test_query_defaults() {
        let query = CashflowQuery::from_json("{}").unwrap();
        assert!(query.range.is_unbounded());
        assert_eq!(query.sort_order, SortOrder::Descending);
        assert!(SourceType::ALL.iter().all(|s| query.includes(*s)));
        assert_eq!(query.fetch_timeout(), None);
    }

    #[test]
    fn test_query_rejects_inverted_range() {
        let json = r#"{"range": {"from": "2024-02-01", "to": "2024-01-01"}}"#;
        assert!(matches!(
            CashflowQuery::from_json(json),
            Err(LedgerError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_query_rejects_malformed_bound() {
        let json = r#"{"range": {"from": "last tuesday", "to": "all"}}"#;
        assert!(matches!(
            CashflowQuery::from_json(json),
            Err(LedgerError::Serialization(_))
        ));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = CashflowQuery::schema_as_json().unwrap();
        assert!(schema_json.contains("sort_order"));
        assert!(schema_json.contains("fetch_timeout_secs"));
        assert!(schema_json.contains("range"));
    }
}
