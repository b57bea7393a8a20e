use crate::schema::SourceType;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid record {record_id}: {details}")]
    Validation { record_id: String, details: String },

    #[error("Source '{source_type}' failed to load: {reason}")]
    SourceFetch {
        source_type: SourceType,
        reason: String,
    },

    #[error("Record {record_id} has unrecognised date '{value}' (expected YYYY-MM-DD or DD/MM/YYYY)")]
    MalformedDate { record_id: String, value: String },

    #[error("Invalid date range: from {from} is after to {to}")]
    InvalidDateRange { from: String, to: String },

    #[error("Running balance mismatch at entry {entry_id}: expected {expected}, computed {actual}")]
    BalanceMismatch {
        entry_id: String,
        expected: Decimal,
        actual: Decimal,
    },

    #[error("Amount overflow while accumulating entry {entry_id}")]
    AmountOverflow { entry_id: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LedgerError {
    /// Identifier of the record this error concerns, when it is a per-record error.
    pub fn record_id(&self) -> Option<&str> {
        match self {
            Self::Validation { record_id, .. } | Self::MalformedDate { record_id, .. } => {
                Some(record_id)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
