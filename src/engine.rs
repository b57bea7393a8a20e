use crate::balancer::{checked_total, compute_running_balances, AccountLedgerView};
use crate::dedupe::dedupe_with_report;
use crate::error::{LedgerError, Result};
use crate::ingestion::{normalize_batch, NormalizeContext, SkippedRecord};
use crate::ordering::sort_entries;
use crate::schema::{CashflowQuery, SortOrder, SourceRecord, SourceType};
use crate::LedgerEntry;
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Error returned by a host-supplied fetch function.
pub type FetchFailure = Box<dyn std::error::Error + Send + Sync>;

/// A pending load of one source collection.
pub struct SourceFetch<'a> {
    pub source_type: SourceType,
    pub fetch: BoxFuture<'a, std::result::Result<Vec<SourceRecord>, FetchFailure>>,
}

impl<'a> SourceFetch<'a> {
    pub fn new<F>(source_type: SourceType, fetch: F) -> Self
    where
        F: Future<Output = std::result::Result<Vec<SourceRecord>, FetchFailure>> + Send + 'a,
    {
        Self {
            source_type,
            fetch: Box::pin(fetch),
        }
    }
}

/// The outcome of loading one source collection.
#[derive(Debug)]
pub struct SourceCollection {
    pub source_type: SourceType,
    pub outcome: std::result::Result<Vec<SourceRecord>, LedgerError>,
}

impl SourceCollection {
    pub fn loaded(source_type: SourceType, records: Vec<SourceRecord>) -> Self {
        Self {
            source_type,
            outcome: Ok(records),
        }
    }

    pub fn failed(source_type: SourceType, reason: impl Into<String>) -> Self {
        Self {
            source_type,
            outcome: Err(LedgerError::SourceFetch {
                source_type,
                reason: reason.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFailure {
    pub source_type: SourceType,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashflowTotals {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub net: Decimal,
}

/// Unified income/expense feed plus everything that was left out of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CashflowReport {
    pub entries: Vec<LedgerEntry>,
    /// Records dropped during normalization
    pub skipped_records: Vec<SkippedRecord>,
    /// Sources that failed, timed out or were cancelled
    pub failed_sources: Vec<SourceFailure>,
    /// Entries merged away as duplicates of an earlier entry
    pub duplicates_removed: Vec<LedgerEntry>,
}

impl CashflowReport {
    /// True when no source failed and no record was skipped.
    pub fn is_complete(&self) -> bool {
        self.skipped_records.is_empty() && self.failed_sources.is_empty()
    }

    /// Fails with [`LedgerError::AmountOverflow`] when a total leaves the
    /// `Decimal` range.
    pub fn totals(&self) -> Result<CashflowTotals> {
        let total_income = checked_total(self.entries.iter().filter(|e| e.is_income()))?;
        let total_expense = checked_total(self.entries.iter().filter(|e| !e.is_income()))?;

        // Both totals are non-negative, so the difference stays in range
        Ok(CashflowTotals {
            total_income,
            total_expense,
            net: total_income - total_expense,
        })
    }
}

pub struct CashflowAggregator {
    query: CashflowQuery,
    as_of: DateTime<Utc>,
    cancel: CancellationToken,
}

impl CashflowAggregator {
    pub fn new(query: CashflowQuery, as_of: DateTime<Utc>) -> Self {
        Self {
            query,
            as_of,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses a caller-owned token so in-flight fetches can be aborted from outside.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn query(&self) -> &CashflowQuery {
        &self.query
    }

    /// Fetches every enabled source concurrently, then runs the pipeline over
    /// whatever loaded. Failed, timed-out and cancelled sources contribute no
    /// entries and are listed in [`CashflowReport::failed_sources`].
    pub async fn aggregate(&self, sources: Vec<SourceFetch<'_>>) -> CashflowReport {
        let collections = self.fetch_all(sources).await;
        self.aggregate_collections(collections)
    }

    /// Fetches every enabled source and builds the running-balance view of an
    /// account whose balance today is `current_balance`.
    pub async fn account_ledger(
        &self,
        current_balance: Decimal,
        sources: Vec<SourceFetch<'_>>,
    ) -> Result<(AccountLedgerView, CashflowReport)> {
        let collections = self.fetch_all(sources).await;
        self.account_ledger_from_collections(current_balance, collections)
    }

    async fn fetch_all(&self, sources: Vec<SourceFetch<'_>>) -> Vec<SourceCollection> {
        let timeout = self.query.fetch_timeout();
        let pending = sources
            .into_iter()
            .filter(|source| {
                let enabled = self.query.includes(source.source_type);
                if !enabled {
                    debug!("Source {} not requested, skipping fetch", source.source_type);
                }
                enabled
            })
            .map(|source| self.run_fetch(source, timeout));

        join_all(pending).await
    }

    async fn run_fetch(&self, source: SourceFetch<'_>, timeout: Option<Duration>) -> SourceCollection {
        let SourceFetch { source_type, fetch } = source;

        let bounded = async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, fetch).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!("timed out after {:?}", limit)),
                },
                None => fetch.await.map_err(|e| e.to_string()),
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err("cancelled".to_string()),
            result = bounded => result,
        };

        match outcome {
            Ok(records) => {
                debug!("Source {} returned {} records", source_type, records.len());
                SourceCollection::loaded(source_type, records)
            }
            Err(reason) => SourceCollection::failed(source_type, reason),
        }
    }

    /// Runs normalize -> dedupe -> date filter -> sort over already-loaded
    /// collections.
    pub fn aggregate_collections(&self, collections: Vec<SourceCollection>) -> CashflowReport {
        let (entries, mut report) = self.collect(collections);

        let entries: Vec<LedgerEntry> = if self.query.range.is_unbounded() {
            entries
        } else {
            entries
                .into_iter()
                .filter(|e| self.query.range.contains(e.date))
                .collect()
        };

        report.entries = sort_entries(entries, self.query.sort_order);

        info!(
            "Cashflow aggregated: {} entries, {} duplicates removed, {} records skipped, {} sources failed",
            report.entries.len(),
            report.duplicates_removed.len(),
            report.skipped_records.len(),
            report.failed_sources.len()
        );

        report
    }

    /// Builds an account's running-balance view from already-loaded collections.
    ///
    /// Balances are computed over the full history, since `current_balance`
    /// is anchored at the newest entry, and only then narrowed to the query's
    /// date range.
    pub fn account_ledger_from_collections(
        &self,
        current_balance: Decimal,
        collections: Vec<SourceCollection>,
    ) -> Result<(AccountLedgerView, CashflowReport)> {
        let (entries, mut report) = self.collect(collections);
        let newest_first = sort_entries(entries, SortOrder::Descending);

        let mut view = compute_running_balances(current_balance, newest_first)?;
        if !self.query.range.is_unbounded() {
            view.rows.retain(|row| self.query.range.contains(row.entry.date));
        }

        let mut entries: Vec<LedgerEntry> = view.rows.iter().map(|row| row.entry.clone()).collect();
        if self.query.sort_order == SortOrder::Ascending {
            entries.reverse();
        }
        report.entries = entries;

        Ok((view, report))
    }

    // Normalize and dedupe every enabled collection; entries are left unsorted.
    fn collect(&self, collections: Vec<SourceCollection>) -> (Vec<LedgerEntry>, CashflowReport) {
        info!(
            "Aggregating {} source collections as of {}",
            collections.len(),
            self.as_of
        );

        let ctx = NormalizeContext::new(self.as_of);
        let mut report = CashflowReport::default();
        let mut entries = Vec::new();

        for collection in collections {
            if !self.query.includes(collection.source_type) {
                debug!("Source {} not requested, ignoring", collection.source_type);
                continue;
            }

            match collection.outcome {
                Ok(mut records) => {
                    let before = records.len();
                    records.retain(|record| self.query.includes(record.source_type()));
                    if records.len() < before {
                        debug!(
                            "Source {}: dropped {} records of unrequested types",
                            collection.source_type,
                            before - records.len()
                        );
                    }

                    let batch = normalize_batch(&records, &ctx);
                    debug!(
                        "Source {}: {} entries normalized, {} skipped",
                        collection.source_type,
                        batch.entries.len(),
                        batch.skipped.len()
                    );
                    entries.extend(batch.entries);
                    report.skipped_records.extend(batch.skipped);
                }
                Err(e) => {
                    warn!("{}", e);
                    let reason = match e {
                        LedgerError::SourceFetch { reason, .. } => reason,
                        other => other.to_string(),
                    };
                    report.failed_sources.push(SourceFailure {
                        source_type: collection.source_type,
                        reason,
                    });
                }
            }
        }

        let (entries, duplicates) = dedupe_with_report(entries);
        debug!(
            "{} entries after dedupe ({} duplicates)",
            entries.len(),
            duplicates.len()
        );
        report.duplicates_removed = duplicates;

        (entries, report)
    }
}

/// Convenience wrapper around [`CashflowAggregator::aggregate_collections`].
pub fn aggregate_cashflow(
    query: CashflowQuery,
    as_of: DateTime<Utc>,
    collections: Vec<SourceCollection>,
) -> CashflowReport {
    CashflowAggregator::new(query, as_of).aggregate_collections(collections)
}
