//! Bulk Repopulator
//!
//! Scans for records whose content is older than a window, dedups them by
//! request key and runs one regeneration job per key under a semaphore. Every
//! job is attempted; one failure never stops the others.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};
use visaguide_core::{
    CompositeId, ContentRecord, GuideResult, Provider, RequestKey, RequestProfile,
    ValidationError,
};
use visaguide_storage::{stale_cutoff, RecordStore};

use crate::constants::{
    DEFAULT_REPOPULATE_CONCURRENCY, DEFAULT_REPOPULATE_DAYS, DEFAULT_REPOPULATE_LIMIT,
    ERROR_PREVIEW_LIMIT,
};
use crate::services::RegenerationJob;
use crate::telemetry::metrics;
use crate::types::{RepopulateErrorEntry, RepopulateParams, RepopulateSummary};

/// Key recorded for a job whose task panicked or was cancelled.
const UNKNOWN_KEY: &str = "unknown";

/// Fully resolved parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepopulateRequest {
    pub days: u32,
    pub provider: Provider,
    pub limit: usize,
    pub concurrency: usize,
}

impl RepopulateRequest {
    /// Fill omitted parameters with defaults.
    pub fn from_params(params: &RepopulateParams, default_provider: Provider) -> Self {
        Self {
            days: params.days.unwrap_or(DEFAULT_REPOPULATE_DAYS),
            provider: params.provider.unwrap_or(default_provider),
            limit: params.limit.unwrap_or(DEFAULT_REPOPULATE_LIMIT),
            concurrency: params.concurrency.unwrap_or(DEFAULT_REPOPULATE_CONCURRENCY),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.concurrency == 0 {
            return Err(ValidationError::InvalidValue {
                field: "concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for RepopulateRequest {
    fn default() -> Self {
        Self::from_params(&RepopulateParams::default(), Provider::default())
    }
}

/// Collapse rows sharing a request key.
///
/// Keys keep the position of their first occurrence; the row kept is the
/// last one seen for that key.
pub fn dedup_by_key(rows: Vec<ContentRecord>) -> Vec<ContentRecord> {
    let mut index: HashMap<RequestKey, usize> = HashMap::new();
    let mut unique: Vec<ContentRecord> = Vec::with_capacity(rows.len());

    for row in rows {
        match index.get(&row.key) {
            Some(&slot) => unique[slot] = row,
            None => {
                index.insert(row.key.clone(), unique.len());
                unique.push(row);
            }
        }
    }
    unique
}

#[derive(Clone)]
pub struct BulkRepopulator {
    records: Arc<dyn RecordStore>,
    job: RegenerationJob,
}

impl std::fmt::Debug for BulkRepopulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkRepopulator").finish_non_exhaustive()
    }
}

impl BulkRepopulator {
    pub fn new(records: Arc<dyn RecordStore>, job: RegenerationJob) -> Self {
        Self { records, job }
    }

    /// Run one repopulation pass.
    ///
    /// # Errors
    /// `ValidationError` for `concurrency == 0`; `StoreError` when the stale
    /// scan fails. Per-key failures are reported in the summary instead.
    #[instrument(skip(self), fields(days = request.days, provider = %request.provider))]
    pub async fn run(&self, request: RepopulateRequest) -> GuideResult<RepopulateSummary> {
        request.validate()?;

        let cutoff = stale_cutoff(request.days, Utc::now());
        let rows = match self.records.find_stale(cutoff, request.limit).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Stale scan failed, repopulation aborted");
                if let Some(m) = metrics() {
                    m.record_repopulate_run(false);
                }
                return Err(e);
            }
        };

        let scanned = rows.len();
        let unique = dedup_by_key(rows);
        let requested = unique.len();

        let semaphore = Arc::new(Semaphore::new(request.concurrency));
        let mut tasks: JoinSet<(CompositeId, GuideResult<ContentRecord>)> = JoinSet::new();
        let mut failures: Vec<RepopulateErrorEntry> = Vec::new();

        // Permits are taken before spawning so admission follows scan order.
        for row in unique {
            let profile = RequestProfile::new(row.key, request.provider);
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    failures.push(RepopulateErrorEntry {
                        key: profile.composite_id.into_inner(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let job = self.job.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = job.run(&profile).await;
                (profile.composite_id, result)
            });
        }

        let mut refreshed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => refreshed += 1,
                Ok((id, Err(e))) => failures.push(RepopulateErrorEntry {
                    key: id.into_inner(),
                    error: e.to_string(),
                }),
                Err(e) => failures.push(RepopulateErrorEntry {
                    key: UNKNOWN_KEY.to_string(),
                    error: e.to_string(),
                }),
            }
        }

        let failed = failures.len();
        failures.sort_by(|a, b| a.key.cmp(&b.key));
        failures.truncate(ERROR_PREVIEW_LIMIT);

        if let Some(m) = metrics() {
            m.record_repopulate_run(true);
        }
        info!(scanned, requested, refreshed, failed, "Repopulation finished");

        Ok(RepopulateSummary {
            scanned,
            requested,
            refreshed,
            failed,
            errors: failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use visaguide_core::RecordStatus;

    fn row(destination: &str, marker: &str) -> ContentRecord {
        let key = RequestKey::new("US", "US", destination, "Tourism", "eVisa");
        let mut record = ContentRecord::placeholder(key, RecordStatus::Ready, Utc::now());
        record.content.additional_notes = Some(marker.to_string());
        record
    }

    #[test]
    fn test_dedup_keeps_first_position_and_last_row() {
        let rows = vec![
            row("JP", "first"),
            row("FR", "only"),
            row("JP", "second"),
            row("JP", "third"),
        ];

        let unique = dedup_by_key(rows);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].key.destination, "JP");
        assert_eq!(unique[0].content.additional_notes.as_deref(), Some("third"));
        assert_eq!(unique[1].key.destination, "FR");
    }

    #[test]
    fn test_request_defaults() {
        let request = RepopulateRequest::from_params(&RepopulateParams::default(), Provider::Anthropic);
        assert_eq!(request.days, DEFAULT_REPOPULATE_DAYS);
        assert_eq!(request.limit, DEFAULT_REPOPULATE_LIMIT);
        assert_eq!(request.concurrency, DEFAULT_REPOPULATE_CONCURRENCY);
        assert_eq!(request.provider, Provider::Anthropic);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let request = RepopulateRequest {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            request.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_dedup_yields_distinct_keys(destinations in prop::collection::vec("[A-D]", 0..40)) {
            let rows: Vec<ContentRecord> = destinations.iter().map(|d| row(d, "x")).collect();
            let mut distinct: Vec<&String> = destinations.iter().collect();
            distinct.sort();
            distinct.dedup();

            let unique = dedup_by_key(rows);

            prop_assert_eq!(unique.len(), distinct.len());
            let mut seen = std::collections::HashSet::new();
            for record in &unique {
                prop_assert!(seen.insert(record.key.clone()));
            }
        }
    }
}
