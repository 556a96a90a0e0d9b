//! Regeneration Job
//!
//! Drives one record from stale or missing to generated and stored. Every
//! transition is mirrored before it is written to the record store.

use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};
use visaguide_core::{ContentRecord, GuideError, GuideResult, RecordStatus, RequestProfile};
use visaguide_llm::GeneratorRegistry;
use visaguide_storage::{BestEffortMirror, RecordPatch, RecordStore};

use crate::telemetry::metrics;

/// One regeneration, end to end. Cheap to clone; every handle is shared.
#[derive(Clone)]
pub struct RegenerationJob {
    records: Arc<dyn RecordStore>,
    mirror: BestEffortMirror,
    generators: Arc<GeneratorRegistry>,
}

impl std::fmt::Debug for RegenerationJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegenerationJob")
            .field("generators", &self.generators)
            .finish_non_exhaustive()
    }
}

impl RegenerationJob {
    pub fn new(
        records: Arc<dyn RecordStore>,
        mirror: BestEffortMirror,
        generators: Arc<GeneratorRegistry>,
    ) -> Self {
        Self {
            records,
            mirror,
            generators,
        }
    }

    /// Run the job for `profile`.
    ///
    /// On success the stored `ready` row is returned. On failure the row is
    /// marked `error` (content and `last_updated` untouched) and the original
    /// failure is returned.
    #[instrument(
        skip(self, profile),
        fields(composite_id = %profile.composite_id, provider = %profile.provider)
    )]
    pub async fn run(&self, profile: &RequestProfile) -> GuideResult<ContentRecord> {
        if let Some(m) = metrics() {
            m.job_started();
        }

        let now = Utc::now();
        self.mirror
            .mirror_status(&profile.key, RecordStatus::Processing, now)
            .await;

        let result = match self
            .records
            .upsert(&profile.key, &RecordPatch::status(RecordStatus::Processing, now))
            .await
        {
            Ok(row) => self.generate_and_store(profile, row).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(record) => {
                info!(status = %record.status, "Regeneration succeeded");
            }
            Err(e) => {
                self.mark_failed(profile, e).await;
            }
        }

        if let Some(m) = metrics() {
            m.record_job(profile.provider.as_str(), result.is_ok());
            m.job_finished();
        }
        result
    }

    async fn generate_and_store(
        &self,
        profile: &RequestProfile,
        mut row: ContentRecord,
    ) -> GuideResult<ContentRecord> {
        let generator = self.generators.get(profile.provider)?;

        let started = Instant::now();
        let generated = generator.generate(profile).await;
        if let Some(m) = metrics() {
            m.record_generation(profile.provider.as_str(), started.elapsed().as_secs_f64());
        }

        let content = generated?;
        content.validate(profile.provider)?;

        let patch = RecordPatch::generated(content, profile.provider, Utc::now());
        patch.apply_to(&mut row);
        self.mirror.mirror_ready(&row).await;

        self.records.upsert(&profile.key, &patch).await
    }

    async fn mark_failed(&self, profile: &RequestProfile, error: &GuideError) {
        warn!(error = %error, kind = error.kind(), "Regeneration failed");

        self.mirror.mirror_error(&profile.key).await;

        let patch = RecordPatch::status(RecordStatus::Error, Utc::now());
        if let Err(e) = self.records.update_fields(&profile.key, &patch).await {
            warn!(error = %e, "Failed to record error status");
        }
    }
}
