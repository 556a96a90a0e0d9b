//! Request Coordinator
//!
//! Entry point for one lookup: decide the target status, write the
//! placeholder, mirror it, and launch a detached regeneration job when the
//! cached record cannot be served.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use visaguide_core::{
    ContentRecord, GuideResult, Provider, RecordStatus, RequestKey, RequestProfile, Timestamp,
    ValidationError,
};
use visaguide_llm::GeneratorRegistry;
use visaguide_storage::{BestEffortMirror, FreshnessPolicy, RecordPatch, RecordStore};

use super::{InFlightPermit, InFlightRegistry, RegenerationJob};
use crate::telemetry::metrics;
use crate::types::KeyEcho;

/// One incoming lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorRequest {
    pub key: RequestKey,
    pub provider: Provider,
    pub force_refresh: bool,
}

/// What the caller gets back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorOutcome {
    /// The cached record is fresh and complete; served inline.
    Ready(ContentRecord),
    /// A regeneration is pending; the echo carries the decided status.
    Accepted(KeyEcho),
}

impl CoordinatorOutcome {
    pub fn status(&self) -> RecordStatus {
        match self {
            CoordinatorOutcome::Ready(record) => record.status,
            CoordinatorOutcome::Accepted(echo) => echo.status,
        }
    }
}

#[derive(Clone)]
pub struct RequestCoordinator {
    records: Arc<dyn RecordStore>,
    mirror: BestEffortMirror,
    job: RegenerationJob,
    policy: FreshnessPolicy,
    inflight: Arc<InFlightRegistry>,
    generators: Arc<GeneratorRegistry>,
}

impl std::fmt::Debug for RequestCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("policy", &self.policy)
            .field("inflight", &self.inflight.len())
            .finish_non_exhaustive()
    }
}

impl RequestCoordinator {
    pub fn new(
        records: Arc<dyn RecordStore>,
        mirror: BestEffortMirror,
        generators: Arc<GeneratorRegistry>,
        policy: FreshnessPolicy,
        inflight: Arc<InFlightRegistry>,
    ) -> Self {
        let job = RegenerationJob::new(Arc::clone(&records), mirror.clone(), Arc::clone(&generators));
        Self {
            records,
            mirror,
            job,
            policy,
            inflight,
            generators,
        }
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    pub fn job(&self) -> &RegenerationJob {
        &self.job
    }

    pub fn inflight(&self) -> &Arc<InFlightRegistry> {
        &self.inflight
    }

    /// Handle one lookup.
    ///
    /// # Errors
    /// `ValidationError` for a blank key field or an unconfigured provider,
    /// before any store access. `StoreError` when the lookup or the
    /// placeholder write fails. Generation failures never surface here.
    #[instrument(skip(self, request), fields(composite_id = %request.key.composite_id()))]
    pub async fn handle(&self, request: CoordinatorRequest) -> GuideResult<CoordinatorOutcome> {
        let CoordinatorRequest {
            key,
            provider,
            force_refresh,
        } = request;

        key.validate()?;
        if !self.generators.has(provider) {
            return Err(ValidationError::InvalidValue {
                field: "provider".to_string(),
                reason: format!("provider '{}' is not configured", provider),
            }
            .into());
        }

        let now = Utc::now();
        let existing = self.records.find_one(&key).await?;
        let status = self.policy.decide(existing.as_ref(), force_refresh, now);

        if let Some(m) = metrics() {
            m.record_decision(status.as_str());
        }

        if let (RecordStatus::Ready, Some(record)) = (status, existing.as_ref()) {
            return self.serve_cached(&key, record, now).await;
        }

        // Claim before writing; a running job owns the row and the mirror.
        let Some(permit) = self.inflight.try_acquire(key.composite_id()) else {
            let current = existing.as_ref().map_or(status, |record| record.status);
            debug!(status = %current, "Job already running, placeholder write skipped");
            return Ok(CoordinatorOutcome::Accepted(KeyEcho {
                status: current,
                key,
            }));
        };

        self.records
            .upsert(&key, &RecordPatch::status(status, now))
            .await?;
        self.mirror.mirror_status(&key, status, now).await;

        self.spawn_job(permit, RequestProfile::new(key.clone(), provider));
        info!(status = %status, provider = %provider, "Regeneration requested");

        Ok(CoordinatorOutcome::Accepted(KeyEcho { status, key }))
    }

    /// Serve a fresh, complete record.
    ///
    /// A row whose status still says otherwise (e.g. `error` after a failed
    /// forced refresh kept the good content) is moved back to `ready` in
    /// both stores, unless a job for it is still running.
    async fn serve_cached(
        &self,
        key: &RequestKey,
        record: &ContentRecord,
        now: Timestamp,
    ) -> GuideResult<CoordinatorOutcome> {
        if record.status == RecordStatus::Ready || self.inflight.is_running(&key.composite_id()) {
            debug!(status = %record.status, "Serving cached record");
            return Ok(CoordinatorOutcome::Ready(record.clone()));
        }

        let stored = self
            .records
            .upsert(key, &RecordPatch::status(RecordStatus::Ready, now))
            .await?;
        self.mirror.mirror_ready(&stored).await;
        info!(previous = %record.status, "Cached record restored to ready");
        Ok(CoordinatorOutcome::Ready(stored))
    }

    /// Run the job detached, holding `permit` until it finishes.
    ///
    /// The task owns everything it touches; its result is only observable
    /// through the stores.
    fn spawn_job(&self, permit: InFlightPermit, profile: RequestProfile) {
        let job = self.job.clone();
        tokio::spawn(async move {
            let _permit = permit;
            // Failures are recorded on the row and in the mirror by the job.
            let _ = job.run(&profile).await;
        });
    }
}
