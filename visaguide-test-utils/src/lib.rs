//! VisaGuide Test Utilities
//!
//! Shared test infrastructure for the VisaGuide workspace:
//! - A scripted content generator with call and concurrency tracking
//! - Record and mirror stores that always fail
//! - Fixtures for keys, content and records at a chosen age
//! - Proptest generators for keys, statuses and content
//! - Pollers that wait for a detached job to land

pub use visaguide_core::{
    CompositeId, ContentRecord, GeneratedContent, GenerationError, GuideError, GuideResult,
    MirrorError, Provider, RecordStatus, RequestKey, RequestProfile, StoreError, Timestamp,
};

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use visaguide_llm::{ContentGenerator, GeneratorRegistry};
use visaguide_storage::{InMemoryMirrorStore, MirrorStore, RecordPatch, RecordStore};

// ============================================================================
// SCRIPTED GENERATOR
// ============================================================================

/// Deterministic content generator.
///
/// Returns [`fixtures::content_for`] for every key unless the destination was
/// marked as failing. Tracks how many calls were made and the highest number
/// of calls that were in progress at once.
#[derive(Debug)]
pub struct ScriptedGenerator {
    provider: Provider,
    delay: Duration,
    failing_destinations: HashSet<String>,
    incomplete: bool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            delay: Duration::ZERO,
            failing_destinations: HashSet::new(),
            incomplete: false,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call whose destination is `destination`.
    pub fn failing_for(mut self, destination: impl Into<String>) -> Self {
        self.failing_destinations.insert(destination.into());
        self
    }

    /// Answer with content that misses mandatory attributes.
    pub fn returning_incomplete(mut self) -> Self {
        self.incomplete = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Wrap in an `Arc` together with a registry holding only this generator.
    pub fn into_registry(self) -> (Arc<Self>, Arc<GeneratorRegistry>) {
        let generator = Arc::new(self);
        let registry = GeneratorRegistry::new().with(generator.clone());
        (generator, Arc::new(registry))
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(&self, profile: &RequestProfile) -> GuideResult<GeneratedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_destinations.contains(&profile.key.destination) {
            return Err(GenerationError::RequestFailed {
                provider: self.provider.to_string(),
                status: 500,
                message: format!("scripted failure for {}", profile.composite_id),
            }
            .into());
        }

        if self.incomplete {
            return Ok(GeneratedContent {
                visa_description: Some("Only a description".to_string()),
                ..Default::default()
            });
        }

        Ok(fixtures::content_for(&profile.key, self.provider))
    }
}

// ============================================================================
// FAILING STORES
// ============================================================================

/// Mirror store that rejects every write and counts the attempts.
#[derive(Debug, Default)]
pub struct FailingMirror {
    attempts: AtomicUsize,
}

impl FailingMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MirrorStore for FailingMirror {
    async fn merge_upsert(&self, document_id: &CompositeId, _payload: JsonValue) -> GuideResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MirrorError::WriteFailed {
            document_id: document_id.to_string(),
            reason: "mirror offline".to_string(),
        }
        .into())
    }
}

/// Record store whose every operation fails with a connection error.
#[derive(Debug, Clone)]
pub struct FailingRecordStore {
    reason: String,
}

impl Default for FailingRecordStore {
    fn default() -> Self {
        Self::new("connection refused")
    }
}

impl FailingRecordStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> GuideResult<T> {
        Err(StoreError::ConnectionFailed {
            reason: self.reason.clone(),
        }
        .into())
    }
}

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn upsert(&self, _key: &RequestKey, _patch: &RecordPatch) -> GuideResult<ContentRecord> {
        self.fail()
    }

    async fn find_one(&self, _key: &RequestKey) -> GuideResult<Option<ContentRecord>> {
        self.fail()
    }

    async fn update_fields(&self, _key: &RequestKey, _patch: &RecordPatch) -> GuideResult<()> {
        self.fail()
    }

    async fn find_stale(&self, _cutoff: Timestamp, _limit: usize) -> GuideResult<Vec<ContentRecord>> {
        self.fail()
    }

    async fn purge_older_than(&self, _days: u32) -> GuideResult<u64> {
        self.fail()
    }

    async fn health_check(&self) -> GuideResult<()> {
        self.fail()
    }
}

// ============================================================================
// POLLING HELPERS
// ============================================================================

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll the mirror until the document for `id` carries `status`.
///
/// Returns the document, or `None` once `timeout` elapses.
pub async fn wait_for_mirror_status(
    mirror: &InMemoryMirrorStore,
    id: &CompositeId,
    status: RecordStatus,
    timeout: Duration,
) -> Option<JsonValue> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(document)) = mirror.get(id) {
            if document.get("status").and_then(JsonValue::as_str) == Some(status.as_str()) {
                return Some(document);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll the record store until the row for `key` carries `status`.
pub async fn wait_for_record_status(
    records: &dyn RecordStore,
    key: &RequestKey,
    status: RecordStatus,
    timeout: Duration,
) -> Option<ContentRecord> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(record)) = records.find_one(key).await {
            if record.status == status {
                return Some(record);
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use super::*;
    use proptest::prelude::*;

    /// Non-blank key field, occasionally containing a `/`.
    pub fn arb_key_field() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 /-]{0,11}"
    }

    pub fn arb_request_key() -> impl Strategy<Value = RequestKey> {
        (
            arb_key_field(),
            arb_key_field(),
            arb_key_field(),
            arb_key_field(),
            arb_key_field(),
        )
            .prop_map(|(resident, nationality, destination, category, visa_type)| {
                RequestKey::new(resident, nationality, destination, category, visa_type)
            })
    }

    pub fn arb_record_status() -> impl Strategy<Value = RecordStatus> {
        prop_oneof![
            Just(RecordStatus::Queued),
            Just(RecordStatus::Processing),
            Just(RecordStatus::Refreshing),
            Just(RecordStatus::Ready),
            Just(RecordStatus::Error),
        ]
    }

    pub fn arb_provider() -> impl Strategy<Value = Provider> {
        prop_oneof![Just(Provider::OpenAi), Just(Provider::Anthropic)]
    }

    /// Content where any attribute may be absent or blank.
    pub fn arb_generated_content() -> impl Strategy<Value = GeneratedContent> {
        let field = || proptest::option::of("[ a-z]{0,8}");
        (
            (field(), field(), field(), field(), field()),
            (field(), field(), field(), field(), field()),
        )
            .prop_map(|((a, b, c, d, e), (f, g, h, i, j))| GeneratedContent {
                visa_description: a,
                eligibility: b,
                required_documents: c,
                application_process: d,
                processing_time: e,
                fees: f,
                validity: g,
                stay_duration: h,
                restrictions: i,
                additional_notes: j,
            })
    }

    /// Record of any status and content, `age_days` in 0..120.
    pub fn arb_record() -> impl Strategy<Value = ContentRecord> {
        (
            arb_request_key(),
            arb_record_status(),
            arb_generated_content(),
            proptest::option::of(0i64..120),
        )
            .prop_map(|(key, status, content, age_days)| {
                let now = chrono::Utc::now();
                let mut record = ContentRecord::placeholder(key, status, now);
                record.content = content;
                record.last_updated = age_days.map(|d| now - chrono::Duration::days(d));
                record
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    pub fn us_to_japan_key() -> RequestKey {
        RequestKey::new("US", "US", "JP", "Tourism", "eVisa")
    }

    /// US tourist key for an arbitrary destination.
    pub fn key_for_destination(destination: &str) -> RequestKey {
        RequestKey::new("US", "US", destination, "Tourism", "eVisa")
    }

    /// Complete content mentioning the key it was generated for.
    pub fn content_for(key: &RequestKey, provider: Provider) -> GeneratedContent {
        GeneratedContent {
            visa_description: Some(format!(
                "{} {} visa for {} citizens travelling to {} (via {})",
                key.visa_category, key.visa_type, key.nationality, key.destination, provider
            )),
            eligibility: Some("Valid passport holders".to_string()),
            required_documents: Some("Passport, photo, itinerary".to_string()),
            application_process: Some("Apply online and await approval".to_string()),
            processing_time: Some("5 business days".to_string()),
            fees: Some("USD 30".to_string()),
            validity: Some("90 days".to_string()),
            stay_duration: Some("Up to 30 days".to_string()),
            restrictions: None,
            additional_notes: None,
        }
    }

    pub fn complete_content() -> GeneratedContent {
        content_for(&us_to_japan_key(), Provider::OpenAi)
    }

    /// Ready record whose content was generated `age_days` ago.
    pub fn ready_record(key: RequestKey, age_days: i64) -> ContentRecord {
        let now = Utc::now();
        let generated_at = now - ChronoDuration::days(age_days);
        let mut record = ContentRecord::placeholder(key.clone(), RecordStatus::Ready, generated_at);
        record.content = content_for(&key, Provider::OpenAi);
        record.source = Some(Provider::OpenAi);
        record.last_updated = Some(generated_at);
        record
    }

    /// Row left in `status` after a regeneration that never finished.
    pub fn record_with_status(key: RequestKey, status: RecordStatus) -> ContentRecord {
        ContentRecord::placeholder(key, status, Utc::now())
    }
}
