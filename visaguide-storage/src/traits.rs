//! Store traits consumed by the coordinator and the regeneration job.
//!
//! Both stores are external collaborators. The record store is the source of
//! truth; the mirror store is a convenience read path for connected clients.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use visaguide_core::{
    CompositeId, ContentRecord, GeneratedContent, GuideResult, Provider, RecordStatus,
    RequestKey, Timestamp,
};

/// A partial write against one record.
///
/// `status` and `updated_at` are always written. Content, source and
/// `last_updated` are only written when present, so a status-only write
/// never disturbs the last known good content or its freshness stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPatch {
    pub status: RecordStatus,
    pub content: Option<GeneratedContent>,
    pub source: Option<Provider>,
    pub last_updated: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl RecordPatch {
    /// Status-only write: placeholders, `processing` and `error` transitions.
    pub fn status(status: RecordStatus, now: Timestamp) -> Self {
        Self {
            status,
            content: None,
            source: None,
            last_updated: None,
            updated_at: now,
        }
    }

    /// Successful generation: content plus a fresh `last_updated`.
    pub fn generated(content: GeneratedContent, source: Provider, now: Timestamp) -> Self {
        Self {
            status: RecordStatus::Ready,
            content: Some(content),
            source: Some(source),
            last_updated: Some(now),
            updated_at: now,
        }
    }

    /// Whether this write carries generated content.
    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Apply the patch to an in-memory row.
    pub fn apply_to(&self, record: &mut ContentRecord) {
        record.status = self.status;
        record.updated_at = self.updated_at;
        if let Some(content) = &self.content {
            record.content = content.clone();
        }
        if let Some(source) = self.source {
            record.source = Some(source);
        }
        if let Some(last_updated) = self.last_updated {
            record.last_updated = Some(last_updated);
        }
    }
}

/// Durable keyed storage for content records.
///
/// Implementations must enforce uniqueness on [`RequestKey`] and make
/// `upsert` atomic per row. Concurrent writers get last-writer-wins.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a row for `key`, or apply `patch` to the existing one.
    ///
    /// Returns the row as stored after the write.
    async fn upsert(&self, key: &RequestKey, patch: &RecordPatch) -> GuideResult<ContentRecord>;

    /// Look up the single row for `key`.
    async fn find_one(&self, key: &RequestKey) -> GuideResult<Option<ContentRecord>>;

    /// Apply `patch` to an existing row. Fails with `StoreError::NotFound`
    /// when there is no row for `key`.
    async fn update_fields(&self, key: &RequestKey, patch: &RecordPatch) -> GuideResult<()>;

    /// Rows whose `last_updated` is strictly before `cutoff`, at most `limit`.
    /// Rows that were never generated (`last_updated` is null) are excluded.
    async fn find_stale(&self, cutoff: Timestamp, limit: usize) -> GuideResult<Vec<ContentRecord>>;

    /// Delete rows not touched (`updated_at`) within the last `days` days.
    /// Returns the number of rows removed.
    async fn purge_older_than(&self, days: u32) -> GuideResult<u64>;

    /// Cheap connectivity probe used by the readiness endpoint.
    async fn health_check(&self) -> GuideResult<()> {
        Ok(())
    }
}

/// Secondary, eventually consistent document store.
///
/// Writes merge top-level keys into the existing document rather than
/// replacing it, so partial status updates compose with full payloads.
#[async_trait]
pub trait MirrorStore: Send + Sync {
    async fn merge_upsert(&self, document_id: &CompositeId, payload: JsonValue) -> GuideResult<()>;
}
