//! Mirror store: in-memory implementation, payload builders and the
//! best-effort writer used by every job.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use visaguide_core::{
    CompositeId, ContentRecord, GuideError, GuideResult, MirrorError, RecordStatus, RequestKey,
    Timestamp,
};

use crate::traits::MirrorStore;

/// Default capacity of the mirror change feed.
pub const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// One merged write, as seen by change-feed subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MirrorChange {
    pub document_id: CompositeId,
    /// Full document after the merge.
    pub document: JsonValue,
}

/// Mirror store over a `HashMap` of JSON objects with a broadcast change feed.
#[derive(Debug, Clone)]
pub struct InMemoryMirrorStore {
    documents: Arc<RwLock<HashMap<CompositeId, Map<String, JsonValue>>>>,
    changes: broadcast::Sender<MirrorChange>,
}

impl Default for InMemoryMirrorStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_CAPACITY)
    }
}

impl InMemoryMirrorStore {
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }

    /// Current document for `document_id`, if any write has landed.
    pub fn get(&self, document_id: &CompositeId) -> GuideResult<Option<JsonValue>> {
        let documents = self
            .documents
            .read()
            .map_err(|_| GuideError::Mirror(MirrorError::LockPoisoned))?;
        Ok(documents.get(document_id).cloned().map(JsonValue::Object))
    }

    /// Subscribe to merged writes made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorChange> {
        self.changes.subscribe()
    }

    pub fn len(&self) -> GuideResult<usize> {
        let documents = self
            .documents
            .read()
            .map_err(|_| GuideError::Mirror(MirrorError::LockPoisoned))?;
        Ok(documents.len())
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn merge_upsert(&self, document_id: &CompositeId, payload: JsonValue) -> GuideResult<()> {
        let JsonValue::Object(fields) = payload else {
            return Err(MirrorError::InvalidPayload {
                document_id: document_id.to_string(),
            }
            .into());
        };

        let merged = {
            let mut documents = self
                .documents
                .write()
                .map_err(|_| GuideError::Mirror(MirrorError::LockPoisoned))?;
            let document = documents.entry(document_id.clone()).or_default();
            document.extend(fields);
            JsonValue::Object(document.clone())
        };

        // No subscribers is not an error.
        let _ = self.changes.send(MirrorChange {
            document_id: document_id.clone(),
            document: merged,
        });
        Ok(())
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

fn key_fields(key: &RequestKey) -> Map<String, JsonValue> {
    key.fields()
        .into_iter()
        .map(|(name, value)| (name.to_string(), JsonValue::String(value.to_string())))
        .collect()
}

/// Key fields plus a status and touch time.
pub fn status_payload(key: &RequestKey, status: RecordStatus, now: Timestamp) -> JsonValue {
    let mut payload = key_fields(key);
    payload.insert("status".to_string(), json!(status));
    payload.insert("updated_at".to_string(), json!(now));
    JsonValue::Object(payload)
}

/// The full record with `status` forced to `ready`.
pub fn ready_payload(record: &ContentRecord) -> GuideResult<JsonValue> {
    let mut payload = serde_json::to_value(record).map_err(|e| MirrorError::WriteFailed {
        document_id: record.composite_id().into_inner(),
        reason: e.to_string(),
    })?;
    if let JsonValue::Object(fields) = &mut payload {
        fields.insert("status".to_string(), json!(RecordStatus::Ready));
    }
    Ok(payload)
}

/// Key fields and `status: error` only. Content already mirrored stays put.
pub fn error_payload(key: &RequestKey) -> JsonValue {
    let mut payload = key_fields(key);
    payload.insert("status".to_string(), json!(RecordStatus::Error));
    JsonValue::Object(payload)
}

// ============================================================================
// BEST-EFFORT WRITER
// ============================================================================

/// Wraps a [`MirrorStore`] so that no mirror failure ever reaches a caller.
///
/// This is the only place mirror results are inspected.
#[derive(Clone)]
pub struct BestEffortMirror {
    inner: Arc<dyn MirrorStore>,
}

impl std::fmt::Debug for BestEffortMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BestEffortMirror").finish_non_exhaustive()
    }
}

impl BestEffortMirror {
    pub fn new(inner: Arc<dyn MirrorStore>) -> Self {
        Self { inner }
    }

    /// Returns whether the write landed. Callers are free to ignore it.
    pub async fn write(&self, document_id: &CompositeId, payload: JsonValue) -> bool {
        match self.inner.merge_upsert(document_id, payload).await {
            Ok(()) => {
                debug!(composite_id = %document_id, "Mirror write landed");
                true
            }
            Err(e) => {
                warn!(composite_id = %document_id, error = %e, "Mirror write failed");
                false
            }
        }
    }

    pub async fn mirror_status(&self, key: &RequestKey, status: RecordStatus, now: Timestamp) -> bool {
        self.write(&key.composite_id(), status_payload(key, status, now))
            .await
    }

    pub async fn mirror_ready(&self, record: &ContentRecord) -> bool {
        let document_id = record.composite_id();
        match ready_payload(record) {
            Ok(payload) => self.write(&document_id, payload).await,
            Err(e) => {
                warn!(composite_id = %document_id, error = %e, "Mirror payload build failed");
                false
            }
        }
    }

    pub async fn mirror_error(&self, key: &RequestKey) -> bool {
        self.write(&key.composite_id(), error_payload(key)).await
    }
}
