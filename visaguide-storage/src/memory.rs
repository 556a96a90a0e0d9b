//! In-memory record store.
//!
//! Backs tests and the `memory` store backend. Uniqueness on the request key
//! falls out of the map; each write takes the lock once, which gives per-row
//! atomicity and last-writer-wins between concurrent writers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use visaguide_core::{
    ContentRecord, GuideError, GuideResult, RequestKey, StoreError, Timestamp,
};

use crate::freshness::stale_cutoff;
use crate::traits::{RecordPatch, RecordStore};

/// Record store over a `HashMap` keyed by [`RequestKey`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<RequestKey, ContentRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a row verbatim, bypassing patch semantics.
    pub fn seed(&self, record: ContentRecord) -> GuideResult<()> {
        self.write()?.insert(record.key.clone(), record);
        Ok(())
    }

    pub fn len(&self) -> GuideResult<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> GuideResult<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Snapshot of every row, ordered by composite id.
    pub fn all(&self) -> GuideResult<Vec<ContentRecord>> {
        let mut rows: Vec<ContentRecord> = self.read()?.values().cloned().collect();
        rows.sort_by(|a, b| a.composite_id().cmp(&b.composite_id()));
        Ok(rows)
    }

    fn read(&self) -> GuideResult<RwLockReadGuard<'_, HashMap<RequestKey, ContentRecord>>> {
        self.records
            .read()
            .map_err(|_| GuideError::Store(StoreError::LockPoisoned))
    }

    fn write(&self) -> GuideResult<RwLockWriteGuard<'_, HashMap<RequestKey, ContentRecord>>> {
        self.records
            .write()
            .map_err(|_| GuideError::Store(StoreError::LockPoisoned))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn upsert(&self, key: &RequestKey, patch: &RecordPatch) -> GuideResult<ContentRecord> {
        let mut records = self.write()?;
        let record = records.entry(key.clone()).or_insert_with(|| {
            ContentRecord::placeholder(key.clone(), patch.status, patch.updated_at)
        });
        patch.apply_to(record);
        Ok(record.clone())
    }

    async fn find_one(&self, key: &RequestKey) -> GuideResult<Option<ContentRecord>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn update_fields(&self, key: &RequestKey, patch: &RecordPatch) -> GuideResult<()> {
        let mut records = self.write()?;
        let record = records.get_mut(key).ok_or_else(|| StoreError::NotFound {
            key: key.composite_id().into_inner(),
        })?;
        patch.apply_to(record);
        Ok(())
    }

    async fn find_stale(&self, cutoff: Timestamp, limit: usize) -> GuideResult<Vec<ContentRecord>> {
        let records = self.read()?;
        let mut stale: Vec<ContentRecord> = records
            .values()
            .filter(|r| r.last_updated.map_or(false, |at| at < cutoff))
            .cloned()
            .collect();
        // Oldest first, so a limited scan always picks the stalest rows.
        stale.sort_by_key(|r| r.last_updated);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn purge_older_than(&self, days: u32) -> GuideResult<u64> {
        let cutoff = stale_cutoff(days, Utc::now());
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|_, r| r.updated_at >= cutoff);
        Ok((before - records.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use visaguide_core::{GeneratedContent, Provider, RecordStatus};

    fn key(destination: &str) -> RequestKey {
        RequestKey::new("US", "US", destination, "Tourism", "eVisa")
    }

    fn content(description: &str) -> GeneratedContent {
        GeneratedContent {
            visa_description: Some(description.to_string()),
            eligibility: Some("All".to_string()),
            required_documents: Some("Passport".to_string()),
            application_process: Some("Online".to_string()),
            processing_time: Some("2 days".to_string()),
            ..Default::default()
        }
    }

    fn generated_at(destination: &str, age_days: i64) -> ContentRecord {
        let now = Utc::now();
        let mut record = ContentRecord::placeholder(key(destination), RecordStatus::Ready, now);
        record.content = content("seeded");
        record.last_updated = Some(now - Duration::days(age_days));
        record.updated_at = now - Duration::days(age_days);
        record
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates_single_row() -> GuideResult<()> {
        let store = InMemoryRecordStore::new();
        let k = key("JP");

        let first = store
            .upsert(&k, &RecordPatch::status(RecordStatus::Queued, Utc::now()))
            .await?;
        let second = store
            .upsert(&k, &RecordPatch::status(RecordStatus::Processing, Utc::now()))
            .await?;

        assert_eq!(store.len()?, 1);
        assert_eq!(first.id, second.id);
        assert_eq!(second.status, RecordStatus::Processing);
        Ok(())
    }

    #[tokio::test]
    async fn test_status_write_keeps_last_known_good() -> GuideResult<()> {
        let store = InMemoryRecordStore::new();
        let k = key("JP");
        let now = Utc::now();
        store
            .upsert(&k, &RecordPatch::generated(content("good"), Provider::OpenAi, now))
            .await?;

        store
            .update_fields(&k, &RecordPatch::status(RecordStatus::Error, Utc::now()))
            .await?;

        let row = store.find_one(&k).await?.expect("row exists");
        assert_eq!(row.status, RecordStatus::Error);
        assert_eq!(row.content.visa_description.as_deref(), Some("good"));
        assert_eq!(row.last_updated, Some(now));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_fields_on_missing_row_is_not_found() {
        let store = InMemoryRecordStore::new();
        let result = store
            .update_fields(&key("FR"), &RecordPatch::status(RecordStatus::Error, Utc::now()))
            .await;
        assert!(matches!(
            result,
            Err(GuideError::Store(StoreError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_find_stale_excludes_fresh_and_never_generated() -> GuideResult<()> {
        let store = InMemoryRecordStore::new();
        store.seed(generated_at("JP", 45))?;
        store.seed(generated_at("FR", 90))?;
        store.seed(generated_at("DE", 2))?;
        store.seed(ContentRecord::placeholder(key("IT"), RecordStatus::Queued, Utc::now()))?;

        let stale = store.find_stale(stale_cutoff(30, Utc::now()), 10).await?;
        let destinations: Vec<&str> = stale.iter().map(|r| r.key.destination.as_str()).collect();
        assert_eq!(destinations, vec!["FR", "JP"]);

        let limited = store.find_stale(stale_cutoff(30, Utc::now()), 1).await?;
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].key.destination, "FR");
        Ok(())
    }

    #[tokio::test]
    async fn test_purge_removes_untouched_rows() -> GuideResult<()> {
        let store = InMemoryRecordStore::new();
        store.seed(generated_at("JP", 400))?;
        store.seed(generated_at("FR", 10))?;

        let removed = store.purge_older_than(365).await?;

        assert_eq!(removed, 1);
        assert!(store.find_one(&key("JP")).await?.is_none());
        assert!(store.find_one(&key("FR")).await?.is_some());
        Ok(())
    }
}
