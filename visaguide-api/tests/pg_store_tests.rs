#![cfg(feature = "db-tests")]
//! Postgres record store against a live database.
//!
//! Connection settings come from `VISAGUIDE_DB_*`. Every test works on keys
//! with a random destination so runs do not interfere.

use chrono::{Duration, Utc};
use visaguide_api::{DbConfig, PgRecordStore};
use visaguide_core::{GuideError, GuideResult, Provider, RecordStatus, RequestKey, StoreError};
use visaguide_storage::{RecordPatch, RecordStore};
use visaguide_test_utils::fixtures;

fn test_store() -> PgRecordStore {
    PgRecordStore::new(DbConfig::from_env())
}

fn unique_key() -> RequestKey {
    fixtures::key_for_destination(&format!("T-{}", uuid::Uuid::now_v7().simple()))
}

#[tokio::test]
async fn test_upsert_creates_then_updates_one_row() -> GuideResult<()> {
    let store = test_store();
    let key = unique_key();
    let now = Utc::now();

    let created = store
        .upsert(&key, &RecordPatch::status(RecordStatus::Queued, now))
        .await?;
    assert_eq!(created.status, RecordStatus::Queued);
    assert_eq!(created.last_updated, None);

    let content = fixtures::content_for(&key, Provider::OpenAi);
    let ready = store
        .upsert(&key, &RecordPatch::generated(content.clone(), Provider::OpenAi, now))
        .await?;
    assert_eq!(ready.id, created.id);
    assert_eq!(ready.status, RecordStatus::Ready);
    assert_eq!(ready.content, content);
    assert_eq!(ready.source, Some(Provider::OpenAi));

    // A status-only write keeps content and last_updated.
    store
        .update_fields(&key, &RecordPatch::status(RecordStatus::Error, Utc::now()))
        .await?;
    let errored = store.find_one(&key).await?;
    assert_eq!(errored.as_ref().map(|r| r.status), Some(RecordStatus::Error));
    assert_eq!(errored.as_ref().map(|r| &r.content), Some(&content));
    assert_eq!(
        errored.and_then(|r| r.last_updated).map(|t| t.timestamp()),
        ready.last_updated.map(|t| t.timestamp())
    );
    Ok(())
}

#[tokio::test]
async fn test_update_missing_row_is_not_found() {
    let store = test_store();
    let result = store
        .update_fields(&unique_key(), &RecordPatch::status(RecordStatus::Error, Utc::now()))
        .await;
    assert!(matches!(
        result,
        Err(GuideError::Store(StoreError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn test_find_stale_skips_never_generated_rows() -> GuideResult<()> {
    let store = test_store();
    let stale_key = unique_key();
    let pending_key = unique_key();
    let long_ago = Utc::now() - Duration::days(90);

    store
        .upsert(
            &stale_key,
            &RecordPatch::generated(
                fixtures::content_for(&stale_key, Provider::OpenAi),
                Provider::OpenAi,
                long_ago,
            ),
        )
        .await?;
    store
        .upsert(&pending_key, &RecordPatch::status(RecordStatus::Queued, long_ago))
        .await?;

    let rows = store
        .find_stale(Utc::now() - Duration::days(30), 10_000)
        .await?;
    assert!(rows.iter().any(|r| r.key == stale_key));
    assert!(rows.iter().all(|r| r.key != pending_key));
    Ok(())
}

#[tokio::test]
async fn test_health_check_reaches_database() -> GuideResult<()> {
    test_store().health_check().await
}
