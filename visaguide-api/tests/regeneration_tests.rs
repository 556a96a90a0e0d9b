//! Regeneration job transitions, run directly without the coordinator.

use std::sync::Arc;

use visaguide_api::RegenerationJob;
use visaguide_core::{GenerationError, GuideError, GuideResult, Provider, RecordStatus, RequestProfile};
use visaguide_storage::{BestEffortMirror, InMemoryMirrorStore, InMemoryRecordStore, RecordStore};
use visaguide_test_utils::{fixtures, ScriptedGenerator};

struct JobFixture {
    records: Arc<InMemoryRecordStore>,
    mirror: Arc<InMemoryMirrorStore>,
    generator: Arc<ScriptedGenerator>,
    job: RegenerationJob,
}

fn job_with(generator: ScriptedGenerator) -> JobFixture {
    let records = Arc::new(InMemoryRecordStore::new());
    let mirror = Arc::new(InMemoryMirrorStore::new(64));
    let (generator, registry) = generator.into_registry();
    let record_store: Arc<dyn RecordStore> = records.clone();
    let job = RegenerationJob::new(record_store, BestEffortMirror::new(mirror.clone()), registry);
    JobFixture {
        records,
        mirror,
        generator,
        job,
    }
}

fn profile() -> RequestProfile {
    RequestProfile::new(fixtures::us_to_japan_key(), Provider::OpenAi)
}

#[tokio::test]
async fn test_run_creates_ready_row_for_unknown_key() -> GuideResult<()> {
    let fixture = job_with(ScriptedGenerator::new(Provider::OpenAi));
    let mut changes = fixture.mirror.subscribe();

    let record = fixture.job.run(&profile()).await?;

    assert_eq!(record.status, RecordStatus::Ready);
    assert!(record.is_complete());
    assert_eq!(fixture.records.all()?, vec![record]);

    // processing first, then the full ready document
    let first = changes.try_recv().map(|c| c.document["status"].clone()).ok();
    let second = changes.try_recv().map(|c| c.document["status"].clone()).ok();
    assert_eq!(first, Some(serde_json::json!("processing")));
    assert_eq!(second, Some(serde_json::json!("ready")));
    Ok(())
}

#[tokio::test]
async fn test_rerun_is_idempotent() -> GuideResult<()> {
    let fixture = job_with(ScriptedGenerator::new(Provider::OpenAi));

    let first = fixture.job.run(&profile()).await?;
    let second = fixture.job.run(&profile()).await?;

    assert_eq!(fixture.records.len()?, 1);
    assert_eq!(first.id, second.id);
    assert_eq!(first.content, second.content);
    assert_eq!(second.status, RecordStatus::Ready);
    assert_eq!(fixture.generator.calls(), 2);
    assert_eq!(fixture.mirror.len()?, 1);
    Ok(())
}

#[tokio::test]
async fn test_failure_marks_error_and_preserves_content() -> GuideResult<()> {
    let fixture = job_with(ScriptedGenerator::new(Provider::OpenAi).failing_for("JP"));
    let seeded = fixtures::ready_record(fixtures::us_to_japan_key(), 40);
    fixture.records.seed(seeded.clone())?;

    let result = fixture.job.run(&profile()).await;
    assert!(matches!(
        result,
        Err(GuideError::Generation(GenerationError::RequestFailed { .. }))
    ));

    let stored = fixture.records.find_one(&seeded.key).await?;
    let Some(stored) = stored else {
        panic!("row disappeared after a failed run");
    };
    assert_eq!(stored.status, RecordStatus::Error);
    assert_eq!(stored.content, seeded.content);
    assert_eq!(stored.last_updated, seeded.last_updated);
    assert_eq!(stored.source, seeded.source);

    let document = fixture.mirror.get(&seeded.composite_id())?.unwrap_or_default();
    assert_eq!(document["status"], "error");
    Ok(())
}

#[tokio::test]
async fn test_unregistered_provider_fails_the_job() -> GuideResult<()> {
    let fixture = job_with(ScriptedGenerator::new(Provider::OpenAi));
    let anthropic = RequestProfile::new(fixtures::us_to_japan_key(), Provider::Anthropic);

    let result = fixture.job.run(&anthropic).await;

    assert!(matches!(
        result,
        Err(GuideError::Generation(GenerationError::ProviderNotConfigured { .. }))
    ));
    let stored = fixture.records.find_one(&anthropic.key).await?;
    assert_eq!(stored.map(|r| r.status), Some(RecordStatus::Error));
    Ok(())
}
