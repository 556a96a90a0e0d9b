//! Shared harness for the API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use visaguide_api::{ApiConfig, AppState};
use visaguide_storage::{InMemoryMirrorStore, InMemoryRecordStore, RecordStore};
use visaguide_test_utils::ScriptedGenerator;

pub const JOB_TIMEOUT: Duration = Duration::from_secs(5);

/// App state over in-memory stores with handles kept for assertions.
pub struct Harness {
    pub records: Arc<InMemoryRecordStore>,
    pub mirror: Arc<InMemoryMirrorStore>,
    pub generator: Arc<ScriptedGenerator>,
    pub state: AppState,
}

impl Harness {
    pub fn new(generator: ScriptedGenerator) -> Self {
        Self::with_config(generator, ApiConfig::default())
    }

    pub fn with_config(generator: ScriptedGenerator, config: ApiConfig) -> Self {
        let records = Arc::new(InMemoryRecordStore::new());
        let mirror = Arc::new(InMemoryMirrorStore::new(config.mirror_channel_capacity));
        let (generator, registry) = generator.into_registry();
        let record_store: Arc<dyn RecordStore> = records.clone();
        let state = AppState::new(config, record_store, Arc::clone(&mirror), registry);
        Self {
            records,
            mirror,
            generator,
            state,
        }
    }

    /// Wait until no detached regeneration job is running.
    pub async fn wait_idle(&self) -> bool {
        let deadline = tokio::time::Instant::now() + JOB_TIMEOUT;
        while !self.state.coordinator.inflight().is_empty() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}
