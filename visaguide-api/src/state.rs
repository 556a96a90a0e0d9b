//! Shared application state.
//!
//! One `AppState` is built at startup and cloned into every handler. Handlers
//! pull out only the piece they need through `FromRef`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;
use visaguide_llm::GeneratorRegistry;
use visaguide_storage::{
    BestEffortMirror, FreshnessPolicy, InMemoryMirrorStore, MirrorStore, RecordStore,
};

use crate::config::ApiConfig;
use crate::jobs::BulkRepopulator;
use crate::services::{InFlightRegistry, RequestCoordinator};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub records: Arc<dyn RecordStore>,
    pub mirror: Arc<InMemoryMirrorStore>,
    pub generators: Arc<GeneratorRegistry>,
    pub coordinator: Arc<RequestCoordinator>,
    pub repopulator: Arc<BulkRepopulator>,
    pub start_time: Instant,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .field("mirror_documents", &self.mirror.len().ok())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the coordinator, the regeneration job and the repopulator over
    /// the given stores.
    pub fn new(
        config: ApiConfig,
        records: Arc<dyn RecordStore>,
        mirror: Arc<InMemoryMirrorStore>,
        generators: Arc<GeneratorRegistry>,
    ) -> Self {
        let mirror_store: Arc<dyn MirrorStore> = mirror.clone();
        let coordinator = RequestCoordinator::new(
            Arc::clone(&records),
            BestEffortMirror::new(mirror_store),
            Arc::clone(&generators),
            FreshnessPolicy::new(config.freshness_days),
            InFlightRegistry::new(),
        );
        let repopulator = BulkRepopulator::new(Arc::clone(&records), coordinator.job().clone());

        Self {
            config: Arc::new(config),
            records,
            mirror,
            generators,
            coordinator: Arc::new(coordinator),
            repopulator: Arc::new(repopulator),
            start_time: Instant::now(),
        }
    }

    /// Seconds since the state was built.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

macro_rules! from_state {
    ($type:ty, $field:ident) => {
        impl FromRef<AppState> for $type {
            fn from_ref(state: &AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}

from_state!(Arc<ApiConfig>, config);
from_state!(Arc<dyn RecordStore>, records);
from_state!(Arc<InMemoryMirrorStore>, mirror);
from_state!(Arc<GeneratorRegistry>, generators);
from_state!(Arc<RequestCoordinator>, coordinator);
from_state!(Arc<BulkRepopulator>, repopulator);
