//! VisaGuide API - HTTP/WebSocket Layer
//!
//! Serves cached visa guidance over REST. Lookups go through the request
//! coordinator, which answers from the record store when the cached record is
//! fresh and otherwise launches a detached regeneration job whose progress is
//! published to the realtime mirror. Maintenance endpoints refresh stale
//! records in bulk and purge old rows.

pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod jobs;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod types;

// Re-export commonly used types
pub use config::{ApiConfig, LogFormat, MaintenanceSecret, StoreBackend};
pub use db::{DbConfig, PgRecordStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use jobs::{BulkRepopulator, RepopulateRequest, RepopulateScheduleConfig};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{
    CoordinatorOutcome, CoordinatorRequest, InFlightPermit, InFlightRegistry, RegenerationJob,
    RequestCoordinator,
};
pub use state::AppState;
pub use types::*;
