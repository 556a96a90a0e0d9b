//! Maintenance Routes
//!
//! Operator endpoints guarded by a shared secret sent in the
//! `x-maintenance-secret` header:
//! - `POST /api/v1/maintenance/repopulate` refreshes stale records in bulk
//! - `POST /api/v1/maintenance/purge` removes rows untouched for a long time
//!
//! With no secret configured both endpoints answer 503.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{info, warn};
use visaguide_core::{GuideError, ValidationError};
use visaguide_llm::GeneratorRegistry;
use visaguide_storage::RecordStore;

use crate::config::{ApiConfig, MaintenanceSecret};
use crate::constants::{DEFAULT_PURGE_DAYS, MAINTENANCE_SECRET_HEADER};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{BulkRepopulator, RepopulateRequest};
use crate::state::AppState;
use crate::types::{PurgeRequest, PurgeResponse, RepopulateParams, RepopulateSummary};

type HmacSha256 = Hmac<Sha256>;

/// Fixed message both sides are tagged over before comparison.
const SECRET_CHECK_CONTEXT: &[u8] = b"visaguide-maintenance";

// ============================================================================
// AUTHORIZATION
// ============================================================================

/// Check the request header against the configured secret.
///
/// # Errors
/// `SERVICE_UNAVAILABLE` when no secret is configured, `UNAUTHORIZED` when
/// the header is missing or does not match.
pub fn authorize(secret: Option<&MaintenanceSecret>, headers: &HeaderMap) -> ApiResult<()> {
    let Some(secret) = secret else {
        return Err(ApiError::service_unavailable(
            "Maintenance endpoints are disabled",
        ));
    };

    let provided = headers
        .get(MAINTENANCE_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing maintenance secret"))?;

    if secrets_match(secret.expose(), provided) {
        Ok(())
    } else {
        warn!("Rejected maintenance request with a wrong secret");
        Err(ApiError::unauthorized("Invalid maintenance secret"))
    }
}

/// Compare two secrets in constant time.
///
/// Each value keys an HMAC over the same message; the tags have a fixed
/// length regardless of the inputs and `verify_slice` compares them without
/// early exit.
fn secrets_match(expected: &str, provided: &str) -> bool {
    let Ok(mut expected_mac) = HmacSha256::new_from_slice(expected.as_bytes()) else {
        return false;
    };
    let Ok(mut provided_mac) = HmacSha256::new_from_slice(provided.as_bytes()) else {
        return false;
    };
    expected_mac.update(SECRET_CHECK_CONTEXT);
    provided_mac.update(SECRET_CHECK_CONTEXT);

    let tag = expected_mac.finalize().into_bytes();
    provided_mac.verify_slice(&tag).is_ok()
}

/// An empty body means "all defaults".
fn parse_optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    Ok(serde_json::from_slice(body)?)
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/maintenance/repopulate
#[utoipa::path(
    post,
    path = "/api/v1/maintenance/repopulate",
    tag = "Maintenance",
    request_body(content = Option<RepopulateParams>, description = "Omitted fields use defaults"),
    responses(
        (status = 200, description = "Run finished", body = RepopulateSummary),
        (status = 400, description = "Invalid parameters", body = ApiError),
        (status = 401, description = "Missing or wrong maintenance secret", body = ApiError),
        (status = 503, description = "Maintenance endpoints disabled", body = ApiError),
    ),
    security(("maintenance_secret" = [])),
)]
pub async fn repopulate(
    State(config): State<Arc<ApiConfig>>,
    State(generators): State<Arc<GeneratorRegistry>>,
    State(repopulator): State<Arc<BulkRepopulator>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    authorize(config.maintenance_secret.as_ref(), &headers)?;

    let params: RepopulateParams = parse_optional_body(&body)?;
    let request = RepopulateRequest::from_params(&params, config.default_provider);
    if !generators.has(request.provider) {
        return Err(GuideError::from(ValidationError::InvalidValue {
            field: "provider".to_string(),
            reason: format!("provider '{}' is not configured", request.provider),
        })
        .into());
    }

    info!(
        days = request.days,
        limit = request.limit,
        concurrency = request.concurrency,
        provider = %request.provider,
        "Repopulate requested"
    );
    let summary = repopulator.run(request).await?;
    Ok(Json(summary))
}

/// POST /api/v1/maintenance/purge
#[utoipa::path(
    post,
    path = "/api/v1/maintenance/purge",
    tag = "Maintenance",
    request_body(content = Option<PurgeRequest>, description = "Defaults to 365 days"),
    responses(
        (status = 200, description = "Rows removed", body = PurgeResponse),
        (status = 400, description = "Invalid parameters", body = ApiError),
        (status = 401, description = "Missing or wrong maintenance secret", body = ApiError),
        (status = 503, description = "Maintenance endpoints disabled", body = ApiError),
    ),
    security(("maintenance_secret" = [])),
)]
pub async fn purge(
    State(config): State<Arc<ApiConfig>>,
    State(records): State<Arc<dyn RecordStore>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    authorize(config.maintenance_secret.as_ref(), &headers)?;

    let request: PurgeRequest = parse_optional_body(&body)?;
    let days = request.days.unwrap_or(DEFAULT_PURGE_DAYS);
    if days == 0 {
        return Err(ApiError::validation_failed("days must be at least 1"));
    }

    let removed = records.purge_older_than(days).await?;
    info!(days, removed, "Purged old records");
    Ok(Json(PurgeResponse { removed, days }))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/repopulate", post(repopulate))
        .route("/purge", post(purge))
}
