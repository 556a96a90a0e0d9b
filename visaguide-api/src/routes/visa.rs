//! Visa Info Routes
//!
//! `POST /api/v1/visa-info` runs the request coordinator: a fresh record is
//! served inline (200), anything else is accepted for regeneration (202) and
//! completes through the mirror. `GET /api/v1/visa-info` reads the stored
//! record without triggering anything.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use visaguide_core::RequestKey;
use visaguide_storage::RecordStore;

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::services::{CoordinatorOutcome, CoordinatorRequest, RequestCoordinator};
use crate::state::AppState;
use crate::types::{KeyQuery, VisaInfoRequest};

/// POST /api/v1/visa-info
#[utoipa::path(
    post,
    path = "/api/v1/visa-info",
    tag = "Visa Info",
    request_body = VisaInfoRequest,
    responses(
        (status = 200, description = "Fresh record served from cache", body = visaguide_core::ContentRecord),
        (status = 202, description = "Regeneration queued or already processing", body = crate::types::KeyEcho),
        (status = 400, description = "Missing key field or unconfigured provider", body = ApiError),
        (status = 500, description = "Record store failure", body = ApiError),
    ),
)]
pub async fn request_visa_info(
    State(coordinator): State<Arc<RequestCoordinator>>,
    State(config): State<Arc<ApiConfig>>,
    Json(req): Json<VisaInfoRequest>,
) -> ApiResult<Response> {
    let request = CoordinatorRequest {
        key: req.key(),
        provider: req.provider.unwrap_or(config.default_provider),
        force_refresh: req.force_refresh,
    };

    let response = match coordinator.handle(request).await? {
        CoordinatorOutcome::Ready(record) => (StatusCode::OK, Json(record)).into_response(),
        CoordinatorOutcome::Accepted(echo) => (StatusCode::ACCEPTED, Json(echo)).into_response(),
    };
    Ok(response)
}

/// GET /api/v1/visa-info
#[utoipa::path(
    get,
    path = "/api/v1/visa-info",
    tag = "Visa Info",
    params(KeyQuery),
    responses(
        (status = 200, description = "Stored record, in whatever status it is", body = visaguide_core::ContentRecord),
        (status = 400, description = "Missing key field", body = ApiError),
        (status = 404, description = "No record for this key", body = ApiError),
    ),
)]
pub async fn get_visa_info(
    State(records): State<Arc<dyn RecordStore>>,
    Query(query): Query<KeyQuery>,
) -> ApiResult<impl IntoResponse> {
    let key = RequestKey::from(query);
    key.validate().map_err(visaguide_core::GuideError::from)?;

    let record = records
        .find_one(&key)
        .await?
        .ok_or_else(|| ApiError::record_not_found(&key))?;
    Ok(Json(record))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/", post(request_visa_info).get(get_visa_info))
}
