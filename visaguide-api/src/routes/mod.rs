//! REST API Routes Module
//!
//! Includes:
//! - Visa info lookups (coordinator entry point and plain reads)
//! - Mirror document reads and the change stream WebSocket
//! - Secret-guarded maintenance endpoints
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics and the OpenAPI document

pub mod health;
pub mod maintenance;
pub mod mirror;
pub mod visa;

use std::time::Duration;

use axum::{
    http::{header, header::HeaderName, HeaderValue, Method},
    middleware::from_fn,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::ApiConfig;
use crate::constants::MAINTENANCE_SECRET_HEADER;
use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use maintenance::create_router as maintenance_router;
pub use mirror::create_router as mirror_router;
pub use visa::create_router as visa_router;

/// Handler for /openapi.json endpoint.
async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

/// Build CORS layer from API configuration.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(MAINTENANCE_SECRET_HEADER),
        ])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if !config.is_production() {
        tracing::info!("CORS: Development mode - allowing all origins");
        return cors.allow_origin(Any).allow_headers(Any);
    }

    tracing::info!(
        "CORS: Production mode - allowing origins: {:?}",
        config.cors_origins
    );
    let allowed = config.clone();
    cors.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _parts| {
            origin
                .to_str()
                .map(|o| allowed.is_origin_allowed(o))
                .unwrap_or(false)
        },
    ))
}

/// Create the complete API router.
///
/// Layers run outermost first: CORS, request tracing, observability, then
/// the handler.
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    let api = Router::new()
        .nest("/visa-info", visa_router())
        .nest("/mirror", mirror_router())
        .nest("/maintenance", maintenance_router());

    Router::new()
        .nest("/api/v1", api)
        .nest("/health", health_router())
        .route("/metrics", get(metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_in_both_modes() {
        let dev = ApiConfig::default();
        let _ = build_cors_layer(&dev);

        let prod = ApiConfig {
            cors_origins: vec!["https://visaguide.dev".to_string(), "*.visaguide.dev".to_string()],
            ..Default::default()
        };
        let _ = build_cors_layer(&prod);
    }
}
