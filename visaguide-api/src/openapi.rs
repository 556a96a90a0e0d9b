//! OpenAPI Specification for the VisaGuide API
//!
//! Generated with utoipa from the route annotations and the request,
//! response and domain types.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::constants::MAINTENANCE_SECRET_HEADER;
use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{health, maintenance, mirror, visa};
use crate::types::*;

use visaguide_core::{ContentRecord, GeneratedContent, Provider, RecordStatus, RequestKey};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "VisaGuide API",
        version = "0.4.0",
        description = "Cached, LLM-generated visa guidance with background regeneration and a realtime mirror",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "http://localhost:8080", description = "Local Development")
    ),
    tags(
        (name = "Visa Info", description = "Cached lookups that trigger regeneration when stale"),
        (name = "Mirror", description = "Realtime documents tracking regeneration progress"),
        (name = "Maintenance", description = "Bulk repopulation and purge, guarded by a shared secret"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics"),
    ),
    paths(
        visa::request_visa_info,
        visa::get_visa_info,
        mirror::get_document,
        maintenance::repopulate,
        maintenance::purge,
        health::ping,
        health::liveness,
        health::readiness,
        crate::telemetry::metrics::metrics_handler,
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            RequestKey, RecordStatus, Provider, GeneratedContent, ContentRecord,
            VisaInfoRequest, KeyEcho,
            RepopulateParams, RepopulateSummary, RepopulateErrorEntry,
            PurgeRequest, PurgeResponse,
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Registers the maintenance secret header as a security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "maintenance_secret",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    MAINTENANCE_SECRET_HEADER,
                ))),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes() -> Result<(), serde_json::Error> {
        let json = ApiDoc::to_json()?;
        assert!(json.contains("/api/v1/visa-info"));
        assert!(json.contains("/api/v1/maintenance/repopulate"));
        assert!(json.contains("maintenance_secret"));
        Ok(())
    }

    #[test]
    fn test_record_schema_describes_ids_and_timestamps() -> Result<(), serde_json::Error> {
        let doc = serde_json::to_value(ApiDoc::openapi())?;
        let record = doc["components"]["schemas"]["ContentRecord"].to_string();
        assert!(record.contains("\"last_updated\""));
        assert!(record.contains("\"updated_at\""));
        assert!(record.contains("\"date-time\""));
        assert!(record.contains("\"uuid\""));
        Ok(())
    }
}
