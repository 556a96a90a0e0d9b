//! API Request and Response Types

use serde::{Deserialize, Serialize};
use visaguide_core::{Provider, RecordStatus, RequestKey};

// ============================================================================
// VISA INFO
// ============================================================================

/// Lookup request for one content record.
///
/// Key fields default to empty so a missing field reaches key validation and
/// is reported as `MISSING_FIELD` rather than a deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VisaInfoRequest {
    #[serde(default)]
    pub resident_country: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub visa_category: String,
    #[serde(default)]
    pub visa_type: String,
    /// Generator to use; the configured default when absent
    #[serde(default)]
    pub provider: Option<Provider>,
    /// Regenerate even when the cached record is fresh
    #[serde(default)]
    pub force_refresh: bool,
}

impl VisaInfoRequest {
    pub fn key(&self) -> RequestKey {
        RequestKey::new(
            self.resident_country.as_str(),
            self.nationality.as_str(),
            self.destination.as_str(),
            self.visa_category.as_str(),
            self.visa_type.as_str(),
        )
    }
}

/// Query string form of a request key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct KeyQuery {
    #[serde(default)]
    pub resident_country: String,
    #[serde(default)]
    pub nationality: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default)]
    pub visa_category: String,
    #[serde(default)]
    pub visa_type: String,
}

impl From<KeyQuery> for RequestKey {
    fn from(q: KeyQuery) -> Self {
        RequestKey::new(
            q.resident_country,
            q.nationality,
            q.destination,
            q.visa_category,
            q.visa_type,
        )
    }
}

/// Body of a 202 response: the decided status plus the request key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct KeyEcho {
    pub status: RecordStatus,
    #[serde(flatten)]
    pub key: RequestKey,
}

// ============================================================================
// MIRROR
// ============================================================================

/// Optional filter for the mirror change stream.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
pub struct MirrorStreamQuery {
    /// Only forward changes to this document
    pub composite_id: Option<String>,
}

// ============================================================================
// MAINTENANCE
// ============================================================================

/// Parameters for a bulk repopulation run. Omitted fields use defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RepopulateParams {
    /// Records whose content is older than this many days are refreshed
    pub days: Option<u32>,
    pub provider: Option<Provider>,
    /// Maximum number of stale rows to scan
    pub limit: Option<usize>,
    /// Maximum number of jobs in flight
    pub concurrency: Option<usize>,
}

/// One failed key in a repopulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RepopulateErrorEntry {
    /// Composite id of the failed key
    pub key: String,
    pub error: String,
}

/// Outcome of a repopulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RepopulateSummary {
    /// Stale rows returned by the scan, before dedup
    pub scanned: usize,
    /// Distinct keys a job was run for
    pub requested: usize,
    pub refreshed: usize,
    pub failed: usize,
    /// First failures, sorted by key
    pub errors: Vec<RepopulateErrorEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PurgeRequest {
    /// Rows not touched within this many days are removed
    pub days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PurgeResponse {
    pub removed: u64,
    pub days: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_echo_is_flat() -> Result<(), serde_json::Error> {
        let echo = KeyEcho {
            status: RecordStatus::Queued,
            key: RequestKey::new("US", "US", "JP", "Tourism", "eVisa"),
        };
        let value = serde_json::to_value(&echo)?;
        assert_eq!(
            value,
            serde_json::json!({
                "status": "queued",
                "resident_country": "US",
                "nationality": "US",
                "destination": "JP",
                "visa_category": "Tourism",
                "visa_type": "eVisa",
            })
        );
        Ok(())
    }

    #[test]
    fn test_visa_info_request_defaults() -> Result<(), serde_json::Error> {
        let req: VisaInfoRequest = serde_json::from_value(serde_json::json!({
            "resident_country": "US",
            "nationality": "US",
            "destination": "JP",
        }))?;
        assert_eq!(req.visa_category, "");
        assert!(!req.force_refresh);
        assert_eq!(req.provider, None);
        assert!(req.key().validate().is_err());
        Ok(())
    }

    #[test]
    fn test_visa_info_request_provider_and_force() -> Result<(), serde_json::Error> {
        let req: VisaInfoRequest = serde_json::from_value(serde_json::json!({
            "resident_country": "US",
            "nationality": "US",
            "destination": "JP",
            "visa_category": "Tourism",
            "visa_type": "eVisa",
            "provider": "anthropic",
            "force_refresh": true,
        }))?;
        assert_eq!(req.provider, Some(Provider::Anthropic));
        assert!(req.force_refresh);
        assert!(req.key().validate().is_ok());
        Ok(())
    }
}
