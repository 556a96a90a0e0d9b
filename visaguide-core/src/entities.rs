//! Content records and the generator-facing profile.

use serde::{Deserialize, Serialize};

use crate::enums::{Provider, RecordStatus};
use crate::error::GenerationError;
use crate::identity::{CompositeId, RequestKey};
use crate::{new_entity_id, EntityId, Timestamp};

/// Attributes that must be present for a record to count as complete.
pub const MANDATORY_FIELDS: [&str; 5] = [
    "visa_description",
    "eligibility",
    "required_documents",
    "application_process",
    "processing_time",
];

/// Structured content produced by a content generator.
///
/// Every attribute is nullable; only the mandatory subset decides
/// completeness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GeneratedContent {
    #[serde(default)]
    pub visa_description: Option<String>,
    #[serde(default)]
    pub eligibility: Option<String>,
    #[serde(default)]
    pub required_documents: Option<String>,
    #[serde(default)]
    pub application_process: Option<String>,
    #[serde(default)]
    pub processing_time: Option<String>,
    #[serde(default)]
    pub fees: Option<String>,
    #[serde(default)]
    pub validity: Option<String>,
    #[serde(default)]
    pub stay_duration: Option<String>,
    #[serde(default)]
    pub restrictions: Option<String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl GeneratedContent {
    fn mandatory_values(&self) -> [(&'static str, Option<&String>); 5] {
        [
            (MANDATORY_FIELDS[0], self.visa_description.as_ref()),
            (MANDATORY_FIELDS[1], self.eligibility.as_ref()),
            (MANDATORY_FIELDS[2], self.required_documents.as_ref()),
            (MANDATORY_FIELDS[3], self.application_process.as_ref()),
            (MANDATORY_FIELDS[4], self.processing_time.as_ref()),
        ]
    }

    /// Mandatory attributes that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.mandatory_values()
            .into_iter()
            .filter(|(_, value)| value.map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Structural check applied to generator output before it is stored.
    pub fn validate(&self, provider: Provider) -> Result<(), GenerationError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(GenerationError::IncompleteRecord {
                provider: provider.to_string(),
                missing: missing.into_iter().map(str::to_string).collect(),
            })
        }
    }
}

/// A cached content record as held by the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ContentRecord {
    /// Surrogate row id. The request key is the real identity.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: EntityId,
    #[serde(flatten)]
    pub key: RequestKey,
    #[serde(flatten)]
    pub content: GeneratedContent,
    pub status: RecordStatus,
    /// Provider that produced the current content, if any.
    pub source: Option<Provider>,
    /// When content was last generated successfully.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub last_updated: Option<Timestamp>,
    /// When the row was last touched for any reason.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl ContentRecord {
    /// A row carrying only key fields and a status.
    pub fn placeholder(key: RequestKey, status: RecordStatus, now: Timestamp) -> Self {
        Self {
            id: new_entity_id(),
            key,
            content: GeneratedContent::default(),
            status,
            source: None,
            last_updated: None,
            updated_at: now,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.content.is_complete()
    }

    pub fn composite_id(&self) -> CompositeId {
        self.key.composite_id()
    }
}

/// Everything a regeneration job needs to know about one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestProfile {
    pub key: RequestKey,
    pub provider: Provider,
    pub composite_id: CompositeId,
}

impl RequestProfile {
    pub fn new(key: RequestKey, provider: Provider) -> Self {
        let composite_id = key.composite_id();
        Self {
            key,
            provider,
            composite_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn full_content() -> GeneratedContent {
        GeneratedContent {
            visa_description: Some("Electronic tourist visa".to_string()),
            eligibility: Some("US passport holders".to_string()),
            required_documents: Some("Passport, photo".to_string()),
            application_process: Some("Apply online".to_string()),
            processing_time: Some("5 business days".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_content_is_complete() {
        assert!(full_content().is_complete());
        assert!(full_content().validate(Provider::OpenAi).is_ok());
    }

    #[test]
    fn test_blank_mandatory_field_is_missing() {
        let content = GeneratedContent {
            eligibility: Some("   ".to_string()),
            fees: None,
            ..full_content()
        };
        assert_eq!(content.missing_fields(), vec!["eligibility"]);
        assert!(matches!(
            content.validate(Provider::Anthropic),
            Err(GenerationError::IncompleteRecord { .. })
        ));
    }

    #[test]
    fn test_optional_fields_do_not_affect_completeness() {
        let content = GeneratedContent {
            fees: None,
            validity: None,
            ..full_content()
        };
        assert!(content.is_complete());
    }

    #[test]
    fn test_placeholder_is_incomplete_and_unstamped() {
        let key = RequestKey::new("US", "US", "JP", "Tourism", "eVisa");
        let record = ContentRecord::placeholder(key, RecordStatus::Queued, Utc::now());
        assert!(!record.is_complete());
        assert!(record.last_updated.is_none());
        assert!(record.source.is_none());
    }

    #[test]
    fn test_record_serializes_flat() -> Result<(), serde_json::Error> {
        let key = RequestKey::new("US", "US", "JP", "Tourism", "eVisa");
        let mut record = ContentRecord::placeholder(key, RecordStatus::Ready, Utc::now());
        record.content = full_content();
        let json = serde_json::to_value(&record)?;
        assert_eq!(json["destination"], "JP");
        assert_eq!(json["visa_description"], "Electronic tourist visa");
        assert_eq!(json["status"], "ready");

        let back: ContentRecord = serde_json::from_value(json)?;
        assert_eq!(back, record);
        Ok(())
    }

    #[test]
    fn test_content_deserializes_with_missing_keys() -> Result<(), serde_json::Error> {
        let content: GeneratedContent =
            serde_json::from_str(r#"{"visa_description": "x", "unexpected": 1}"#)?;
        assert_eq!(content.visa_description.as_deref(), Some("x"));
        assert!(content.fees.is_none());
        Ok(())
    }

    #[test]
    fn test_profile_derives_composite_id() {
        let key = RequestKey::new("US", "US", "JP", "Tourism", "eVisa");
        let profile = RequestProfile::new(key, Provider::Anthropic);
        assert_eq!(profile.composite_id.as_str(), "US_US_JP_Tourism_eVisa_visa");
    }
}
