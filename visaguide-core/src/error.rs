//! Error types for VisaGuide operations

use thiserror::Error;

/// Request validation errors. Raised before any store access.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Record store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found for key {key}")]
    NotFound { key: String },

    #[error("Upsert failed for key {key}: {reason}")]
    UpsertFailed { key: String, reason: String },

    #[error("Update failed for key {key}: {reason}")]
    UpdateFailed { key: String, reason: String },

    #[error("Query failed: {reason}")]
    QueryFailed { reason: String },

    #[error("Store connection failed: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Content generator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("No content generator configured for provider {provider}")]
    ProviderNotConfigured { provider: String },

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("Rate limited by {provider}")]
    RateLimited { provider: String },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Incomplete record from {provider}, missing: {missing:?}")]
    IncompleteRecord {
        provider: String,
        missing: Vec<String>,
    },
}

/// Mirror store errors. Always swallowed by the best-effort mirror writer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MirrorError {
    #[error("Mirror write failed for document {document_id}: {reason}")]
    WriteFailed { document_id: String, reason: String },

    #[error("Mirror payload for document {document_id} is not a JSON object")]
    InvalidPayload { document_id: String },

    #[error("Mirror lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Provider not supported: {provider}")]
    ProviderNotSupported { provider: String },
}

/// Master error type for all VisaGuide errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuideError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl GuideError {
    /// Short machine-readable label, used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            GuideError::Validation(_) => "validation",
            GuideError::Store(_) => "store",
            GuideError::Generation(_) => "generation",
            GuideError::Mirror(_) => "mirror",
            GuideError::Config(_) => "config",
        }
    }
}

/// Result type alias for VisaGuide operations.
pub type GuideResult<T> = Result<T, GuideError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_missing_field() {
        let err = ValidationError::RequiredFieldMissing {
            field: "destination".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Required field missing"));
        assert!(msg.contains("destination"));
    }

    #[test]
    fn test_store_error_display_upsert_failed() {
        let err = StoreError::UpsertFailed {
            key: "US_US_JP_Tourism_eVisa_visa".to_string(),
            reason: "connection reset".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Upsert failed"));
        assert!(msg.contains("US_US_JP_Tourism_eVisa_visa"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_generation_error_display_incomplete() {
        let err = GenerationError::IncompleteRecord {
            provider: "openai".to_string(),
            missing: vec!["fees".to_string()],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Incomplete record"));
        assert!(msg.contains("openai"));
        assert!(msg.contains("fees"));
    }

    #[test]
    fn test_generation_error_display_timeout() {
        let err = GenerationError::Timeout {
            provider: "anthropic".to_string(),
            timeout_ms: 30_000,
        };
        assert!(err.to_string().contains("30000ms"));
    }

    #[test]
    fn test_guide_error_from_variants() {
        let validation = GuideError::from(ValidationError::RequiredFieldMissing {
            field: "nationality".to_string(),
        });
        assert!(matches!(validation, GuideError::Validation(_)));
        assert_eq!(validation.kind(), "validation");

        let store = GuideError::from(StoreError::LockPoisoned);
        assert!(matches!(store, GuideError::Store(_)));
        assert_eq!(store.kind(), "store");

        let generation = GuideError::from(GenerationError::RateLimited {
            provider: "openai".to_string(),
        });
        assert!(matches!(generation, GuideError::Generation(_)));

        let mirror = GuideError::from(MirrorError::LockPoisoned);
        assert_eq!(mirror.kind(), "mirror");

        let config = GuideError::from(ConfigError::ProviderNotSupported {
            provider: "gemini".to_string(),
        });
        assert!(matches!(config, GuideError::Config(_)));
    }
}
