//! Status and provider enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, StoreError};

/// Lifecycle status of a content record.
///
/// A record is created `Queued`, moves through `Processing` or `Refreshing`
/// while a regeneration job runs, and settles at `Ready` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Queued,
    Processing,
    Refreshing,
    Ready,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Queued => "queued",
            RecordStatus::Processing => "processing",
            RecordStatus::Refreshing => "refreshing",
            RecordStatus::Ready => "ready",
            RecordStatus::Error => "error",
        }
    }

    /// Ready and Error are settled; everything else means work is pending.
    pub fn is_settled(&self) -> bool {
        matches!(self, RecordStatus::Ready | RecordStatus::Error)
    }

    /// True when a regeneration job has to be launched for this status.
    pub fn needs_regeneration(&self) -> bool {
        !matches!(self, RecordStatus::Ready)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RecordStatus::Queued),
            "processing" => Ok(RecordStatus::Processing),
            "refreshing" => Ok(RecordStatus::Refreshing),
            "ready" => Ok(RecordStatus::Ready),
            "error" => Ok(RecordStatus::Error),
            other => Err(StoreError::QueryFailed {
                reason: format!("unknown record status '{}'", other),
            }),
        }
    }
}

/// Content generator selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::OpenAi, Provider::Anthropic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            other => Err(ConfigError::ProviderNotSupported {
                provider: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            RecordStatus::Queued,
            RecordStatus::Processing,
            RecordStatus::Refreshing,
            RecordStatus::Ready,
            RecordStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<RecordStatus>(), Ok(status));
        }
        assert!("done".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&RecordStatus::Refreshing)?, "\"refreshing\"");
        Ok(())
    }

    #[test]
    fn test_only_ready_skips_regeneration() {
        assert!(!RecordStatus::Ready.needs_regeneration());
        assert!(RecordStatus::Queued.needs_regeneration());
        assert!(RecordStatus::Error.needs_regeneration());
        assert!(RecordStatus::Error.is_settled());
        assert!(!RecordStatus::Processing.is_settled());
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!("OpenAI".parse::<Provider>(), Ok(Provider::OpenAi));
        assert_eq!(" anthropic ".parse::<Provider>(), Ok(Provider::Anthropic));
        assert_eq!(
            "gemini".parse::<Provider>(),
            Err(ConfigError::ProviderNotSupported {
                provider: "gemini".to_string()
            })
        );
    }

    #[test]
    fn test_provider_serde_names() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Provider::OpenAi)?, "\"openai\"");
        let parsed: Provider = serde_json::from_str("\"anthropic\"")?;
        assert_eq!(parsed, Provider::Anthropic);
        Ok(())
    }
}
