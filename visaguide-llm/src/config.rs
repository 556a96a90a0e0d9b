//! Generator configuration loaded from the environment.

use std::time::Duration;

use visaguide_core::{ConfigError, Provider};

/// Default OpenAI model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Default Anthropic model.
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Settings for the hosted content generators.
///
/// A provider is only registered when its API key is set.
#[derive(Clone)]
pub struct GeneratorConfig {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub anthropic_base_url: Option<String>,
    /// Client-side request budget per provider.
    pub requests_per_minute: u32,
    /// Per-request timeout, applied to the whole HTTP exchange.
    pub request_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            openai_base_url: None,
            anthropic_api_key: None,
            anthropic_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            anthropic_base_url: None,
            requests_per_minute: 60,
            request_timeout: Duration::from_secs(60),
            max_tokens: 2048,
            temperature: 0.2,
        }
    }
}

impl GeneratorConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VISAGUIDE_OPENAI_API_KEY`, `VISAGUIDE_OPENAI_MODEL`, `VISAGUIDE_OPENAI_BASE_URL`
    /// - `VISAGUIDE_ANTHROPIC_API_KEY`, `VISAGUIDE_ANTHROPIC_MODEL`, `VISAGUIDE_ANTHROPIC_BASE_URL`
    /// - `VISAGUIDE_LLM_REQUESTS_PER_MINUTE` (default: 60)
    /// - `VISAGUIDE_LLM_TIMEOUT_SECS` (default: 60)
    /// - `VISAGUIDE_LLM_MAX_TOKENS` (default: 2048)
    /// - `VISAGUIDE_LLM_TEMPERATURE` (default: 0.2)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            openai_api_key: non_empty("VISAGUIDE_OPENAI_API_KEY"),
            openai_model: non_empty("VISAGUIDE_OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: non_empty("VISAGUIDE_OPENAI_BASE_URL"),
            anthropic_api_key: non_empty("VISAGUIDE_ANTHROPIC_API_KEY"),
            anthropic_model: non_empty("VISAGUIDE_ANTHROPIC_MODEL")
                .unwrap_or(defaults.anthropic_model),
            anthropic_base_url: non_empty("VISAGUIDE_ANTHROPIC_BASE_URL"),
            requests_per_minute: non_empty("VISAGUIDE_LLM_REQUESTS_PER_MINUTE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.requests_per_minute),
            request_timeout: non_empty("VISAGUIDE_LLM_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_tokens: non_empty("VISAGUIDE_LLM_MAX_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_tokens),
            temperature: non_empty("VISAGUIDE_LLM_TEMPERATURE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.temperature),
        }
    }

    /// Providers that have credentials.
    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.api_key(*p).is_some())
            .collect()
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAi => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "temperature".to_string(),
                value: self.temperature.to_string(),
                reason: "must be between 0.0 and 2.0".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_tokens".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("GeneratorConfig")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("anthropic_model", &self.anthropic_model)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_no_providers() {
        let config = GeneratorConfig::default();
        assert!(config.configured_providers().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configured_providers_follow_keys() {
        let config = GeneratorConfig {
            anthropic_api_key: Some("sk-ant".to_string()),
            ..Default::default()
        };
        assert_eq!(config.configured_providers(), vec![Provider::Anthropic]);
        assert_eq!(config.api_key(Provider::OpenAi), None);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = GeneratorConfig {
            openai_api_key: Some("sk-secret-value".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("sk-secret-value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_rejects_bad_temperature() {
        let config = GeneratorConfig {
            temperature: 3.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
