//! API Configuration Module
//!
//! Server, freshness, CORS and maintenance settings, loaded from `VISAGUIDE_*`
//! environment variables with development-friendly defaults.

use secrecy::{ExposeSecret, SecretString};
use visaguide_core::{ConfigError, Provider};
use visaguide_storage::DEFAULT_FRESHNESS_DAYS;

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CORS_MAX_AGE_SECS, DEFAULT_MIRROR_CHANNEL_CAPACITY, DEFAULT_PORT,
};

// ============================================================================
// MAINTENANCE SECRET (TYPE-SAFE)
// ============================================================================

/// Shared secret guarding the maintenance endpoints.
///
/// Wrapped in `secrecy` so it never shows up in logs or debug output.
#[derive(Clone)]
pub struct MaintenanceSecret(SecretString);

impl MaintenanceSecret {
    /// # Errors
    /// Returns `ConfigError::MissingRequired` if the secret is empty.
    pub fn new(secret: String) -> Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "maintenance_secret".to_string(),
            });
        }
        Ok(Self(SecretString::new(secret.into())))
    }

    /// Expose the secret value (only for the constant-time comparison).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl std::fmt::Debug for MaintenanceSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MaintenanceSecret([REDACTED, {} chars])", self.len())
    }
}

// ============================================================================
// BACKEND / FORMAT SELECTION
// ============================================================================

/// Which record store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Process-local store; contents are lost on restart.
    #[default]
    Memory,
    Postgres,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            other => Err(ConfigError::InvalidValue {
                field: "store_backend".to_string(),
                value: other.to_string(),
                reason: "expected 'memory' or 'postgres'".to_string(),
            }),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = std::convert::Infallible;

    /// Anything other than "pretty" selects JSON.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("pretty") {
            Ok(LogFormat::Pretty)
        } else {
            Ok(LogFormat::Json)
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Records newer than this many days are served without regeneration.
    pub freshness_days: u32,

    /// Provider used when a request does not name one.
    pub default_provider: Provider,

    /// `None` disables the maintenance endpoints (503).
    pub maintenance_secret: Option<MaintenanceSecret>,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,
    pub cors_max_age_secs: u64,

    /// Buffered change events per mirror subscriber.
    pub mirror_channel_capacity: usize,

    pub log_format: LogFormat,
    pub store_backend: StoreBackend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            freshness_days: DEFAULT_FRESHNESS_DAYS,
            default_provider: Provider::default(),
            maintenance_secret: None,
            cors_origins: Vec::new(),
            cors_max_age_secs: DEFAULT_CORS_MAX_AGE_SECS,
            mirror_channel_capacity: DEFAULT_MIRROR_CHANNEL_CAPACITY,
            log_format: LogFormat::default(),
            store_backend: StoreBackend::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `VISAGUIDE_HOST` (default: 0.0.0.0), `VISAGUIDE_PORT` (default: 8080)
    /// - `VISAGUIDE_FRESHNESS_DAYS` (default: 30)
    /// - `VISAGUIDE_DEFAULT_PROVIDER`: "openai" or "anthropic" (default: openai)
    /// - `VISAGUIDE_MAINTENANCE_SECRET`: unset disables maintenance endpoints
    /// - `VISAGUIDE_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `VISAGUIDE_CORS_MAX_AGE_SECS` (default: 86400)
    /// - `VISAGUIDE_MIRROR_CHANNEL_CAPACITY` (default: 1000)
    /// - `VISAGUIDE_LOG_FORMAT`: "json" or "pretty" (default: json)
    /// - `VISAGUIDE_STORE`: "memory" or "postgres" (default: memory)
    ///
    /// # Errors
    /// Returns `ConfigError` for an unknown provider, an unknown store
    /// backend, or a non-positive freshness window.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let freshness_days = match var("VISAGUIDE_FRESHNESS_DAYS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| ConfigError::InvalidValue {
                field: "freshness_days".to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.freshness_days,
        };

        let default_provider = match var("VISAGUIDE_DEFAULT_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => defaults.default_provider,
        };

        let store_backend = match var("VISAGUIDE_STORE") {
            Some(raw) => raw.parse()?,
            None => defaults.store_backend,
        };

        let maintenance_secret = var("VISAGUIDE_MAINTENANCE_SECRET")
            .map(MaintenanceSecret::new)
            .transpose()?;

        let cors_origins = var("VISAGUIDE_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            host: var("VISAGUIDE_HOST").unwrap_or(defaults.host),
            port: var("VISAGUIDE_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            freshness_days,
            default_provider,
            maintenance_secret,
            cors_origins,
            cors_max_age_secs: var("VISAGUIDE_CORS_MAX_AGE_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cors_max_age_secs),
            mirror_channel_capacity: var("VISAGUIDE_MIRROR_CHANNEL_CAPACITY")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.mirror_channel_capacity),
            log_format: var("VISAGUIDE_LOG_FORMAT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.log_format),
            store_backend,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.freshness_days < 1 {
            return Err(ConfigError::InvalidValue {
                field: "freshness_days".to_string(),
                value: self.freshness_days.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.mirror_channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mirror_channel_capacity".to_string(),
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in production mode (strict CORS).
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }

    /// Check if a given origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        if self.cors_origins.is_empty() {
            return true;
        }

        self.cors_origins.iter().any(|allowed| {
            if allowed == origin {
                return true;
            }
            // *.visaguide.dev
            match (allowed.strip_prefix("*."), origin.strip_prefix("https://")) {
                (Some(pattern), Some(domain)) => {
                    domain == pattern || domain.ends_with(&format!(".{}", pattern))
                }
                _ => false,
            }
        })
    }

    pub fn with_maintenance_secret(mut self, secret: impl Into<String>) -> Result<Self, ConfigError> {
        self.maintenance_secret = Some(MaintenanceSecret::new(secret.into())?);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.freshness_days, 30);
        assert_eq!(config.default_provider, Provider::OpenAi);
        assert!(config.maintenance_secret.is_none());
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_freshness() {
        let config = ApiConfig {
            freshness_days: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_maintenance_secret_is_redacted() -> Result<(), ConfigError> {
        let secret = MaintenanceSecret::new("hunter2-hunter2".to_string())?;
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("REDACTED"));
        assert_eq!(secret.expose(), "hunter2-hunter2");
        Ok(())
    }

    #[test]
    fn test_empty_maintenance_secret_rejected() {
        assert!(MaintenanceSecret::new("   ".to_string()).is_err());
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("postgres".parse::<StoreBackend>().ok(), Some(StoreBackend::Postgres));
        assert_eq!("Memory".parse::<StoreBackend>().ok(), Some(StoreBackend::Memory));
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("pretty".parse::<LogFormat>().ok(), Some(LogFormat::Pretty));
        assert_eq!("anything".parse::<LogFormat>().ok(), Some(LogFormat::Json));
    }

    #[test]
    fn test_origin_allowed() {
        let mut config = ApiConfig::default();
        assert!(config.is_origin_allowed("http://localhost:3000"));

        config.cors_origins = vec![
            "https://visaguide.dev".to_string(),
            "*.visaguide.dev".to_string(),
        ];
        assert!(config.is_production());
        assert!(config.is_origin_allowed("https://visaguide.dev"));
        assert!(config.is_origin_allowed("https://app.visaguide.dev"));
        assert!(!config.is_origin_allowed("https://notvisaguide.dev"));
        assert!(!config.is_origin_allowed("https://evil.com"));
    }
}
