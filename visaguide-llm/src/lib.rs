//! VisaGuide LLM - Content Generators
//!
//! Defines the [`ContentGenerator`] trait, the [`GeneratorRegistry`] that
//! selects a generator by [`Provider`], and hosted-API implementations for
//! OpenAI and Anthropic.

pub mod config;
pub mod providers;

pub use config::{GeneratorConfig, DEFAULT_ANTHROPIC_MODEL, DEFAULT_OPENAI_MODEL};
pub use providers::{
    extract_json, parse_content, AnthropicClient, AnthropicGenerator, OpenAIClient,
    OpenAIGenerator,
};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use visaguide_core::{
    GeneratedContent, GenerationError, GuideError, GuideResult, Provider, RequestProfile,
};

// ============================================================================
// CONTENT GENERATOR TRAIT
// ============================================================================

/// Produces structured content for one request profile.
///
/// Implementations must be thread-safe and should return content that passes
/// [`GeneratedContent::validate`]; callers validate again regardless.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Provider this generator is registered under.
    fn provider(&self) -> Provider;

    async fn generate(&self, profile: &RequestProfile) -> GuideResult<GeneratedContent>;
}

// ============================================================================
// GENERATOR REGISTRY
// ============================================================================

/// Registry of content generators keyed by provider.
/// Generators must be explicitly registered; there is no auto-discovery.
#[derive(Default, Clone)]
pub struct GeneratorRegistry {
    generators: HashMap<Provider, Arc<dyn ContentGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build hosted generators for every provider with credentials.
    pub fn from_config(config: &GeneratorConfig) -> GuideResult<Self> {
        config.validate()?;
        let mut registry = Self::new();

        if let Some(key) = config.api_key(Provider::OpenAi) {
            let mut client = OpenAIClient::new(key, config.requests_per_minute, config.request_timeout)?;
            if let Some(url) = &config.openai_base_url {
                client = client.with_base_url(url.as_str());
            }
            registry.register(Arc::new(
                OpenAIGenerator::new(client, config.openai_model.as_str())
                    .with_sampling(config.max_tokens, config.temperature),
            ));
        }

        if let Some(key) = config.api_key(Provider::Anthropic) {
            let mut client =
                AnthropicClient::new(key, config.requests_per_minute, config.request_timeout)?;
            if let Some(url) = &config.anthropic_base_url {
                client = client.with_base_url(url.as_str());
            }
            registry.register(Arc::new(
                AnthropicGenerator::new(client, config.anthropic_model.as_str())
                    .with_sampling(config.max_tokens, config.temperature),
            ));
        }

        info!(providers = ?registry.providers(), "Content generators registered");
        Ok(registry)
    }

    /// Register a generator under its own provider.
    /// Replaces any generator previously registered for that provider.
    pub fn register(&mut self, generator: Arc<dyn ContentGenerator>) {
        self.generators.insert(generator.provider(), generator);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.register(generator);
        self
    }

    /// Look up the generator for `provider`.
    ///
    /// # Errors
    /// `GenerationError::ProviderNotConfigured` when nothing is registered.
    pub fn get(&self, provider: Provider) -> GuideResult<Arc<dyn ContentGenerator>> {
        self.generators.get(&provider).cloned().ok_or_else(|| {
            GuideError::Generation(GenerationError::ProviderNotConfigured {
                provider: provider.to_string(),
            })
        })
    }

    pub fn has(&self, provider: Provider) -> bool {
        self.generators.contains_key(&provider)
    }

    /// Registered providers in a stable order.
    pub fn providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.generators.contains_key(p))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use visaguide_core::RequestKey;

    struct Canned(Provider);

    #[async_trait]
    impl ContentGenerator for Canned {
        fn provider(&self) -> Provider {
            self.0
        }

        async fn generate(&self, profile: &RequestProfile) -> GuideResult<GeneratedContent> {
            Ok(GeneratedContent {
                visa_description: Some(format!("{} via {}", profile.key.destination, self.0)),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_empty_registry_reports_provider_not_configured() {
        let registry = GeneratorRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(Provider::Anthropic),
            Err(GuideError::Generation(GenerationError::ProviderNotConfigured { .. }))
        ));
    }

    #[tokio::test]
    async fn test_registry_dispatches_by_provider() -> GuideResult<()> {
        let registry = GeneratorRegistry::new()
            .with(Arc::new(Canned(Provider::OpenAi)))
            .with(Arc::new(Canned(Provider::Anthropic)));
        assert_eq!(registry.providers(), vec![Provider::OpenAi, Provider::Anthropic]);

        let profile = RequestProfile::new(
            RequestKey::new("US", "US", "JP", "Tourism", "eVisa"),
            Provider::Anthropic,
        );
        let content = registry.get(profile.provider)?.generate(&profile).await?;
        assert_eq!(content.visa_description.as_deref(), Some("JP via anthropic"));
        Ok(())
    }

    #[test]
    fn test_register_replaces_existing_provider() {
        let mut registry = GeneratorRegistry::new();
        registry.register(Arc::new(Canned(Provider::OpenAi)));
        registry.register(Arc::new(Canned(Provider::OpenAi)));
        assert_eq!(registry.providers().len(), 1);
    }

    #[test]
    fn test_from_config_registers_only_keyed_providers() -> GuideResult<()> {
        let config = GeneratorConfig {
            openai_api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let registry = GeneratorRegistry::from_config(&config)?;
        assert!(registry.has(Provider::OpenAi));
        assert!(!registry.has(Provider::Anthropic));
        Ok(())
    }
}
