//! OpenAI content generator

use async_trait::async_trait;
use visaguide_core::{GeneratedContent, GuideResult, Provider, RequestProfile};

use super::client::OpenAIClient;
use super::types::{CompletionRequest, CompletionResponse, Message, ResponseFormat};
use crate::providers::{invalid_response, parse_content, user_prompt, SYSTEM_PROMPT};
use crate::ContentGenerator;

/// Content generator backed by the OpenAI chat completions API.
pub struct OpenAIGenerator {
    client: OpenAIClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIGenerator {
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens: 2048,
            temperature: 0.2,
        }
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    fn build_request(&self, profile: &RequestProfile) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt(profile),
                },
            ],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            response_format: Some(ResponseFormat::json_object()),
        }
    }
}

#[async_trait]
impl ContentGenerator for OpenAIGenerator {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(&self, profile: &RequestProfile) -> GuideResult<GeneratedContent> {
        let request = self.build_request(profile);
        let response: CompletionResponse = self.client.request("chat/completions", &request).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| invalid_response(Provider::OpenAi, "response has no choices"))?;

        parse_content(Provider::OpenAi, &text)
    }
}

impl std::fmt::Debug for OpenAIGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIGenerator")
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use visaguide_core::RequestKey;

    #[test]
    fn test_request_asks_for_json_object() -> Result<(), Box<dyn std::error::Error>> {
        let client = OpenAIClient::new("k", 60, Duration::from_secs(5))?;
        let generator = OpenAIGenerator::new(client, "gpt-4o-mini").with_sampling(512, 0.0);
        let profile = RequestProfile::new(
            RequestKey::new("US", "US", "JP", "Tourism", "eVisa"),
            Provider::OpenAi,
        );

        let request = generator.build_request(&profile);
        let json = serde_json::to_value(&request)?;

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json["messages"][1]["content"]
            .as_str()
            .is_some_and(|c| c.contains("JP")));
        Ok(())
    }
}
