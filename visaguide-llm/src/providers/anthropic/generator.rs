//! Anthropic content generator

use async_trait::async_trait;
use visaguide_core::{GeneratedContent, GuideResult, Provider, RequestProfile};

use super::client::AnthropicClient;
use super::types::{ContentBlock, Message, MessageRequest, MessageResponse};
use crate::providers::{invalid_response, parse_content, user_prompt, SYSTEM_PROMPT};
use crate::ContentGenerator;

/// Content generator backed by the Anthropic messages API.
pub struct AnthropicGenerator {
    client: AnthropicClient,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicGenerator {
    pub fn new(client: AnthropicClient, model: impl Into<String>) -> Self {
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

    fn build_request(&self, profile: &RequestProfile) -> MessageRequest {
        MessageRequest {
            model: self.model.clone(),
            system: Some(SYSTEM_PROMPT.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user_prompt(profile),
            }],
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        }
    }

    fn extract_text(content: Vec<ContentBlock>) -> String {
        content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl ContentGenerator for AnthropicGenerator {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(&self, profile: &RequestProfile) -> GuideResult<GeneratedContent> {
        let request = self.build_request(profile);
        let response: MessageResponse = self.client.request("messages", &request).await?;

        let text = Self::extract_text(response.content);
        if text.trim().is_empty() {
            return Err(invalid_response(Provider::Anthropic, "response has no text blocks"));
        }
        parse_content(Provider::Anthropic, &text)
    }
}

impl std::fmt::Debug for AnthropicGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicGenerator")
            .field("model", &self.model)
            .finish()
    }
}
