//! OpenAI HTTP client with rate limiting

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use visaguide_core::{GuideResult, Provider};

use super::types::ApiError;
use crate::providers::{invalid_response, rate_limited, request_failed, transport_error, RequestThrottle};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client with rate limiting.
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    throttle: RequestThrottle,
    timeout: Duration,
}

impl OpenAIClient {
    /// Create a new OpenAI client.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `requests_per_minute` - Maximum requests per minute
    /// * `timeout` - Per-request timeout
    pub fn new(
        api_key: impl Into<String>,
        requests_per_minute: u32,
        timeout: Duration,
    ) -> GuideResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| request_failed(Provider::OpenAi, 0, format!("Client build failed: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            throttle: RequestThrottle::new(Provider::OpenAi, requests_per_minute),
            timeout,
        })
    }

    /// Point the client at a compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make an API request with automatic rate limiting.
    pub async fn request<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> GuideResult<Res> {
        let _permit = self.throttle.acquire().await?;
        let timeout_ms = self.timeout.as_millis() as u64;

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(Provider::OpenAi, timeout_ms, e))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                invalid_response(Provider::OpenAi, format!("Failed to parse response: {}", e))
            });
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let error_msg = match serde_json::from_str::<ApiError>(&error_text) {
            Ok(api_error) => api_error.error.message,
            Err(_) => error_text,
        };

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => rate_limited(Provider::OpenAi),
            _ => request_failed(Provider::OpenAi, status.as_u16(), error_msg),
        })
    }
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_api_key() -> GuideResult<()> {
        let client = OpenAIClient::new("sk-live-123", 60, Duration::from_secs(5))?;
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-live-123"));
        assert!(debug.contains("[REDACTED]"));
        Ok(())
    }

    #[test]
    fn test_base_url_override_drops_trailing_slash() -> GuideResult<()> {
        let client = OpenAIClient::new("k", 60, Duration::from_secs(5))?
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
        Ok(())
    }
}
