//! Content generator implementations backed by hosted LLM APIs.
//!
//! Both adapters share the prompt, the request throttle and the response
//! parsing in this module; only the wire format differs.

pub mod anthropic;
pub mod openai;
pub mod throttle;

pub use anthropic::{AnthropicClient, AnthropicGenerator};
pub use openai::{OpenAIClient, OpenAIGenerator};
pub use throttle::RequestThrottle;

use visaguide_core::{GeneratedContent, GenerationError, GuideError, GuideResult, Provider, RequestProfile};

// ============================================================================
// ERROR HELPERS
// ============================================================================

pub(crate) fn request_failed(provider: Provider, status: u16, message: impl Into<String>) -> GuideError {
    GuideError::Generation(GenerationError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    })
}

pub(crate) fn rate_limited(provider: Provider) -> GuideError {
    GuideError::Generation(GenerationError::RateLimited {
        provider: provider.to_string(),
    })
}

pub(crate) fn timed_out(provider: Provider, timeout_ms: u64) -> GuideError {
    GuideError::Generation(GenerationError::Timeout {
        provider: provider.to_string(),
        timeout_ms,
    })
}

pub(crate) fn invalid_response(provider: Provider, reason: impl Into<String>) -> GuideError {
    GuideError::Generation(GenerationError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    })
}

/// Map a transport error, distinguishing timeouts from everything else.
pub(crate) fn transport_error(provider: Provider, timeout_ms: u64, err: reqwest::Error) -> GuideError {
    if err.is_timeout() {
        timed_out(provider, timeout_ms)
    } else {
        request_failed(provider, 0, format!("HTTP request failed: {}", err))
    }
}

// ============================================================================
// PROMPT
// ============================================================================

pub(crate) const SYSTEM_PROMPT: &str = "You are a visa requirements assistant. \
    Answer with a single JSON object and nothing else. \
    The object must have exactly these string keys: visa_description, eligibility, \
    required_documents, application_process, processing_time, fees, validity, \
    stay_duration, restrictions, additional_notes. \
    visa_description, eligibility, required_documents, application_process and \
    processing_time must never be empty. Use null for any other key you cannot answer.";

/// User message describing one request key.
pub(crate) fn user_prompt(profile: &RequestProfile) -> String {
    let key = &profile.key;
    format!(
        "Describe the {} visa of type \"{}\" for travel to {}, \
         for a citizen of {} who currently resides in {}.",
        key.visa_category, key.visa_type, key.destination, key.nationality, key.resident_country
    )
}

// ============================================================================
// RESPONSE PARSING
// ============================================================================

/// Pull the JSON object out of model output.
///
/// Accepts a bare object, an object inside a Markdown code fence, or an
/// object surrounded by prose.
pub fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => {
            let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
            body.rsplit_once("```").map_or(body, |(body, _)| body)
        }
        None => trimmed,
    };

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| &unfenced[start..=end])
}

/// Parse and validate generator output.
pub fn parse_content(provider: Provider, raw: &str) -> GuideResult<GeneratedContent> {
    let json = extract_json(raw)
        .ok_or_else(|| invalid_response(provider, "no JSON object in model output"))?;
    let content: GeneratedContent = serde_json::from_str(json)
        .map_err(|e| invalid_response(provider, format!("malformed JSON: {}", e)))?;
    content.validate(provider)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use visaguide_core::RequestKey;

    const COMPLETE: &str = r#"{
        "visa_description": "Tourist eVisa",
        "eligibility": "US citizens",
        "required_documents": "Passport",
        "application_process": "Apply online",
        "processing_time": "5 days",
        "fees": null
    }"#;

    #[test]
    fn test_extract_bare_object() {
        assert_eq!(extract_json(" {\"a\": 1} "), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_fenced_object() {
        let raw = "```json\n{\"a\": {\"b\": 2}}\n```";
        assert_eq!(extract_json(raw), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn test_extract_object_inside_prose() {
        let raw = "Here you go: {\"a\": 1} Hope that helps.";
        assert_eq!(extract_json(raw), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_extract_rejects_text_without_object() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} {"), None);
    }

    #[test]
    fn test_parse_content_accepts_complete_record() -> GuideResult<()> {
        let content = parse_content(Provider::OpenAi, COMPLETE)?;
        assert!(content.is_complete());
        assert!(content.fees.is_none());
        Ok(())
    }

    #[test]
    fn test_parse_content_rejects_incomplete_record() {
        let raw = r#"{"visa_description": "Tourist eVisa"}"#;
        let err = parse_content(Provider::Anthropic, raw);
        assert!(matches!(
            err,
            Err(GuideError::Generation(GenerationError::IncompleteRecord { .. }))
        ));
    }

    #[test]
    fn test_parse_content_rejects_malformed_json() {
        let err = parse_content(Provider::OpenAi, "{\"visa_description\": }");
        assert!(matches!(
            err,
            Err(GuideError::Generation(GenerationError::InvalidResponse { .. }))
        ));
    }

    #[test]
    fn test_user_prompt_names_every_key_field() {
        let profile = RequestProfile::new(
            RequestKey::new("CA", "IN", "JP", "Tourism", "eVisa"),
            Provider::OpenAi,
        );
        let prompt = user_prompt(&profile);
        for value in ["CA", "IN", "JP", "Tourism", "eVisa"] {
            assert!(prompt.contains(value), "prompt misses {}", value);
        }
    }
}
