//! OpenAI-compatible chat-completions capability.
//!
//! Works against any endpoint exposing `POST {api_base}/chat/completions`
//! (Gemini's OpenAI-compatible API, LiteLLM, OpenRouter, ...).

use super::{StageCapability, prompts};
use crate::errors::CapabilityError;
use crate::sanitize::text_len;
use crate::stage::{Stage, StageOutput};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Connection and sampling settings for [`LlmCapability`].
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: Option<f64>,
    /// Exact reply the Test prompt asks for when nothing needs fixing.
    pub all_clear_sentinel: String,
}

pub struct LlmCapability {
    settings: LlmSettings,
    http_client: Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl LlmCapability {
    pub fn new(settings: LlmSettings) -> Result<Self, CapabilityError> {
        let http_client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| {
                CapabilityError::RequestFailed(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self {
            settings,
            http_client,
        })
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        )
    }
}

/// Map a non-success HTTP response body to a capability error.
fn error_from_response(status: u16, body: &str) -> CapabilityError {
    let message = serde_json::from_str::<ApiErrorResponse>(body)
        .map(|r| r.error.message)
        .unwrap_or_else(|_| body.to_string());
    if status == 429 {
        CapabilityError::RateLimited(message)
    } else {
        CapabilityError::Provider {
            code: status,
            message,
        }
    }
}

/// Pull the first choice's text out of a chat-completions body.
///
/// Surrounding whitespace is trimmed here, at the provider boundary, so the
/// pipeline can compare Test output to the sentinel by exact equality.
fn content_from_response(body: &str) -> Result<String, CapabilityError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CapabilityError::Parse(format!("invalid chat completion body: {e}")))?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CapabilityError::Parse("response has no message content".to_string()))?;
    Ok(content.trim().to_string())
}

#[async_trait]
impl StageCapability for LlmCapability {
    async fn invoke(&self, stage: Stage, input: &str) -> Result<StageOutput, CapabilityError> {
        let prompt = prompts::render(stage, input, &self.settings.all_clear_sentinel);
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.settings.temperature,
        };

        let mut http_request = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json");
        if let Some(ref api_key) = self.settings.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let start = Instant::now();
        tracing::debug!(
            %stage,
            model = %self.settings.model,
            prompt_chars = text_len(&prompt),
            "sending chat completion"
        );

        let response = http_request
            .json(&request)
            .send()
            .await
            .map_err(|e| CapabilityError::RequestFailed(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CapabilityError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_response(status.as_u16(), &body));
        }

        let content = content_from_response(&body)?;
        tracing::debug!(
            %stage,
            elapsed_ms = start.elapsed().as_millis() as u64,
            output_chars = text_len(&content),
            "chat completion received"
        );
        Ok(StageOutput::Text(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(api_base: &str) -> LlmSettings {
        LlmSettings {
            api_base: api_base.to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            timeout: Duration::from_secs(5),
            temperature: None,
            all_clear_sentinel: "OK".to_string(),
        }
    }

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let cap = LlmCapability::new(settings("http://localhost:4000/v1/")).unwrap();
        assert_eq!(cap.endpoint(), "http://localhost:4000/v1/chat/completions");
    }

    #[test]
    fn test_content_is_trimmed() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  OK\n"}}]}"#;
        assert_eq!(content_from_response(body).unwrap(), "OK");
    }

    #[test]
    fn test_multibyte_content_is_counted_in_chars() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"café ✓"}}]}"#;
        let content = content_from_response(body).unwrap();
        assert_eq!(content, "café ✓");
        assert_eq!(text_len(&content), 6);
        assert!(content.len() > text_len(&content));
    }

    #[test]
    fn test_missing_choices_is_parse_error() {
        let err = content_from_response(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, CapabilityError::Parse(_)));
    }

    #[test]
    fn test_null_content_is_parse_error() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(
            content_from_response(body).unwrap_err(),
            CapabilityError::Parse(_)
        ));
    }

    #[test]
    fn test_rate_limit_maps_to_rate_limited() {
        let err = error_from_response(429, r#"{"error":{"message":"quota"}}"#);
        assert!(matches!(err, CapabilityError::RateLimited(m) if m == "quota"));
    }

    #[test]
    fn test_unstructured_error_body_is_kept() {
        let err = error_from_response(502, "bad gateway");
        match err {
            CapabilityError::Provider { code, message } => {
                assert_eq!(code, 502);
                assert_eq!(message, "bad gateway");
            }
            other => panic!("Expected Provider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_failed() {
        // Port 9 (discard) on localhost is not an HTTP server.
        let cap = LlmCapability::new(settings("http://127.0.0.1:9")).unwrap();
        let err = cap.invoke(Stage::Plan, "task").await.unwrap_err();
        assert!(matches!(err, CapabilityError::RequestFailed(_)));
    }
}
