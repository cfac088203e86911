// diagnosis-service-rs/src/llm_client.rs
//
// HTTP client for the Gemini generateContent API
//
// This module provides:
// - Real HTTP calls to the Gemini REST API via reqwest
// - Classification of upstream failures into LLMError variants
// - Raw JSON responses, left for response_text to interpret
//
// One call per request: fallback across models is the invoker's job,
// so there is no retry loop here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::invoker::ModelBackend;

pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

/// Error type for upstream model calls
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String), // 400, 401, 403
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String), // 429
    #[error("Model not available: {0}")]
    ModelNotAvailable(String), // 404, unknown or retired model name
    #[error("Server error: {0}")]
    ServerError(String), // 5xx
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Empty response: {0}")]
    EmptyResponse(String), // candidate blocked or cut off before any text
    #[error("Unknown error: {0}")]
    UnknownError(String),
}

impl LLMError {
    /// Short tag recorded against a failed candidate
    pub fn error_kind(&self) -> &'static str {
        match self {
            LLMError::InvalidRequest(_) => "invalid_request",
            LLMError::RateLimitExceeded(_) => "rate_limited",
            LLMError::ModelNotAvailable(_) => "model_not_available",
            LLMError::ServerError(_) => "server_error",
            LLMError::NetworkError(_) => "network_error",
            LLMError::Timeout(_) => "timeout",
            LLMError::ParseError(_) => "parse_error",
            LLMError::EmptyResponse(_) => "empty_response",
            LLMError::UnknownError(_) => "unknown",
        }
    }
}

/// Gemini REST client
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    api_url: String,
}

impl GeminiClient {
    /// Creates a client for `api_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    ///
    /// A missing key is accepted here and reported by the invoker at call time.
    pub fn new(api_key: Option<String>, api_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        let api_url = api_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.filter(|k| !k.trim().is_empty());

        tracing::info!(
            "Gemini client initialized (endpoint: {}, credentials: {})",
            api_url,
            if api_key.is_some() { "present" } else { "missing" }
        );

        Self {
            client,
            api_key,
            api_url,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_url, model)
    }

    // Execute a single generateContent call
    async fn execute_request(&self, model: &str, prompt: &str) -> Result<Value, LLMError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LLMError::InvalidRequest("API key is not set".to_string()))?;

        let request_body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LLMError::Timeout(format!("Request timed out: {}", err))
                } else if err.is_connect() {
                    LLMError::NetworkError(format!("Connection failed: {}", err))
                } else {
                    LLMError::NetworkError(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();

            return Err(match status.as_u16() {
                400 => LLMError::InvalidRequest(format!("Bad request: {}", text)),
                401 => LLMError::InvalidRequest(format!("Unauthorized: {}", text)),
                403 => LLMError::InvalidRequest(format!("Forbidden: {}", text)),
                404 => LLMError::ModelNotAvailable(format!("{} not found: {}", model, text)),
                429 => LLMError::RateLimitExceeded(text),
                500..=599 => LLMError::ServerError(format!("Server error ({}): {}", status, text)),
                _ => LLMError::UnknownError(format!("Unexpected status ({}): {}", status, text)),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|err| LLMError::ParseError(format!("Failed to parse response: {}", err)))?;

        let has_candidates = body
            .get("candidates")
            .and_then(Value::as_array)
            .map(|c| !c.is_empty())
            .unwrap_or(false);

        if !has_candidates {
            // Blocked prompts come back as 200 with only promptFeedback
            let feedback = body
                .get("promptFeedback")
                .map(Value::to_string)
                .unwrap_or_else(|| "none".to_string());
            return Err(LLMError::ParseError(format!(
                "No candidates returned in response (promptFeedback: {})",
                feedback
            )));
        }

        // Safety blocks and MAX_TOKENS cut-offs come back as a candidate without text
        let first = &body["candidates"][0];
        if !candidate_has_text(first) {
            let finish_reason = first
                .get("finishReason")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            return Err(LLMError::EmptyResponse(format!(
                "{} returned a candidate with no text (finishReason: {})",
                model, finish_reason
            )));
        }

        if let Some(tokens) = body
            .get("usageMetadata")
            .and_then(|u| u.get("totalTokenCount"))
            .and_then(Value::as_u64)
        {
            tracing::debug!("Gemini request to {} completed. Used {} tokens", model, tokens);
        }

        Ok(body)
    }
}

fn candidate_has_text(candidate: &Value) -> bool {
    candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts.iter().any(|part| {
                part.get("text")
                    .and_then(Value::as_str)
                    .map_or(false, |text| !text.trim().is_empty())
            })
        })
        .unwrap_or(false)
}

#[async_trait]
impl ModelBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<Value, LLMError> {
        self.execute_request(model, prompt).await
    }
}
