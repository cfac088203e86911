//! Ordered fallback across candidate models
//!
//! Candidates are tried one at a time, in order, with a single bounded call
//! each. The first non-blank answer wins and later candidates are never
//! called. Failures are collected so an exhausted run can say what went wrong.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm_client::LLMError;
use crate::response_text::extract_text;

/// Built-in candidate order, used when no fallback list is configured
pub const DEFAULT_CANDIDATE_MODELS: &[&str] =
    &["gemini-pro", "gemini-1.5-flash-latest", "gemini-1.5-flash"];

pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS);

/// A generative model provider the invoker can call
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &str;

    /// Whether credentials for the provider are configured
    fn has_credentials(&self) -> bool;

    /// One completion call returning the provider's raw response body
    async fn generate(&self, model: &str, prompt: &str) -> Result<Value, LLMError>;
}

/// Why one candidate did not produce an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFailure {
    pub candidate: String,
    pub error_kind: String,
    pub message: String,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.candidate, self.error_kind, self.message)
    }
}

/// Successful invocation: the answer plus the candidates that failed before it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub text: String,
    pub attempts: Vec<CandidateFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Missing credentials for {0}: set GEMINI_API_KEY")]
    MissingCredentials(String),

    #[error("All model candidates failed: {}", summarize(.attempts))]
    AllCandidatesExhausted { attempts: Vec<CandidateFailure> },
}

impl InvokeError {
    /// Per-candidate failure lines, if any
    pub fn attempt_summaries(&self) -> Option<Vec<String>> {
        match self {
            InvokeError::AllCandidatesExhausted { attempts } => {
                Some(attempts.iter().map(ToString::to_string).collect())
            }
            InvokeError::MissingCredentials(_) => None,
        }
    }
}

fn summarize(attempts: &[CandidateFailure]) -> String {
    if attempts.is_empty() {
        return "no candidates configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Invoker behaviour, resolved from configuration by the caller
#[derive(Debug, Clone)]
pub struct InvokerOptions {
    /// Tried ahead of `fallback_models`
    pub model_override: Option<String>,
    pub fallback_models: Vec<String>,
    /// Serve the canned diagnosis without touching the backend
    pub offline: bool,
    pub call_timeout: Duration,
}

impl Default for InvokerOptions {
    fn default() -> Self {
        Self {
            model_override: None,
            fallback_models: DEFAULT_CANDIDATE_MODELS.iter().map(|m| m.to_string()).collect(),
            offline: false,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

pub struct ModelInvoker {
    backend: Arc<dyn ModelBackend>,
    options: InvokerOptions,
}

impl ModelInvoker {
    pub fn new(backend: Arc<dyn ModelBackend>, options: InvokerOptions) -> Self {
        Self { backend, options }
    }

    pub fn is_offline(&self) -> bool {
        self.options.offline
    }

    pub fn has_credentials(&self) -> bool {
        self.backend.has_credentials()
    }

    /// Candidate models in trial order: override first, then the fallback
    /// list without repeating the override.
    pub fn candidates(&self) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::with_capacity(self.options.fallback_models.len() + 1);

        if let Some(model) = self.options.model_override.as_ref() {
            candidates.push(model.clone());
        }
        for model in &self.options.fallback_models {
            if !candidates.contains(model) {
                candidates.push(model.clone());
            }
        }

        candidates
    }

    /// Generate text for `prompt` using the configured candidates
    pub async fn invoke(&self, prompt: &str) -> Result<Invocation, InvokeError> {
        let candidates = self.candidates();
        self.invoke_candidates(prompt, &candidates).await
    }

    /// Generate text for `prompt`, trying `candidates` strictly in order
    pub async fn invoke_candidates(
        &self,
        prompt: &str,
        candidates: &[String],
    ) -> Result<Invocation, InvokeError> {
        if self.options.offline {
            tracing::info!("Offline mode enabled, returning canned diagnosis");
            return Ok(Invocation {
                text: canned_diagnosis(),
                attempts: Vec::new(),
            });
        }

        if !self.backend.has_credentials() {
            tracing::error!("No credentials configured for {}", self.backend.name());
            return Err(InvokeError::MissingCredentials(self.backend.name().to_string()));
        }

        let mut attempts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            tracing::info!("Attempting model: {}", candidate);

            match self.attempt(candidate, prompt).await {
                Ok(text) => {
                    if !attempts.is_empty() {
                        tracing::info!(
                            "Model {} answered after {} failed candidate(s)",
                            candidate,
                            attempts.len()
                        );
                    }
                    return Ok(Invocation { text, attempts });
                }
                Err(failure) => {
                    tracing::warn!("Candidate failed: {}", failure);
                    attempts.push(failure);
                }
            }
        }

        let error = InvokeError::AllCandidatesExhausted { attempts };
        tracing::error!("{}", error);
        Err(error)
    }

    // One bounded call against a single candidate
    async fn attempt(&self, candidate: &str, prompt: &str) -> Result<String, CandidateFailure> {
        let failure = |error_kind: &str, message: String| CandidateFailure {
            candidate: candidate.to_string(),
            error_kind: error_kind.to_string(),
            message,
        };

        let call = self.backend.generate(candidate, prompt);
        let response = match tokio::time::timeout(self.options.call_timeout, call).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(failure(err.error_kind(), err.to_string())),
            Err(_) => {
                return Err(failure(
                    "timeout",
                    format!("no response within {:?}", self.options.call_timeout),
                ))
            }
        };

        let text = extract_text(&response);
        if text.trim().is_empty() {
            return Err(failure("empty_response", "model returned no text".to_string()));
        }

        Ok(text)
    }
}

/// Fixed diagnosis served in offline mode
pub fn canned_diagnosis() -> String {
    json!({
        "summary": "Excessive shaft vibration and rising motor temperature",
        "probable_causes": [
            {"cause": "rotor imbalance", "likelihood": 70},
            {"cause": "worn bearing", "likelihood": 60}
        ],
        "severity": "high",
        "recommended_actions": [
            "Stop the machine and inspect the bearings",
            "Check shaft alignment",
            "Replace damaged parts"
        ],
        "troubleshooting_steps": [
            "Measure vibration with a vibration meter",
            "Visually inspect the rotor",
            "Check motor current and voltage"
        ],
        "estimated_parts": ["Bearing - P/N 1234", "Gasket - P/N 5678"],
        "estimated_time_hours": 3.5,
        "confidence": 0.85,
        "required_tools": ["Torque wrench", "Vibration meter", "Infrared thermometer"],
        "recommended_tests": ["Vibration test (ISO 10816)", "Temperature measurement at 3 points"],
        "logs_needed": ["Last 24h of motor current", "Maintenance logs for the last 6 months"],
        "component": "motor",
        "category": "mechanical",
        "maintenance_priority": 2
    })
    .to_string()
}
