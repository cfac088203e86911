//! Service settings resolved from the environment

use std::net::SocketAddr;
use std::time::Duration;

use crate::invoker::{InvokerOptions, DEFAULT_CALL_TIMEOUT, DEFAULT_CALL_TIMEOUT_SECS, DEFAULT_CANDIDATE_MODELS};
use crate::llm_client::DEFAULT_GEMINI_API_URL;

pub const SERVICE_NAME: &str = "DIAGNOSIS";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct DiagnosisSettings {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model_override: Option<String>,
    pub fallback_models: Vec<String>,
    pub offline: bool,
    pub call_timeout: Duration,
    pub bind_addr: SocketAddr,
}

impl DiagnosisSettings {
    /// Reads `GEMINI_*` variables plus the `DIAGNOSIS_SERVICE_ADDR`/`PORT` bind overrides
    pub fn from_env() -> Self {
        let timeout_secs = config_rs::env_or("GEMINI_TIMEOUT_SECS", DEFAULT_CALL_TIMEOUT_SECS).max(1);

        Self {
            api_key: config_rs::env_string("GEMINI_API_KEY"),
            api_url: config_rs::env_string("GEMINI_API_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_API_URL.to_string()),
            model_override: config_rs::env_string("GEMINI_MODEL"),
            fallback_models: config_rs::env_list("GEMINI_FALLBACK_MODELS").unwrap_or_else(default_models),
            offline: config_rs::env_flag("GEMINI_TEST_MODE"),
            call_timeout: Duration::from_secs(timeout_secs),
            bind_addr: config_rs::get_bind_address(SERVICE_NAME, DEFAULT_PORT),
        }
    }

    pub fn invoker_options(&self) -> InvokerOptions {
        InvokerOptions {
            model_override: self.model_override.clone(),
            fallback_models: self.fallback_models.clone(),
            offline: self.offline,
            call_timeout: self.call_timeout,
        }
    }
}

impl Default for DiagnosisSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_GEMINI_API_URL.to_string(),
            model_override: None,
            fallback_models: default_models(),
            offline: false,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        }
    }
}

fn default_models() -> Vec<String> {
    DEFAULT_CANDIDATE_MODELS.iter().map(|m| m.to_string()).collect()
}
