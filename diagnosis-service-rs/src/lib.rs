use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

pub mod config;
pub mod diagnosis;
pub mod invoker;
pub mod llm_client;
pub mod models;
pub mod prompt;
pub mod response_text;
pub mod validation;

pub use config::DiagnosisSettings;
pub use diagnosis::{degraded_payload, extract_json, DiagnosisError};
pub use invoker::{CandidateFailure, InvokeError, Invocation, InvokerOptions, ModelBackend, ModelInvoker};
pub use llm_client::{GeminiClient, LLMError};
pub use models::{DiagnosisRequest, DiagnosisResponse, ErrorResponse, HealthResponse};
pub use prompt::build_prompt;
pub use response_text::extract_text;

use validation::{parse_json_body, payload_limit_config, validate_content_type, validate_diagnose_request};

pub const SERVICE_NAME: &str = "diagnosis-service";

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Diagnosis pipeline and HTTP surface
pub struct DiagnosisService {
    invoker: ModelInvoker,
}

impl DiagnosisService {
    pub fn new(invoker: ModelInvoker) -> Self {
        Lazy::force(&START_TIME);
        Self { invoker }
    }

    /// Wire a Gemini-backed invoker from resolved settings
    pub fn from_settings(settings: &DiagnosisSettings) -> Self {
        let client = GeminiClient::new(
            settings.api_key.clone(),
            settings.api_url.clone(),
            settings.call_timeout,
        );
        Self::new(ModelInvoker::new(Arc::new(client), settings.invoker_options()))
    }

    /// Run one request through prompt, model and extraction.
    ///
    /// Invocation failures are returned; unparsable model text is not, it
    /// degrades to an `{error, raw}` diagnosis.
    pub async fn diagnose(&self, request: &DiagnosisRequest) -> Result<DiagnosisResponse, InvokeError> {
        let prompt = build_prompt(request);
        let raw_output = self.invoker.invoke(&prompt).await?.text;

        let diagnosis = match extract_json(&raw_output) {
            Ok(diagnosis) => diagnosis,
            Err(err) => {
                tracing::warn!("{}; returning degraded diagnosis", err);
                degraded_payload(&raw_output)
            }
        };

        Ok(DiagnosisResponse { diagnosis, raw_output })
    }

    /// Create the Axum router with all routes and middleware
    pub fn create_router(self: Arc<Self>) -> Router {
        Router::new()
            .route("/", get(Self::root_handler))
            .route("/health", get(Self::health_handler))
            .route("/diagnose", post(Self::diagnose_handler))
            .layer(payload_limit_config())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .with_state(self)
    }

    /// GET / - liveness
    async fn root_handler() -> impl IntoResponse {
        Json(serde_json::json!({ "status": "ok" }))
    }

    /// GET /health - readiness with model provider status
    async fn health_handler(State(state): State<Arc<Self>>) -> impl IntoResponse {
        let uptime = START_TIME.elapsed().as_secs() as i64;

        let provider = if state.invoker.is_offline() {
            "OFFLINE"
        } else if state.invoker.has_credentials() {
            "CONFIGURED"
        } else {
            "NOT_CONFIGURED"
        };
        let ready = provider != "NOT_CONFIGURED";

        let mut dependencies = HashMap::new();
        dependencies.insert("model_provider".to_string(), provider.to_string());

        Json(HealthResponse {
            healthy: ready,
            service_name: SERVICE_NAME.to_string(),
            uptime_seconds: uptime,
            status: if ready { "SERVING" } else { "DEGRADED" }.to_string(),
            dependencies,
        })
    }

    /// POST /diagnose
    async fn diagnose_handler(
        State(state): State<Arc<Self>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> impl IntoResponse {
        let request = match validate_content_type(&headers, "application/json")
            .and_then(|_| parse_json_body(&body))
            .and_then(validate_diagnose_request)
        {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("Rejected diagnose request: {}", err);
                return err.to_response().into_response();
            }
        };

        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("diagnose", %request_id);

        async move {
            tracing::info!(
                "Diagnose request: equipment={:?}, machine_id={:?}",
                request.equipment_name,
                request.machine_id
            );

            match state.diagnose(&request).await {
                Ok(response) => (StatusCode::OK, Json(response)).into_response(),
                Err(err) => {
                    tracing::error!("Diagnosis failed: {}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(ErrorResponse {
                            error: err.to_string(),
                            code: 500,
                            details: err.attempt_summaries(),
                        }),
                    )
                        .into_response()
                }
            }
        }
        .instrument(span)
        .await
    }
}
