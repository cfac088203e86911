//! HTTP tests for the diagnosis router.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; the
//! model is either a fixed in-memory backend or a wiremock Gemini endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use diagnosis_service::{
    DiagnosisService, DiagnosisSettings, InvokerOptions, LLMError, ModelBackend, ModelInvoker,
};

const MODEL_JSON: &str = r#"{"summary":"vibration","severity":"high","confidence":0.8}"#;

/// Backend that answers every call with the same text, or fails every call
struct FixedBackend {
    answer: Option<&'static str>,
}

#[async_trait]
impl ModelBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    fn has_credentials(&self) -> bool {
        true
    }

    async fn generate(&self, model: &str, _prompt: &str) -> Result<Value, LLMError> {
        match self.answer {
            Some(text) => Ok(json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})),
            None => Err(LLMError::ModelNotAvailable(format!("{} is retired", model))),
        }
    }
}

fn router_with(backend: FixedBackend, options: InvokerOptions) -> Router {
    let invoker = ModelInvoker::new(Arc::new(backend), options);
    Arc::new(DiagnosisService::new(invoker)).create_router()
}

fn router_answering(answer: Option<&'static str>) -> Router {
    router_with(FixedBackend { answer }, InvokerOptions::default())
}

fn diagnose_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/diagnose")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn diagnose_returns_parsed_model_json() {
    let app = router_answering(Some(MODEL_JSON));

    let (status, body) = send(app, diagnose_request(json!({"symptoms": "motor vibrating"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "diagnosis": {"summary": "vibration", "severity": "high", "confidence": 0.8},
            "raw_output": MODEL_JSON
        })
    );
}

#[tokio::test]
async fn diagnose_degrades_when_model_answers_prose() {
    let app = router_answering(Some("I cannot comply."));

    let (status, body) = send(app, diagnose_request(json!({"symptoms": "motor vibrating"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["diagnosis"]["error"].is_string());
    assert_eq!(body["diagnosis"]["raw"], "I cannot comply.");
    assert_eq!(body["raw_output"], "I cannot comply.");
}

#[tokio::test]
async fn diagnose_fails_when_all_candidates_fail() {
    let app = router_answering(None);

    let (status, body) = send(app, diagnose_request(json!({"symptoms": "motor vibrating"}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("gemini-pro is retired"), "unexpected error: {}", error);
    assert_eq!(body["details"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn diagnose_reports_missing_credentials() {
    let settings = DiagnosisSettings {
        api_url: "http://127.0.0.1:9".to_string(),
        ..DiagnosisSettings::default()
    };
    let app = Arc::new(DiagnosisService::from_settings(&settings)).create_router();

    let (status, body) = send(app, diagnose_request(json!({"symptoms": "noise"}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("GEMINI_API_KEY"));
    assert!(body.get("details").is_none());
}

#[tokio::test]
async fn diagnose_in_offline_mode_needs_no_credentials() {
    let settings = DiagnosisSettings {
        offline: true,
        ..DiagnosisSettings::default()
    };
    let app = Arc::new(DiagnosisService::from_settings(&settings)).create_router();

    let (status, body) = send(app, diagnose_request(json!({"symptoms": "noise"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["diagnosis"]["severity"], "high");
    assert!(body["raw_output"].as_str().unwrap().contains("\"summary\""));
}

#[tokio::test]
async fn diagnose_falls_back_across_gemini_models() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-pro:generateContent"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model retired"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash-latest:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": MODEL_JSON}]}}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let settings = DiagnosisSettings {
        api_key: Some("test-key".to_string()),
        api_url: mock_server.uri(),
        call_timeout: Duration::from_secs(5),
        ..DiagnosisSettings::default()
    };
    let app = Arc::new(DiagnosisService::from_settings(&settings)).create_router();

    let (status, body) = send(
        app,
        diagnose_request(json!({
            "symptoms": "motor vibrating",
            "equipment_name": "Conveyor M-12",
            "metadata": {"rpm": 1750}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["diagnosis"]["summary"], "vibration");
}

#[tokio::test]
async fn diagnose_skips_gemini_candidates_without_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/blocked:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"finishReason": "SAFETY", "index": 0}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/truncated:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": ""}]},
                "finishReason": "MAX_TOKENS"
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/good:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": MODEL_JSON}]}}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let settings = DiagnosisSettings {
        api_key: Some("test-key".to_string()),
        api_url: mock_server.uri(),
        fallback_models: vec!["blocked".to_string(), "truncated".to_string(), "good".to_string()],
        ..DiagnosisSettings::default()
    };
    let app = Arc::new(DiagnosisService::from_settings(&settings)).create_router();

    let (status, body) = send(app, diagnose_request(json!({"symptoms": "motor vibrating"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["diagnosis"]["summary"], "vibration");
    assert_eq!(body["raw_output"], MODEL_JSON);
}

#[tokio::test]
async fn diagnose_rejects_missing_symptoms() {
    let app = router_answering(Some(MODEL_JSON));

    let (status, body) = send(app, diagnose_request(json!({"equipment_name": "pump"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn diagnose_rejects_malformed_body_and_content_type() {
    let app = router_answering(Some(MODEL_JSON));
    let malformed = Request::builder()
        .method("POST")
        .uri("/diagnose")
        .header("content-type", "application/json")
        .body(Body::from("{\"symptoms\": "))
        .unwrap();
    let (status, _) = send(app.clone(), malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let plain_text = Request::builder()
        .method("POST")
        .uri("/diagnose")
        .header("content-type", "text/plain")
        .body(Body::from("motor vibrating"))
        .unwrap();
    let (status, body) = send(app, plain_text).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["code"], 415);
}

#[tokio::test]
async fn root_reports_ok() {
    let app = router_answering(Some(MODEL_JSON));
    let request = Request::builder().uri("/").body(Body::empty()).unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn health_reports_model_provider() {
    let app = router_answering(Some(MODEL_JSON));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["status"], "SERVING");
    assert_eq!(body["service_name"], "diagnosis-service");
    assert_eq!(body["dependencies"]["model_provider"], "CONFIGURED");

    let unconfigured = Arc::new(DiagnosisService::from_settings(&DiagnosisSettings::default())).create_router();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (_, body) = send(unconfigured, request).await;
    assert_eq!(body["status"], "DEGRADED");
    assert_eq!(body["dependencies"]["model_provider"], "NOT_CONFIGURED");
}
