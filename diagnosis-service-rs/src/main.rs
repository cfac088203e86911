// diagnosis-service-rs/src/main.rs
// Diagnosis Service - HTTP entry point for equipment fault diagnosis
// Port 8080 by default (DIAGNOSIS_SERVICE_PORT / PORT / DIAGNOSIS_SERVICE_ADDR)
//
// Implements:
// - POST /diagnose backed by Gemini with ordered model fallback
// - Offline mode (GEMINI_TEST_MODE) serving a canned diagnosis
// - Liveness (GET /) and readiness (GET /health) endpoints

use std::sync::Arc;

use diagnosis_service::{DiagnosisService, DiagnosisSettings};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = DiagnosisSettings::from_env();

    if settings.offline {
        tracing::warn!("GEMINI_TEST_MODE is set: serving canned diagnoses, no model calls will be made");
    } else if settings.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set: /diagnose will fail until credentials are provided");
    }

    let service = Arc::new(DiagnosisService::from_settings(&settings));
    tracing::info!(
        "Model override: {}, fallback models: {}",
        settings.model_override.as_deref().unwrap_or("none"),
        settings.fallback_models.join(", ")
    );

    let app = service.create_router();

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("Diagnosis Service starting on {}", settings.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
