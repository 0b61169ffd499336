use crate::app::ingest_use_case::{IngestOutcome, IngestUseCase, OutcomeClass, TargetEndpoints};
use crate::app::instruction_use_case::InstructionUseCase;
use crate::config::AgentConfig;
use crate::error::{IngestError, Result};
use crate::infra::http_client::ReqwestHttp;
use crate::infra::instruction_store::InMemoryInstructionStore;
use crate::pipeline::forward::{Forwarder, RetryPolicy};
use axum::{
    body::Bytes,
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

/// Shared handles for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestUseCase>,
    pub instructions: Arc<InstructionUseCase>,
}

impl AppState {
    /// Wire the production adapters from configuration.
    pub fn from_config(config: &AgentConfig) -> Self {
        let forwarder = Forwarder::new(
            Arc::new(ReqwestHttp::new()),
            RetryPolicy::from(&config.forward),
        );
        let ingest = IngestUseCase::new(
            config.agent_token.clone(),
            TargetEndpoints::from_config(config),
            forwarder,
        );
        Self {
            ingest: Arc::new(ingest),
            instructions: Arc::new(InstructionUseCase::new(Arc::new(
                InMemoryInstructionStore::new(),
            ))),
        }
    }
}

async fn home() -> &'static str {
    "IoT Agent is running!"
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "iot-agent",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn metrics_text() -> impl IntoResponse {
    (
        [(hyper::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::render(),
    )
}

fn error_response(status: StatusCode, error: &str, detail: Value) -> Response {
    (status, Json(json!({ "error": error, "detail": detail }))).into_response()
}

fn outcome_response(outcome: &IngestOutcome) -> Response {
    let orion = json!({
        "all_ok": outcome.all_ok,
        "any_ok": outcome.any_ok,
        "success_count": outcome.success_count,
        "results": outcome.per_target,
    });
    let mut body = json!({
        "status": outcome.class().as_str(),
        "node": outcome.node,
        "ts_ms": outcome.ts_ms,
        "orion": orion,
    });

    let status = match outcome.class() {
        OutcomeClass::Full => StatusCode::OK,
        OutcomeClass::Partial => {
            body["partial"] = json!(true);
            StatusCode::OK
        }
        OutcomeClass::Failed => StatusCode::BAD_GATEWAY,
    };
    (status, Json(body)).into_response()
}

/// POST /ingest
async fn ingest(Extension(state): Extension<AppState>, body: Bytes) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                json!(format!("body is not valid JSON: {e}")),
            )
        }
    };

    // Run on its own task so a panic becomes a 500 instead of a dropped connection
    let use_case = state.ingest.clone();
    let result = tokio::spawn(async move { use_case.process(&body).await })
        .await
        .unwrap_or_else(|join_err| Err(IngestError::Internal(join_err.to_string())));

    match result {
        Ok(outcome) => outcome_response(&outcome),
        Err(IngestError::Decrypt(e)) => error_response(
            StatusCode::BAD_REQUEST,
            "decryption_failed",
            json!(e.public_detail()),
        ),
        Err(IngestError::Validation(errors)) => {
            error_response(StatusCode::BAD_REQUEST, "validation_failed", json!(errors))
        }
        Err(IngestError::Internal(detail)) => {
            error!(%detail, "unexpected error while processing ingest");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                json!("internal error"),
            )
        }
    }
}

/// GET /api/instruction
async fn get_instruction(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let current = state.instructions.current().await;
    Json(json!({ "instruction": current }))
}

/// POST /api/instruction
async fn set_instruction(Extension(state): Extension<AppState>, body: Bytes) -> Response {
    let requested = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|v| v.get("instruction").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();

    match state.instructions.set_from_str(&requested).await {
        Ok(instruction) => Json(json!({ "instruction": instruction })).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/ingest", post(ingest))
        .route("/api/ingest", post(ingest))
        .route("/api/instruction", get(get_instruction).post(set_instruction))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server and run until Ctrl-C.
pub async fn start_server(config: &AgentConfig) -> Result<()> {
    let app = create_server(AppState::from_config(config), &config.static_dir);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    info!("HTTP server running on http://localhost:{}", config.port);
    info!("Ingest endpoint: POST http://localhost:{}/ingest", config.port);
    info!("Forwarding to Orion at {}", config.orion_base);

    Server::try_bind(&addr)?
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
