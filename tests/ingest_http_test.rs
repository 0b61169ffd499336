use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use iot_agent::app::ingest_use_case::{IngestUseCase, TargetEndpoints};
use iot_agent::app::instruction_use_case::InstructionUseCase;
use iot_agent::app::ports::{HttpClientPort, HttpReply};
use iot_agent::config::{AgentConfig, SharedSecret};
use iot_agent::infra::instruction_store::InMemoryInstructionStore;
use iot_agent::pipeline::{seal, Forwarder, RetryPolicy};
use iot_agent::server::{create_server, AppState};
use reqwest::header::HeaderMap;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "Benchopo2025";

/// Fixed status per Orion entity.
struct OrionStub {
    gps: u16,
    temp: u16,
    hum: u16,
}

#[async_trait]
impl HttpClientPort for OrionStub {
    async fn patch(
        &self,
        url: &str,
        _body: &Value,
        _headers: &HeaderMap,
        _timeout: Duration,
    ) -> Result<HttpReply, String> {
        let status = if url.contains("/gps_oruga/") {
            self.gps
        } else if url.contains("/temp_oruga/") {
            self.temp
        } else if url.contains("/hum_oruga/") {
            self.hum
        } else {
            return Err(format!("unexpected url {url}"));
        };
        Ok(HttpReply {
            status,
            body: String::new(),
        })
    }
}

/// Panics on every call, standing in for a bug deep in forwarding.
struct PanickingOrion;

#[async_trait]
impl HttpClientPort for PanickingOrion {
    async fn patch(
        &self,
        _url: &str,
        _body: &Value,
        _headers: &HeaderMap,
        _timeout: Duration,
    ) -> Result<HttpReply, String> {
        panic!("orion client exploded: secret-internal-state");
    }
}

fn app(orion: OrionStub) -> Router {
    app_with(Arc::new(orion))
}

fn app_with(orion: Arc<dyn HttpClientPort>) -> Router {
    let config = AgentConfig::default();
    let policy = RetryPolicy {
        timeout: Duration::from_millis(100),
        max_retries: 2,
        base_delay: Duration::from_millis(1),
    };
    let ingest = IngestUseCase::new(
        Some(SharedSecret::new(SECRET)),
        TargetEndpoints::from_config(&config),
        Forwarder::new(orion, policy),
    );
    let state = AppState {
        ingest: Arc::new(ingest),
        instructions: Arc::new(InstructionUseCase::new(Arc::new(
            InMemoryInstructionStore::new(),
        ))),
    };
    create_server(state, "static")
}

fn healthy_orion() -> OrionStub {
    OrionStub {
        gps: 204,
        temp: 204,
        hum: 204,
    }
}

fn reading() -> Value {
    serde_json::from_str(include_str!("resources/reading.json")).unwrap()
}

fn envelope_for(record: &Value, secret: &str) -> Value {
    let envelope = seal(record, &SharedSecret::new(secret), [9; 12]).unwrap();
    serde_json::to_value(envelope.to_wire()).unwrap()
}

async fn call(app: Router, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn post_json(app: Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    call(app, Method::POST, uri, Some(body.to_string())).await
}

#[tokio::test]
async fn full_success_reports_ok() {
    let (status, body) = post_json(app(healthy_orion()), "/ingest", &envelope_for(&reading(), SECRET)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["node"], "oruga-01");
    assert_eq!(body["ts_ms"], 1_760_870_400_000u64);
    assert_eq!(body["orion"]["all_ok"], true);
    assert_eq!(body["orion"]["success_count"], 3);
    assert_eq!(body["orion"]["results"]["temp"]["status"], 204);
    assert!(body.get("partial").is_none());
}

#[tokio::test]
async fn failing_temperature_target_reports_partial() {
    let orion = OrionStub {
        temp: 500,
        ..healthy_orion()
    };
    let (status, body) = post_json(app(orion), "/api/ingest", &envelope_for(&reading(), SECRET)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "partial");
    assert_eq!(body["partial"], true);
    assert_eq!(body["orion"]["success_count"], 2);
    assert_eq!(body["orion"]["any_ok"], true);
    assert_eq!(body["orion"]["results"]["temp"]["ok"], false);
    assert_eq!(body["orion"]["results"]["temp"]["attempts"], 3);
}

#[tokio::test]
async fn all_targets_failing_is_bad_gateway() {
    let orion = OrionStub {
        gps: 500,
        temp: 500,
        hum: 500,
    };
    let (status, body) = post_json(app(orion), "/ingest", &envelope_for(&reading(), SECRET)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["orion"]["success_count"], 0);
    assert_eq!(body["orion"]["any_ok"], false);
}

#[tokio::test]
async fn wrong_secret_is_a_generic_decryption_failure() {
    let (status, body) = post_json(app(healthy_orion()), "/ingest", &envelope_for(&reading(), "guess")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "decryption_failed");
    assert_eq!(body["detail"], "envelope could not be decrypted");
}

#[tokio::test]
async fn unsupported_version_is_rejected() {
    let mut envelope = envelope_for(&reading(), SECRET);
    envelope["v"] = json!(2);
    let (status, body) = post_json(app(healthy_orion()), "/ingest", &envelope).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "decryption_failed");
    assert_eq!(body["detail"], "unsupported version");
}

#[tokio::test]
async fn invalid_reading_returns_field_errors() {
    let mut record = reading();
    record["course_deg"] = json!(360.0);
    record.as_object_mut().unwrap().remove("sats");
    record["lat"] = json!(90.0001);

    // Presence errors come back alone
    let (status, body) = post_json(app(healthy_orion()), "/ingest", &envelope_for(&record, SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_failed");
    assert_eq!(body["detail"], json!({"sats": "missing"}));

    record["sats"] = json!(9);
    let (status, body) = post_json(app(healthy_orion()), "/ingest", &envelope_for(&record, SECRET)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["detail"],
        json!({"course_deg": "out_of_range", "lat": "out_of_range"})
    );
}

#[tokio::test]
async fn panic_while_processing_is_internal_error_without_detail() {
    let (status, body) = post_json(
        app_with(Arc::new(PanickingOrion)),
        "/ingest",
        &envelope_for(&reading(), SECRET),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"error": "internal_error", "detail": "internal error"})
    );
    assert!(!body.to_string().contains("secret-internal-state"));
}

#[tokio::test]
async fn non_json_body_is_invalid_request() {
    let (status, body) = call(
        app(healthy_orion()),
        Method::POST,
        "/ingest",
        Some("v=1".to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn envelope_missing_ciphertext_is_rejected() {
    let body = json!({"v": 1, "iv": "AAAAAAAAAAAAAAAA", "tag": "AAAAAAAAAAAAAAAAAAAAAA=="});
    let (status, body) = post_json(app(healthy_orion()), "/ingest", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "decryption_failed");
    assert!(body["detail"].as_str().unwrap().starts_with("malformed envelope"));
}

#[tokio::test]
async fn instruction_round_trip() {
    let app = app(healthy_orion());

    let (status, body) = call(app.clone(), Method::GET, "/api/instruction", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["instruction"], "stop");

    for cmd in ["forward", "backward", "left", "right", "stop"] {
        let (status, body) = post_json(app.clone(), "/api/instruction", &json!({"instruction": cmd})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["instruction"], cmd);
    }

    post_json(app.clone(), "/api/instruction", &json!({"instruction": "left"})).await;
    let (_, body) = call(app, Method::GET, "/api/instruction", None).await;
    assert_eq!(body["instruction"], "left");
}

#[tokio::test]
async fn invalid_instruction_is_rejected() {
    let (status, body) = post_json(
        app(healthy_orion()),
        "/api/instruction",
        &json!({"instruction": "invalid"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid instruction");
}

#[tokio::test]
async fn health_reports_service() {
    let (status, body) = call(app(healthy_orion()), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}
