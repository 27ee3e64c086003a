use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use draftsmith::services::generation::{
    DocumentGenerator, EnrichmentBundle, GenerationError, GenerationRequest, HttpDocumentGenerator,
};
use draftsmith::{BackgroundGeneration, CancelReason, GenerationConfig, GenerationStatus};

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    let name = body["formData"]["employeeName"].as_str().unwrap_or_default().to_string();
    let state = body["jurisdiction"]["state"].clone();
    Json(json!({
        "success": true,
        "document": {
            "content": format!("EMPLOYMENT AGREEMENT for {name}"),
            "metadata": { "jurisdiction": state }
        }
    }))
}

async fn overloaded() -> (StatusCode, Json<Value>) {
    (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "upstream overloaded" })))
}

async fn refused() -> Json<Value> {
    Json(json!({ "success": false, "error": "missing jurisdiction" }))
}

async fn garbage() -> &'static str {
    "not json"
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Json(json!({ "success": true, "document": { "content": "too late" } }))
}

async fn serve() -> String {
    let app = Router::new()
        .route("/generate", post(echo))
        .route("/overloaded", post(overloaded))
        .route("/refused", post(refused))
        .route("/garbage", post(garbage))
        .route("/slow", post(slow));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn generator(endpoint: String) -> HttpDocumentGenerator {
    HttpDocumentGenerator::new(&GenerationConfig { endpoint, ..Default::default() })
}

fn request() -> GenerationRequest {
    GenerationRequest::new(
        json!({ "employeeName": "Ada Lovelace" }),
        EnrichmentBundle { jurisdiction: Some(json!({ "state": "CA" })), ..Default::default() },
    )
}

#[tokio::test]
async fn posts_form_and_enrichment() {
    let base = serve().await;
    let generator = generator(format!("{base}/generate"));
    assert_eq!(generator.endpoint(), format!("{base}/generate"));
    let doc = generator.generate(request()).await.unwrap();
    assert_eq!(doc.content, "EMPLOYMENT AGREEMENT for Ada Lovelace");
    assert_eq!(doc.metadata, json!({ "jurisdiction": "CA" }));
}

#[tokio::test]
async fn error_statuses_carry_the_server_message() {
    let base = serve().await;
    match generator(format!("{base}/overloaded")).generate(request()).await {
        Err(GenerationError::Status { status, message }) => {
            assert_eq!(status, 503);
            assert_eq!(message, "upstream overloaded");
        }
        other => panic!("unexpected result {other:?}"),
    }
}

#[tokio::test]
async fn unsuccessful_body_is_a_rejection() {
    let base = serve().await;
    let err = generator(format!("{base}/refused")).generate(request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Rejected(ref m) if m == "missing jurisdiction"));

    let err = generator(format!("{base}/garbage")).generate(request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Decode(_)));
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    let err = generator("http://127.0.0.1:1/generate".to_string()).generate(request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Transport(_)));
}

#[tokio::test]
async fn background_attempt_over_http_is_cancellable() {
    let base = serve().await;
    let drafts = BackgroundGeneration::new(Arc::new(generator(format!("{base}/slow"))));
    drafts.update_inputs(json!({ "employeeName": "Ada Lovelace" }));
    drafts.start();
    assert_eq!(drafts.read().status, GenerationStatus::Pending);

    tokio::time::sleep(Duration::from_millis(20)).await;
    drafts.cancel(CancelReason::Manual);
    assert_eq!(drafts.read().status, GenerationStatus::Idle);
    assert_eq!(drafts.telemetry().attempt_stats.cancelled, 1);
}

#[tokio::test]
async fn background_attempt_over_http_becomes_ready() {
    let base = serve().await;
    let drafts = BackgroundGeneration::new(Arc::new(generator(format!("{base}/generate"))));
    let fp = drafts.update_inputs(json!({ "employeeName": "Grace Hopper" }));
    drafts.start();

    let doc = drafts.await_result(&fp, Duration::from_secs(5)).await.expect("draft within timeout");
    assert_eq!(doc.content, "EMPLOYMENT AGREEMENT for Grace Hopper");
    assert_eq!(drafts.read().status, GenerationStatus::Ready);
}
