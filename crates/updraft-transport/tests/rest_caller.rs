//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "integration-tests"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Transport adapter behaviour against a local HTTP fixture."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use updraft_transport::{AccessToken, CallOptions, Method, RestCaller, RetryPolicy, TransportError};

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(40),
    }
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture");
    let addr = listener.local_addr().expect("fixture address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture serve");
    });
    format!("http://{addr}")
}

fn caller(base: &str) -> RestCaller {
    RestCaller::new(base, Duration::from_secs(5), quick_retry()).expect("caller")
}

fn account() -> AccessToken {
    AccessToken::Account("acct-token".to_owned())
}

async fn flaky(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, Json<Value>) {
    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"code": 503, "message": "temporarily unavailable"})),
        )
    } else {
        (StatusCode::OK, Json(json!({"ok": true})))
    }
}

#[tokio::test]
async fn retry_safe_call_retries_past_transient_failure() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/api/flaky", post(flaky))
        .with_state(hits.clone());
    let base = serve(app).await;

    let response: Value = caller(&base)
        .call(
            Method::POST,
            "/api/flaky",
            &[],
            Option::<&()>::None,
            &account(),
            CallOptions::retryable(),
        )
        .await
        .expect("retried call succeeds");

    assert_eq!(response["ok"], json!(true));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn non_retryable_call_is_not_replayed() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/api/flaky", post(flaky))
        .with_state(hits.clone());
    let base = serve(app).await;

    let err = caller(&base)
        .call_unit(
            Method::POST,
            "/api/flaky",
            &[],
            Option::<&()>::None,
            &account(),
            CallOptions::non_retryable(),
        )
        .await
        .expect_err("single attempt surfaces the failure");

    match err {
        TransportError::Api { status, .. } => assert_eq!(status, 503),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

async fn checkpoint_sink(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let encoding = headers
        .get("content-encoding")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let mut decoder = flate2::read::GzDecoder::new(body.as_ref());
    let mut text = String::new();
    let decoded: Value = match decoder.read_to_string(&mut text) {
        Ok(_) => serde_json::from_str(&text).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    };
    Json(json!({"encoding": encoding, "version": decoded["version"]}))
}

#[tokio::test]
async fn gzip_body_arrives_compressed_and_intact() {
    let app = Router::new().route("/api/checkpoint", patch(checkpoint_sink));
    let base = serve(app).await;

    let body = json!({"version": 3, "deployment": {"resources": []}});
    let response: Value = caller(&base)
        .call(
            Method::PATCH,
            "/api/checkpoint",
            &[],
            Some(&body),
            &AccessToken::Lease("lease-1".to_owned()),
            CallOptions::retryable_gzip(),
        )
        .await
        .expect("gzip call succeeds");

    assert_eq!(response["encoding"], json!("gzip"));
    assert_eq!(response["version"], json!(3));
}

async fn whoami(headers: HeaderMap) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    Json(json!({"authorization": auth}))
}

#[tokio::test]
async fn credential_travels_in_the_token_scheme() {
    let app = Router::new().route("/api/whoami", get(whoami));
    let base = serve(app).await;

    let response: Value = caller(&base)
        .call(
            Method::GET,
            "/api/whoami",
            &[],
            Option::<&()>::None,
            &AccessToken::Lease("lease-7".to_owned()),
            CallOptions::retryable(),
        )
        .await
        .expect("call succeeds");

    assert_eq!(response["authorization"], json!("token lease-7"));
}

async fn always_rejected() -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "code": 400,
            "message": "Bad Request: Stack still contains resources.",
        })),
    )
}

#[tokio::test]
async fn structured_error_bodies_become_typed_rejections() {
    let app = Router::new().route("/api/stack", post(always_rejected));
    let base = serve(app).await;

    let err = caller(&base)
        .call_unit(
            Method::POST,
            "/api/stack",
            &[],
            Option::<&()>::None,
            &account(),
            CallOptions::non_retryable(),
        )
        .await
        .expect_err("rejection surfaces");

    match err {
        TransportError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Bad Request: Stack still contains resources.");
        }
        other => panic!("unexpected error {other:?}"),
    }
}
