//! ---
//! updraft_section: "05-networking-external-interfaces"
//! updraft_subsection: "integration-tests"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "REST backend behaviour against a local HTTP fixture."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use updraft_api::wire::TagMap;
use updraft_api::StackIdentifier;
use updraft_client::RestBackend;
use updraft_core::{BackendError, StackBackend};
use updraft_transport::RetryPolicy;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture");
    let addr = listener.local_addr().expect("fixture address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture serve");
    });
    format!("http://{addr}")
}

fn backend(base: &str) -> RestBackend {
    RestBackend::new(
        base,
        "acct-token",
        Duration::from_secs(5),
        RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(20),
        },
    )
    .expect("backend client")
}

fn prod_stack() -> StackIdentifier {
    StackIdentifier::new("acme", "website", "prod")
}

#[tokio::test]
async fn created_stack_reads_back_with_matching_identifier() {
    let app = Router::new()
        .route("/api/stacks/acme/website", post(|| async { Json(json!({})) }))
        .route(
            "/api/stacks/acme/website/prod",
            get(|| async {
                Json(json!({
                    "orgName": "acme",
                    "projectName": "website",
                    "stackName": "prod",
                    "tags": {"env": "production"},
                }))
            }),
        );
    let base = serve(app).await;
    let client = backend(&base);

    let mut tags = TagMap::new();
    tags.insert("env".to_owned(), "production".to_owned());
    let created = client.create_stack(&prod_stack(), tags).await.unwrap();
    assert_eq!(created.org_name, "acme");
    assert_eq!(created.project_name, "website");
    assert_eq!(created.stack_name, "prod");

    let fetched = client.get_stack(&prod_stack()).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_stack_rejects_bad_names_without_calling_the_backend() {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_route = hits.clone();
    let app = Router::new().route(
        "/api/stacks/acme/website",
        post(move || {
            let hits = hits_route.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({}))
            }
        }),
    );
    let base = serve(app).await;
    let client = backend(&base);

    let bad = StackIdentifier::new("acme", "website", "no spaces allowed");
    let err = client.create_stack(&bad, TagMap::new()).await.unwrap_err();
    assert!(matches!(err, BackendError::Validation(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

async fn delete_guarded(
    State(resources): State<Arc<AtomicUsize>>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let force = params.get("force").map(String::as_str) == Some("true");
    if resources.load(Ordering::SeqCst) > 0 && !force {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "code": 400,
                "message": "Bad Request: Stack still contains resources.",
            })),
        )
    } else {
        (StatusCode::OK, Json(json!({})))
    }
}

#[tokio::test]
async fn delete_surfaces_the_has_resources_condition() {
    let resources = Arc::new(AtomicUsize::new(3));
    let app = Router::new()
        .route("/api/stacks/acme/website/prod", delete(delete_guarded))
        .with_state(resources);
    let base = serve(app).await;
    let client = backend(&base);

    let err = client.delete_stack(&prod_stack(), false).await.unwrap_err();
    assert!(matches!(err, BackendError::StackHasResources));

    client.delete_stack(&prod_stack(), true).await.unwrap();
}

#[tokio::test]
async fn missing_history_surfaces_no_previous_deployment() {
    let app = Router::new().route(
        "/api/stacks/acme/website/prod/updates/latest",
        get(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({"code": 404, "message": "no previous deployment"})),
            )
        }),
    );
    let base = serve(app).await;
    let client = backend(&base);

    let err = client
        .get_latest_configuration(&prod_stack())
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::NoPreviousDeployment));
}

#[tokio::test]
async fn account_name_is_resolved_once_and_cached() {
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_route = hits.clone();
    let app = Router::new().route(
        "/api/user",
        get(move || {
            let hits = hits_route.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Json(json!({"githubLogin": "deploy-bot"}))
            }
        }),
    );
    let base = serve(app).await;
    let client = backend(&base);

    assert_eq!(client.get_account_name().await.unwrap(), "deploy-bot");
    assert_eq!(client.get_account_name().await.unwrap(), "deploy-bot");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
