use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{Method, Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use super::router;
use crate::accounts::AccountDirectory;
use crate::config::CacheConfig;
use crate::lifecycle::{LifecyclePolicy, SellRequestManager, SystemClock};
use crate::rpc::RpcClient;
use crate::state::AppState;
use crate::store::Storage;

const WALLET: &str = "0x52908400098527886E0F7030069857D2E4169EE7";

fn app() -> Router {
    let storage = Storage::memory();
    let clock = Arc::new(SystemClock);
    let accounts = Arc::new(AccountDirectory::new(
        storage.accounts.clone(),
        clock.clone(),
        &CacheConfig::default(),
    ));
    let requests = Arc::new(SellRequestManager::new(
        storage.requests.clone(),
        accounts.clone(),
        clock,
        LifecyclePolicy::default(),
    ));
    // Nothing listens here; chain endpoints are not exercised beyond validation.
    let rpc = RpcClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    router(AppState::new(requests, accounts, rpc))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, email: &str, role: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/accounts",
        Some(json!({ "name": "Test Account", "email": email, "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

async fn submit(app: &Router, user_id: i64, amount: i64) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/sell-requests",
        Some(json!({
            "user_id": user_id,
            "wallet_address": WALLET,
            "amount": amount,
            "price": 5.0,
            "description": "Mangrove restoration",
        })),
    )
    .await
}

#[tokio::test]
async fn sell_request_happy_path() {
    let app = app();
    let user_id = register(&app, "seller@coast.example", "user").await;
    let admin_id = register(&app, "admin@registry.example", "admin").await;

    let (status, created) = submit(&app, user_id, 100).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    assert_eq!(created["source"], "user-submission");
    assert_eq!(
        created["wallet_address"],
        "0x52908400098527886e0f7030069857d2e4169ee7"
    );
    assert!(created["reviewed_by"].is_null());
    let id = created["id"].as_i64().unwrap();

    let (status, reviewed) = send(
        &app,
        Method::PATCH,
        &format!("/sell-requests/{id}/review"),
        Some(json!({ "reviewer_id": admin_id, "decision": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reviewed["status"], "approved");
    assert_eq!(reviewed["reviewed_by"], admin_id);

    let hash = format!("0x{}", "ab".repeat(32));
    let (status, settled) = send(
        &app,
        Method::PATCH,
        &format!("/sell-requests/{id}/settle"),
        Some(json!({ "transaction_hash": hash })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settled["status"], "completed");
    assert_eq!(settled["transaction_hash"], hash);
    assert!(settled["completed_date"].is_string());

    let (status, listed) = send(&app, Method::GET, "/sell-requests?status=completed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, stats) = send(&app, Method::GET, "/sell-requests/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_credits"], 100);
}

#[tokio::test]
async fn validation_failures_name_the_field() {
    let app = app();
    let user_id = register(&app, "seller@coast.example", "user").await;

    let (status, body) = submit(&app, user_id, 0).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "amount");

    let (status, body) = send(
        &app,
        Method::POST,
        "/accounts",
        Some(json!({ "name": "Dup", "email": "SELLER@coast.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["field"], "email");
}

#[tokio::test]
async fn state_conflicts_report_current_status() {
    let app = app();
    let user_id = register(&app, "seller@coast.example", "user").await;
    let admin_id = register(&app, "admin@registry.example", "admin").await;
    let (_, created) = submit(&app, user_id, 100).await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/sell-requests/{id}/settle"),
        Some(json!({ "transaction_hash": format!("0x{}", "cd".repeat(32)) })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current_status"], "pending");

    let review = json!({ "reviewer_id": admin_id, "decision": "reject", "admin_notes": "Expired vintage" });
    let uri = format!("/sell-requests/{id}/review");
    let (status, _) = send(&app, Method::PATCH, &uri, Some(review.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::PATCH, &uri, Some(review)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["current_status"], "rejected");
}

#[tokio::test]
async fn duplicate_live_submission_returns_existing_id() {
    let app = app();
    let user_id = register(&app, "seller@coast.example", "user").await;
    let (_, created) = submit(&app, user_id, 100).await;

    let (status, body) = submit(&app, user_id, 50).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["existing_id"], created["id"]);
}

#[tokio::test]
async fn non_admin_review_is_forbidden() {
    let app = app();
    let user_id = register(&app, "seller@coast.example", "user").await;
    let (_, created) = submit(&app, user_id, 100).await;
    let id = created["id"].as_i64().unwrap();

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/sell-requests/{id}/review"),
        Some(json!({ "reviewer_id": user_id, "decision": "approve" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_resources_are_not_found() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/sell-requests/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("999"));

    let (status, _) = send(&app, Method::GET, "/accounts/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn documents_can_be_attached() {
    let app = app();
    let user_id = register(&app, "seller@coast.example", "user").await;
    let (_, created) = submit(&app, user_id, 100).await;
    let id = created["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/sell-requests/{id}/documents"),
        Some(json!({ "reference": "uploads/registry-extract.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents"], json!(["uploads/registry-extract.pdf"]));
}

#[tokio::test]
async fn stale_threshold_is_bounded() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/sell-requests/stale-approvals?older_than_hours=-1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "older_than_hours");

    let (status, body) = send(&app, Method::GET, "/sell-requests/stale-approvals", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn balance_rejects_malformed_address() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/chain/balance/not-an-address", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "address");
}

#[tokio::test]
async fn malformed_bodies_get_structured_errors() {
    let app = app();
    let user_id = register(&app, "seller@coast.example", "user").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/sell-requests",
        Some(json!({
            "user_id": user_id,
            "wallet_address": WALLET,
            "amount": "lots",
            "price": 5.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("amount"));

    let (status, body) = send(&app, Method::GET, "/sell-requests?status=archived", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send(&app, Method::GET, "/sell-requests/not-a-number", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn liveness_reports_uptime() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "live");
}
