//! Route and error-mapping tests for the HTTP adapter.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use pointledger_server::http;

use common::default_service;

fn app() -> Router {
    http::router(Arc::new(default_service()))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_charge_use_and_query_routes() {
    let app = app();

    let (status, body) = send(&app, "PATCH", "/point/1/charge", Some("1000")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["point"], 1000);

    let (status, body) = send(&app, "PATCH", "/point/1/use", Some("300")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["point"], 700);

    let (status, body) = send(&app, "GET", "/point/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["point"], 700);
    assert!(body["updateMillis"].as_i64().is_some());

    let (status, body) = send(&app, "GET", "/point/1/histories", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["type"], "CHARGE");
    assert_eq!(records[0]["amount"], 1000);
    assert_eq!(records[1]["type"], "USE");
    assert_eq!(records[1]["userId"], 1);
}

#[tokio::test]
async fn test_error_mapping() {
    let app = app();

    let (status, body) = send(&app, "GET", "/point/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, body) = send(&app, "PATCH", "/point/1/charge", Some("-5")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, body) = send(&app, "PATCH", "/point/1/use", Some("10")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INSUFFICIENT_FUNDS");
    assert!(body["message"].as_str().unwrap().contains("available 0"));

    send(&app, "PATCH", "/point/2/charge", Some(i64::MAX.to_string().as_str())).await;
    let (status, body) = send(&app, "PATCH", "/point/2/charge", Some("1")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "OVERFLOW");
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = app();

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    send(&app, "PATCH", "/point/3/charge", Some("50")).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("pointledger_charges_total 1"));
}
