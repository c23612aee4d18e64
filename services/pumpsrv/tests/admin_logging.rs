//! Log level admin endpoint with logging initialized
//!
//! Separate test binary: it installs the process-global subscriber.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pumpsrv::api::create_api_routes;

async fn put_level(app: &Router, level: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/admin/logs/level")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "level": level }).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_log_level_endpoint_validates_directives() {
    ::common::logging::init_with_config(::common::LogConfig {
        service_name: "pumpsrv".to_string(),
        ansi: false,
        ..Default::default()
    })
    .unwrap();

    let (service, _) = common::simulator_service(&[1]).await;
    let app = create_api_routes(service);

    let (status, body) = put_level(&app, "chatty").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "INVALID_LOG_LEVEL");
    assert_ne!(::common::logging::get_log_level(), "chatty");

    let (status, body) = put_level(&app, "info,pumpsrv=trace").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["level"], "info,pumpsrv=trace");

    let request = Request::builder()
        .uri("/api/admin/logs/level")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["level"], "info,pumpsrv=trace");
}
