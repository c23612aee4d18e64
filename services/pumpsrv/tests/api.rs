//! Consumer API tests
//!
//! Requests are driven through the router with `oneshot`; the service behind
//! it talks to an in-process simulator.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use pumpsrv::api::create_api_routes;

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (service, _) = common::simulator_service(&[1, 2]).await;
    let app = create_api_routes(service);

    let (status, body) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["service"], "pumpsrv");
    assert_eq!(body["data"]["pumps"], 2);
    assert_eq!(body["data"]["polling"]["completed"], 0);
}

#[tokio::test]
async fn test_list_and_get_pumps() {
    let (service, _) = common::simulator_service(&[1, 2]).await;
    let app = create_api_routes(service);

    let (status, body) = call(&app, Method::GET, "/api/pumps", None).await;
    assert_eq!(status, StatusCode::OK);
    let pumps = body["data"].as_array().unwrap();
    assert_eq!(pumps.len(), 2);
    assert_eq!(pumps[0]["id"], 1);

    let (status, body) = call(&app, Method::GET, "/api/pumps/2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], 2);
    assert_eq!(body["data"]["status"], "OFFLINE");
}

#[tokio::test]
async fn test_unknown_pump() {
    let (service, _) = common::simulator_service(&[1]).await;
    let app = create_api_routes(service);

    let (status, body) = call(&app, Method::GET, "/api/pumps/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "PUMP_NOT_FOUND");

    let (status, _) = call(&app, Method::POST, "/api/pumps/9/stop", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_authorize_offline_pump_conflicts() {
    let (service, _) = common::simulator_service(&[1]).await;
    let app = create_api_routes(service);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/pumps/1/authorize",
        Some(json!({"nozzle": 1, "price": 23.45})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["kind"], "PROTOCOL_VIOLATION");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn test_authorize_then_stop() {
    let (service, _) = common::simulator_service(&[1]).await;
    service.scheduler().poll_once().await;
    let app = create_api_routes(service);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/pumps/1/authorize",
        Some(json!({"nozzle": 2, "price": 21.9})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "FILLING");
    assert_eq!(body["data"]["nozzle"], 2);
    assert!(body["data"]["transactionId"].is_u64());

    let (status, body) = call(&app, Method::POST, "/api/pumps/1/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "IDLE");
    assert!(body["data"]["transactionId"].is_null());
}

#[tokio::test]
async fn test_command_while_controller_unreachable() {
    let (service, transport) = common::simulator_service(&[1]).await;
    service.scheduler().poll_once().await;
    transport.set_delivery(false);
    let app = create_api_routes(service);

    let (status, body) = call(&app, Method::POST, "/api/pumps/1/stop", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["kind"], "TRANSPORT_ERROR");
    assert_eq!(body["error"]["retryable"], false);

    let (_, body) = call(&app, Method::GET, "/api/pumps/1", None).await;
    assert_eq!(body["data"]["status"], "NO_CONNECTION");
}

#[tokio::test]
async fn test_invalid_log_level_rejected() {
    let (service, _) = common::simulator_service(&[1]).await;
    let app = create_api_routes(service);

    let (status, body) = call(
        &app,
        Method::PUT,
        "/api/admin/logs/level",
        Some(json!({"level": "chatty"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "INVALID_LOG_LEVEL");
}
