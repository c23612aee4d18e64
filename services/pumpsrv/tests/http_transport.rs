//! HTTP transport against a live listener
//!
//! The simulator router is served on an ephemeral port so the full
//! reqwest/axum path is exercised, including Basic auth and failure mapping.

#![allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pumpsrv::config::{ControllerConfig, ControllerMode};
use pumpsrv::protocol::{Command, PacketCodec, PacketType, ResponseEnvelope};
use pumpsrv::pump::PumpStatus;
use pumpsrv::simulator::server::{self, ENDPOINT_PATH};
use pumpsrv::simulator::ControllerSimulator;
use pumpsrv::transport::{HttpTransport, Transport};
use pumpsrv::{PollOutcome, PumpService, TransportError};

// admin:admin
const EXPECTED_AUTH: &str = "Basic YWRtaW46YWRtaW4=";

async fn spawn(app: Router) -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });
    (addr, token)
}

async fn spawn_simulator() -> (SocketAddr, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let token = CancellationToken::new();
    let simulator = Arc::new(ControllerSimulator::seeded(Duration::ZERO, common::SEED));
    tokio::spawn(server::serve(listener, simulator, token.clone()));
    (addr, token)
}

fn controller(addr: SocketAddr) -> ControllerConfig {
    ControllerConfig {
        url: format!("http://{addr}{ENDPOINT_PATH}"),
        timeout_ms: 1000,
        ..ControllerConfig::default()
    }
}

fn status_envelope() -> pumpsrv::protocol::RequestEnvelope {
    PacketCodec::default()
        .encode(&[Command::PumpGetStatus { pump: 1 }])
        .unwrap()
}

#[tokio::test]
async fn test_status_round_trip_over_http() {
    let (addr, token) = spawn_simulator().await;
    let transport = HttpTransport::new(&controller(addr)).unwrap();

    let reply = transport.send(&status_envelope()).await.unwrap();
    let results = PacketCodec::default().decode(&reply).unwrap();
    assert_eq!(results.len(), 1);
    let packet = results.into_iter().next().unwrap().unwrap();
    assert_eq!(packet.packet_type, PacketType::PumpIdleStatus);
    assert_eq!(packet.data["Pump"], 1);
    token.cancel();
}

#[tokio::test]
async fn test_basic_auth_header_is_sent() {
    let app = Router::new().route(
        ENDPOINT_PATH,
        post(|headers: HeaderMap| async move {
            let authorized = headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                == Some(EXPECTED_AUTH);
            if !authorized {
                return Err(StatusCode::UNAUTHORIZED);
            }
            Ok(Json(json!({"Error": false, "Packets": []})))
        }),
    );
    let (addr, token) = spawn(app).await;

    let transport = HttpTransport::new(&controller(addr)).unwrap();
    let reply = transport.send(&status_envelope()).await.unwrap();
    assert_eq!(reply, ResponseEnvelope {
        error: false,
        packets: Some(vec![]),
    });

    let wrong = HttpTransport::new(&ControllerConfig {
        password: "secret".to_string(),
        ..controller(addr)
    })
    .unwrap();
    let err = wrong.send(&status_envelope()).await.unwrap_err();
    assert!(matches!(err, TransportError::HttpStatus { status: 401, .. }));
    token.cancel();
}

#[tokio::test]
async fn test_undecodable_body() {
    let app = Router::new().route(ENDPOINT_PATH, post(|| async { "<html>busy</html>" }));
    let (addr, token) = spawn(app).await;

    let transport = HttpTransport::new(&controller(addr)).unwrap();
    let err = transport.send(&status_envelope()).await.unwrap_err();
    assert!(matches!(err, TransportError::Decode(_)));
    token.cancel();
}

#[tokio::test]
async fn test_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new(&controller(addr)).unwrap();
    let err = transport.send(&status_envelope()).await.unwrap_err();
    assert!(
        matches!(err, TransportError::ConnectionFailed { .. }),
        "got {err:?}"
    );
}

#[tokio::test]
async fn test_slow_controller_times_out() {
    let app = Router::new().route(
        ENDPOINT_PATH,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"Error": false, "Packets": []}))
        }),
    );
    let (addr, token) = spawn(app).await;

    let transport = HttpTransport::new(&ControllerConfig {
        timeout_ms: 100,
        ..controller(addr)
    })
    .unwrap();
    let err = transport.send(&status_envelope()).await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout(_)), "got {err:?}");
    token.cancel();
}

#[tokio::test]
async fn test_service_polls_over_http() {
    let (addr, token) = spawn_simulator().await;

    let mut config = common::simulator_config(&[1, 2]);
    config.controller = ControllerConfig {
        mode: ControllerMode::Http,
        ..controller(addr)
    };
    let service = PumpService::new(config, CancellationToken::new()).unwrap();

    // the simulator echoes configuration requests, so the static list is used
    assert_eq!(service.load_configuration().await.unwrap(), 2);
    let outcome = service.scheduler().poll_once().await;
    assert!(matches!(outcome, PollOutcome::Completed { applied: 2, .. }));
    assert!(service
        .snapshot()
        .iter()
        .all(|p| p.status == PumpStatus::Idle));

    service.shutdown().await;
    token.cancel();
}
