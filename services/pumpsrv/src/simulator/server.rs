//! HTTP front for the simulator: `POST /jsonPTS`
//!
//! Lets the HTTP transport talk to a simulated controller exactly as it
//! would to real hardware.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::controller::ControllerSimulator;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};

pub const ENDPOINT_PATH: &str = "/jsonPTS";

pub fn router(simulator: Arc<ControllerSimulator>) -> Router {
    Router::new()
        .route(ENDPOINT_PATH, post(handle_envelope))
        .with_state(simulator)
}

async fn handle_envelope(
    State(simulator): State<Arc<ControllerSimulator>>,
    Json(envelope): Json<RequestEnvelope>,
) -> Json<ResponseEnvelope> {
    Json(simulator.handle(&envelope).await)
}

/// Serve the simulator until `token` is cancelled
pub async fn serve(
    listener: TcpListener,
    simulator: Arc<ControllerSimulator>,
    token: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!("Controller simulator listening on http://{}{}", addr, ENDPOINT_PATH);

    let result = axum::serve(listener, router(simulator))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await;
    if let Err(e) = &result {
        error!("Simulator server error: {}", e);
    }
    result
}
