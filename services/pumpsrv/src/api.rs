//! Consumer REST API
//!
//! Reads go through the registry snapshot, writes through `submit_command`;
//! nothing else in the service is reachable from here.
//!
//! - `GET  /health`
//! - `GET  /api/pumps`
//! - `GET  /api/pumps/{id}`
//! - `POST /api/pumps/{id}/authorize` with `{ "nozzle": 1, "price": 23.45 }`
//! - `POST /api/pumps/{id}/stop`
//! - `GET|PUT /api/admin/logs/level`

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::PumpSrvError;
use crate::pump::{Pump, PumpId};
use crate::scheduler::{PollStats, PumpCommand};
use crate::service::PumpService;

/// Success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: u16,
    pub kind: String,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
}

impl IntoResponse for PumpSrvError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            success: false,
            error: ErrorInfo {
                code: status.as_u16(),
                kind: self.error_code().to_string(),
                message: self.to_string(),
                retryable: self.is_retryable(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub nozzle: u8,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub pumps: usize,
    pub polling: PollStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLevelRequest {
    pub level: String,
}

type ApiResult<T> = Result<Json<SuccessResponse<T>>, PumpSrvError>;

pub fn create_api_routes(service: PumpService) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/pumps", get(list_pumps))
        .route("/api/pumps/{id}", get(get_pump))
        .route("/api/pumps/{id}/authorize", post(authorize_pump))
        .route("/api/pumps/{id}/stop", post(stop_pump))
        .route("/api/admin/logs/level", get(get_log_level).put(set_log_level))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn health_check(State(service): State<PumpService>) -> ApiResult<HealthStatus> {
    let status = if service.scheduler().is_stopped() {
        "stopping"
    } else {
        "healthy"
    };
    Ok(Json(SuccessResponse::new(HealthStatus {
        status: status.to_string(),
        service: service.config().service.name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pumps: service.registry().len(),
        polling: service.stats(),
        timestamp: Utc::now(),
    })))
}

async fn list_pumps(State(service): State<PumpService>) -> ApiResult<Vec<Pump>> {
    Ok(Json(SuccessResponse::new(service.snapshot().to_vec())))
}

async fn get_pump(State(service): State<PumpService>, Path(id): Path<PumpId>) -> ApiResult<Pump> {
    Ok(Json(SuccessResponse::new(service.pump(id)?)))
}

async fn authorize_pump(
    State(service): State<PumpService>,
    Path(id): Path<PumpId>,
    Json(request): Json<AuthorizeRequest>,
) -> ApiResult<Pump> {
    let pump = service
        .submit_command(
            id,
            PumpCommand::Authorize {
                nozzle: request.nozzle,
                price: request.price,
            },
        )
        .await?;
    Ok(Json(SuccessResponse::new(pump)))
}

async fn stop_pump(State(service): State<PumpService>, Path(id): Path<PumpId>) -> ApiResult<Pump> {
    let pump = service.submit_command(id, PumpCommand::Stop).await?;
    Ok(Json(SuccessResponse::new(pump)))
}

async fn get_log_level() -> ApiResult<LogLevelRequest> {
    Ok(Json(SuccessResponse::new(LogLevelRequest {
        level: common::logging::get_log_level(),
    })))
}

async fn set_log_level(Json(request): Json<LogLevelRequest>) -> Response {
    match common::logging::set_log_level(&request.level) {
        Ok(()) => Json(SuccessResponse::new(request)).into_response(),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                success: false,
                error: ErrorInfo {
                    code: StatusCode::BAD_REQUEST.as_u16(),
                    kind: "INVALID_LOG_LEVEL".to_string(),
                    message,
                    retryable: false,
                },
            }),
        )
            .into_response(),
    }
}
