//! Error handling for the pump communication service
//!
//! Three layers of failure exist on the controller link:
//! - [`TransportError`]: the envelope never made a clean round-trip
//! - [`ProtocolError`]: a reply arrived but could not be understood
//! - [`ProtocolViolation`]: a reply was understood but does not fit the pump's state
//!
//! [`PumpSrvError`] wraps them for callers of the service API.

use thiserror::Error;

use crate::protocol::PacketType;
use crate::pump::{PumpId, PumpStatus};

/// Delivery failures between the service and the controller endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Endpoint refused or dropped the connection
    #[error("Connection failed: {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// No reply within the configured timeout
    #[error("Timeout waiting for response from {0}")]
    Timeout(String),

    /// Reply carried a non-success HTTP status
    #[error("HTTP status {status} from {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    /// Reply body was not a response envelope
    #[error("Response decode failed: {0}")]
    Decode(String),

    /// Delivery switched off (used to exercise NO_CONNECTION paths)
    #[error("Delivery disabled on transport {0}")]
    Disabled(String),
}

/// Reply content the codec or the fold step could not accept
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Response envelope has no Packets field")]
    MissingPackets,

    #[error("Controller flagged the envelope as failed")]
    EnvelopeRejected,

    #[error("Packet at position {0} has no Type")]
    MissingType(usize),

    #[error("Unknown packet type '{0}'")]
    UnknownType(String),

    #[error("Unexpected packet type {actual}, expected {expected}")]
    UnexpectedType { expected: String, actual: PacketType },

    #[error("Malformed {packet_type} payload: {reason}")]
    MalformedPayload {
        packet_type: PacketType,
        reason: String,
    },

    #[error("Status for pump {reported} arrived in the slot of pump {expected}")]
    PumpMismatch { expected: PumpId, reported: PumpId },

    #[error("No payload builder registered for {0}")]
    NoBuilder(PacketType),

    #[error("Payload builder for {packet_type} failed: {reason}")]
    BuildFailed {
        packet_type: PacketType,
        reason: String,
    },

    #[error("Controller error on {packet_type} (code {code:?}): {message}")]
    ControllerError {
        packet_type: String,
        code: Option<i64>,
        message: String,
    },

    #[error("No response packet for request position {0}")]
    MissingResponse(usize),
}

/// A recognized response that the pump's current state does not allow
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolViolation {
    #[error("{response} is not valid for pump {pump} in state {state}")]
    UnexpectedResponse {
        pump: PumpId,
        state: PumpStatus,
        response: PacketType,
    },

    #[error(
        "Pump {pump} fill counters decreased: volume {previous_volume} -> {volume}, amount {previous_amount} -> {amount}"
    )]
    NonMonotonic {
        pump: PumpId,
        previous_volume: f64,
        volume: f64,
        previous_amount: f64,
        amount: f64,
    },
}

/// Service-level error type
#[derive(Error, Debug, Clone)]
pub enum PumpSrvError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Violation(#[from] ProtocolViolation),

    #[error("Pump not found: {0}")]
    PumpNotFound(PumpId),

    #[error("Scheduler stopped")]
    Stopped,
}

/// Result type alias for the service
pub type Result<T> = std::result::Result<T, PumpSrvError>;

impl PumpSrvError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable code for API responses and log correlation
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIGURATION_ERROR",
            Self::Transport(TransportError::Timeout(_)) => "TIMEOUT",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Protocol(_) => "PROTOCOL_ERROR",
            Self::Violation(_) => "PROTOCOL_VIOLATION",
            Self::PumpNotFound(_) => "PUMP_NOT_FOUND",
            Self::Stopped => "SERVICE_STOPPED",
        }
    }

    /// Whether repeating the same request later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(e) if !matches!(e, TransportError::Disabled(_)))
    }

    /// HTTP status for the consumer API
    pub fn status_code(&self) -> u16 {
        match self {
            Self::PumpNotFound(_) => 404,
            Self::Violation(_) => 409,
            Self::Transport(TransportError::Timeout(_)) => 504,
            Self::Transport(_) | Self::Protocol(_) => 502,
            Self::Stopped => 503,
            Self::Config(_) => 500,
        }
    }
}

impl From<figment::Error> for PumpSrvError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
