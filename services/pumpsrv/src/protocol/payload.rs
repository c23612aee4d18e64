//! Typed `Data` payloads for each packet kind

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{PacketType, ResultPacket};
use crate::error::ProtocolError;
use crate::pump::PumpId;

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PumpGetStatusRequest {
    pub pump: PumpId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PumpAuthorizeRequest {
    pub pump: PumpId,
    pub nozzle: u8,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PumpStopRequest {
    pub pump: PumpId,
}

// ============================================================================
// Response payloads
// ============================================================================

/// `PumpIdleStatus` data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdleStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump: Option<PumpId>,
    /// Raised nozzle, 0 when all nozzles are hung up
    #[serde(default)]
    pub nozzle_up: u8,
    #[serde(default)]
    pub last_price: f64,
    #[serde(default)]
    pub last_volume: f64,
    #[serde(default)]
    pub last_amount: f64,
    /// Pending request marker, opaque to this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// `PumpFillingStatus` data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FillingStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pump: Option<PumpId>,
    pub transaction: u32,
    #[serde(default)]
    pub nozzle: u8,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfiguredPump {
    pub id: PumpId,
}

/// `PumpsConfiguration` data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PumpsConfiguration {
    #[serde(default)]
    pub pumps: Vec<ConfiguredPump>,
}

/// One grade slot; `Id` is 1-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfiguredGrade {
    pub id: usize,
    pub name: String,
    #[serde(default)]
    pub price: f64,
}

/// `FuelGradesConfiguration` data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FuelGradesConfiguration {
    #[serde(default)]
    pub fuel_grades: Vec<ConfiguredGrade>,
}

/// Deserialize a payload, tagging failures with the packet kind
pub fn parse<T: serde::de::DeserializeOwned>(
    packet_type: PacketType,
    data: &Value,
) -> Result<T, ProtocolError> {
    T::deserialize(data).map_err(|e| ProtocolError::MalformedPayload {
        packet_type,
        reason: e.to_string(),
    })
}

/// A status result resolved for one pump
#[derive(Debug, Clone, PartialEq)]
pub enum PumpReport {
    Idle(IdleStatus),
    Filling(FillingStatus),
}

impl PumpReport {
    pub fn packet_type(&self) -> PacketType {
        match self {
            PumpReport::Idle(_) => PacketType::PumpIdleStatus,
            PumpReport::Filling(_) => PacketType::PumpFillingStatus,
        }
    }

    /// Interpret a result packet as the status of `expected`.
    ///
    /// Rejects non-status kinds, negative or non-finite counters, and
    /// payloads whose `Pump` field names a different pump.
    pub fn for_pump(packet: &ResultPacket, expected: PumpId) -> Result<Self, ProtocolError> {
        let (reported, report) = match packet.packet_type {
            PacketType::PumpIdleStatus => {
                let status: IdleStatus = parse(packet.packet_type, &packet.data)?;
                check_counters(
                    packet.packet_type,
                    &[
                        ("LastPrice", status.last_price),
                        ("LastVolume", status.last_volume),
                        ("LastAmount", status.last_amount),
                    ],
                )?;
                (status.pump, PumpReport::Idle(status))
            },
            PacketType::PumpFillingStatus => {
                let status: FillingStatus = parse(packet.packet_type, &packet.data)?;
                check_counters(
                    packet.packet_type,
                    &[
                        ("Volume", status.volume),
                        ("Amount", status.amount),
                        ("Price", status.price),
                    ],
                )?;
                (status.pump, PumpReport::Filling(status))
            },
            other => {
                return Err(ProtocolError::UnexpectedType {
                    expected: "PumpIdleStatus or PumpFillingStatus".to_string(),
                    actual: other,
                })
            },
        };

        match reported {
            Some(reported) if reported != expected => {
                Err(ProtocolError::PumpMismatch { expected, reported })
            },
            _ => Ok(report),
        }
    }
}

fn check_counters(packet_type: PacketType, fields: &[(&str, f64)]) -> Result<(), ProtocolError> {
    for (name, value) in fields {
        if !value.is_finite() || *value < 0.0 {
            return Err(ProtocolError::MalformedPayload {
                packet_type,
                reason: format!("{name} must be a non-negative number, got {value}"),
            });
        }
    }
    Ok(())
}
