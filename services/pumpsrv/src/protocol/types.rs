//! jsonPTS wire types
//!
//! Request:  `{ "Protocol": "jsonPTS", "Packets": [ { "Id", "Type", "Data" } ] }`
//! Response: `{ "Error": bool, "Packets": [ { "Type", "Data" } ] }`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Fixed protocol tag carried by every request envelope
pub const PROTOCOL_TAG: &str = "jsonPTS";

/// Packet kinds known to this service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    GetPumpsConfiguration,
    PumpsConfiguration,
    GetFuelGradesConfiguration,
    FuelGradesConfiguration,
    PumpGetStatus,
    PumpIdleStatus,
    PumpAuthorize,
    PumpFillingStatus,
    PumpStop,
}

impl PacketType {
    pub const ALL: [PacketType; 9] = [
        PacketType::GetPumpsConfiguration,
        PacketType::PumpsConfiguration,
        PacketType::GetFuelGradesConfiguration,
        PacketType::FuelGradesConfiguration,
        PacketType::PumpGetStatus,
        PacketType::PumpIdleStatus,
        PacketType::PumpAuthorize,
        PacketType::PumpFillingStatus,
        PacketType::PumpStop,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PacketType::GetPumpsConfiguration => "GetPumpsConfiguration",
            PacketType::PumpsConfiguration => "PumpsConfiguration",
            PacketType::GetFuelGradesConfiguration => "GetFuelGradesConfiguration",
            PacketType::FuelGradesConfiguration => "FuelGradesConfiguration",
            PacketType::PumpGetStatus => "PumpGetStatus",
            PacketType::PumpIdleStatus => "PumpIdleStatus",
            PacketType::PumpAuthorize => "PumpAuthorize",
            PacketType::PumpFillingStatus => "PumpFillingStatus",
            PacketType::PumpStop => "PumpStop",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PacketType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PacketType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownType(s.to_string()))
    }
}

/// Outbound envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestEnvelope {
    pub protocol: String,
    pub packets: Vec<RequestPacket>,
}

/// One outbound packet; `Type` stays a string so unknown kinds survive a round-trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestPacket {
    pub id: u32,
    #[serde(rename = "Type")]
    pub packet_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

/// Inbound envelope
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub error: bool,
    /// `None` when the controller omitted the field entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packets: Option<Vec<ResponsePacket>>,
}

/// One inbound packet
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponsePacket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub packet_type: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ResponsePacket {
    /// Successful packet of the given kind
    pub fn new(packet_type: PacketType, data: Value) -> Self {
        Self {
            packet_type: Some(packet_type.as_str().to_string()),
            data,
            ..Default::default()
        }
    }

    /// The request packet returned unchanged
    pub fn echo(request: &RequestPacket) -> Self {
        Self {
            id: Some(request.id),
            packet_type: Some(request.packet_type.clone()),
            data: request.data.clone(),
            ..Default::default()
        }
    }
}

/// A decoded result: recognized kind plus its raw payload
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPacket {
    pub packet_type: PacketType,
    pub data: Value,
}
