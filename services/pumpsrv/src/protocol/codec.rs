//! Envelope encoding and decoding
//!
//! The codec turns a list of [`Command`]s into a request envelope and a
//! response envelope into positional results. It does not interpret packet
//! semantics; that is left to the state machine and the service.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

use super::payload::{PumpAuthorizeRequest, PumpGetStatusRequest, PumpStopRequest};
use super::types::{
    PacketType, RequestEnvelope, RequestPacket, ResponseEnvelope, ResultPacket, PROTOCOL_TAG,
};
use crate::error::ProtocolError;
use crate::pump::PumpId;

/// A request the service can put on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetPumpsConfiguration,
    GetFuelGradesConfiguration,
    PumpGetStatus { pump: PumpId },
    PumpAuthorize { pump: PumpId, nozzle: u8, price: f64 },
    PumpStop { pump: PumpId },
}

impl Command {
    pub fn packet_type(&self) -> PacketType {
        match self {
            Command::GetPumpsConfiguration => PacketType::GetPumpsConfiguration,
            Command::GetFuelGradesConfiguration => PacketType::GetFuelGradesConfiguration,
            Command::PumpGetStatus { .. } => PacketType::PumpGetStatus,
            Command::PumpAuthorize { .. } => PacketType::PumpAuthorize,
            Command::PumpStop { .. } => PacketType::PumpStop,
        }
    }

    /// Target pump, if the command addresses one
    pub fn pump(&self) -> Option<PumpId> {
        match self {
            Command::PumpGetStatus { pump }
            | Command::PumpAuthorize { pump, .. }
            | Command::PumpStop { pump } => Some(*pump),
            Command::GetPumpsConfiguration | Command::GetFuelGradesConfiguration => None,
        }
    }
}

/// Builds the `Data` object for one command
pub type PayloadBuilder = Arc<dyn Fn(&Command) -> Result<Value, ProtocolError> + Send + Sync>;

/// Payload builders keyed by command type
#[derive(Clone, Default)]
pub struct CommandTable {
    builders: HashMap<PacketType, PayloadBuilder>,
}

impl CommandTable {
    /// Table with no builders
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builders for every request kind this service sends
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(PacketType::GetPumpsConfiguration, |_| Ok(Value::Null));
        table.register(PacketType::GetFuelGradesConfiguration, |_| Ok(Value::Null));
        table.register(PacketType::PumpGetStatus, |cmd| match cmd {
            Command::PumpGetStatus { pump } => to_data(
                PacketType::PumpGetStatus,
                &PumpGetStatusRequest { pump: *pump },
            ),
            other => Err(wrong_command(PacketType::PumpGetStatus, other)),
        });
        table.register(PacketType::PumpAuthorize, |cmd| match cmd {
            Command::PumpAuthorize {
                pump,
                nozzle,
                price,
            } => to_data(
                PacketType::PumpAuthorize,
                &PumpAuthorizeRequest {
                    pump: *pump,
                    nozzle: *nozzle,
                    price: *price,
                },
            ),
            other => Err(wrong_command(PacketType::PumpAuthorize, other)),
        });
        table.register(PacketType::PumpStop, |cmd| match cmd {
            Command::PumpStop { pump } => {
                to_data(PacketType::PumpStop, &PumpStopRequest { pump: *pump })
            },
            other => Err(wrong_command(PacketType::PumpStop, other)),
        });
        table
    }

    /// Install or replace the builder for `packet_type`
    pub fn register<F>(&mut self, packet_type: PacketType, builder: F) -> &mut Self
    where
        F: Fn(&Command) -> Result<Value, ProtocolError> + Send + Sync + 'static,
    {
        self.builders.insert(packet_type, Arc::new(builder));
        self
    }

    fn build(&self, command: &Command) -> Result<Value, ProtocolError> {
        let packet_type = command.packet_type();
        let builder = self
            .builders
            .get(&packet_type)
            .ok_or(ProtocolError::NoBuilder(packet_type))?;
        builder(command)
    }
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.builders.keys().map(PacketType::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("CommandTable").field("builders", &keys).finish()
    }
}

fn to_data<T: serde::Serialize>(packet_type: PacketType, data: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(data).map_err(|e| ProtocolError::BuildFailed {
        packet_type,
        reason: e.to_string(),
    })
}

fn wrong_command(packet_type: PacketType, command: &Command) -> ProtocolError {
    ProtocolError::BuildFailed {
        packet_type,
        reason: format!("builder received {}", command.packet_type()),
    }
}

/// Stateless envelope codec
#[derive(Debug, Clone)]
pub struct PacketCodec {
    table: CommandTable,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(CommandTable::standard())
    }
}

impl PacketCodec {
    pub fn new(table: CommandTable) -> Self {
        Self { table }
    }

    /// Build one envelope; packet ids run 1..=n in command order
    pub fn encode(&self, commands: &[Command]) -> Result<RequestEnvelope, ProtocolError> {
        let packets = commands
            .iter()
            .enumerate()
            .map(|(index, command)| -> Result<RequestPacket, ProtocolError> {
                Ok(RequestPacket {
                    id: index as u32 + 1,
                    packet_type: command.packet_type().as_str().to_string(),
                    data: self.table.build(command)?,
                })
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;

        trace!(packets = packets.len(), "Encoded request envelope");
        Ok(RequestEnvelope {
            protocol: PROTOCOL_TAG.to_string(),
            packets,
        })
    }

    /// Split a reply into per-position results.
    ///
    /// The outer error covers the whole envelope; the inner ones belong to a
    /// single position so the others stay aligned.
    pub fn decode(
        &self,
        envelope: &ResponseEnvelope,
    ) -> Result<Vec<Result<ResultPacket, ProtocolError>>, ProtocolError> {
        let packets = match &envelope.packets {
            Some(packets) => packets,
            None => return Err(ProtocolError::MissingPackets),
        };
        if envelope.error && packets.is_empty() {
            return Err(ProtocolError::EnvelopeRejected);
        }

        Ok(packets
            .iter()
            .enumerate()
            .map(|(position, packet)| -> Result<ResultPacket, ProtocolError> {
                let type_name = packet
                    .packet_type
                    .as_deref()
                    .ok_or(ProtocolError::MissingType(position))?;
                if packet.error {
                    return Err(ProtocolError::ControllerError {
                        packet_type: type_name.to_string(),
                        code: packet.code,
                        message: packet.message.clone().unwrap_or_default(),
                    });
                }
                Ok(ResultPacket {
                    packet_type: type_name.parse()?,
                    data: packet.data.clone(),
                })
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::protocol::ResponsePacket;
    use serde_json::json;

    #[test]
    fn test_encode_assigns_sequential_ids() {
        let codec = PacketCodec::default();
        let commands: Vec<Command> = (1..=4).map(|pump| Command::PumpGetStatus { pump }).collect();
        let envelope = codec.encode(&commands).unwrap();

        assert_eq!(envelope.protocol, "jsonPTS");
        let ids: Vec<u32> = envelope.packets.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(envelope.packets[2].data, json!({"Pump": 3}));
        assert_eq!(envelope.packets[2].packet_type, "PumpGetStatus");
    }

    #[test]
    fn test_encode_authorize_payload() {
        let codec = PacketCodec::default();
        let envelope = codec
            .encode(&[Command::PumpAuthorize {
                pump: 2,
                nozzle: 1,
                price: 23.45,
            }])
            .unwrap();
        assert_eq!(
            envelope.packets[0].data,
            json!({"Pump": 2, "Nozzle": 1, "Price": 23.45})
        );
    }

    #[test]
    fn test_encode_configuration_requests_have_no_data() {
        let codec = PacketCodec::default();
        let envelope = codec
            .encode(&[
                Command::GetPumpsConfiguration,
                Command::GetFuelGradesConfiguration,
            ])
            .unwrap();
        assert!(envelope.packets.iter().all(|p| p.data.is_null()));
    }

    #[test]
    fn test_empty_table_fails_with_no_builder() {
        let codec = PacketCodec::new(CommandTable::empty());
        assert_eq!(
            codec.encode(&[Command::PumpStop { pump: 1 }]),
            Err(ProtocolError::NoBuilder(PacketType::PumpStop))
        );
    }

    #[test]
    fn test_injected_builder_is_used() {
        let mut table = CommandTable::standard();
        table.register(PacketType::PumpStop, |cmd| {
            Ok(json!({"Pump": cmd.pump(), "Force": true}))
        });
        let codec = PacketCodec::new(table);
        let envelope = codec.encode(&[Command::PumpStop { pump: 5 }]).unwrap();
        assert_eq!(envelope.packets[0].data, json!({"Pump": 5, "Force": true}));
    }

    #[test]
    fn test_round_trip_through_echo() {
        let codec = PacketCodec::default();
        let request = codec
            .encode(&[
                Command::PumpGetStatus { pump: 1 },
                Command::PumpStop { pump: 2 },
            ])
            .unwrap();
        let reply = ResponseEnvelope {
            error: false,
            packets: Some(request.packets.iter().map(ResponsePacket::echo).collect()),
        };
        let decoded = codec.decode(&reply).unwrap();
        assert_eq!(decoded.len(), 2);
        let first = decoded[0].as_ref().unwrap();
        assert_eq!(first.packet_type, PacketType::PumpGetStatus);
        assert_eq!(first.data, json!({"Pump": 1}));
        assert_eq!(
            decoded[1].as_ref().unwrap().packet_type,
            PacketType::PumpStop
        );
    }

    #[test]
    fn test_decode_missing_packets() {
        let codec = PacketCodec::default();
        let reply = ResponseEnvelope {
            error: false,
            packets: None,
        };
        assert_eq!(codec.decode(&reply), Err(ProtocolError::MissingPackets));
    }

    #[test]
    fn test_decode_rejected_envelope() {
        let codec = PacketCodec::default();
        let reply = ResponseEnvelope {
            error: true,
            packets: Some(vec![]),
        };
        assert_eq!(codec.decode(&reply), Err(ProtocolError::EnvelopeRejected));
    }

    #[test]
    fn test_decode_keeps_positions_aligned() {
        let codec = PacketCodec::default();
        let reply: ResponseEnvelope = serde_json::from_value(json!({
            "Error": false,
            "Packets": [
                {"Type": "PumpIdleStatus", "Data": {"Pump": 1}},
                {"Type": "PumpWobble", "Data": {}},
                {"Data": {}},
                {"Type": "PumpStop", "Error": true, "Code": 4, "Message": "locked"},
                {"Type": "PumpFillingStatus", "Data": {"Pump": 5, "Transaction": 1}}
            ]
        }))
        .unwrap();

        let decoded = codec.decode(&reply).unwrap();
        assert_eq!(decoded.len(), 5);
        assert!(decoded[0].is_ok());
        assert_eq!(
            decoded[1],
            Err(ProtocolError::UnknownType("PumpWobble".into()))
        );
        assert_eq!(decoded[2], Err(ProtocolError::MissingType(2)));
        assert!(matches!(
            &decoded[3],
            Err(ProtocolError::ControllerError { code: Some(4), message, .. }) if message == "locked"
        ));
        assert_eq!(
            decoded[4].as_ref().unwrap().packet_type,
            PacketType::PumpFillingStatus
        );
    }
}
