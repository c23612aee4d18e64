//! jsonPTS protocol: wire types, payloads and the envelope codec

pub mod codec;
pub mod payload;
pub mod types;

pub use codec::{Command, CommandTable, PacketCodec, PayloadBuilder};
pub use payload::{FillingStatus, IdleStatus, PumpReport};
pub use types::{
    PacketType, RequestEnvelope, RequestPacket, ResponseEnvelope, ResponsePacket, ResultPacket,
    PROTOCOL_TAG,
};
