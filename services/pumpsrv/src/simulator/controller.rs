//! jsonPTS controller simulator
//!
//! Answers envelopes the way a controller would, with random sale figures.
//! It never fails: unknown or unparsable packets are echoed back unchanged.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::SimulatorConfig;
use crate::protocol::payload::{
    parse, FillingStatus, IdleStatus, PumpAuthorizeRequest, PumpGetStatusRequest, PumpStopRequest,
};
use crate::protocol::{PacketType, RequestEnvelope, RequestPacket, ResponseEnvelope, ResponsePacket};

pub const DEFAULT_LATENCY: Duration = Duration::from_millis(800);
pub const DEFAULT_DEMO_PRICE: f64 = 23.45;

/// Upper bound of the volume reported right after an authorize
pub const AUTHORIZE_MAX_VOLUME: f64 = 2.0;
/// Upper bound of the amount reported right after an authorize
pub const AUTHORIZE_MAX_AMOUNT: f64 = 50.0;
/// Upper bound of the last-sale volume reported after a stop
pub const STOP_MAX_VOLUME: f64 = 5.0;
/// Upper bound of the last-sale amount reported after a stop
pub const STOP_MAX_AMOUNT: f64 = 100.0;

pub struct ControllerSimulator {
    latency: Duration,
    demo_price: f64,
    rng: Mutex<Box<dyn RngCore + Send>>,
    next_transaction: AtomicU32,
}

impl fmt::Debug for ControllerSimulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerSimulator")
            .field("latency", &self.latency)
            .field("demo_price", &self.demo_price)
            .finish_non_exhaustive()
    }
}

impl ControllerSimulator {
    pub fn new(config: &SimulatorConfig) -> Self {
        let rng: Box<dyn RngCore + Send> = match config.seed {
            Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
            None => Box::new(StdRng::from_entropy()),
        };
        Self::with_rng(
            Duration::from_millis(config.latency_ms),
            config.demo_price,
            rng,
        )
    }

    /// Deterministic simulator with the default demo price
    pub fn seeded(latency: Duration, seed: u64) -> Self {
        Self::with_rng(
            latency,
            DEFAULT_DEMO_PRICE,
            Box::new(StdRng::seed_from_u64(seed)),
        )
    }

    /// Simulator drawing from an injected random source
    pub fn with_rng(latency: Duration, demo_price: f64, mut rng: Box<dyn RngCore + Send>) -> Self {
        let first_transaction = rng.gen_range(1..100_000);
        Self {
            latency,
            demo_price,
            rng: Mutex::new(rng),
            next_transaction: AtomicU32::new(first_transaction),
        }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn demo_price(&self) -> f64 {
        self.demo_price
    }

    /// Answer one envelope after the simulated hardware latency
    pub async fn handle(&self, envelope: &RequestEnvelope) -> ResponseEnvelope {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let packets = envelope.packets.iter().map(|p| self.answer(p)).collect();
        ResponseEnvelope {
            error: false,
            packets: Some(packets),
        }
    }

    fn answer(&self, request: &RequestPacket) -> ResponsePacket {
        let reply = match request.packet_type.parse::<PacketType>() {
            Ok(kind @ PacketType::PumpGetStatus) => parse::<PumpGetStatusRequest>(kind, &request.data)
                .ok()
                .map(|req| self.idle(req.pump, 0.0, 0.0)),
            Ok(kind @ PacketType::PumpAuthorize) => parse::<PumpAuthorizeRequest>(kind, &request.data)
                .ok()
                .map(|req| self.filling(&req)),
            Ok(kind @ PacketType::PumpStop) => parse::<PumpStopRequest>(kind, &request.data)
                .ok()
                .map(|req| self.stopped(req.pump)),
            _ => None,
        };

        match reply {
            Some(mut packet) => {
                packet.id = Some(request.id);
                trace!(request = %request.packet_type, "Simulator answered");
                packet
            },
            None => {
                debug!(request = %request.packet_type, "Simulator echoing packet");
                ResponsePacket::echo(request)
            },
        }
    }

    fn idle(&self, pump: u32, last_volume: f64, last_amount: f64) -> ResponsePacket {
        let status = IdleStatus {
            pump: Some(pump),
            nozzle_up: 0,
            last_price: self.demo_price,
            last_volume,
            last_amount,
            request: None,
            user: None,
        };
        ResponsePacket::new(PacketType::PumpIdleStatus, to_value(&status))
    }

    fn stopped(&self, pump: u32) -> ResponsePacket {
        let (volume, amount) = {
            let mut rng = self.rng.lock();
            (
                round2(rng.gen_range(0.0..=STOP_MAX_VOLUME)),
                round2(rng.gen_range(0.0..=STOP_MAX_AMOUNT)),
            )
        };
        self.idle(pump, volume, amount)
    }

    fn filling(&self, request: &PumpAuthorizeRequest) -> ResponsePacket {
        let (volume, amount) = {
            let mut rng = self.rng.lock();
            (
                round2(rng.gen_range(0.0..=AUTHORIZE_MAX_VOLUME)),
                round2(rng.gen_range(0.0..=AUTHORIZE_MAX_AMOUNT)),
            )
        };
        let status = FillingStatus {
            pump: Some(request.pump),
            transaction: self.next_transaction.fetch_add(1, Ordering::Relaxed),
            nozzle: request.nozzle,
            volume,
            amount,
            price: request.price,
            user: None,
        };
        ResponsePacket::new(PacketType::PumpFillingStatus, to_value(&status))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_value<T: serde::Serialize>(payload: &T) -> Value {
    serde_json::to_value(payload).unwrap_or(Value::Null)
}
