//! Test Common Utilities
//!
//! Builders shared by the pumpsrv integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use pumpsrv::config::{ControllerMode, PumpSrvConfig, StaticPump};
use pumpsrv::pump::Grade;
use pumpsrv::simulator::ControllerSimulator;
use pumpsrv::transport::SimulatorTransport;
use pumpsrv::PumpService;
use tokio_util::sync::CancellationToken;

pub const SEED: u64 = 7;

/// Simulator-mode config with the given static pumps and no latency
pub fn simulator_config(ids: &[u32]) -> PumpSrvConfig {
    let mut config = PumpSrvConfig::default();
    config.controller.mode = ControllerMode::Simulator;
    config.simulator.latency_ms = 0;
    config.simulator.seed = Some(SEED);
    config.polling.interval_ms = 100;
    config.pumps = ids
        .iter()
        .map(|id| StaticPump {
            id: *id,
            grades: vec![Grade::new("Super 95", 23.45), Grade::new("Diesel", 21.9)],
        })
        .collect();
    config
}

/// Service backed by an in-process simulator whose delivery the test controls
pub async fn simulator_service(ids: &[u32]) -> (PumpService, Arc<SimulatorTransport>) {
    simulator_service_with_latency(ids, Duration::ZERO).await
}

pub async fn simulator_service_with_latency(
    ids: &[u32],
    latency: Duration,
) -> (PumpService, Arc<SimulatorTransport>) {
    let transport = Arc::new(SimulatorTransport::new(Arc::new(
        ControllerSimulator::seeded(latency, SEED),
    )));
    let service = PumpService::with_transport(
        simulator_config(ids),
        transport.clone(),
        CancellationToken::new(),
    );
    service.load_configuration().await.unwrap();
    (service, transport)
}
