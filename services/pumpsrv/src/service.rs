//! Pump service: configuration → transport → registry → scheduler
//!
//! The two entry points external collaborators use are [`PumpService::snapshot`]
//! and [`PumpService::submit_command`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{ControllerMode, PumpSrvConfig};
use crate::error::{ProtocolError, PumpSrvError, Result};
use crate::protocol::payload::{parse, FuelGradesConfiguration, PumpsConfiguration};
use crate::protocol::{Command, PacketCodec, PacketType, ResultPacket};
use crate::pump::{Grade, Pump, PumpId, PumpRegistry, Snapshot};
use crate::scheduler::{PollScheduler, PollStats, PumpCommand};
use crate::simulator::ControllerSimulator;
use crate::transport::{HttpTransport, SimulatorTransport, Transport};

#[derive(Debug, Clone)]
pub struct PumpService {
    config: Arc<PumpSrvConfig>,
    registry: Arc<PumpRegistry>,
    scheduler: PollScheduler,
    token: CancellationToken,
}

/// What the controller reported during a configuration exchange
#[derive(Debug, Default)]
struct ControllerLayout {
    pumps: Option<Vec<PumpId>>,
    grades: Option<Vec<(usize, Grade)>>,
}

impl PumpService {
    /// Build the transport named by `controller.mode` and wire the service
    pub fn new(config: PumpSrvConfig, token: CancellationToken) -> Result<Self> {
        let transport: Arc<dyn Transport> = match config.controller.mode {
            ControllerMode::Http => {
                let http = HttpTransport::new(&config.controller)?;
                info!("Controller transport ready: {}", http.url());
                Arc::new(http)
            },
            ControllerMode::Simulator => {
                let simulator = ControllerSimulator::new(&config.simulator);
                info!(
                    "Controller transport ready: simulator (latency {}ms, demo price {})",
                    simulator.latency().as_millis(),
                    simulator.demo_price()
                );
                Arc::new(SimulatorTransport::new(Arc::new(simulator)))
            },
        };
        Ok(Self::with_transport(config, transport, token))
    }

    pub fn with_transport(
        config: PumpSrvConfig,
        transport: Arc<dyn Transport>,
        token: CancellationToken,
    ) -> Self {
        let registry = Arc::new(PumpRegistry::new());
        let scheduler = PollScheduler::new(
            Arc::clone(&registry),
            transport,
            PacketCodec::default(),
            Duration::from_millis(config.polling.interval_ms),
            token.clone(),
        );
        Self {
            config: Arc::new(config),
            registry,
            scheduler,
            token,
        }
    }

    pub fn config(&self) -> &PumpSrvConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PumpRegistry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    /// Ask the controller for its pumps and grades and populate the registry.
    ///
    /// Falls back to the static `pumps` list when the controller cannot be
    /// reached or does not enumerate pumps. Returns the number of pumps loaded.
    pub async fn load_configuration(&self) -> Result<usize> {
        self.scheduler
            .exchange(&configuration_commands(), |results| match results {
                Ok(results) => Ok(self.install(ControllerLayout::from_results(results), false)),
                Err(e @ (PumpSrvError::Transport(_) | PumpSrvError::Protocol(_))) => {
                    warn!("Controller configuration unavailable ({}), using static pumps", e);
                    Ok(self.install(ControllerLayout::default(), false))
                },
                Err(e) => Err(e),
            })
            .await
    }

    /// Re-read the controller configuration. Pumps that remain keep their live
    /// state; only their grade tables are replaced.
    pub async fn refresh_configuration(&self) -> Result<usize> {
        self.scheduler
            .exchange(&configuration_commands(), |results| {
                Ok(self.install(ControllerLayout::from_results(results?), true))
            })
            .await
    }

    pub fn snapshot(&self) -> Snapshot {
        self.registry.snapshot()
    }

    pub fn pump(&self, id: PumpId) -> Result<Pump> {
        self.registry.get(id).ok_or(PumpSrvError::PumpNotFound(id))
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.registry.subscribe()
    }

    pub async fn submit_command(&self, pump_id: PumpId, command: PumpCommand) -> Result<Pump> {
        self.scheduler.submit_command(pump_id, command).await
    }

    pub fn stats(&self) -> PollStats {
        self.scheduler.stats()
    }

    /// Start periodic polling unless disabled in configuration
    pub fn start(&self) {
        if self.config.polling.enabled {
            self.scheduler.start();
        } else {
            info!("Polling disabled by configuration");
        }
    }

    pub async fn shutdown(&self) {
        info!("Shutting down pump service");
        self.token.cancel();
        self.scheduler.stop().await;
    }

    /// Build pump records from `layout` and hand them to the registry
    fn install(&self, layout: ControllerLayout, preserve_live: bool) -> usize {
        let static_grades: HashMap<PumpId, &Vec<Grade>> = self
            .config
            .pumps
            .iter()
            .map(|p| (p.id, &p.grades))
            .collect();

        let ids: Vec<PumpId> = match layout.pumps {
            Some(ids) if !ids.is_empty() => ids,
            _ => {
                debug!("Controller did not enumerate pumps, using static list");
                self.config.pumps.iter().map(|p| p.id).collect()
            },
        };
        if ids.is_empty() {
            warn!("No pumps configured");
        }

        let slots = self.config.grade_slots;
        let pumps: Vec<Pump> = ids
            .into_iter()
            .map(|id| {
                let grades = grade_table(
                    slots,
                    layout.grades.as_deref(),
                    static_grades.get(&id).map(|g| g.as_slice()),
                );
                match self.registry.get(id) {
                    Some(existing) if preserve_live => existing.with_grades(grades),
                    _ => Pump::new(id, grades),
                }
            })
            .collect();

        let count = pumps.len();
        self.registry.load_configuration(pumps);
        count
    }
}

fn configuration_commands() -> [Command; 2] {
    [
        Command::GetPumpsConfiguration,
        Command::GetFuelGradesConfiguration,
    ]
}

/// Fixed-size grade table: controller grades by slot, else the static list
fn grade_table(
    slots: usize,
    controller: Option<&[(usize, Grade)]>,
    configured: Option<&[Grade]>,
) -> Vec<Grade> {
    let mut table = vec![Grade::default(); slots];
    match controller {
        Some(grades) if !grades.is_empty() => {
            for (slot, grade) in grades {
                match table.get_mut(slot.wrapping_sub(1)) {
                    Some(entry) => *entry = grade.clone(),
                    None => warn!(slot, slots, "Fuel grade outside the slot table, ignored"),
                }
            }
        },
        _ => {
            for (entry, grade) in table.iter_mut().zip(configured.unwrap_or_default()) {
                *entry = grade.clone();
            }
        },
    }
    table
}

impl ControllerLayout {
    fn from_results(results: Vec<std::result::Result<ResultPacket, ProtocolError>>) -> Self {
        let mut layout = Self::default();
        for result in results {
            let packet = match result {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Configuration result dropped: {}", e);
                    continue;
                },
            };
            match packet.packet_type {
                PacketType::PumpsConfiguration => {
                    match parse::<PumpsConfiguration>(packet.packet_type, &packet.data) {
                        Ok(config) => {
                            layout.pumps = Some(config.pumps.into_iter().map(|p| p.id).collect())
                        },
                        Err(e) => warn!("Configuration result dropped: {}", e),
                    }
                },
                PacketType::FuelGradesConfiguration => {
                    match parse::<FuelGradesConfiguration>(packet.packet_type, &packet.data) {
                        Ok(config) => {
                            layout.grades = Some(
                                config
                                    .fuel_grades
                                    .into_iter()
                                    .map(|g| (g.id, Grade::new(g.name, g.price)))
                                    .collect(),
                            )
                        },
                        Err(e) => warn!("Configuration result dropped: {}", e),
                    }
                },
                other => debug!(packet_type = %other, "Ignoring configuration reply packet"),
            }
        }
        layout
    }
}
