//! In-process transport backed by the controller simulator

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::traits::Transport;
use crate::error::TransportError;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};
use crate::simulator::ControllerSimulator;

/// Hands envelopes straight to a [`ControllerSimulator`].
///
/// Delivery can be switched off to drive the unreachable-controller paths.
#[derive(Debug)]
pub struct SimulatorTransport {
    simulator: Arc<ControllerSimulator>,
    delivering: AtomicBool,
}

impl SimulatorTransport {
    pub fn new(simulator: Arc<ControllerSimulator>) -> Self {
        Self {
            simulator,
            delivering: AtomicBool::new(true),
        }
    }

    pub fn set_delivery(&self, enabled: bool) {
        debug!(enabled, "Simulator delivery switched");
        self.delivering.store(enabled, Ordering::SeqCst);
    }

    pub fn is_delivering(&self) -> bool {
        self.delivering.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for SimulatorTransport {
    fn name(&self) -> &str {
        "simulator"
    }

    async fn send(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError> {
        if !self.is_delivering() {
            return Err(TransportError::Disabled(self.name().to_string()));
        }
        Ok(self.simulator.handle(envelope).await)
    }
}
