//! Polling scheduler
//!
//! Owns the exchange gate: every envelope (periodic poll, out-of-band command,
//! configuration load) goes out while holding it, so at most one round-trip is
//! in flight and the registry has exactly one writer at a time. A tick that
//! finds the gate taken is skipped, not queued.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ProtocolError, PumpSrvError, Result, TransportError};
use crate::protocol::{Command, PacketCodec, PumpReport, ResultPacket};
use crate::pump::{transition, Pump, PumpEvent, PumpId, PumpRegistry};
use crate::transport::Transport;

/// Out-of-band command for a single pump
#[derive(Debug, Clone, PartialEq)]
pub enum PumpCommand {
    Authorize { nozzle: u8, price: f64 },
    Stop,
}

impl PumpCommand {
    fn to_command(&self, pump: PumpId) -> Command {
        match self {
            PumpCommand::Authorize { nozzle, price } => Command::PumpAuthorize {
                pump,
                nozzle: *nozzle,
                price: *price,
            },
            PumpCommand::Stop => Command::PumpStop { pump },
        }
    }
}

/// Result of one poll attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Another round-trip held the gate
    Skipped,
    /// No pumps registered
    Empty,
    /// Reply folded; counts are per pump
    Completed {
        applied: usize,
        rejected: usize,
        dropped: usize,
    },
    /// Envelope never made it; every pump was marked `NO_CONNECTION`
    Unreachable(TransportError),
    /// Reply could not be split into results at all
    Rejected(ProtocolError),
    /// Cancelled before the reply could be applied
    Stopped,
}

/// Counters since start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStats {
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub protocol_warnings: u64,
    pub violations: u64,
    pub commands: u64,
}

#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    protocol_warnings: AtomicU64,
    violations: AtomicU64,
    commands: AtomicU64,
}

#[derive(Debug)]
struct Inner {
    registry: Arc<PumpRegistry>,
    transport: Arc<dyn Transport>,
    codec: PacketCodec,
    gate: tokio::sync::Mutex<()>,
    interval: Duration,
    token: CancellationToken,
    counters: Counters,
    task: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Debug, Clone)]
pub struct PollScheduler {
    inner: Arc<Inner>,
}

impl PollScheduler {
    pub fn new(
        registry: Arc<PumpRegistry>,
        transport: Arc<dyn Transport>,
        codec: PacketCodec,
        interval: Duration,
        token: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                transport,
                codec,
                gate: tokio::sync::Mutex::new(()),
                interval,
                token,
                counters: Counters::default(),
                task: Mutex::new(None),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<PumpRegistry> {
        &self.inner.registry
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    pub fn stats(&self) -> PollStats {
        let c = &self.inner.counters;
        PollStats {
            completed: c.completed.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            protocol_warnings: c.protocol_warnings.load(Ordering::Relaxed),
            violations: c.violations.load(Ordering::Relaxed),
            commands: c.commands.load(Ordering::Relaxed),
        }
    }

    /// Spawn the timer task. Calling it twice is a no-op.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if task.is_some() || self.is_stopped() {
            return;
        }

        let scheduler = self.clone();
        let token = self.inner.token.clone();
        let period = self.inner.interval;
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Polling task started, interval {}ms", period.as_millis());

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        scheduler.poll_once().await;
                    }
                    () = token.cancelled() => {
                        info!("Polling task received cancellation signal, shutting down");
                        break;
                    }
                }
            }
        }));
    }

    /// Cancel the timer, wait for it to finish and close the registry
    pub async fn stop(&self) {
        self.inner.token.cancel();
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Polling task ended abnormally: {}", e);
            }
        }
        self.inner.registry.close();
        info!("Polling scheduler stopped");
    }

    /// Run one poll of every registered pump
    pub async fn poll_once(&self) -> PollOutcome {
        let inner = &self.inner;
        if inner.token.is_cancelled() {
            return PollOutcome::Stopped;
        }
        let Ok(_gate) = inner.gate.try_lock() else {
            inner.counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Poll skipped, exchange in flight");
            return PollOutcome::Skipped;
        };

        let snapshot = inner.registry.snapshot();
        if snapshot.is_empty() {
            return PollOutcome::Empty;
        }
        let commands: Vec<Command> = snapshot
            .iter()
            .map(|p| Command::PumpGetStatus { pump: p.id })
            .collect();

        let envelope = match inner.codec.encode(&commands) {
            Ok(envelope) => envelope,
            Err(e) => {
                inner.counters.protocol_warnings.fetch_add(1, Ordering::Relaxed);
                warn!("Poll envelope could not be built: {}", e);
                return PollOutcome::Rejected(e);
            },
        };

        let reply = tokio::select! {
            () = inner.token.cancelled() => return PollOutcome::Stopped,
            reply = inner.transport.send(&envelope) => reply,
        };
        if inner.token.is_cancelled() {
            return PollOutcome::Stopped;
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                inner.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(transport = inner.transport.name(), "Poll failed: {}", e);
                let updates = snapshot
                    .iter()
                    .filter_map(|p| transition(p, &PumpEvent::Unreachable).ok())
                    .collect();
                inner.registry.apply(updates);
                return PollOutcome::Unreachable(e);
            },
        };

        let results = match inner.codec.decode(&reply) {
            Ok(results) => results,
            Err(e) => {
                inner.counters.protocol_warnings.fetch_add(1, Ordering::Relaxed);
                warn!("Poll reply rejected: {}", e);
                return PollOutcome::Rejected(e);
            },
        };
        if results.len() > snapshot.len() {
            warn!(
                expected = snapshot.len(),
                received = results.len(),
                "Poll reply carries extra packets, ignoring the tail"
            );
        }

        let mut results = results.into_iter();
        let mut updates = Vec::with_capacity(snapshot.len());
        let (mut rejected, mut dropped) = (0, 0);
        for (position, previous) in snapshot.iter().enumerate() {
            let result = results
                .next()
                .unwrap_or(Err(ProtocolError::MissingResponse(position)));
            match self.fold(previous, result) {
                Ok(next) => updates.push(next),
                Err(PumpSrvError::Violation(_)) => rejected += 1,
                Err(_) => dropped += 1,
            }
        }

        let applied = inner.registry.apply(updates);
        inner.counters.completed.fetch_add(1, Ordering::Relaxed);
        debug!(applied, rejected, dropped, "Poll completed");
        PollOutcome::Completed {
            applied,
            rejected,
            dropped,
        }
    }

    /// Send one command for `pump_id` and fold the reply before returning.
    ///
    /// Waits for any round-trip in flight. The returned record is the pump as
    /// published after the reply was applied.
    pub async fn submit_command(&self, pump_id: PumpId, command: PumpCommand) -> Result<Pump> {
        let inner = &self.inner;
        let _gate = tokio::select! {
            () = inner.token.cancelled() => return Err(PumpSrvError::Stopped),
            gate = inner.gate.lock() => gate,
        };
        if inner.token.is_cancelled() {
            return Err(PumpSrvError::Stopped);
        }

        let previous = inner
            .registry
            .get(pump_id)
            .ok_or(PumpSrvError::PumpNotFound(pump_id))?;
        inner.counters.commands.fetch_add(1, Ordering::Relaxed);
        info!(pump_id, ?command, "Submitting pump command");

        let envelope = inner.codec.encode(&[command.to_command(pump_id)])?;
        let reply = tokio::select! {
            () = inner.token.cancelled() => return Err(PumpSrvError::Stopped),
            reply = inner.transport.send(&envelope) => reply,
        };
        if inner.token.is_cancelled() {
            return Err(PumpSrvError::Stopped);
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!(pump_id, "Command delivery failed: {}", e);
                if let Ok(next) = transition(&previous, &PumpEvent::Unreachable) {
                    inner.registry.upsert(pump_id, next);
                }
                return Err(e.into());
            },
        };

        let result = inner
            .codec
            .decode(&reply)?
            .into_iter()
            .next()
            .unwrap_or(Err(ProtocolError::MissingResponse(0)));
        let next = self.fold(&previous, result)?;
        if !inner.registry.upsert(pump_id, next.clone()) {
            warn!(pump_id, "Command reply not applied, registry closed");
            return Err(PumpSrvError::Stopped);
        }
        Ok(inner.registry.get(pump_id).unwrap_or(next))
    }

    /// Send `commands` under the gate and hand the outcome to `apply` while the
    /// gate is still held.
    ///
    /// Transport and decode failures are passed to `apply` as well, so a
    /// fallback that writes the registry cannot interleave with a poll fold.
    /// Only cancellation short-circuits with [`PumpSrvError::Stopped`].
    pub async fn exchange<T, F>(&self, commands: &[Command], apply: F) -> Result<T>
    where
        F: FnOnce(Result<Vec<std::result::Result<ResultPacket, ProtocolError>>>) -> Result<T>,
    {
        let inner = &self.inner;
        let _gate = tokio::select! {
            () = inner.token.cancelled() => return Err(PumpSrvError::Stopped),
            gate = inner.gate.lock() => gate,
        };
        if inner.token.is_cancelled() {
            return Err(PumpSrvError::Stopped);
        }

        let envelope = match inner.codec.encode(commands) {
            Ok(envelope) => envelope,
            Err(e) => return apply(Err(e.into())),
        };
        let reply = tokio::select! {
            () = inner.token.cancelled() => return Err(PumpSrvError::Stopped),
            reply = inner.transport.send(&envelope) => reply,
        };
        if inner.token.is_cancelled() {
            return Err(PumpSrvError::Stopped);
        }

        let results = reply
            .map_err(PumpSrvError::from)
            .and_then(|reply| inner.codec.decode(&reply).map_err(PumpSrvError::from));
        apply(results)
    }

    /// Resolve one positional result against `previous` and run the transition
    fn fold(
        &self,
        previous: &Pump,
        result: std::result::Result<ResultPacket, ProtocolError>,
    ) -> Result<Pump> {
        let counters = &self.inner.counters;
        let report = result.and_then(|packet| PumpReport::for_pump(&packet, previous.id));
        let report = match report {
            Ok(report) => report,
            Err(e) => {
                counters.protocol_warnings.fetch_add(1, Ordering::Relaxed);
                warn!(pump_id = previous.id, "Dropping status result: {}", e);
                return Err(e.into());
            },
        };

        transition(previous, &PumpEvent::Report(report)).map_err(|violation| {
            counters.violations.fetch_add(1, Ordering::Relaxed);
            warn!(pump_id = previous.id, "Protocol violation: {}", violation);
            violation.into()
        })
    }
}
