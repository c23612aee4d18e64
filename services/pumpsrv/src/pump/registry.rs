//! Shared pump store
//!
//! One writer (the scheduler, while it holds the exchange gate) replaces whole
//! records; any number of readers take [`Snapshot`]s or subscribe to changes.
//! Each publish swaps in a new `Arc<Vec<Pump>>`, so a snapshot never changes
//! after it has been handed out.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::model::{Pump, PumpId};

/// Point-in-time view of every pump, in configuration order
pub type Snapshot = Arc<Vec<Pump>>;

#[derive(Debug)]
pub struct PumpRegistry {
    tx: watch::Sender<Snapshot>,
    closed: AtomicBool,
}

impl Default for PumpRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PumpRegistry {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Vec::new()));
        Self {
            tx,
            closed: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    pub fn get(&self, id: PumpId) -> Option<Pump> {
        self.tx.borrow().iter().find(|p| p.id == id).cloned()
    }

    pub fn pump_ids(&self) -> Vec<PumpId> {
        self.tx.borrow().iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_empty()
    }

    /// Replace the record for `id`. Unknown ids are ignored.
    pub fn upsert(&self, id: PumpId, pump: Pump) -> bool {
        if pump.id != id {
            warn!(pump_id = id, record_id = pump.id, "Refusing upsert with mismatched id");
            return false;
        }
        self.apply(vec![pump]) == 1
    }

    /// Replace several records with a single publish; returns how many landed
    pub fn apply(&self, updates: Vec<Pump>) -> usize {
        if updates.is_empty() || self.is_closed() {
            return 0;
        }

        let now = Utc::now();
        let mut applied = 0;
        self.tx.send_if_modified(|current| {
            let mut next = current.as_ref().clone();
            for mut update in updates {
                match next.iter_mut().find(|p| p.id == update.id) {
                    Some(slot) => {
                        update.updated_at = Some(now);
                        *slot = update;
                        applied += 1;
                    },
                    None => debug!(pump_id = update.id, "Dropping update for unknown pump"),
                }
            }
            if applied == 0 {
                return false;
            }
            *current = Arc::new(next);
            true
        });
        applied
    }

    /// Replace the whole contents. The only operation that adds or removes ids.
    pub fn load_configuration(&self, pumps: Vec<Pump>) {
        if self.is_closed() {
            return;
        }

        let mut seen = HashSet::new();
        let pumps: Vec<Pump> = pumps
            .into_iter()
            .filter(|p| {
                let fresh = seen.insert(p.id);
                if !fresh {
                    warn!(pump_id = p.id, "Duplicate pump in configuration, keeping first");
                }
                fresh
            })
            .collect();

        info!(pumps = pumps.len(), "Registry loaded");
        self.tx.send_replace(Arc::new(pumps));
    }

    /// Receiver that observes every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Make every later write a no-op
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Registry closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
