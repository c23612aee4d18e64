//! Pump records as published to readers
//!
//! A [`Pump`] is never mutated in place once published; every update builds a
//! new record and the registry swaps it in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Controller-assigned pump number
pub type PumpId = u32;

/// Observed pump state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PumpStatus {
    /// Configured but never successfully polled
    #[default]
    Offline,
    /// Last poll could not reach the controller
    NoConnection,
    Idle,
    NozzleUp,
    Filling,
}

impl PumpStatus {
    pub const ALL: [PumpStatus; 5] = [
        PumpStatus::Offline,
        PumpStatus::NoConnection,
        PumpStatus::Idle,
        PumpStatus::NozzleUp,
        PumpStatus::Filling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PumpStatus::Offline => "OFFLINE",
            PumpStatus::NoConnection => "NO_CONNECTION",
            PumpStatus::Idle => "IDLE",
            PumpStatus::NozzleUp => "NOZZLE_UP",
            PumpStatus::Filling => "FILLING",
        }
    }

    /// States in which a sale is open and a transaction id must be present
    pub fn has_open_sale(&self) -> bool {
        matches!(self, PumpStatus::NozzleUp | PumpStatus::Filling)
    }
}

impl fmt::Display for PumpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fuel grade slot on a pump
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Grade {
    pub name: String,
    pub price: f64,
}

impl Grade {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
        }
    }
}

/// Latest known state of one dispenser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pump {
    pub id: PumpId,
    pub status: PumpStatus,
    /// Nozzle in use, 0 when none is raised
    pub nozzle: u8,
    /// Current sale volume while filling
    pub volume: f64,
    /// Current sale amount while filling
    pub amount: f64,
    /// Unit price of the active or last grade
    pub price: f64,
    pub last_price: f64,
    pub last_volume: f64,
    pub last_amount: f64,
    pub transaction_id: Option<u32>,
    /// Fixed-size grade table, only replaced by a configuration load
    pub grades: Vec<Grade>,
    /// Attendant reported by the controller (advisory)
    pub current_user: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Pump {
    /// A freshly configured pump, `OFFLINE` until its first successful poll
    pub fn new(id: PumpId, grades: Vec<Grade>) -> Self {
        Self {
            id,
            status: PumpStatus::Offline,
            nozzle: 0,
            volume: 0.0,
            amount: 0.0,
            price: 0.0,
            last_price: 0.0,
            last_volume: 0.0,
            last_amount: 0.0,
            transaction_id: None,
            grades,
            current_user: None,
            updated_at: None,
        }
    }

    /// Copy of this pump with a new grade table, live state untouched
    pub fn with_grades(&self, grades: Vec<Grade>) -> Self {
        Self {
            grades,
            ..self.clone()
        }
    }
}
