//! Fuel dispenser communication service
//!
//! Talks jsonPTS to a pump controller (or the built-in simulator), keeps an
//! in-memory model of every pump up to date by periodic polling, and exposes
//! snapshot reads and command submission to the rest of the point of sale.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod protocol;
pub mod pump;
pub mod scheduler;
pub mod service;
pub mod simulator;
pub mod transport;

pub use error::{ProtocolError, ProtocolViolation, PumpSrvError, Result, TransportError};
pub use scheduler::{PollOutcome, PollScheduler, PollStats, PumpCommand};
pub use service::PumpService;
