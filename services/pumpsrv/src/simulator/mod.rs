//! Controller simulator for offline and demo operation

pub mod controller;
pub mod server;

pub use controller::ControllerSimulator;
