//! Pump model, transition logic and the shared registry

pub mod model;
pub mod registry;
pub mod state_machine;

pub use model::{Grade, Pump, PumpId, PumpStatus};
pub use registry::{PumpRegistry, Snapshot};
pub use state_machine::{transition, PumpEvent};
