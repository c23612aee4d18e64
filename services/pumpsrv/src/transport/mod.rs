//! Controller transports

pub mod http;
pub mod simulator;
pub mod traits;

pub use http::HttpTransport;
pub use simulator::SimulatorTransport;
pub use traits::Transport;
