//! Shared service plumbing for the fuel dispenser services
//!
//! Provides the pieces every service binary needs before it can talk to hardware:
//! - logging initialization (console + optional rolling file)
//! - graceful shutdown signal handling
//! - startup banner and service metadata

pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use logging::{LogConfig, LogFormat};
pub use service_bootstrap::ServiceInfo;
pub use shutdown::{shutdown_token, wait_for_shutdown};

// Re-export common dependencies
pub use tokio;
pub use tokio_util::sync::CancellationToken;
