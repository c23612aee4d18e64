//! Service Bootstrap and Initialization
//!
//! Command-line arguments, logging setup and configuration validation for the
//! pumpsrv binary.

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::{ControllerMode, LoggingConfig, PumpSrvConfig};
use crate::error::{PumpSrvError, Result};
use common::service_bootstrap::ServiceInfo;
use common::{LogConfig, LogFormat};

/// Command-line arguments for pumpsrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pumpsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Fuel Dispenser Communication Service",
    long_about = None
)]
pub struct Args {
    /// Configuration file (YAML)
    #[arg(short = 'c', long, env = "PUMPSRV_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Bind address for the API server
    #[arg(short = 'b', long)]
    pub bind_address: Option<String>,

    /// Talk to the built-in simulator instead of a controller
    #[arg(long)]
    pub simulator: bool,

    /// Only serve the simulator over HTTP on this address (e.g. 127.0.0.1:8085)
    #[arg(long, value_name = "ADDR")]
    pub serve_simulator: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Validation mode - only validate configuration without starting service
    #[arg(long)]
    pub validate: bool,
}

impl Args {
    pub fn parse_log_level(level: &str) -> tracing::Level {
        match level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }

    /// Fold command-line overrides into the loaded configuration
    pub fn apply_overrides(&self, config: &mut PumpSrvConfig) {
        if self.simulator {
            config.controller.mode = ControllerMode::Simulator;
        }
        if let Some(level) = &self.log_level {
            config.service.logging.level = level.clone();
        }
    }
}

/// Initialize logging from the `service.logging` section
pub fn initialize_logging(
    args: &Args,
    service_info: &ServiceInfo,
    logging: &LoggingConfig,
) -> Result<()> {
    let format = match logging.format.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    };
    let level = args.log_level.as_deref().unwrap_or(&logging.level);

    let log_config = LogConfig {
        service_name: service_info.name.clone(),
        console_level: Args::parse_log_level(level),
        log_dir: logging.dir.as_ref().map(PathBuf::from),
        format,
        ansi: !args.no_color,
    };

    common::logging::init_with_config(log_config)
        .map_err(|e| PumpSrvError::config(format!("Failed to init logging: {}", e)))
}

/// Log what the loaded configuration will do
pub fn validate_configuration(config: &PumpSrvConfig) -> Result<()> {
    debug!("Validating configuration");
    config.validate()?;

    info!("Service: {}", config.service.name);
    match config.controller.mode {
        ControllerMode::Http => info!(
            "Controller: {} (user {}, timeout {}ms)",
            config.controller.url, config.controller.username, config.controller.timeout_ms
        ),
        ControllerMode::Simulator => info!(
            "Controller: simulator (latency {}ms, demo price {})",
            config.simulator.latency_ms, config.simulator.demo_price
        ),
    }
    info!(
        "Polling: {} every {}ms",
        if config.polling.enabled { "enabled" } else { "disabled" },
        config.polling.interval_ms
    );
    info!("Found {} static pump(s), {} grade slot(s)", config.pumps.len(), config.grade_slots);
    for pump in &config.pumps {
        info!("  Pump {}: {} grade(s)", pump.id, pump.grades.len());
    }

    info!("Configuration validation completed successfully");
    Ok(())
}

/// Determine bind address. Priority: CLI > config
pub fn determine_bind_address(cli_arg: Option<&str>, config_bind: &str) -> String {
    match cli_arg {
        Some(addr) => {
            info!("Using bind address from command line: {}", addr);
            addr.to_string()
        },
        None => config_bind.to_string(),
    }
}
