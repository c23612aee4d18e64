//! Service configuration
//!
//! Layered with figment: compiled defaults, then the YAML file, then
//! `PUMPSRV_` environment variables (`__` separates nested keys, e.g.
//! `PUMPSRV_CONTROLLER__URL`).

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::{PumpSrvError, Result};
use crate::pump::{Grade, PumpId};

pub const DEFAULT_CONFIG_PATH: &str = "config/pumpsrv.yaml";
pub const DEFAULT_PORT: u16 = 6010;
pub const ENV_PREFIX: &str = "PUMPSRV_";
pub const DEFAULT_GRADE_SLOTS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PumpSrvConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub simulator: SimulatorConfig,

    /// Grade slots per pump when the controller does not say otherwise
    #[serde(default = "default_grade_slots")]
    pub grade_slots: usize,

    /// Pumps to use when the controller does not enumerate any
    #[serde(default)]
    pub pumps: Vec<StaticPump>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Consumer API server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_api_bind")]
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files
    pub dir: Option<String>,

    /// `text` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerMode {
    #[default]
    Http,
    Simulator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub mode: ControllerMode,

    #[serde(default = "default_controller_url")]
    pub url: String,

    #[serde(default = "default_credential")]
    pub username: String,

    #[serde(default = "default_credential")]
    pub password: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Controllers ship with self-signed certificates
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    #[serde(default = "default_demo_price")]
    pub demo_price: f64,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

/// Statically configured pump
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticPump {
    pub id: PumpId,

    #[serde(default)]
    pub grades: Vec<Grade>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_service_name() -> String {
    "pumpsrv".to_string()
}

fn default_api_bind() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_controller_url() -> String {
    "https://192.168.1.117/jsonPTS".to_string()
}

fn default_credential() -> String {
    "admin".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_latency_ms() -> u64 {
    800
}

fn default_demo_price() -> f64 {
    23.45
}

fn default_grade_slots() -> usize {
    DEFAULT_GRADE_SLOTS
}

// Default implementations
impl Default for PumpSrvConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            controller: ControllerConfig::default(),
            polling: PollingConfig::default(),
            simulator: SimulatorConfig::default(),
            grade_slots: default_grade_slots(),
            pumps: Vec::new(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            api: ApiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_api_bind(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
            format: default_log_format(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            mode: ControllerMode::Http,
            url: default_controller_url(),
            username: default_credential(),
            password: default_credential(),
            timeout_ms: default_timeout_ms(),
            accept_invalid_certs: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            demo_price: default_demo_price(),
            seed: None,
        }
    }
}

impl PumpSrvConfig {
    /// Load defaults → YAML → environment, then validate.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.exists() => {
                return Err(PumpSrvError::config(format!(
                    "Config file not found: {}",
                    path.display()
                )))
            },
            Some(path) => path.to_path_buf(),
            None => Path::new(DEFAULT_CONFIG_PATH).to_path_buf(),
        };
        debug!("Loading configuration from {}", file.display());

        let config: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Yaml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(PumpSrvError::config("polling.interval_ms must be > 0"));
        }
        if self.controller.timeout_ms == 0 {
            return Err(PumpSrvError::config("controller.timeout_ms must be > 0"));
        }
        if self.controller.mode == ControllerMode::Http && self.controller.url.trim().is_empty() {
            return Err(PumpSrvError::config(
                "controller.url is required in http mode",
            ));
        }
        if self.grade_slots == 0 {
            return Err(PumpSrvError::config("grade_slots must be > 0"));
        }

        let mut seen = HashSet::new();
        for pump in &self.pumps {
            if !seen.insert(pump.id) {
                return Err(PumpSrvError::config(format!(
                    "Duplicate pump id {} in pumps",
                    pump.id
                )));
            }
            if pump.grades.len() > self.grade_slots {
                return Err(PumpSrvError::config(format!(
                    "Pump {} lists {} grades, only {} slots available",
                    pump.id,
                    pump.grades.len(),
                    self.grade_slots
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = PumpSrvConfig::default();
        assert_eq!(config.polling.interval_ms, 1000);
        assert_eq!(config.simulator.latency_ms, 800);
        assert_eq!(config.simulator.demo_price, 23.45);
        assert_eq!(config.controller.url, "https://192.168.1.117/jsonPTS");
        assert_eq!(config.controller.username, "admin");
        assert_eq!(config.grade_slots, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml_overrides_defaults() {
        let file = write_yaml(
            r#"
controller:
  mode: simulator
polling:
  interval_ms: 250
simulator:
  latency_ms: 0
  seed: 42
pumps:
  - id: 1
    grades:
      - { name: "Diesel", price: 21.9 }
  - id: 2
"#,
        );
        let config = PumpSrvConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.controller.mode, ControllerMode::Simulator);
        assert_eq!(config.polling.interval_ms, 250);
        assert_eq!(config.simulator.seed, Some(42));
        assert_eq!(config.pumps.len(), 2);
        assert_eq!(config.pumps[0].grades[0], Grade::new("Diesel", 21.9));
        // untouched sections keep their defaults
        assert_eq!(config.controller.timeout_ms, 5000);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = PumpSrvConfig::load(Some(Path::new("/nonexistent/pumpsrv.yaml"))).unwrap_err();
        assert!(matches!(err, PumpSrvError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = PumpSrvConfig::default();
        config.polling.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_url_in_http_mode() {
        let mut config = PumpSrvConfig::default();
        config.controller.url = "  ".into();
        assert!(config.validate().is_err());

        config.controller.mode = ControllerMode::Simulator;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicate_pumps() {
        let mut config = PumpSrvConfig::default();
        config.pumps = vec![
            StaticPump {
                id: 1,
                grades: vec![],
            },
            StaticPump {
                id: 1,
                grades: vec![],
            },
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate pump id 1"));
    }

    #[test]
    fn test_validate_rejects_too_many_grades() {
        let mut config = PumpSrvConfig::default();
        config.grade_slots = 1;
        config.pumps = vec![StaticPump {
            id: 1,
            grades: vec![Grade::new("A", 1.0), Grade::new("B", 2.0)],
        }];
        assert!(config.validate().is_err());
    }
}
