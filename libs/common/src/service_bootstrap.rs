//! Service metadata and startup banner

use tracing::info;

/// Service metadata for startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "pumpsrv")
    pub name: String,
    /// Service version from the service crate's Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
    /// Default API port
    pub default_port: u16,
}

impl ServiceInfo {
    /// Create new service info; pass `env!("CARGO_PKG_VERSION")` from the service crate
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            default_port,
        }
    }
}

/// Print the startup banner through the logger
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = match service.name.as_str() {
        "pumpsrv" => {
            r#"
 ██████╗ ██╗   ██╗███╗   ███╗██████╗ ███████╗██████╗ ██╗   ██╗
 ██╔══██╗██║   ██║████╗ ████║██╔══██╗██╔════╝██╔══██╗██║   ██║
 ██████╔╝██║   ██║██╔████╔██║██████╔╝███████╗██████╔╝██║   ██║
 ██╔═══╝ ██║   ██║██║╚██╔╝██║██╔═══╝ ╚════██║██╔══██╗╚██╗ ██╔╝
 ██║     ╚██████╔╝██║ ╚═╝ ██║██║     ███████║██║  ██║ ╚████╔╝
 ╚═╝      ╚═════╝ ╚═╝     ╚═╝╚═╝     ╚══════╝╚═╝  ╚═╝  ╚═══╝
            "#
        },
        _ => "",
    };

    if !banner.is_empty() {
        info!("{}", banner);
    }
    info!(" {} v{}", service.name.to_uppercase(), service.version);
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
}
