//! Fuel Dispenser Communication Service (`pumpsrv`)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tracing::{error, info};

use common::service_bootstrap::{print_startup_banner, ServiceInfo};
use pumpsrv::api::create_api_routes;
use pumpsrv::bootstrap::{self, Args};
use pumpsrv::config::{PumpSrvConfig, DEFAULT_PORT};
use pumpsrv::simulator::{server, ControllerSimulator};
use pumpsrv::PumpService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = PumpSrvConfig::load(args.config.as_deref())?;
    args.apply_overrides(&mut config);

    let service_info = ServiceInfo::new(
        "pumpsrv",
        env!("CARGO_PKG_VERSION"),
        "Fuel Dispenser Communication Service - jsonPTS",
        DEFAULT_PORT,
    );
    bootstrap::initialize_logging(&args, &service_info, &config.service.logging)?;
    if !args.no_color {
        print_startup_banner(&service_info);
    }

    // Validation mode: validate and exit
    if args.validate {
        bootstrap::validate_configuration(&config)?;
        return Ok(());
    }

    let shutdown_token = common::shutdown_token();

    // Simulator-only mode: stand in for a controller on the network
    if let Some(addr) = args.serve_simulator.as_deref() {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind simulator to {addr}"))?;
        let simulator = Arc::new(ControllerSimulator::new(&config.simulator));
        server::serve(listener, simulator, shutdown_token).await?;
        return Ok(());
    }

    let service = PumpService::new(config.clone(), shutdown_token.child_token())?;
    let pumps = service.load_configuration().await?;
    info!("Registry initialized with {} pump(s)", pumps);
    service.start();

    let server_handle = if config.service.api.enabled {
        let bind_address = bootstrap::determine_bind_address(
            args.bind_address.as_deref(),
            &config.service.api.bind_address,
        );
        let addr: SocketAddr = bind_address
            .parse()
            .with_context(|| format!("Invalid bind address '{bind_address}'"))?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {addr}"))?;

        info!("API server listening on http://{}", addr);
        info!("Health check: http://{}/health", addr);

        let app = create_api_routes(service.clone());
        let server_token = shutdown_token.clone();
        Some(tokio::spawn(async move {
            let shutdown = async move { server_token.cancelled().await };
            if let Err(e) = serve(listener, app).with_graceful_shutdown(shutdown).await {
                error!("Server error: {}", e);
            }
        }))
    } else {
        info!("API server disabled by configuration");
        None
    };

    // Wait for shutdown and cleanup
    shutdown_token.cancelled().await;
    service.shutdown().await;
    if let Some(handle) = server_handle {
        if let Err(e) = handle.await {
            error!("API server task failed: {}", e);
        }
    }

    info!("pumpsrv stopped");
    Ok(())
}
