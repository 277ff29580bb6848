//! Modbus gateway service entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use modgw::bridge::IngestBridge;
use modgw::protocols::modbus::ModbusTcpServer;
use modgw::{GatewayConfig, MeterStore, RegisterMap};

/// Modbus/TCP gateway exposing live MQTT telemetry as holding registers
#[derive(Parser, Debug)]
#[command(name = "modgw", version, about)]
struct Args {
    /// Path to the gateway configuration file
    #[arg(short, long, default_value = "config/modgw.yaml")]
    config: String,

    /// Log filter, e.g. `info` or `modgw=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Override the configured listen address as `host:port`
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .init();

    info!("Loading configuration from {}", args.config);
    let mut config = GatewayConfig::from_file(&args.config)?;
    if let Some(bind) = &args.bind {
        let (host, port) = bind
            .rsplit_once(':')
            .with_context(|| format!("--bind {} is not host:port", bind))?;
        config.server.bind_address = host.to_string();
        config.server.port = port
            .parse()
            .with_context(|| format!("--bind port {} is not a number", port))?;
    }

    let map = Arc::new(RegisterMap::from_config(&config.mapping)?);
    info!(
        "Register map ready: {} units, {} device types",
        map.unit_count(),
        map.device_type_count()
    );
    let store = Arc::new(MeterStore::new());

    let shutdown = CancellationToken::new();

    let bridge = IngestBridge::new(config.mqtt.clone(), Arc::clone(&store));
    let bridge_shutdown = shutdown.clone();
    let bridge_task = tokio::spawn(async move {
        if let Err(e) = bridge.run(bridge_shutdown).await {
            error!("Ingestion bridge failed: {}", e);
        }
    });

    let server = Arc::new(ModbusTcpServer::new(&config.server, map, store));
    let server_task = {
        let server = Arc::clone(&server);
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = server.run(server_shutdown).await {
                error!("Modbus/TCP server failed: {}", e);
            }
        })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");
    shutdown.cancel();

    let _ = server_task.await;
    let _ = bridge_task.await;

    let stats = server.stats().await;
    info!(
        "Served {} requests ({} data responses, {} exceptions, {} dropped frames)",
        stats.total_requests,
        stats.successful_responses,
        stats.exception_responses,
        stats.dropped_frames
    );

    Ok(())
}
