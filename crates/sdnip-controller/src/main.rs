//! SDN-IP controller daemon.
//!
//! Runs the controller against an in-memory fabric, optionally seeded from a
//! topology file, until interrupted. A real switch channel and BGP speaker
//! plug in through the same `Southbound` trait and route event sender.

use anyhow::Context;
use clap::Parser;
use sdnip::config::{ConfigHandle, DEFAULT_CONFIG_PATH};
use sdnip::daemon::{ControllerConfig, SdnIpController};
use sdnip::simulation::FabricFile;
use sdnip::southbound::SouthboundEvent;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// SDN-IP routing controller
#[derive(Parser, Debug)]
#[command(name = "sdnipd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Controller configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Static ARP table file (JSON list of {"ip", "mac"})
    #[arg(long)]
    static_arp_table: Option<PathBuf>,

    /// Simulated fabric description (switches, links, hosts, announcements)
    #[arg(short = 't', long)]
    topology: Option<PathBuf>,

    /// Seconds between pending-route reconciliation passes
    #[arg(long, default_value = "3")]
    reconcile_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .compact()
        .init();

    info!("Starting sdnipd");

    match run(args).await {
        Ok(()) => {
            info!("sdnipd exiting normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, "sdnipd exiting with error");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Arc::new(
        ConfigHandle::load(&args.config)
            .with_context(|| format!("loading configuration from {}", args.config.display()))?,
    );

    let registry = config.current();
    info!(
        as_number = registry.as_number(),
        router_id = %registry.router_id(),
        listen_port = registry.listen_port(),
        endpoints = registry.endpoints().len(),
        internal_networks = registry.internal_networks().len(),
        "Configuration loaded"
    );
    for neighbor in registry.neighbors() {
        info!(address = %neighbor.address, remote_as = neighbor.remote_as, "BGP neighbor");
    }

    let fabric_file = match &args.topology {
        Some(path) => FabricFile::load(path).context("loading topology file")?,
        None => FabricFile::default(),
    };
    let fabric = Arc::new(fabric_file.build_fabric());
    info!(
        switches = fabric_file.switches.len(),
        links = fabric_file.links.len(),
        hosts = fabric_file.hosts.len(),
        "Simulated fabric ready"
    );

    let settings = ControllerConfig {
        reconcile_interval: Duration::from_secs(args.reconcile_interval_secs.max(1)),
        static_arp_table: args.static_arp_table.clone(),
        ..ControllerConfig::default()
    };
    let controller = Arc::new(
        SdnIpController::new(config, fabric, settings).context("starting controller")?,
    );
    let handle = controller.start();

    for node in fabric_file.switch_ids() {
        handle
            .send_southbound_event(SouthboundEvent::SwitchEnter(node))
            .await?;
    }
    for event in fabric_file.route_events() {
        handle.send_route_event(event).await?;
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Received shutdown signal");

    handle.shutdown().await;
    Ok(())
}
