//! Controller wiring and event loops.
//!
//! The controller owns the shared stores and runs one task per input stream:
//! route events, southbound events, operator commands, and the reconciler
//! tick. Tasks only meet through the stores' own operations.

use super::command::{CommandReply, CommandRequest, OperatorCommand, RouteSummary};
use crate::arp::ArpProxy;
use crate::config::ConfigHandle;
use crate::error::{Result, SdnIpError};
use crate::path::PathInstaller;
use crate::reactive::{BgpForward, ReactiveForwarder};
use crate::route::{HopStore, Reconciler, RouteEvent, RouteOrch, DEFAULT_RECONCILE_INTERVAL};
use crate::southbound::{ObservedPacket, PacketIn, Southbound, SouthboundEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for the controller runtime.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Period of the pending-route reconciler
    pub reconcile_interval: Duration,
    /// Capacity of each input channel
    pub channel_capacity: usize,
    /// Optional static ARP table file
    pub static_arp_table: Option<PathBuf>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            channel_capacity: 1024,
            static_arp_table: None,
        }
    }
}

/// The SDN-IP control plane.
pub struct SdnIpController {
    settings: ControllerConfig,
    config: Arc<ConfigHandle>,
    installer: Arc<PathInstaller>,
    orch: Arc<RouteOrch>,
    arp: Arc<ArpProxy>,
    reactive: Arc<ReactiveForwarder>,
}

impl SdnIpController {
    /// Wires the components together. Fails only if the static ARP table
    /// cannot be loaded.
    pub fn new(
        config: Arc<ConfigHandle>,
        southbound: Arc<dyn Southbound>,
        settings: ControllerConfig,
    ) -> Result<Self> {
        let installer = Arc::new(PathInstaller::new(southbound));
        let store = Arc::new(HopStore::new());
        let orch = Arc::new(RouteOrch::new(store, installer.clone(), config.clone()));

        let mut arp = ArpProxy::new(config.clone(), installer.clone());
        if let Some(path) = &settings.static_arp_table {
            arp = arp.with_static_table(path)?;
        }

        let reactive = Arc::new(ReactiveForwarder::new(installer.clone(), config.clone()));

        Ok(Self {
            settings,
            config,
            installer,
            orch,
            arp: Arc::new(arp),
            reactive,
        })
    }

    pub fn config(&self) -> &Arc<ConfigHandle> {
        &self.config
    }

    pub fn store(&self) -> &Arc<HopStore> {
        self.orch.store()
    }

    pub fn route_orch(&self) -> &Arc<RouteOrch> {
        &self.orch
    }

    pub fn arp(&self) -> &Arc<ArpProxy> {
        &self.arp
    }

    /// Handles one route-source event.
    pub async fn handle_route_event(&self, event: RouteEvent) {
        self.orch.handle_route_event(event).await;
    }

    /// Handles one event from the southbound channel.
    pub async fn handle_southbound_event(&self, event: SouthboundEvent) {
        match event {
            SouthboundEvent::SwitchEnter(node) => {
                info!(node = %node, "Switch connected");
                if let Err(e) = self.installer.install_table_miss(node).await {
                    warn!(node = %node, error = %e, "Failed to install table-miss rule");
                }
            }
            SouthboundEvent::SwitchLeave(node) => {
                info!(node = %node, "Switch disconnected");
            }
            SouthboundEvent::PacketIn(packet_in) => self.handle_packet_in(&packet_in).await,
        }
    }

    async fn handle_packet_in(&self, packet_in: &PacketIn) {
        match &packet_in.packet {
            ObservedPacket::Arp(message) => {
                if let Err(e) = self
                    .arp
                    .handle_arp(packet_in.node, packet_in.in_port, message)
                    .await
                {
                    warn!(node = %packet_in.node, error = %e, "ARP handling failed");
                }
            }
            ObservedPacket::Ip {
                eth_src, src, dst, ..
            } => {
                self.arp.observe_ip(*src, *eth_src);

                match self.reactive.forward_bgp(packet_in).await {
                    Ok(BgpForward::Forwarded(port)) => {
                        debug!(src = %src, dst = %dst, port = %port, "BGP packet forwarded");
                    }
                    Ok(_) => {}
                    Err(e) => warn!(src = %src, dst = %dst, error = %e, "BGP forwarding failed"),
                }

                if let Err(e) = self.reactive.route_internal_host(dst).await {
                    warn!(dst = %dst, error = %e, "Internal host routing failed");
                }
            }
            ObservedPacket::Other => {}
        }
    }

    /// Executes an operator command.
    pub async fn handle_command(&self, command: OperatorCommand) -> CommandReply {
        debug!(?command, "Operator command");
        match command {
            OperatorCommand::DumpBindings => CommandReply::Bindings(self.arp.dump()),
            OperatorCommand::ReloadStaticBindings => match self.arp.reload_static() {
                Ok(count) => CommandReply::StaticBindingsReloaded(count),
                Err(e) => CommandReply::Failed(e.to_string()),
            },
            OperatorCommand::Probe(target) => match self.arp.probe(target).await {
                Ok(count) => CommandReply::Probed(count),
                Err(e) => CommandReply::Failed(e.to_string()),
            },
            OperatorCommand::DumpRoutes => CommandReply::Routes(
                self.store()
                    .snapshot()
                    .into_iter()
                    .map(|entry| RouteSummary {
                        prefix: entry.prefix,
                        next_hop: entry.next_hop,
                        state: entry.state,
                    })
                    .collect(),
            ),
            OperatorCommand::ReloadConfig => match self.config.reload() {
                Ok(registry) => CommandReply::ConfigReloaded {
                    endpoints: registry.endpoints().len(),
                },
                Err(e) => CommandReply::Failed(e.to_string()),
            },
        }
    }

    /// Spawns the event loops and the reconciler.
    pub fn start(self: &Arc<Self>) -> ControllerHandle {
        let capacity = self.settings.channel_capacity;
        let (route_tx, mut route_rx) = mpsc::channel::<RouteEvent>(capacity);
        let (southbound_tx, mut southbound_rx) = mpsc::channel::<SouthboundEvent>(capacity);
        let (command_tx, mut command_rx) = mpsc::channel::<CommandRequest>(capacity);
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();

        let controller = self.clone();
        let token = cancel.clone();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = route_rx.recv() => match event {
                        Some(event) => controller.handle_route_event(event).await,
                        None => break,
                    },
                }
            }
            debug!("Route event loop stopped");
        });

        let controller = self.clone();
        let token = cancel.clone();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = southbound_rx.recv() => match event {
                        Some(event) => controller.handle_southbound_event(event).await,
                        None => break,
                    },
                }
            }
            debug!("Southbound event loop stopped");
        });

        let controller = self.clone();
        let token = cancel.clone();
        tasks.spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    request = command_rx.recv() => match request {
                        Some(request) => {
                            let reply = controller.handle_command(request.command).await;
                            // The requester may have given up waiting.
                            let _ = request.reply.send(reply);
                        }
                        None => break,
                    },
                }
            }
            debug!("Command loop stopped");
        });

        let reconciler = Reconciler::new(self.orch.clone(), self.settings.reconcile_interval);
        tasks.spawn(reconciler.run(cancel.clone()));

        info!(
            reconcile_interval_ms = self.settings.reconcile_interval.as_millis() as u64,
            "Controller started"
        );

        ControllerHandle {
            route_tx,
            southbound_tx,
            command_tx,
            cancel,
            tasks,
        }
    }
}

/// Handle to a running controller.
pub struct ControllerHandle {
    route_tx: mpsc::Sender<RouteEvent>,
    southbound_tx: mpsc::Sender<SouthboundEvent>,
    command_tx: mpsc::Sender<CommandRequest>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl ControllerHandle {
    /// Sender the route source pushes events into.
    pub fn route_events(&self) -> mpsc::Sender<RouteEvent> {
        self.route_tx.clone()
    }

    /// Sender the southbound channel pushes events into.
    pub fn southbound_events(&self) -> mpsc::Sender<SouthboundEvent> {
        self.southbound_tx.clone()
    }

    pub async fn send_route_event(&self, event: RouteEvent) -> Result<()> {
        self.route_tx.send(event).await.map_err(|_| SdnIpError::ShutDown)
    }

    pub async fn send_southbound_event(&self, event: SouthboundEvent) -> Result<()> {
        self.southbound_tx
            .send(event)
            .await
            .map_err(|_| SdnIpError::ShutDown)
    }

    /// Sends an operator command and waits for its reply.
    pub async fn command(&self, command: OperatorCommand) -> Result<CommandReply> {
        let (request, reply) = CommandRequest::new(command);
        self.command_tx
            .send(request)
            .await
            .map_err(|_| SdnIpError::ShutDown)?;
        reply.await.map_err(|_| SdnIpError::ShutDown)
    }

    /// Token that stops every task when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels all tasks and waits for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Controller task ended abnormally");
            }
        }
        info!("Controller stopped");
    }
}
