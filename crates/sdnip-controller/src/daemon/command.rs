//! Operator command surface.

use crate::route::RouteState;
use sdnip_types::{IpAddress, IpPrefix, MacAddress};
use serde::Serialize;
use tokio::sync::oneshot;

/// Commands issued by an operator or management layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    /// List learned ARP bindings.
    DumpBindings,
    /// Re-read the static ARP table file.
    ReloadStaticBindings,
    /// Broadcast an ARP request for an address out every edge port.
    Probe(IpAddress),
    /// List route entries.
    DumpRoutes,
    /// Re-read the configuration file.
    ReloadConfig,
}

/// One row of a route dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub prefix: IpPrefix,
    pub next_hop: IpAddress,
    pub state: RouteState,
}

/// Reply to an [`OperatorCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommandReply {
    Bindings(Vec<(IpAddress, MacAddress)>),
    StaticBindingsReloaded(usize),
    Probed(usize),
    Routes(Vec<RouteSummary>),
    ConfigReloaded { endpoints: usize },
    Failed(String),
}

/// A command together with the channel its reply goes back on.
#[derive(Debug)]
pub struct CommandRequest {
    pub command: OperatorCommand,
    pub reply: oneshot::Sender<CommandReply>,
}

impl CommandRequest {
    pub fn new(command: OperatorCommand) -> (Self, oneshot::Receiver<CommandReply>) {
        let (reply, rx) = oneshot::channel();
        (Self { command, reply }, rx)
    }
}
