//! Southbound switch-control channel.
//!
//! The controller never owns switch connections. Everything it needs from the
//! fabric (inventory, host attachment, rule installation, packet injection)
//! goes through the [`Southbound`] trait, and everything the fabric reports
//! back arrives as a [`SouthboundEvent`].

#[cfg(test)]
pub(crate) mod gated;
mod memory;
mod types;

pub use memory::{FailureMode, InMemoryFabric, SentPacket};
pub use types::{
    ArpMessage, ArpOp, FlowAction, FlowMatch, FlowMod, HostAttachment, Link, ObservedPacket,
    PacketIn, Payload, SouthboundEvent, Switch, TcpPorts, BGP_PORT, ETH_TYPE_ARP, ETH_TYPE_IPV4,
    ETH_TYPE_IPV6, IP_PROTO_TCP, PATH_RULE_PRIORITY, TABLE_MISS_PRIORITY,
};

use async_trait::async_trait;
use sdnip_types::{IpAddress, NodeId, PortNo};
use thiserror::Error;

/// Southbound channel errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SouthboundError {
    #[error("switch {0} is not connected")]
    NotConnected(NodeId),

    #[error("switch {node} rejected request: {reason}")]
    Rejected { node: NodeId, reason: String },

    #[error("port {port} does not exist on switch {node}")]
    UnknownPort { node: NodeId, port: PortNo },

    #[error("topology service unavailable: {0}")]
    TopologyUnavailable(String),
}

/// Result type for southbound operations.
pub type Result<T> = std::result::Result<T, SouthboundError>;

/// Commands and queries the controller issues towards the fabric.
///
/// Implementations must be cheap to call concurrently; the controller calls
/// into them from several tasks at once.
#[async_trait]
pub trait Southbound: Send + Sync {
    /// Installs or replaces the rule keyed by `(priority, matcher)` on `node`.
    async fn install_rule(&self, node: NodeId, rule: FlowMod) -> Result<()>;

    /// Emits `payload` out of `port` on `node`.
    async fn send_packet(&self, node: NodeId, port: PortNo, payload: Payload) -> Result<()>;

    /// Current switch inventory.
    async fn list_nodes(&self) -> Result<Vec<Switch>>;

    /// Current inter-switch links.
    async fn list_links(&self) -> Result<Vec<Link>>;

    /// Currently known host attachment points.
    async fn list_host_attachments(&self) -> Result<Vec<HostAttachment>>;

    /// Looks up where `ip` attaches to the fabric.
    async fn find_host(&self, ip: &IpAddress) -> Result<Option<HostAttachment>> {
        Ok(self
            .list_host_attachments()
            .await?
            .into_iter()
            .find(|host| host.ip == *ip))
    }
}
