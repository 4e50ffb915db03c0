//! Southbound wrapper that holds one rule installation until released.

use super::types::{FlowAction, FlowMod, HostAttachment, Link, Payload, Switch};
use super::{Result, Southbound};
use async_trait::async_trait;
use sdnip_types::{IpAddress, MacAddress, NodeId, PortNo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub struct GatedSouthbound {
    inner: Arc<dyn Southbound>,
    mac: MacAddress,
    armed: AtomicBool,
    held: Notify,
    release: Notify,
}

impl GatedSouthbound {
    /// Holds the first rule that rewrites the destination to `mac`.
    pub fn new(inner: Arc<dyn Southbound>, mac: MacAddress) -> Self {
        Self {
            inner,
            mac,
            armed: AtomicBool::new(true),
            held: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Waits until the gated rule is being held.
    pub async fn wait_held(&self) {
        self.held.notified().await;
    }

    /// Lets the held rule through.
    pub fn release(&self) {
        self.release.notify_one();
    }

    fn holds(&self, rule: &FlowMod) -> bool {
        rule.actions.contains(&FlowAction::SetEthDst(self.mac))
            && self.armed.swap(false, Ordering::SeqCst)
    }
}

#[async_trait]
impl Southbound for GatedSouthbound {
    async fn install_rule(&self, node: NodeId, rule: FlowMod) -> Result<()> {
        if self.holds(&rule) {
            self.held.notify_one();
            self.release.notified().await;
        }
        self.inner.install_rule(node, rule).await
    }

    async fn send_packet(&self, node: NodeId, port: PortNo, payload: Payload) -> Result<()> {
        self.inner.send_packet(node, port, payload).await
    }

    async fn list_nodes(&self) -> Result<Vec<Switch>> {
        self.inner.list_nodes().await
    }

    async fn list_links(&self) -> Result<Vec<Link>> {
        self.inner.list_links().await
    }

    async fn list_host_attachments(&self) -> Result<Vec<HostAttachment>> {
        self.inner.list_host_attachments().await
    }

    async fn find_host(&self, ip: &IpAddress) -> Result<Option<HostAttachment>> {
        self.inner.find_host(ip).await
    }
}
