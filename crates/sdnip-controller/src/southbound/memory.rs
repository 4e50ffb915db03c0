//! In-memory fabric.
//!
//! A [`Southbound`] implementation that keeps switches, links, hosts and flow
//! tables in process memory. The simulation binary runs against it and the
//! test suites use it to observe exactly what the controller programmed.

use super::types::{FlowAction, FlowMatch, FlowMod, HostAttachment, Link, Payload, Switch};
use super::{Result, Southbound, SouthboundError};
use async_trait::async_trait;
use parking_lot::Mutex;
use sdnip_types::{IpAddress, NodeId, PortNo};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Injected failure for a single switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Rule installation is rejected; packet injection still works.
    RejectRules,
    /// Every command to the switch fails as if the channel were down.
    Disconnected,
}

/// A packet emitted through `send_packet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub node: NodeId,
    pub port: PortNo,
    pub payload: Payload,
}

type FlowTable = HashMap<(u16, FlowMatch), Vec<FlowAction>>;

#[derive(Debug, Default)]
struct FabricState {
    switches: BTreeMap<NodeId, BTreeSet<PortNo>>,
    links: Vec<Link>,
    hosts: BTreeMap<IpAddress, HostAttachment>,
    flow_tables: HashMap<NodeId, FlowTable>,
    failures: HashMap<NodeId, FailureMode>,
    install_log: Vec<(NodeId, FlowMod)>,
    sent: Vec<SentPacket>,
}

/// Fabric kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryFabric {
    state: Mutex<FabricState>,
}

impl InMemoryFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a switch with the given ports, replacing any previous port list.
    pub fn add_switch(&self, id: NodeId, ports: impl IntoIterator<Item = PortNo>) {
        let mut state = self.state.lock();
        state.switches.insert(id, ports.into_iter().collect());
    }

    /// Removes a switch together with its links, hosts and flow table.
    pub fn remove_switch(&self, id: NodeId) {
        let mut state = self.state.lock();
        state.switches.remove(&id);
        state.links.retain(|link| link.src != id && link.dst != id);
        state.hosts.retain(|_, host| host.node != id);
        state.flow_tables.remove(&id);
    }

    /// Adds a directed link. At most one link per ordered pair is kept.
    pub fn add_link(&self, link: Link) {
        let mut state = self.state.lock();
        state
            .links
            .retain(|existing| !(existing.src == link.src && existing.dst == link.dst));
        state.links.push(link);
    }

    /// Adds a link in both directions.
    pub fn connect(&self, a: NodeId, a_port: PortNo, b: NodeId, b_port: PortNo) {
        let link = Link::new(a, a_port, b, b_port);
        self.add_link(link);
        self.add_link(link.reversed());
    }

    pub fn remove_link(&self, src: NodeId, dst: NodeId) {
        self.state
            .lock()
            .links
            .retain(|link| !(link.src == src && link.dst == dst));
    }

    pub fn add_host(&self, host: HostAttachment) {
        self.state.lock().hosts.insert(host.ip, host);
    }

    pub fn remove_host(&self, ip: &IpAddress) {
        self.state.lock().hosts.remove(ip);
    }

    pub fn set_failure(&self, node: NodeId, mode: FailureMode) {
        self.state.lock().failures.insert(node, mode);
    }

    pub fn clear_failure(&self, node: NodeId) {
        self.state.lock().failures.remove(&node);
    }

    /// Returns the rules currently programmed on `node`, ordered by priority.
    pub fn flows(&self, node: NodeId) -> Vec<FlowMod> {
        let state = self.state.lock();
        let mut flows: Vec<FlowMod> = state
            .flow_tables
            .get(&node)
            .map(|table| {
                table
                    .iter()
                    .map(|((priority, matcher), actions)| {
                        FlowMod::new(*priority, matcher.clone(), actions.clone())
                    })
                    .collect()
            })
            .unwrap_or_default();
        flows.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.matcher.to_string().cmp(&b.matcher.to_string()))
        });
        flows
    }

    /// Returns the rule installed on `node` for `(priority, matcher)`.
    pub fn flow(&self, node: NodeId, priority: u16, matcher: &FlowMatch) -> Option<FlowMod> {
        let state = self.state.lock();
        state
            .flow_tables
            .get(&node)?
            .get(&(priority, matcher.clone()))
            .map(|actions| FlowMod::new(priority, matcher.clone(), actions.clone()))
    }

    /// Total number of rules across all switches.
    pub fn flow_count(&self) -> usize {
        self.state.lock().flow_tables.values().map(HashMap::len).sum()
    }

    /// Every accepted `install_rule` call, in order.
    pub fn install_log(&self) -> Vec<(NodeId, FlowMod)> {
        self.state.lock().install_log.clone()
    }

    /// Every accepted `send_packet` call, in order.
    pub fn sent_packets(&self) -> Vec<SentPacket> {
        self.state.lock().sent.clone()
    }

    /// Forgets the call history while keeping flow tables intact.
    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        state.install_log.clear();
        state.sent.clear();
    }

    fn check_reachable(state: &FabricState, node: NodeId) -> Result<()> {
        if !state.switches.contains_key(&node) {
            return Err(SouthboundError::NotConnected(node));
        }
        if state.failures.get(&node) == Some(&FailureMode::Disconnected) {
            return Err(SouthboundError::NotConnected(node));
        }
        Ok(())
    }
}

#[async_trait]
impl Southbound for InMemoryFabric {
    async fn install_rule(&self, node: NodeId, rule: FlowMod) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_reachable(&state, node)?;
        if state.failures.get(&node) == Some(&FailureMode::RejectRules) {
            return Err(SouthboundError::Rejected {
                node,
                reason: "flow table rejected modification".to_string(),
            });
        }

        debug!(node = %node, priority = rule.priority, matcher = %rule.matcher, "Installing rule");
        state
            .flow_tables
            .entry(node)
            .or_default()
            .insert((rule.priority, rule.matcher.clone()), rule.actions.clone());
        state.install_log.push((node, rule));
        Ok(())
    }

    async fn send_packet(&self, node: NodeId, port: PortNo, payload: Payload) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_reachable(&state, node)?;
        let known_port = state
            .switches
            .get(&node)
            .is_some_and(|ports| ports.contains(&port));
        if !known_port {
            return Err(SouthboundError::UnknownPort { node, port });
        }

        state.sent.push(SentPacket {
            node,
            port,
            payload,
        });
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Switch>> {
        let state = self.state.lock();
        Ok(state
            .switches
            .iter()
            .map(|(id, ports)| Switch {
                id: *id,
                ports: ports.iter().copied().collect(),
            })
            .collect())
    }

    async fn list_links(&self) -> Result<Vec<Link>> {
        Ok(self.state.lock().links.clone())
    }

    async fn list_host_attachments(&self) -> Result<Vec<HostAttachment>> {
        Ok(self.state.lock().hosts.values().copied().collect())
    }

    async fn find_host(&self, ip: &IpAddress) -> Result<Option<HostAttachment>> {
        Ok(self.state.lock().hosts.get(ip).copied())
    }
}
