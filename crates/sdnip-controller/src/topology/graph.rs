//! Fabric topology snapshot and shortest-path search.

use crate::southbound::{Link, Southbound, SouthboundError, Switch};
use petgraph::algo::astar;
use petgraph::graphmap::DiGraphMap;
use sdnip_types::{NodeId, PortNo};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Ports joining two adjacent switches, seen from the source switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkPorts {
    pub src_port: PortNo,
    pub dst_port: PortNo,
}

/// Ordered node sequence between two switches. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    nodes: Vec<NodeId>,
}

impl Path {
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Number of nodes on the path (1 when source and destination coincide).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn first(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn last(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    /// Consecutive `(from, to)` pairs along the path.
    pub fn hops(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.nodes.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<String> = self.nodes.iter().map(ToString::to_string).collect();
        write!(f, "{}", nodes.join(" -> "))
    }
}

/// Directed graph of switches built from one inventory snapshot.
///
/// Snapshots are never cached; every path computation should start from a
/// fresh [`TopologyGraph::build`].
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    graph: DiGraphMap<NodeId, LinkPorts>,
    ports: BTreeMap<NodeId, BTreeSet<PortNo>>,
}

impl TopologyGraph {
    /// Pulls the current switch and link inventory from the fabric.
    pub async fn build(southbound: &dyn Southbound) -> Result<Self, SouthboundError> {
        let switches = southbound.list_nodes().await?;
        let links = southbound.list_links().await?;
        Ok(Self::from_parts(&switches, &links))
    }

    /// Builds a graph from an explicit inventory.
    ///
    /// Links whose endpoints are not in `switches` still add their nodes, since
    /// topology discovery may report a link before the switch description.
    pub fn from_parts(switches: &[Switch], links: &[Link]) -> Self {
        let mut graph = DiGraphMap::new();
        let mut ports: BTreeMap<NodeId, BTreeSet<PortNo>> = BTreeMap::new();

        for switch in switches {
            graph.add_node(switch.id);
            ports
                .entry(switch.id)
                .or_default()
                .extend(switch.ports.iter().copied());
        }

        for link in links {
            if link.src == link.dst {
                continue;
            }
            graph.add_edge(
                link.src,
                link.dst,
                LinkPorts {
                    src_port: link.src_port,
                    dst_port: link.dst_port,
                },
            );
        }

        Self { graph, ports }
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.graph.contains_node(node)
    }

    /// All known switches in ascending id order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.graph.nodes().collect();
        nodes.sort();
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Ports joining `src` to `dst`, if the two are adjacent.
    pub fn link(&self, src: NodeId, dst: NodeId) -> Option<LinkPorts> {
        self.graph.edge_weight(src, dst).copied()
    }

    /// Ports of every switch that are not the source port of an inter-switch link.
    pub fn edge_ports(&self) -> Vec<(NodeId, PortNo)> {
        let mut result = Vec::new();
        for (node, ports) in &self.ports {
            let trunk: BTreeSet<PortNo> = self
                .graph
                .edges(*node)
                .map(|(_, _, link)| link.src_port)
                .collect();
            result.extend(
                ports
                    .iter()
                    .filter(|port| !trunk.contains(port))
                    .map(|port| (*node, *port)),
            );
        }
        result
    }

    /// Fewest-hop path from `src` to `dst`, or `None` when unreachable.
    ///
    /// Ties between equal-length paths are broken arbitrarily.
    pub fn shortest_path(&self, src: NodeId, dst: NodeId) -> Option<Path> {
        if !self.graph.contains_node(src) || !self.graph.contains_node(dst) {
            return None;
        }
        astar(&self.graph, src, |finish| finish == dst, |_| 1u32, |_| 0)
            .map(|(_, nodes)| Path { nodes })
    }
}
