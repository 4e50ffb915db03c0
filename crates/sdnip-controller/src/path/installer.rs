//! Hop-by-hop forwarding chain installation.

use crate::southbound::{
    FlowAction, FlowMatch, FlowMod, Southbound, SouthboundError, PATH_RULE_PRIORITY,
};
use crate::topology::TopologyGraph;
use sdnip_types::{NodeId, PortNo};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Path installation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstallError {
    #[error("no path from switch {from} to switch {to}")]
    PathNotFound { from: NodeId, to: NodeId },

    #[error("rule installation failed on switch {node}: {source}")]
    RuleInstallFailure {
        node: NodeId,
        #[source]
        source: SouthboundError,
    },

    #[error("topology snapshot failed: {0}")]
    Topology(#[from] SouthboundError),
}

/// Result type for path installation.
pub type Result<T> = std::result::Result<T, InstallError>;

/// Converts a forwarding intent into rules on every switch along a path.
///
/// Each call takes a fresh topology snapshot. Rules are keyed by
/// `(priority, match)` on the switch, so re-issuing the same intent replaces
/// rather than duplicates. Already-installed hops are not rolled back when a
/// later hop fails.
pub struct PathInstaller {
    southbound: Arc<dyn Southbound>,
    priority: u16,
}

impl PathInstaller {
    pub fn new(southbound: Arc<dyn Southbound>) -> Self {
        Self {
            southbound,
            priority: PATH_RULE_PRIORITY,
        }
    }

    /// Overrides the priority used for path rules.
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    pub fn southbound(&self) -> &Arc<dyn Southbound> {
        &self.southbound
    }

    /// Installs `matcher -> rewrite -> output` from `from` towards `to_port` on `to`.
    ///
    /// Returns the port the first switch on the path forwards out of, which is
    /// `to_port` itself when `from == to`.
    pub async fn install_path(
        &self,
        from: NodeId,
        to: NodeId,
        to_port: PortNo,
        matcher: &FlowMatch,
        rewrite: &[FlowAction],
    ) -> Result<PortNo> {
        let graph = TopologyGraph::build(self.southbound.as_ref()).await?;
        let Some(path) = graph.shortest_path(from, to) else {
            debug!(from = %from, to = %to, matcher = %matcher, "No path, dropping intent");
            return Err(InstallError::PathNotFound { from, to });
        };

        // Resolve every hop port before touching any switch.
        let mut plan = Vec::with_capacity(path.len());
        for (node, next) in path.hops() {
            let link = graph
                .link(node, next)
                .ok_or(InstallError::PathNotFound { from, to })?;
            plan.push((node, link.src_port));
        }
        plan.push((path.last(), to_port));

        debug!(path = %path, matcher = %matcher, "Installing path");
        for (node, out_port) in &plan {
            let mut actions = rewrite.to_vec();
            actions.push(FlowAction::Output(*out_port));
            let rule = FlowMod::new(self.priority, matcher.clone(), actions);
            self.southbound
                .install_rule(*node, rule)
                .await
                .map_err(|source| {
                    warn!(node = %node, error = %source, "Rule installation failed");
                    InstallError::RuleInstallFailure {
                        node: *node,
                        source,
                    }
                })?;
        }

        Ok(plan[0].1)
    }

    /// Every switch currently known to the fabric, in ascending id order.
    pub async fn all_ingress_nodes(&self) -> Result<Vec<NodeId>> {
        let mut nodes: Vec<NodeId> = self
            .southbound
            .list_nodes()
            .await?
            .into_iter()
            .map(|switch| switch.id)
            .collect();
        nodes.sort();
        nodes.dedup();
        Ok(nodes)
    }

    /// Every `(switch, port)` not used to reach another switch.
    pub async fn edge_ports(&self) -> Result<Vec<(NodeId, PortNo)>> {
        let graph = TopologyGraph::build(self.southbound.as_ref()).await?;
        Ok(graph.edge_ports())
    }

    /// Installs the lowest-priority rule punting unmatched packets to the controller.
    pub async fn install_table_miss(&self, node: NodeId) -> Result<()> {
        self.southbound
            .install_rule(node, FlowMod::table_miss())
            .await
            .map_err(|source| InstallError::RuleInstallFailure { node, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::southbound::{FailureMode, InMemoryFabric, Link, TABLE_MISS_PRIORITY};
    use pretty_assertions::assert_eq;

    const PORT_A: u32 = 10;
    const PORT_B: u32 = 11;
    const PORT_C: u32 = 20;
    const PORT_D: u32 = 21;
    const PORT_X: u32 = 3;

    fn n(id: u64) -> NodeId {
        NodeId::new(id)
    }

    fn p(port: u32) -> PortNo {
        PortNo::new(port)
    }

    fn matcher() -> FlowMatch {
        FlowMatch::ip_destination("203.0.113.0/24".parse().unwrap())
    }

    /// Nodes {1,2,3}: 1 -(A/B)-> 2 -(C/D)-> 3, host port X on node 3.
    fn line_fabric() -> Arc<InMemoryFabric> {
        let fabric = Arc::new(InMemoryFabric::new());
        fabric.add_switch(n(1), [p(1), p(PORT_A)]);
        fabric.add_switch(n(2), [p(PORT_B), p(PORT_C)]);
        fabric.add_switch(n(3), [p(PORT_D), p(PORT_X)]);
        fabric.add_link(Link::new(n(1), p(PORT_A), n(2), p(PORT_B)));
        fabric.add_link(Link::new(n(2), p(PORT_C), n(3), p(PORT_D)));
        fabric
    }

    fn output_rule(out: u32) -> FlowMod {
        FlowMod::new(PATH_RULE_PRIORITY, matcher(), vec![FlowAction::Output(p(out))])
    }

    #[tokio::test]
    async fn test_three_node_chain() {
        let fabric = line_fabric();
        let installer = PathInstaller::new(fabric.clone());

        let egress = installer
            .install_path(n(1), n(3), p(PORT_X), &matcher(), &[])
            .await
            .unwrap();

        assert_eq!(egress, p(PORT_A));
        assert_eq!(fabric.flows(n(1)), vec![output_rule(PORT_A)]);
        assert_eq!(fabric.flows(n(2)), vec![output_rule(PORT_C)]);
        assert_eq!(fabric.flows(n(3)), vec![output_rule(PORT_X)]);
    }

    #[tokio::test]
    async fn test_single_node_terminal_rule() {
        let fabric = line_fabric();
        let installer = PathInstaller::new(fabric.clone());
        let mac = "aa:00:00:00:00:01".parse().unwrap();

        let egress = installer
            .install_path(n(3), n(3), p(PORT_X), &matcher(), &[FlowAction::SetEthDst(mac)])
            .await
            .unwrap();

        assert_eq!(egress, p(PORT_X));
        assert_eq!(
            fabric.install_log(),
            vec![(
                n(3),
                FlowMod::new(
                    PATH_RULE_PRIORITY,
                    matcher(),
                    vec![FlowAction::SetEthDst(mac), FlowAction::Output(p(PORT_X))],
                )
            )]
        );
    }

    #[tokio::test]
    async fn test_unreachable_issues_no_calls() {
        let fabric = line_fabric();
        let installer = PathInstaller::new(fabric.clone());

        let err = installer
            .install_path(n(3), n(1), p(1), &matcher(), &[])
            .await
            .unwrap_err();

        assert_eq!(err, InstallError::PathNotFound { from: n(3), to: n(1) });
        assert!(fabric.install_log().is_empty());
        assert!(fabric.sent_packets().is_empty());
    }

    #[tokio::test]
    async fn test_reinstall_is_idempotent() {
        let fabric = line_fabric();
        let installer = PathInstaller::new(fabric.clone());

        for _ in 0..2 {
            installer
                .install_path(n(1), n(3), p(PORT_X), &matcher(), &[])
                .await
                .unwrap();
        }

        assert_eq!(fabric.flow_count(), 3);
        for node in [n(1), n(2), n(3)] {
            assert_eq!(fabric.flows(node).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_new_port_supersedes_previous_rule() {
        let fabric = line_fabric();
        let installer = PathInstaller::new(fabric.clone());

        installer
            .install_path(n(3), n(3), p(PORT_X), &matcher(), &[])
            .await
            .unwrap();
        installer
            .install_path(n(3), n(3), p(PORT_D), &matcher(), &[])
            .await
            .unwrap();

        assert_eq!(fabric.flows(n(3)), vec![output_rule(PORT_D)]);
    }

    #[tokio::test]
    async fn test_mid_path_failure_keeps_earlier_hops() {
        let fabric = line_fabric();
        fabric.set_failure(n(2), FailureMode::RejectRules);
        let installer = PathInstaller::new(fabric.clone());

        let err = installer
            .install_path(n(1), n(3), p(PORT_X), &matcher(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::RuleInstallFailure { node, .. } if node == n(2)));
        assert_eq!(fabric.flows(n(1)), vec![output_rule(PORT_A)]);
        assert!(fabric.flows(n(3)).is_empty());
    }

    #[tokio::test]
    async fn test_ingress_nodes_and_table_miss() {
        let fabric = line_fabric();
        let installer = PathInstaller::new(fabric.clone());

        assert_eq!(installer.all_ingress_nodes().await.unwrap(), vec![n(1), n(2), n(3)]);

        installer.install_table_miss(n(2)).await.unwrap();
        let flows = fabric.flows(n(2));
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].priority, TABLE_MISS_PRIORITY);
        assert_eq!(flows[0].actions, vec![FlowAction::ToController]);
    }
}
