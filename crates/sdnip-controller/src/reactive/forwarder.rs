//! Packet-triggered forwarding.
//!
//! These installs are one-shot forwarding decisions made from a punted packet.
//! They never create or update route entries.

use crate::config::ConfigHandle;
use crate::path::PathInstaller;
use crate::southbound::{
    FlowAction, FlowMatch, ObservedPacket, PacketIn, Payload, SouthboundError, BGP_PORT,
};
use sdnip_types::{IpAddress, IpPrefix, PortNo};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of offering a packet to the BGP transit path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BgpForward {
    /// Not a BGP session packet.
    NotBgp,
    /// Path installed and the packet re-emitted out this port.
    Forwarded(PortNo),
    /// Endpoints unknown or unreachable; packet dropped.
    Dropped,
}

/// Result of programming the path to an internal host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalRoute {
    NotInternal,
    UnknownHost,
    Installed { ingress: usize, failed: usize },
}

/// Reactive forwarding for BGP session transit and internal hosts.
pub struct ReactiveForwarder {
    installer: Arc<PathInstaller>,
    config: Arc<ConfigHandle>,
}

impl ReactiveForwarder {
    pub fn new(installer: Arc<PathInstaller>, config: Arc<ConfigHandle>) -> Self {
        Self { installer, config }
    }

    /// Carries a BGP session packet between two fabric-attached speakers.
    pub async fn forward_bgp(&self, packet_in: &PacketIn) -> Result<BgpForward, SouthboundError> {
        let ObservedPacket::Ip {
            src,
            dst,
            tcp: Some(tcp),
            ..
        } = &packet_in.packet
        else {
            return Ok(BgpForward::NotBgp);
        };
        if !tcp.involves(BGP_PORT) || !dst.is_ipv4() {
            return Ok(BgpForward::NotBgp);
        }
        debug!(src = %src, dst = %dst, "BGP packet in");

        let southbound = self.installer.southbound();
        let (Some(src_host), Some(dst_host)) =
            (southbound.find_host(src).await?, southbound.find_host(dst).await?)
        else {
            debug!(src = %src, dst = %dst, "BGP endpoint unknown, dropping");
            return Ok(BgpForward::Dropped);
        };

        let matcher = FlowMatch::ip_destination(IpPrefix::host(*dst)).with_eth_dst(dst_host.mac);
        let egress = match self
            .installer
            .install_path(src_host.node, dst_host.node, dst_host.port, &matcher, &[])
            .await
        {
            Ok(port) => port,
            Err(e) => {
                debug!(src = %src, dst = %dst, error = %e, "No BGP transit path, dropping");
                return Ok(BgpForward::Dropped);
            }
        };

        southbound
            .send_packet(packet_in.node, egress, Payload::Raw(packet_in.data.clone()))
            .await?;
        Ok(BgpForward::Forwarded(egress))
    }

    /// Programs every ingress switch towards `dst` if it is an internal host.
    pub async fn route_internal_host(&self, dst: &IpAddress) -> Result<InternalRoute, SouthboundError> {
        if !self.config.current().is_internal_host(dst) {
            return Ok(InternalRoute::NotInternal);
        }

        let Some(host) = self.installer.southbound().find_host(dst).await? else {
            debug!(dst = %dst, "Internal host location unknown");
            return Ok(InternalRoute::UnknownHost);
        };

        let ingress = match self.installer.all_ingress_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!(dst = %dst, error = %e, "Cannot enumerate ingress switches");
                return Ok(InternalRoute::Installed {
                    ingress: 0,
                    failed: 0,
                });
            }
        };

        let matcher = FlowMatch::ip_destination(IpPrefix::host(*dst));
        let rewrite = [FlowAction::SetEthDst(host.mac)];
        let mut failed = 0;
        for node in &ingress {
            if let Err(e) = self
                .installer
                .install_path(*node, host.node, host.port, &matcher, &rewrite)
                .await
            {
                debug!(dst = %dst, ingress = %node, error = %e, "Internal host path not installed");
                failed += 1;
            }
        }

        info!(dst = %dst, switches = ingress.len(), failed, "Internal host path installed");
        Ok(InternalRoute::Installed {
            ingress: ingress.len(),
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdnIpConfig;
    use crate::southbound::{
        HostAttachment, InMemoryFabric, SentPacket, TcpPorts, ETH_TYPE_IPV4, PATH_RULE_PRIORITY,
    };
    use pretty_assertions::assert_eq;
    use sdnip_types::{MacAddress, NodeId};

    fn n(id: u64) -> NodeId {
        NodeId::new(id)
    }

    fn p(port: u32) -> PortNo {
        PortNo::new(port)
    }

    fn ip(s: &str) -> IpAddress {
        s.parse().unwrap()
    }

    fn mac(s: &str) -> MacAddress {
        s.parse().unwrap()
    }

    /// Speaker 10.0.0.1 on 1/1, external router 10.0.0.100 on 3/1,
    /// internal host 10.10.0.5 on 2/3; 1 <-> 2 <-> 3.
    fn fabric() -> Arc<InMemoryFabric> {
        let fabric = Arc::new(InMemoryFabric::new());
        fabric.add_switch(n(1), [p(1), p(2)]);
        fabric.add_switch(n(2), [p(1), p(2), p(3)]);
        fabric.add_switch(n(3), [p(1), p(2)]);
        fabric.connect(n(1), p(2), n(2), p(1));
        fabric.connect(n(2), p(2), n(3), p(2));
        for (addr, node, port, hw) in [
            ("10.0.0.1", 1, 1, "aa:bb:cc:00:00:01"),
            ("10.0.0.100", 3, 1, "02:00:00:00:01:00"),
            ("10.10.0.5", 2, 3, "02:00:00:00:00:05"),
        ] {
            fabric.add_host(HostAttachment {
                ip: ip(addr),
                node: n(node),
                port: p(port),
                mac: mac(hw),
            });
        }
        fabric
    }

    fn forwarder(fabric: &Arc<InMemoryFabric>) -> ReactiveForwarder {
        let config = SdnIpConfig::from_json(
            r#"{"local": {"networks": ["10.10.0.0/16"]}, "speakers": [
                {"dpid": 1, "port": 1, "mac": "aa:bb:cc:00:00:01", "speaker_ids": ["10.0.0.100"]}
            ]}"#,
        )
        .unwrap();
        ReactiveForwarder::new(
            Arc::new(PathInstaller::new(fabric.clone())),
            Arc::new(ConfigHandle::from_config(&config)),
        )
    }

    fn bgp_packet(node: u64, in_port: u32, src: &str, dst: &str) -> PacketIn {
        PacketIn {
            node: n(node),
            in_port: p(in_port),
            packet: ObservedPacket::Ip {
                eth_src: mac("02:00:00:00:00:aa"),
                eth_dst: mac("02:00:00:00:00:bb"),
                src: ip(src),
                dst: ip(dst),
                tcp: Some(TcpPorts {
                    src: 40123,
                    dst: BGP_PORT,
                }),
            },
            data: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_bgp_transit_installs_path_and_reemits() {
        let fabric = fabric();
        let fwd = forwarder(&fabric);

        let packet_in = bgp_packet(1, 1, "10.0.0.1", "10.0.0.100");
        let outcome = fwd.forward_bgp(&packet_in).await.unwrap();

        assert_eq!(outcome, BgpForward::Forwarded(p(2)));
        let matcher = FlowMatch {
            eth_type: Some(ETH_TYPE_IPV4),
            eth_dst: Some(mac("02:00:00:00:01:00")),
            ip_dst: Some("10.0.0.100/32".parse().unwrap()),
            ..FlowMatch::default()
        };
        assert!(fabric.flow(n(1), PATH_RULE_PRIORITY, &matcher).is_some());
        assert!(fabric.flow(n(2), PATH_RULE_PRIORITY, &matcher).is_some());
        assert_eq!(
            fabric.flow(n(3), PATH_RULE_PRIORITY, &matcher).unwrap().output_port(),
            Some(p(1))
        );
        assert_eq!(
            fabric.sent_packets(),
            vec![SentPacket {
                node: n(1),
                port: p(2),
                payload: Payload::Raw(vec![1, 2, 3]),
            }]
        );
    }

    #[tokio::test]
    async fn test_bgp_unknown_endpoint_no_calls() {
        let fabric = fabric();
        let fwd = forwarder(&fabric);

        let outcome = fwd
            .forward_bgp(&bgp_packet(1, 1, "10.0.0.1", "10.0.0.222"))
            .await
            .unwrap();

        assert_eq!(outcome, BgpForward::Dropped);
        assert!(fabric.install_log().is_empty());
        assert!(fabric.sent_packets().is_empty());
    }

    #[tokio::test]
    async fn test_non_bgp_ignored() {
        let fabric = fabric();
        let fwd = forwarder(&fabric);

        let mut packet_in = bgp_packet(1, 1, "10.0.0.1", "10.0.0.100");
        if let ObservedPacket::Ip { tcp, .. } = &mut packet_in.packet {
            *tcp = Some(TcpPorts { src: 5000, dst: 80 });
        }
        assert_eq!(fwd.forward_bgp(&packet_in).await.unwrap(), BgpForward::NotBgp);
        assert!(fabric.install_log().is_empty());
    }

    #[tokio::test]
    async fn test_internal_host_programmed_from_every_switch() {
        let fabric = fabric();
        let fwd = forwarder(&fabric);

        let outcome = fwd.route_internal_host(&ip("10.10.0.5")).await.unwrap();
        assert_eq!(
            outcome,
            InternalRoute::Installed {
                ingress: 3,
                failed: 0
            }
        );

        let matcher = FlowMatch::ip_destination("10.10.0.5/32".parse().unwrap());
        for node in [n(1), n(2), n(3)] {
            let rule = fabric.flow(node, PATH_RULE_PRIORITY, &matcher).unwrap();
            assert_eq!(rule.actions[0], FlowAction::SetEthDst(mac("02:00:00:00:00:05")));
        }
        assert_eq!(
            fabric.flow(n(2), PATH_RULE_PRIORITY, &matcher).unwrap().output_port(),
            Some(p(3))
        );
    }

    #[tokio::test]
    async fn test_external_destination_not_routed() {
        let fabric = fabric();
        let fwd = forwarder(&fabric);

        assert_eq!(
            fwd.route_internal_host(&ip("10.0.0.100")).await.unwrap(),
            InternalRoute::NotInternal
        );
        assert_eq!(
            fwd.route_internal_host(&ip("10.10.9.9")).await.unwrap(),
            InternalRoute::UnknownHost
        );
        assert!(fabric.install_log().is_empty());
    }
}
