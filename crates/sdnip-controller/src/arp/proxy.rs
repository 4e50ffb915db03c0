//! ARP proxy answering on behalf of fabric-attached hosts.

use super::table::{read_static_table, ArpTable};
use super::{ArpError, Result};
use crate::config::ConfigHandle;
use crate::path::PathInstaller;
use crate::southbound::{ArpMessage, ArpOp, Payload};
use sdnip_types::{IpAddress, MacAddress, NodeId, PortNo};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What the proxy did with an ARP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOutcome {
    /// A reply carrying this MAC was sent back out the ingress port.
    Replied(MacAddress),
    /// Replies and unknown opcodes are only learned from.
    NotARequest,
    /// No answer known; the request is dropped.
    Unanswered,
}

/// Learns bindings from punted traffic and answers ARP requests.
///
/// Requests from inside an internal network are answered with the MAC of the
/// first registered speaker, which acts as the default gateway. Everything
/// else is answered from the learned table or dropped.
pub struct ArpProxy {
    table: ArpTable,
    config: Arc<ConfigHandle>,
    installer: Arc<PathInstaller>,
    static_table: Option<PathBuf>,
}

impl ArpProxy {
    pub fn new(config: Arc<ConfigHandle>, installer: Arc<PathInstaller>) -> Self {
        Self {
            table: ArpTable::new(),
            config,
            installer,
            static_table: None,
        }
    }

    /// Seeds the table from a static file and remembers it for reloads.
    pub fn with_static_table(mut self, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = read_static_table(&path)?;
        let count = self.table.load(&records);
        info!(path = %path.display(), count, "Loaded static ARP bindings");
        self.static_table = Some(path);
        Ok(self)
    }

    pub fn table(&self) -> &ArpTable {
        &self.table
    }

    /// Passive learning from an IP packet.
    ///
    /// Unspecified senders (address probes) and non-unicast MACs are skipped.
    pub fn observe_ip(&self, src: IpAddress, eth_src: MacAddress) {
        if src.is_unspecified() || eth_src.is_multicast() || eth_src.is_zero() {
            debug!(ip = %src, mac = %eth_src, "Not learning from unusable sender");
            return;
        }
        if let Some(previous) = self.table.learn(src, eth_src) {
            debug!(ip = %src, old = %previous, new = %eth_src, "ARP binding changed");
        }
    }

    /// Handles an ARP packet received on `node`/`in_port`.
    pub async fn handle_arp(
        &self,
        node: NodeId,
        in_port: PortNo,
        message: &ArpMessage,
    ) -> Result<ArpOutcome> {
        self.observe_ip(message.sender_ip, message.sender_mac);

        if message.op != ArpOp::Request {
            return Ok(ArpOutcome::NotARequest);
        }

        let registry = self.config.current();
        let answer = if registry.is_internal_host(&message.sender_ip) {
            registry.first_endpoint().map(|endpoint| endpoint.mac)
        } else {
            self.table.lookup(&message.target_ip)
        };

        let Some(answer) = answer else {
            debug!(sender = %message.sender_ip, target = %message.target_ip, "No ARP answer, dropping");
            return Ok(ArpOutcome::Unanswered);
        };

        let reply = ArpMessage::reply_to(message, answer);
        self.installer
            .southbound()
            .send_packet(node, in_port, Payload::Arp(reply))
            .await?;
        debug!(
            node = %node,
            port = %in_port,
            target = %message.target_ip,
            answer = %answer,
            "Sent ARP reply"
        );
        Ok(ArpOutcome::Replied(answer))
    }

    /// Broadcasts a request for `target` out every edge-facing port.
    ///
    /// Returns the number of ports the request went out of.
    pub async fn probe(&self, target: IpAddress) -> Result<usize> {
        let registry = self.config.current();
        let sender_mac = registry
            .first_endpoint()
            .map(|endpoint| endpoint.mac)
            .unwrap_or(MacAddress::ZERO);
        let request = ArpMessage::request(registry.router_id(), sender_mac, target);

        let ports = self
            .installer
            .edge_ports()
            .await
            .map_err(|e| ArpError::Topology(e.to_string()))?;

        let mut sent = 0;
        for (node, port) in ports {
            match self
                .installer
                .southbound()
                .send_packet(node, port, Payload::Arp(request))
                .await
            {
                Ok(()) => sent += 1,
                Err(e) => warn!(node = %node, port = %port, error = %e, "ARP probe not sent"),
            }
        }

        info!(target = %target, ports = sent, "ARP probe sent");
        Ok(sent)
    }

    /// Re-reads the static table file, overwriting matching bindings.
    pub fn reload_static(&self) -> Result<usize> {
        let path = self.static_table.as_ref().ok_or(ArpError::NoStaticTable)?;
        let records = read_static_table(path)?;
        let count = self.table.load(&records);
        info!(path = %path.display(), count, "Reloaded static ARP bindings");
        Ok(count)
    }

    /// All bindings ordered by address.
    pub fn dump(&self) -> Vec<(IpAddress, MacAddress)> {
        self.table.dump()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdnIpConfig;
    use crate::southbound::{InMemoryFabric, SentPacket};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

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

    const GATEWAY_MAC: &str = "aa:bb:cc:00:00:01";

    fn config(json: &str) -> Arc<ConfigHandle> {
        Arc::new(ConfigHandle::from_config(&SdnIpConfig::from_json(json).unwrap()))
    }

    fn default_config() -> Arc<ConfigHandle> {
        config(
            r#"{"local": {"router_id": "10.10.0.254", "networks": ["10.10.0.0/16"]}, "speakers": [
                {"dpid": 1, "port": 1, "mac": "aa:bb:cc:00:00:01", "speaker_ids": ["10.0.0.1"]},
                {"dpid": 2, "port": 1, "mac": "aa:bb:cc:00:00:02", "speaker_ids": ["10.0.0.2"]}
            ]}"#,
        )
    }

    fn fabric() -> Arc<InMemoryFabric> {
        let fabric = Arc::new(InMemoryFabric::new());
        fabric.add_switch(n(1), [p(1), p(2), p(3)]);
        fabric.add_switch(n(2), [p(1), p(2)]);
        fabric.connect(n(1), p(3), n(2), p(2));
        fabric
    }

    fn proxy(fabric: &Arc<InMemoryFabric>, config: Arc<ConfigHandle>) -> ArpProxy {
        ArpProxy::new(config, Arc::new(PathInstaller::new(fabric.clone())))
    }

    fn request(sender: &str, sender_mac: &str, target: &str) -> ArpMessage {
        ArpMessage::request(ip(sender), mac(sender_mac), ip(target))
    }

    #[tokio::test]
    async fn test_internal_requester_gets_gateway_mac() {
        let fabric = fabric();
        let proxy = proxy(&fabric, default_config());
        // A learned binding for the target must not change the answer.
        proxy.observe_ip(ip("10.10.0.1"), mac("02:00:00:00:00:99"));

        let req = request("10.10.3.4", "02:00:00:00:03:04", "10.10.0.1");
        let outcome = proxy.handle_arp(n(1), p(2), &req).await.unwrap();

        assert_eq!(outcome, ArpOutcome::Replied(mac(GATEWAY_MAC)));
        let sent = fabric.sent_packets();
        assert_eq!(
            sent,
            vec![SentPacket {
                node: n(1),
                port: p(2),
                payload: Payload::Arp(ArpMessage::reply_to(&req, mac(GATEWAY_MAC))),
            }]
        );
        let Payload::Arp(reply) = &sent[0].payload else {
            panic!("expected ARP payload");
        };
        assert_eq!(reply.op, ArpOp::Reply);
        assert_eq!(reply.eth_dst, mac("02:00:00:00:03:04"));
        assert_eq!(reply.sender_ip, ip("10.10.0.1"));
        assert_eq!(reply.target_ip, ip("10.10.3.4"));
    }

    #[tokio::test]
    async fn test_internal_requester_without_speakers_dropped() {
        let fabric = fabric();
        let proxy = proxy(
            &fabric,
            config(r#"{"local": {"networks": ["10.10.0.0/16"]}, "speakers": []}"#),
        );

        let req = request("10.10.3.4", "02:00:00:00:03:04", "10.10.0.1");
        assert_eq!(
            proxy.handle_arp(n(1), p(2), &req).await.unwrap(),
            ArpOutcome::Unanswered
        );
        assert!(fabric.sent_packets().is_empty());
    }

    #[tokio::test]
    async fn test_external_requester_uses_learned_table() {
        let fabric = fabric();
        let proxy = proxy(&fabric, default_config());
        proxy.observe_ip(ip("192.0.2.7"), mac("02:00:00:00:00:07"));

        let req = request("10.0.0.1", GATEWAY_MAC, "192.0.2.7");
        let outcome = proxy.handle_arp(n(1), p(1), &req).await.unwrap();

        assert_eq!(outcome, ArpOutcome::Replied(mac("02:00:00:00:00:07")));
        assert_eq!(fabric.sent_packets().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_target_dropped_but_sender_learned() {
        let fabric = fabric();
        let proxy = proxy(&fabric, default_config());

        let req = request("10.0.0.1", GATEWAY_MAC, "192.0.2.8");
        let outcome = proxy.handle_arp(n(1), p(1), &req).await.unwrap();

        assert_eq!(outcome, ArpOutcome::Unanswered);
        assert!(fabric.sent_packets().is_empty());
        assert_eq!(proxy.table().lookup(&ip("10.0.0.1")), Some(mac(GATEWAY_MAC)));
    }

    #[tokio::test]
    async fn test_reply_opcode_only_learned() {
        let fabric = fabric();
        let proxy = proxy(&fabric, default_config());
        proxy.observe_ip(ip("192.0.2.7"), mac("02:00:00:00:00:07"));

        let mut reply = request("10.0.0.2", "aa:bb:cc:00:00:02", "192.0.2.7");
        reply.op = ArpOp::Reply;
        assert_eq!(
            proxy.handle_arp(n(2), p(1), &reply).await.unwrap(),
            ArpOutcome::NotARequest
        );

        let mut other = reply;
        other.op = ArpOp::Other(8);
        assert_eq!(
            proxy.handle_arp(n(2), p(1), &other).await.unwrap(),
            ArpOutcome::NotARequest
        );

        assert!(fabric.sent_packets().is_empty());
        assert_eq!(proxy.table().lookup(&ip("10.0.0.2")), Some(mac("aa:bb:cc:00:00:02")));
    }

    #[tokio::test]
    async fn test_unusable_senders_not_learned() {
        let fabric = fabric();
        let proxy = proxy(&fabric, default_config());

        // Address conflict check: sender 0.0.0.0 asking about a tentative address.
        let conflict_check = request("0.0.0.0", "02:00:00:00:00:42", "192.0.2.42");
        proxy.handle_arp(n(1), p(1), &conflict_check).await.unwrap();
        proxy.observe_ip(ip("192.0.2.43"), MacAddress::BROADCAST);
        proxy.observe_ip(ip("192.0.2.44"), MacAddress::ZERO);
        proxy.observe_ip(ip("192.0.2.45"), mac("01:00:5e:00:00:01"));

        assert!(proxy.table().is_empty());
        assert!(fabric.sent_packets().is_empty());

        proxy.observe_ip(ip("192.0.2.46"), mac("02:00:00:00:00:46"));
        assert_eq!(proxy.dump(), vec![(ip("192.0.2.46"), mac("02:00:00:00:00:46"))]);
    }

    #[tokio::test]
    async fn test_stale_binding_is_served_after_move() {
        let fabric = fabric();
        let proxy = proxy(&fabric, default_config());
        proxy.observe_ip(ip("192.0.2.7"), mac("02:00:00:00:00:07"));
        // Host re-addressed: the newer MAC replaces the old one without any conflict check.
        proxy.observe_ip(ip("192.0.2.7"), mac("02:00:00:00:07:07"));

        let req = request("10.0.0.1", GATEWAY_MAC, "192.0.2.7");
        assert_eq!(
            proxy.handle_arp(n(1), p(1), &req).await.unwrap(),
            ArpOutcome::Replied(mac("02:00:00:00:07:07"))
        );
    }

    #[tokio::test]
    async fn test_probe_covers_every_edge_port() {
        let fabric = fabric();
        let proxy = proxy(&fabric, default_config());

        let count = proxy.probe(ip("192.0.2.50")).await.unwrap();

        // Node 1 ports 1,2 and node 2 port 1; ports 3 and 2 are trunks.
        assert_eq!(count, 3);
        let sent = fabric.sent_packets();
        let ports: Vec<(NodeId, PortNo)> = sent.iter().map(|s| (s.node, s.port)).collect();
        assert_eq!(ports, vec![(n(1), p(1)), (n(1), p(2)), (n(2), p(1))]);

        let expected = ArpMessage::request(ip("10.10.0.254"), mac(GATEWAY_MAC), ip("192.0.2.50"));
        assert!(sent.iter().all(|s| s.payload == Payload::Arp(expected)));
        assert!(expected.eth_dst.is_broadcast());
    }

    #[tokio::test]
    async fn test_static_table_load_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("arp.json");
        fs::write(&path, r#"[{"ip": "192.0.2.7", "mac": "02:00:00:00:00:07"}]"#).unwrap();

        let fabric = fabric();
        let proxy = proxy(&fabric, default_config())
            .with_static_table(&path)
            .unwrap();
        assert_eq!(proxy.table().lookup(&ip("192.0.2.7")), Some(mac("02:00:00:00:00:07")));

        proxy.observe_ip(ip("192.0.2.7"), mac("02:00:00:00:99:99"));
        fs::write(
            &path,
            r#"[{"ip": "192.0.2.7", "mac": "02:00:00:00:00:77"}, {"ip": "192.0.2.8", "mac": "02:00:00:00:00:08"}]"#,
        )
        .unwrap();

        assert_eq!(proxy.reload_static().unwrap(), 2);
        assert_eq!(
            proxy.dump(),
            vec![
                (ip("192.0.2.7"), mac("02:00:00:00:00:77")),
                (ip("192.0.2.8"), mac("02:00:00:00:00:08")),
            ]
        );
    }

    #[tokio::test]
    async fn test_reload_without_static_table() {
        let fabric = fabric();
        let proxy = proxy(&fabric, default_config());
        assert!(matches!(proxy.reload_static(), Err(ArpError::NoStaticTable)));
    }
}
