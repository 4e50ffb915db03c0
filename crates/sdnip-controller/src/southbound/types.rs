//! Southbound data types.
//!
//! Matches and actions are structured values handed to the switch-control
//! channel as-is; the core never encodes protocol bytes itself.

use sdnip_types::{IpAddress, IpPrefix, MacAddress, NodeId, PortNo};
use serde::{Deserialize, Serialize};
use std::fmt;

/// EtherType for IPv4.
pub const ETH_TYPE_IPV4: u16 = 0x0800;
/// EtherType for IPv6.
pub const ETH_TYPE_IPV6: u16 = 0x86dd;
/// EtherType for ARP.
pub const ETH_TYPE_ARP: u16 = 0x0806;
/// IP protocol number for TCP.
pub const IP_PROTO_TCP: u8 = 6;
/// Well-known BGP port.
pub const BGP_PORT: u16 = 179;

/// Priority of the table-miss rule that punts unmatched packets to the controller.
pub const TABLE_MISS_PRIORITY: u16 = 0;
/// Priority of every forwarding rule installed along a path.
pub const PATH_RULE_PRIORITY: u16 = 1;

/// Match predicate for a forwarding rule.
///
/// `None` fields are wildcards, so `FlowMatch::default()` matches every packet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMatch {
    pub eth_type: Option<u16>,
    pub eth_dst: Option<MacAddress>,
    pub ip_dst: Option<IpPrefix>,
    pub ip_proto: Option<u8>,
    pub tcp_dst: Option<u16>,
}

impl FlowMatch {
    /// Wildcard match.
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches IP traffic whose destination falls inside `prefix`.
    ///
    /// Host bits are cleared, so every spelling of a range yields one match key.
    pub fn ip_destination(prefix: IpPrefix) -> Self {
        let eth_type = if prefix.is_ipv4() {
            ETH_TYPE_IPV4
        } else {
            ETH_TYPE_IPV6
        };
        Self {
            eth_type: Some(eth_type),
            ip_dst: Some(prefix.network()),
            ..Self::default()
        }
    }

    pub fn with_eth_dst(mut self, mac: MacAddress) -> Self {
        self.eth_dst = Some(mac);
        self
    }
}

impl fmt::Display for FlowMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(eth_type) = self.eth_type {
            parts.push(format!("eth_type=0x{eth_type:04x}"));
        }
        if let Some(mac) = self.eth_dst {
            parts.push(format!("eth_dst={mac}"));
        }
        if let Some(prefix) = self.ip_dst {
            parts.push(format!("ip_dst={prefix}"));
        }
        if let Some(proto) = self.ip_proto {
            parts.push(format!("ip_proto={proto}"));
        }
        if let Some(port) = self.tcp_dst {
            parts.push(format!("tcp_dst={port}"));
        }
        if parts.is_empty() {
            write!(f, "*")
        } else {
            write!(f, "{}", parts.join(","))
        }
    }
}

/// Action applied by a forwarding rule, in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowAction {
    /// Rewrite the Ethernet destination address.
    SetEthDst(MacAddress),
    /// Forward out of a port.
    Output(PortNo),
    /// Punt to the controller (unbuffered).
    ToController,
}

/// A complete forwarding rule as issued to one switch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowMod {
    pub priority: u16,
    pub matcher: FlowMatch,
    pub actions: Vec<FlowAction>,
}

impl FlowMod {
    pub fn new(priority: u16, matcher: FlowMatch, actions: Vec<FlowAction>) -> Self {
        Self {
            priority,
            matcher,
            actions,
        }
    }

    /// Lowest-priority match-all rule sending misses to the controller.
    pub fn table_miss() -> Self {
        Self::new(
            TABLE_MISS_PRIORITY,
            FlowMatch::any(),
            vec![FlowAction::ToController],
        )
    }

    /// Returns the output port of the rule, if any.
    pub fn output_port(&self) -> Option<PortNo> {
        self.actions.iter().find_map(|action| match action {
            FlowAction::Output(port) => Some(*port),
            _ => None,
        })
    }
}

/// A switch and its ports as reported by the topology service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Switch {
    pub id: NodeId,
    pub ports: Vec<PortNo>,
}

/// Directed adjacency between two switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub src: NodeId,
    pub src_port: PortNo,
    pub dst: NodeId,
    pub dst_port: PortNo,
}

impl Link {
    pub fn new(src: NodeId, src_port: PortNo, dst: NodeId, dst_port: PortNo) -> Self {
        Self {
            src,
            src_port,
            dst,
            dst_port,
        }
    }

    /// Returns the same link seen from the other end.
    pub fn reversed(&self) -> Self {
        Self::new(self.dst, self.dst_port, self.src, self.src_port)
    }
}

/// Where a host with a known address attaches to the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostAttachment {
    pub ip: IpAddress,
    pub node: NodeId,
    pub port: PortNo,
    pub mac: MacAddress,
}

/// ARP operation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArpOp {
    Request,
    Reply,
    Other(u16),
}

impl ArpOp {
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => ArpOp::Request,
            2 => ArpOp::Reply,
            other => ArpOp::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            ArpOp::Request => 1,
            ArpOp::Reply => 2,
            ArpOp::Other(code) => *code,
        }
    }
}

/// Decoded ARP message together with its Ethernet addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArpMessage {
    pub op: ArpOp,
    pub eth_src: MacAddress,
    pub eth_dst: MacAddress,
    pub sender_ip: IpAddress,
    pub sender_mac: MacAddress,
    pub target_ip: IpAddress,
    pub target_mac: MacAddress,
}

impl ArpMessage {
    /// Builds the reply answering `request` with `answer` as the target's MAC.
    pub fn reply_to(request: &ArpMessage, answer: MacAddress) -> Self {
        Self {
            op: ArpOp::Reply,
            eth_src: answer,
            eth_dst: request.sender_mac,
            sender_ip: request.target_ip,
            sender_mac: answer,
            target_ip: request.sender_ip,
            target_mac: request.sender_mac,
        }
    }

    /// Builds a broadcast request asking who owns `target_ip`.
    pub fn request(sender_ip: IpAddress, sender_mac: MacAddress, target_ip: IpAddress) -> Self {
        Self {
            op: ArpOp::Request,
            eth_src: sender_mac,
            eth_dst: MacAddress::BROADCAST,
            sender_ip,
            sender_mac,
            target_ip,
            target_mac: MacAddress::ZERO,
        }
    }
}

/// Payload handed to `send_packet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Structured ARP frame; the channel encodes it.
    Arp(ArpMessage),
    /// Raw bytes of a previously received packet being re-emitted.
    Raw(Vec<u8>),
}

/// TCP source and destination ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpPorts {
    pub src: u16,
    pub dst: u16,
}

impl TcpPorts {
    pub fn involves(&self, port: u16) -> bool {
        self.src == port || self.dst == port
    }
}

/// Header view of a packet punted to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedPacket {
    Arp(ArpMessage),
    Ip {
        eth_src: MacAddress,
        eth_dst: MacAddress,
        src: IpAddress,
        dst: IpAddress,
        tcp: Option<TcpPorts>,
    },
    Other,
}

/// A packet received from a switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketIn {
    pub node: NodeId,
    pub in_port: PortNo,
    pub packet: ObservedPacket,
    pub data: Vec<u8>,
}

/// Event delivered by the southbound channel to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SouthboundEvent {
    SwitchEnter(NodeId),
    SwitchLeave(NodeId),
    PacketIn(PacketIn),
}
