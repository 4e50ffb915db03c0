//! Speaker registry: the read-only view of the configuration used at runtime.

use super::file::{LocalConfig, SdnIpConfig};
use sdnip_types::{IpAddress, IpPrefix, MacAddress, NodeId, PortNo};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Where a route-source endpoint attaches to the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AttachmentPoint {
    pub endpoint_id: IpAddress,
    pub node: NodeId,
    pub port: PortNo,
    pub mac: MacAddress,
}

/// A BGP neighbor the route source should be configured with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborConfig {
    pub address: IpAddress,
    pub remote_as: u32,
    pub next_hop_self: bool,
}

/// Endpoint attachments and internally owned address ranges.
///
/// Built once from a validated [`SdnIpConfig`] and never mutated; a reload
/// replaces the whole registry.
#[derive(Debug, Clone, Default)]
pub struct SpeakerRegistry {
    local: LocalConfig,
    endpoints: Vec<AttachmentPoint>,
    by_id: HashMap<IpAddress, usize>,
    by_node: BTreeMap<NodeId, Vec<usize>>,
}

impl SpeakerRegistry {
    pub fn from_config(config: &SdnIpConfig) -> Self {
        let mut registry = SpeakerRegistry {
            local: config.local.clone(),
            ..Default::default()
        };

        for speaker in &config.speakers {
            for id in &speaker.speaker_ids {
                // First registration wins if the config was not validated.
                if registry.by_id.contains_key(id) {
                    continue;
                }
                let index = registry.endpoints.len();
                registry.endpoints.push(AttachmentPoint {
                    endpoint_id: *id,
                    node: speaker.dpid,
                    port: speaker.port,
                    mac: speaker.mac,
                });
                registry.by_id.insert(*id, index);
                registry.by_node.entry(speaker.dpid).or_default().push(index);
            }
        }

        registry
    }

    pub fn local(&self) -> &LocalConfig {
        &self.local
    }

    pub fn as_number(&self) -> u32 {
        self.local.as_number
    }

    pub fn router_id(&self) -> IpAddress {
        self.local.router_id
    }

    pub fn listen_port(&self) -> u16 {
        self.local.listen_port
    }

    /// All endpoints in configuration order.
    pub fn endpoints(&self) -> &[AttachmentPoint] {
        &self.endpoints
    }

    /// The first registered endpoint, which answers ARP for internal hosts.
    pub fn first_endpoint(&self) -> Option<&AttachmentPoint> {
        self.endpoints.first()
    }

    pub fn attachment(&self, endpoint_id: &IpAddress) -> Option<&AttachmentPoint> {
        self.by_id.get(endpoint_id).map(|index| &self.endpoints[*index])
    }

    /// Endpoints attached to `node`, in configuration order.
    pub fn endpoints_on(&self, node: NodeId) -> Vec<&AttachmentPoint> {
        self.by_node
            .get(&node)
            .map(|indices| indices.iter().map(|index| &self.endpoints[*index]).collect())
            .unwrap_or_default()
    }

    pub fn internal_networks(&self) -> &[IpPrefix] {
        &self.local.networks
    }

    /// Returns true if `addr` falls inside an internally owned range.
    pub fn is_internal_host(&self, addr: &IpAddress) -> bool {
        self.local.networks.iter().any(|net| net.contains(addr))
    }

    /// Returns true if `prefix` equals or sits inside an internally owned range.
    pub fn is_internal_prefix(&self, prefix: &IpPrefix) -> bool {
        self.local.networks.iter().any(|net| net.covers(prefix))
    }

    /// BGP neighbors to configure on the route source, one per endpoint.
    pub fn neighbors(&self) -> Vec<NeighborConfig> {
        self.endpoints
            .iter()
            .map(|endpoint| NeighborConfig {
                address: endpoint.endpoint_id,
                remote_as: self.local.as_number,
                next_hop_self: true,
            })
            .collect()
    }
}
