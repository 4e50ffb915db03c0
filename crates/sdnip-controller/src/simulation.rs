//! Simulated fabric description.
//!
//! A JSON file describing switches, links, hosts and a list of route
//! announcements lets `sdnipd` run end to end against [`InMemoryFabric`]:
//!
//! ```json
//! { "switches": [ { "dpid": 1, "ports": [1, 2] } ],
//!   "links": [ { "src": 1, "src_port": 2, "dst": 2, "dst_port": 1 } ],
//!   "hosts": [ { "ip": "10.0.0.1", "node": 1, "port": 1, "mac": "aa:bb:cc:00:00:01" } ],
//!   "announcements": [ { "prefix": "203.0.113.0/24", "next_hop": "10.0.0.1" } ] }
//! ```

use crate::error::{Result, SdnIpError};
use crate::route::RouteEvent;
use crate::southbound::{HostAttachment, InMemoryFabric, Link};
use sdnip_types::{IpAddress, IpPrefix, NodeId, PortNo};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchSpec {
    pub dpid: NodeId,
    #[serde(default)]
    pub ports: Vec<PortNo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkSpec {
    pub src: NodeId,
    pub src_port: PortNo,
    pub dst: NodeId,
    pub dst_port: PortNo,
    /// Also add the reverse direction
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnouncementSpec {
    pub prefix: IpPrefix,
    pub next_hop: IpAddress,
    #[serde(default)]
    pub withdraw: bool,
}

fn default_bidirectional() -> bool {
    true
}

/// Parsed fabric file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FabricFile {
    #[serde(default)]
    pub switches: Vec<SwitchSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
    #[serde(default)]
    pub hosts: Vec<HostAttachment>,
    #[serde(default)]
    pub announcements: Vec<AnnouncementSpec>,
}

impl FabricFile {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| SdnIpError::Topology(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| SdnIpError::Topology(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Builds an in-memory fabric holding the described inventory.
    pub fn build_fabric(&self) -> InMemoryFabric {
        let fabric = InMemoryFabric::new();
        for switch in &self.switches {
            fabric.add_switch(switch.dpid, switch.ports.iter().copied());
        }
        for link in &self.links {
            let forward = Link::new(link.src, link.src_port, link.dst, link.dst_port);
            fabric.add_link(forward);
            if link.bidirectional {
                fabric.add_link(forward.reversed());
            }
        }
        for host in &self.hosts {
            fabric.add_host(*host);
        }
        fabric
    }

    /// Switch ids in file order.
    pub fn switch_ids(&self) -> Vec<NodeId> {
        self.switches.iter().map(|switch| switch.dpid).collect()
    }

    /// Announcements as route events, in file order.
    pub fn route_events(&self) -> Vec<RouteEvent> {
        self.announcements
            .iter()
            .map(|a| RouteEvent::BestPathChanged {
                prefix: a.prefix,
                next_hop: a.next_hop,
                is_withdraw: a.withdraw,
            })
            .collect()
    }
}
