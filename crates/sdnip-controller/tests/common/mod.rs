//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use sdnip::config::{ConfigHandle, SdnIpConfig};
use sdnip::southbound::{HostAttachment, InMemoryFabric};
use sdnip_types::{IpAddress, IpPrefix, MacAddress, NodeId, PortNo};
use std::sync::Arc;

pub const SPEAKER_MAC: &str = "aa:bb:cc:00:00:01";
pub const ROUTER_MAC: &str = "02:00:00:00:02:01";
pub const INTERNAL_HOST_MAC: &str = "02:00:00:00:10:05";

pub const CONFIG_JSON: &str = r#"{
    "local": {
        "as_number": 65113,
        "router_id": "10.0.0.254",
        "listen_port": 2000,
        "networks": ["10.10.0.0/16"]
    },
    "speakers": [
        {"dpid": 1, "port": 1, "mac": "aa:bb:cc:00:00:01", "speaker_ids": ["10.0.0.1"]}
    ]
}"#;

pub fn n(id: u64) -> NodeId {
    NodeId::new(id)
}

pub fn p(port: u32) -> PortNo {
    PortNo::new(port)
}

pub fn ip(s: &str) -> IpAddress {
    s.parse().unwrap()
}

pub fn mac(s: &str) -> MacAddress {
    s.parse().unwrap()
}

pub fn prefix(s: &str) -> IpPrefix {
    s.parse().unwrap()
}

pub fn config_handle() -> Arc<ConfigHandle> {
    Arc::new(ConfigHandle::from_config(
        &SdnIpConfig::from_json(CONFIG_JSON).unwrap(),
    ))
}

pub const LEAVES: [u64; 3] = [1, 2, 3];
pub const SPINE: u64 = 10;
pub const UPLINK: u32 = 10;

/// Leaf-spine fabric: leaves 1, 2, 3 each with host ports 1 and 2 and an
/// uplink on port 10 to spine 10 (spine port = leaf id).
///
/// Hosts: speaker 10.0.0.1 on 1/1, internal host 10.10.0.5 on 2/2.
/// The external router 192.0.2.1 is not attached until
/// [`attach_external_router`] is called.
pub fn leaf_spine() -> Arc<InMemoryFabric> {
    let fabric = Arc::new(InMemoryFabric::new());
    fabric.add_switch(n(SPINE), LEAVES.iter().map(|leaf| p(*leaf as u32)));
    for leaf in LEAVES {
        fabric.add_switch(n(leaf), [p(1), p(2), p(UPLINK)]);
        fabric.connect(n(leaf), p(UPLINK), n(SPINE), p(leaf as u32));
    }

    fabric.add_host(HostAttachment {
        ip: ip("10.0.0.1"),
        node: n(1),
        port: p(1),
        mac: mac(SPEAKER_MAC),
    });
    fabric.add_host(HostAttachment {
        ip: ip("10.10.0.5"),
        node: n(2),
        port: p(2),
        mac: mac(INTERNAL_HOST_MAC),
    });
    fabric
}

/// Attaches 192.0.2.1 to leaf 3 port 1.
pub fn attach_external_router(fabric: &InMemoryFabric) {
    fabric.add_host(HostAttachment {
        ip: ip("192.0.2.1"),
        node: n(3),
        port: p(1),
        mac: mac(ROUTER_MAC),
    });
}
