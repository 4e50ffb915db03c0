//! Common SDN-IP types for the routing controller.
//!
//! This crate provides type-safe representations of the network primitives
//! shared by the controller core and its southbound adapters:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`IpAddress`]: IPv4 and IPv6 addresses
//! - [`IpPrefix`]: CIDR prefixes with containment queries
//! - [`NodeId`]: stable switch (datapath) identifiers
//! - [`PortNo`]: switch port numbers

mod ip;
mod mac;
mod node;

pub use ip::{IpAddress, IpPrefix};
pub use mac::MacAddress;
pub use node::{NodeId, PortNo};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid datapath id: {0}")]
    InvalidNodeId(String),

    #[error("invalid port number: {0}")]
    InvalidPortNo(String),
}
