//! SDN-IP routing controller core.
//!
//! Turns externally learned IP routes and live fabric topology into
//! per-switch forwarding state, and proxies ARP for fabric-attached hosts.
//!
//! # Components
//!
//! - [`topology`]: topology snapshots and fewest-hop paths
//! - [`path`]: hop-by-hop rule installation along a path
//! - [`route`]: prefix store, route orchestration and the reconciler
//! - [`arp`]: learned bindings and the ARP proxy
//! - [`reactive`]: packet-triggered BGP transit and internal host paths
//! - [`config`]: JSON configuration and the speaker registry
//! - [`southbound`]: the switch-control interface and an in-memory fabric
//! - [`daemon`]: task wiring and the operator command surface

pub mod arp;
pub mod config;
pub mod daemon;
pub mod error;
pub mod path;
pub mod reactive;
pub mod route;
pub mod simulation;
pub mod southbound;
pub mod topology;

pub use error::{Result, SdnIpError};
