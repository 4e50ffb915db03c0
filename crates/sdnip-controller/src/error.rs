//! Crate-level error type.

use crate::arp::ArpError;
use crate::config::ConfigError;
use crate::path::InstallError;
use crate::route::RouteError;
use crate::southbound::SouthboundError;
use thiserror::Error;

/// Top-level error for the controller.
#[derive(Debug, Error)]
pub enum SdnIpError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("southbound error: {0}")]
    Southbound(#[from] SouthboundError),

    #[error("path installation error: {0}")]
    Install(#[from] InstallError),

    #[error("route error: {0}")]
    Route(#[from] RouteError),

    #[error("ARP error: {0}")]
    Arp(#[from] ArpError),

    #[error("controller is shut down")]
    ShutDown,

    #[error("topology file error: {0}")]
    Topology(String),
}

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, SdnIpError>;
