//! Switch and port identifiers.
//!
//! Switches are identified by their stable fabric datapath id rather than
//! by any live connection handle, so topology snapshots stay cheap to copy
//! and compare.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable switch (datapath) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn new(dpid: u64) -> Self {
        NodeId(dpid)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the zero-padded hex form used by switch management tools.
    pub fn to_dpid_string(&self) -> String {
        format!("{:016x}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse(),
        };
        parsed
            .map(NodeId)
            .map_err(|_| ParseError::InvalidNodeId(s.to_string()))
    }
}

impl From<u64> for NodeId {
    fn from(dpid: u64) -> Self {
        NodeId(dpid)
    }
}

/// Switch port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNo(u32);

impl PortNo {
    pub const fn new(port: u32) -> Self {
        PortNo(port)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Port 0 is never a valid physical port.
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PortNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PortNo {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse()
            .map(PortNo)
            .map_err(|_| ParseError::InvalidPortNo(s.to_string()))
    }
}

impl From<u32> for PortNo {
    fn from(port: u32) -> Self {
        PortNo(port)
    }
}
