//! ARP proxy and its learned binding table.

mod proxy;
mod table;

pub use proxy::{ArpOutcome, ArpProxy};
pub use table::{read_static_table, ArpTable, StaticBinding};

use crate::southbound::SouthboundError;
use thiserror::Error;

/// ARP proxy errors.
#[derive(Debug, Error)]
pub enum ArpError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse static ARP table: {0}")]
    Parse(String),

    #[error("no static ARP table configured")]
    NoStaticTable,

    #[error("topology unavailable: {0}")]
    Topology(String),

    #[error("southbound error: {0}")]
    Southbound(#[from] SouthboundError),
}

/// Result type for ARP proxy operations.
pub type Result<T> = std::result::Result<T, ArpError>;
