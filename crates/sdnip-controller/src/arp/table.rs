//! Learned IP to MAC bindings.

use super::{ArpError, Result};
use parking_lot::Mutex;
use sdnip_types::{IpAddress, MacAddress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One record of a static ARP table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticBinding {
    pub ip: IpAddress,
    pub mac: MacAddress,
}

/// Reads a static ARP table file (a JSON list of `{"ip", "mac"}` records).
pub fn read_static_table(path: impl AsRef<Path>) -> Result<Vec<StaticBinding>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ArpError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&content)
        .map_err(|e| ArpError::Parse(format!("{}: {}", path.display(), e)))
}

/// IP to MAC bindings. Last write wins and nothing expires.
#[derive(Debug, Default)]
pub struct ArpTable {
    bindings: Mutex<HashMap<IpAddress, MacAddress>>,
}

impl ArpTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `ip -> mac`, returning the previous binding if it differed.
    pub fn learn(&self, ip: IpAddress, mac: MacAddress) -> Option<MacAddress> {
        self.bindings
            .lock()
            .insert(ip, mac)
            .filter(|previous| *previous != mac)
    }

    pub fn lookup(&self, ip: &IpAddress) -> Option<MacAddress> {
        self.bindings.lock().get(ip).copied()
    }

    /// Overwrites bindings with `records`, returning how many were applied.
    pub fn load(&self, records: &[StaticBinding]) -> usize {
        let mut bindings = self.bindings.lock();
        for record in records {
            bindings.insert(record.ip, record.mac);
        }
        records.len()
    }

    /// All bindings ordered by address.
    pub fn dump(&self) -> Vec<(IpAddress, MacAddress)> {
        let mut entries: Vec<(IpAddress, MacAddress)> = self
            .bindings
            .lock()
            .iter()
            .map(|(ip, mac)| (*ip, *mac))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.bindings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.lock().is_empty()
    }
}
