//! Authoritative prefix to next-hop store.

use super::types::{RouteEntry, RouteState};
use chrono::Utc;
use parking_lot::Mutex;
use sdnip_types::{IpAddress, IpPrefix};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<IpPrefix, RouteEntry>,
    next_generation: u64,
}

/// Prefix to next-hop mapping with install status.
///
/// Every operation takes the single store lock, so operations on one prefix
/// are totally ordered. Generations are unique for the lifetime of the store,
/// including across withdraw and re-advertise.
#[derive(Debug, Default)]
pub struct HopStore {
    inner: Mutex<Inner>,
}

impl HopStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an advertisement, resetting the entry to pending.
    ///
    /// Returns the generation to pass to [`HopStore::mark_installed`].
    pub fn record_route(&self, prefix: IpPrefix, next_hop: IpAddress) -> u64 {
        let mut inner = self.inner.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        inner.entries.insert(
            prefix,
            RouteEntry {
                prefix,
                next_hop,
                state: RouteState::Pending,
                generation,
                updated_at: Utc::now(),
            },
        );
        generation
    }

    /// Removes the entry for `prefix`, returning it if present.
    pub fn withdraw(&self, prefix: &IpPrefix) -> Option<RouteEntry> {
        self.inner.lock().entries.remove(prefix)
    }

    /// Marks `prefix` installed if it is still at `generation`.
    ///
    /// Returns false when the entry was withdrawn or re-advertised since the
    /// install attempt started.
    pub fn mark_installed(&self, prefix: &IpPrefix, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(prefix) {
            Some(entry) if entry.generation == generation => {
                entry.state = RouteState::Installed;
                entry.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Prefixes still pending, in ascending order.
    pub fn uninstalled_prefixes(&self) -> Vec<IpPrefix> {
        self.prefixes_in(RouteState::Pending)
    }

    /// Prefixes confirmed installed, in ascending order.
    pub fn installed_prefixes(&self) -> Vec<IpPrefix> {
        self.prefixes_in(RouteState::Installed)
    }

    fn prefixes_in(&self, state: RouteState) -> Vec<IpPrefix> {
        let inner = self.inner.lock();
        let mut prefixes: Vec<IpPrefix> = inner
            .entries
            .values()
            .filter(|entry| entry.state == state)
            .map(|entry| entry.prefix)
            .collect();
        prefixes.sort();
        prefixes
    }

    pub fn next_hop_of(&self, prefix: &IpPrefix) -> Option<IpAddress> {
        self.inner.lock().entries.get(prefix).map(|entry| entry.next_hop)
    }

    pub fn get(&self, prefix: &IpPrefix) -> Option<RouteEntry> {
        self.inner.lock().entries.get(prefix).cloned()
    }

    /// All entries ordered by prefix.
    pub fn snapshot(&self) -> Vec<RouteEntry> {
        let inner = self.inner.lock();
        let mut entries: Vec<RouteEntry> = inner.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.prefix.cmp(&b.prefix));
        entries
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}
