//! Route types.

use chrono::{DateTime, Utc};
use sdnip_types::{IpAddress, IpPrefix};
use serde::Serialize;
use std::fmt;

/// Install status of a route entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RouteState {
    /// Recorded, forwarding state not yet confirmed on every ingress switch.
    Pending,
    /// Every ingress switch accepted the forwarding chain.
    Installed,
}

impl fmt::Display for RouteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteState::Pending => write!(f, "pending"),
            RouteState::Installed => write!(f, "installed"),
        }
    }
}

/// A learned external route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub prefix: IpPrefix,
    pub next_hop: IpAddress,
    pub state: RouteState,
    /// Bumped on every advertisement; guards `mark_installed`.
    pub generation: u64,
    pub updated_at: DateTime<Utc>,
}

impl RouteEntry {
    pub fn is_installed(&self) -> bool {
        self.state == RouteState::Installed
    }
}

/// Notification from the route source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEvent {
    BestPathChanged {
        prefix: IpPrefix,
        next_hop: IpAddress,
        is_withdraw: bool,
    },
    PeerUp {
        peer: IpAddress,
        remote_as: u32,
    },
    PeerDown {
        peer: IpAddress,
        remote_as: u32,
    },
}

impl RouteEvent {
    pub fn advertise(prefix: IpPrefix, next_hop: IpAddress) -> Self {
        RouteEvent::BestPathChanged {
            prefix,
            next_hop,
            is_withdraw: false,
        }
    }

    pub fn withdraw(prefix: IpPrefix, next_hop: IpAddress) -> Self {
        RouteEvent::BestPathChanged {
            prefix,
            next_hop,
            is_withdraw: true,
        }
    }
}

/// What handling a route event or an install attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Forwarding state confirmed on every ingress switch.
    Installed,
    /// Entry recorded but left pending for the reconciler.
    Pending,
    /// A newer advertisement or a withdrawal replaced the entry mid-install.
    Superseded,
    /// Entry removed.
    Withdrawn,
    /// Nothing to do: internal prefix, peer event, or unknown prefix.
    Ignored,
}
