//! Reactive, packet-triggered forwarding.

mod forwarder;

pub use forwarder::{BgpForward, InternalRoute, ReactiveForwarder};
