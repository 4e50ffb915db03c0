//! Learned routes: storage, installation and reconciliation.

mod hop_store;
mod orch;
mod reconciler;
mod types;

pub use hop_store::HopStore;
pub use orch::{Result, RouteError, RouteOrch};
pub use reconciler::{ReconcileSummary, Reconciler, DEFAULT_RECONCILE_INTERVAL};
pub use types::{RouteEntry, RouteEvent, RouteOutcome, RouteState};
