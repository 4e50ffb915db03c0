//! Periodic retry of pending routes.

use super::orch::RouteOrch;
use super::types::RouteOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Default reconciliation period.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(3);

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub attempted: usize,
    pub installed: usize,
    pub pending: usize,
}

/// Re-runs installation for every pending prefix on a fixed period.
///
/// It does not listen to route or topology events; it only re-polls the
/// store, which is enough to converge once an attachment becomes known.
pub struct Reconciler {
    orch: Arc<RouteOrch>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(orch: Arc<RouteOrch>, interval: Duration) -> Self {
        Self { orch, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One pass over the currently pending prefixes.
    pub async fn reconcile_once(&self) -> ReconcileSummary {
        let pending = self.orch.store().uninstalled_prefixes();
        let mut summary = ReconcileSummary {
            attempted: pending.len(),
            ..Default::default()
        };

        for prefix in &pending {
            match self.orch.try_install(prefix).await {
                RouteOutcome::Installed => summary.installed += 1,
                RouteOutcome::Pending => summary.pending += 1,
                _ => {}
            }
        }

        if summary.attempted > 0 {
            debug!(
                attempted = summary.attempted,
                installed = summary.installed,
                pending = summary.pending,
                "Reconciliation pass"
            );
        }
        summary
    }

    /// Runs until `cancel` fires. The first pass happens one period after start.
    #[instrument(skip_all, fields(interval_ms = self.interval.as_millis() as u64))]
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Reconciler started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.reconcile_once().await;
                }
            }
        }
        info!("Reconciler stopped");
    }
}
