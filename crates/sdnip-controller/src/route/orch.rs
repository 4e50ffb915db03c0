//! Route orchestration: turns route events into forwarding state.

use super::hop_store::HopStore;
use super::types::{RouteEvent, RouteOutcome};
use crate::config::ConfigHandle;
use crate::path::{InstallError, PathInstaller};
use crate::southbound::{FlowAction, FlowMatch, SouthboundError};
use parking_lot::Mutex;
use sdnip_types::{IpAddress, IpPrefix};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

/// Route installation errors. All of them leave the entry pending.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("next hop {next_hop} for {prefix} has no known attachment point")]
    AttachmentUnresolved { prefix: IpPrefix, next_hop: IpAddress },

    #[error("{prefix} failed on {failed} of {attempted} ingress switches")]
    PartialInstall {
        prefix: IpPrefix,
        failed: usize,
        attempted: usize,
    },

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    #[error("southbound error: {0}")]
    Southbound(#[from] SouthboundError),
}

/// Result type for RouteOrch operations.
pub type Result<T> = std::result::Result<T, RouteError>;

/// Applies route-source events to the [`HopStore`] and programs every
/// ingress switch for each learned prefix.
pub struct RouteOrch {
    store: Arc<HopStore>,
    installer: Arc<PathInstaller>,
    config: Arc<ConfigHandle>,
    /// Held across an install; one per prefix with an install in flight.
    install_locks: Mutex<HashMap<IpPrefix, Arc<AsyncMutex<()>>>>,
}

impl RouteOrch {
    pub fn new(store: Arc<HopStore>, installer: Arc<PathInstaller>, config: Arc<ConfigHandle>) -> Self {
        Self {
            store,
            installer,
            config,
            install_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<HopStore> {
        &self.store
    }

    /// Handles one route-source event. Never fails; errors are logged and the
    /// affected entry is left for the reconciler.
    #[instrument(skip(self), level = "debug")]
    pub async fn handle_route_event(&self, event: RouteEvent) -> RouteOutcome {
        match event {
            RouteEvent::PeerUp { peer, remote_as } => {
                info!(peer = %peer, remote_as, "Peer up");
                RouteOutcome::Ignored
            }
            RouteEvent::PeerDown { peer, remote_as } => {
                info!(peer = %peer, remote_as, "Peer down");
                RouteOutcome::Ignored
            }
            RouteEvent::BestPathChanged {
                prefix,
                next_hop,
                is_withdraw,
            } => {
                let prefix = prefix.network();
                if self.config.current().is_internal_prefix(&prefix) {
                    debug!(prefix = %prefix, "Ignoring route for internal network");
                    return RouteOutcome::Ignored;
                }

                if is_withdraw {
                    return match self.store.withdraw(&prefix) {
                        Some(_) => {
                            info!(prefix = %prefix, "Route withdrawn");
                            RouteOutcome::Withdrawn
                        }
                        None => RouteOutcome::Ignored,
                    };
                }

                self.store.record_route(prefix, next_hop);
                info!(prefix = %prefix, next_hop = %next_hop, "Best path changed");
                self.try_install(&prefix).await
            }
        }
    }

    /// Runs [`RouteOrch::install_route`] and folds errors into an outcome.
    pub async fn try_install(&self, prefix: &IpPrefix) -> RouteOutcome {
        match self.install_route(prefix).await {
            Ok(outcome) => outcome,
            Err(e @ RouteError::AttachmentUnresolved { .. }) => {
                debug!(error = %e, "Deferring route installation");
                RouteOutcome::Pending
            }
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Route installation incomplete");
                RouteOutcome::Pending
            }
        }
    }

    /// Programs `prefix` on every ingress switch towards its next hop.
    ///
    /// Installs of the same prefix run one at a time and each reads the entry
    /// only once it holds the prefix lock, so the last install to finish always
    /// programs the newest next hop. The entry is marked installed only when
    /// every ingress switch accepted its chain and no newer advertisement
    /// arrived meanwhile.
    pub async fn install_route(&self, prefix: &IpPrefix) -> Result<RouteOutcome> {
        let lock = self.install_lock(prefix);
        let result = {
            let _guard = lock.lock().await;
            self.install_current(prefix).await
        };
        self.release_install_lock(prefix, lock);
        result
    }

    fn install_lock(&self, prefix: &IpPrefix) -> Arc<AsyncMutex<()>> {
        self.install_locks.lock().entry(*prefix).or_default().clone()
    }

    fn release_install_lock(&self, prefix: &IpPrefix, lock: Arc<AsyncMutex<()>>) {
        let mut locks = self.install_locks.lock();
        // The map and this handle are the only owners left.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(prefix);
        }
    }

    async fn install_current(&self, prefix: &IpPrefix) -> Result<RouteOutcome> {
        let Some(entry) = self.store.get(prefix) else {
            return Ok(RouteOutcome::Ignored);
        };

        let attachment = self
            .installer
            .southbound()
            .find_host(&entry.next_hop)
            .await?
            .ok_or(RouteError::AttachmentUnresolved {
                prefix: *prefix,
                next_hop: entry.next_hop,
            })?;

        let ingress = self.installer.all_ingress_nodes().await?;
        let matcher = FlowMatch::ip_destination(*prefix);
        let rewrite = [FlowAction::SetEthDst(attachment.mac)];

        let mut failed = 0;
        for node in &ingress {
            if let Err(e) = self
                .installer
                .install_path(*node, attachment.node, attachment.port, &matcher, &rewrite)
                .await
            {
                debug!(prefix = %prefix, ingress = %node, error = %e, "Ingress switch not programmed");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(RouteError::PartialInstall {
                prefix: *prefix,
                failed,
                attempted: ingress.len(),
            });
        }

        if self.store.mark_installed(prefix, entry.generation) {
            info!(prefix = %prefix, next_hop = %entry.next_hop, switches = ingress.len(), "Route installed");
            Ok(RouteOutcome::Installed)
        } else {
            debug!(prefix = %prefix, "Route changed during installation");
            Ok(RouteOutcome::Superseded)
        }
    }
}
