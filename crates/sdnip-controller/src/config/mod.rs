//! Controller configuration and the speaker registry built from it.

mod file;
mod registry;

pub use file::{LocalConfig, SdnIpConfig, SpeakerConfig, DEFAULT_CONFIG_PATH};
pub use registry::{AttachmentPoint, NeighborConfig, SpeakerRegistry};

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Configuration errors. Fatal at startup, reported but survivable on reload.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("no configuration file to reload from")]
    NoSource,
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Shared, reloadable handle to the current [`SpeakerRegistry`].
///
/// Readers take an `Arc` snapshot and never block a reload for longer than
/// the pointer swap.
#[derive(Debug)]
pub struct ConfigHandle {
    path: Option<PathBuf>,
    registry: RwLock<Arc<SpeakerRegistry>>,
}

impl ConfigHandle {
    /// Loads the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = SdnIpConfig::load(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            registry: RwLock::new(Arc::new(SpeakerRegistry::from_config(&config))),
        })
    }

    /// Wraps an already validated configuration that has no backing file.
    pub fn from_config(config: &SdnIpConfig) -> Self {
        Self {
            path: None,
            registry: RwLock::new(Arc::new(SpeakerRegistry::from_config(config))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Current registry snapshot.
    pub fn current(&self) -> Arc<SpeakerRegistry> {
        self.registry.read().clone()
    }

    /// Re-reads the whole file and swaps the registry in.
    ///
    /// On any error the previous registry stays in effect.
    pub fn reload(&self) -> Result<Arc<SpeakerRegistry>> {
        let path = self.path.as_ref().ok_or(ConfigError::NoSource)?;
        match SdnIpConfig::load(path) {
            Ok(config) => {
                let registry = Arc::new(SpeakerRegistry::from_config(&config));
                *self.registry.write() = registry.clone();
                info!(
                    path = %path.display(),
                    endpoints = registry.endpoints().len(),
                    "Configuration reloaded"
                );
                Ok(registry)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Reload failed, keeping previous configuration");
                Err(e)
            }
        }
    }
}
