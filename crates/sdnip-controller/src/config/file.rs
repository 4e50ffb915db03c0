//! Configuration file support for sdnipd.
//!
//! Loads and validates the controller configuration from a JSON file.
//! Default location: /usr/local/etc/sdnip/config.json

use super::{ConfigError, Result};
use sdnip_types::{IpAddress, IpPrefix, MacAddress, NodeId, PortNo};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/sdnip/config.json";

/// Local routing identity handed to the route source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Local autonomous system number
    #[serde(default = "default_as_number")]
    pub as_number: u32,

    /// Router id announced by the route source
    #[serde(default = "default_router_id")]
    pub router_id: IpAddress,

    /// TCP port the route source listens on
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Address ranges owned by this fabric
    #[serde(default)]
    pub networks: Vec<IpPrefix>,
}

/// One route-source speaker and where it plugs into the fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeakerConfig {
    /// Switch the speaker is attached to
    pub dpid: NodeId,

    /// Switch port the speaker is attached to
    pub port: PortNo,

    /// Speaker interface MAC address
    pub mac: MacAddress,

    /// Peer addresses reachable through this attachment
    pub speaker_ids: Vec<IpAddress>,
}

/// Complete sdnipd configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdnIpConfig {
    pub local: LocalConfig,
    pub speakers: Vec<SpeakerConfig>,
}

fn default_as_number() -> u32 {
    65113
}

fn default_router_id() -> IpAddress {
    IpAddress::V4(Ipv4Addr::LOCALHOST)
}

fn default_listen_port() -> u16 {
    2000
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            as_number: default_as_number(),
            router_id: default_router_id(),
            listen_port: default_listen_port(),
            networks: Vec::new(),
        }
    }
}

impl SdnIpConfig {
    /// Parses and validates configuration text.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: SdnIpConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates configuration from `path`.
    ///
    /// Unlike most daemons there is no fallback to defaults: without a
    /// speaker registry the controller has nothing to route.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|e| match e {
            ConfigError::Parse(msg) => {
                ConfigError::Parse(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.local.listen_port == 0 {
            return Err(ConfigError::Invalid("listen_port must be > 0".to_string()));
        }

        let mut seen = HashSet::new();
        for speaker in &self.speakers {
            if !speaker.port.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "speaker on switch {} has port 0",
                    speaker.dpid
                )));
            }
            if speaker.mac.is_multicast() {
                return Err(ConfigError::Invalid(format!(
                    "speaker MAC {} is not a unicast address",
                    speaker.mac
                )));
            }
            for id in &speaker.speaker_ids {
                if !seen.insert(*id) {
                    return Err(ConfigError::Invalid(format!(
                        "speaker id {} is configured more than once",
                        id
                    )));
                }
            }
        }

        Ok(())
    }
}
