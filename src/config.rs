use std::path::{Path, PathBuf};

use crate::{
    orchestrator::PrimerConfig,
    scenarios::{DockerConfig, NetmapConfig, VpnConfig},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Representation of the `labnet.json` config file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub vpn: VpnConfig,
    pub netmap: NetmapConfig,
    pub docker: DockerConfig,
    /// Directory private keys are written to
    pub key_dir: Option<PathBuf>,
    /// Tunnel priming
    pub priming: PrimerConfig,
}

impl Config {
    /// Load the config from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&file_contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }
}
