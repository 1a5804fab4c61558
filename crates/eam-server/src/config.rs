//! Server configuration
//!
//! Loaded from TOML; every field has a default so an empty or missing file
//! yields a working in-memory server.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use eam_core::{Directory, UserRecord, VcConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// SQLite database file; in-memory store when absent
    #[serde(default)]
    pub database: Option<PathBuf>,

    /// Seconds between lock reaper passes; reaper off when absent
    #[serde(default)]
    pub reaper_interval_secs: Option<u64>,

    #[serde(default)]
    pub version_control: VcConfig,

    /// Directory entries backing the permission policy
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database: None,
            reaper_interval_secs: None,
            version_control: VcConfig::default(),
            users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Read `path` if it exists, defaults otherwise
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    #[must_use]
    pub fn directory(&self) -> Directory {
        Directory::new(self.users.iter().cloned())
    }
}
