//! Runtime configuration

use crate::error::{ConfigError, Result};
use crate::scope::DEFAULT_SEARCH_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a JSON config file
pub const CONFIG_ENV_VAR: &str = "SCOPEKEEP_CONFIG";

/// Settings for the bookmark service, channel and token store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScopeConfig {
    /// Name the host registers the method channel under
    pub channel_name: String,
    /// Directory levels searched when a bookmarked file has moved
    pub search_depth: usize,
    /// Reissue tokens that resolve stale
    pub refresh_stale_tokens: bool,
    /// Keep issued tokens in the bookmark store
    pub persist_tokens: bool,
    pub database_path: Option<PathBuf>,
    /// Queue depth between the host and the channel server
    pub channel_buffer: usize,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            channel_name: "security_scoped".to_string(),
            search_depth: DEFAULT_SEARCH_DEPTH,
            refresh_stale_tokens: true,
            persist_tokens: true,
            database_path: None,
            channel_buffer: 64,
        }
    }
}

impl ScopeConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                }
                .into())
            }
        };

        let config = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load from the file named by `SCOPEKEEP_CONFIG`, or use the defaults
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    /// Database location: the configured path, else the platform data dir
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database_path.clone().or_else(|| {
            dirs::data_dir().map(|dir| dir.join("scopekeep").join("bookmarks.db"))
        })
    }
}
