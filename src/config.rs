//! Configuration loading and persistence.
//!
//! Reads `config.json` from the helmsman config directory, falls back to
//! defaults when it is absent, then applies environment overrides.
//!
//! # Environment
//!
//! | Variable                   | Field                  |
//! |----------------------------|------------------------|
//! | `HELMSMAN_CONFIG_DIR`      | (config directory)     |
//! | `HELMSMAN_SOCKET`          | `socket_path`          |
//! | `HELMSMAN_GATEWAY_URL`     | `gateway_url`          |
//! | `HELMSMAN_GATEWAY_TIMEOUT` | `gateway_timeout_secs` |
//! | `HELMSMAN_PAUSED`          | `start_paused`         |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::fs;

use crate::constants::{
    APP_DIR_NAME, DEFAULT_GATEWAY_TIMEOUT, DEFAULT_GATEWAY_URL, SOCKET_FILE_NAME,
};
use crate::protocol::Capability;

/// Name of the configuration file inside the config directory.
const CONFIG_FILE_NAME: &str = "config.json";

/// Configuration shared by the broker and the client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Control socket path.
    pub socket_path: PathBuf,
    /// Base URL of the agent gateway.
    pub gateway_url: String,
    /// Timeout in seconds for gateway requests.
    pub gateway_timeout_secs: u64,
    /// Capabilities the host permission table reports as missing.
    pub denied_capabilities: Vec<Capability>,
    /// Start the broker with the pause gate closed.
    pub start_paused: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_timeout_secs: DEFAULT_GATEWAY_TIMEOUT.as_secs(),
            denied_capabilities: Vec::new(),
            start_paused: false,
        }
    }
}

/// `<data dir>/helmsman/control.sock`.
///
/// macOS: `~/Library/Application Support/helmsman/control.sock`.
pub fn default_socket_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
        .join(SOCKET_FILE_NAME)
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// `HELMSMAN_CONFIG_DIR` when set, otherwise the platform config dir
    /// (macOS: ~/Library/Application Support/helmsman).
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("HELMSMAN_CONFIG_DIR") {
            return Ok(PathBuf::from(dir));
        }
        Ok(dirs::config_dir()
            .context("Could not determine config directory")?
            .join(APP_DIR_NAME))
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_dir()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads `config.json` from `dir`, or defaults if there is none.
    ///
    /// A file that exists but can't be parsed is an error rather than a
    /// silent fallback, so a typo doesn't quietly re-enable denied
    /// capabilities.
    pub fn load_from(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        let mut config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        config.socket_path = expand_path(&config.socket_path);
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally the process
    /// environment). Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(socket) = lookup("HELMSMAN_SOCKET").filter(|s| !s.is_empty()) {
            self.socket_path = expand_path(Path::new(&socket));
        }

        if let Some(url) = lookup("HELMSMAN_GATEWAY_URL").filter(|s| !s.is_empty()) {
            self.gateway_url = url;
        }

        if let Some(timeout) = lookup("HELMSMAN_GATEWAY_TIMEOUT") {
            match timeout.parse::<u64>() {
                Ok(secs) => self.gateway_timeout_secs = secs,
                Err(_) => log::warn!("Ignoring invalid HELMSMAN_GATEWAY_TIMEOUT={:?}", timeout),
            }
        }

        if let Some(paused) = lookup("HELMSMAN_PAUSED") {
            self.start_paused = matches!(paused.trim(), "1" | "true" | "yes");
        }
    }

    /// Persists the configuration to `config.json` in `dir`.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config dir: {}", dir.display()))?;
        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Gateway request timeout.
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }
}

/// Expand `~` and `$VARS` in a configured path, leaving it as-is on failure.
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(e) => {
            log::warn!("Could not expand {:?}: {e}", raw);
            path.to_path_buf()
        }
    }
}
