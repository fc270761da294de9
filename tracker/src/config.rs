//! Configuration for dxtrack.
//!
//! Two kinds of configuration live here: process environment flags that
//! shape a single run, and the per-user credentials cache that survives
//! between runs.
//!
//! # Environment Variables
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `DX_LOG_LEVEL` | Log verbosity (`trace`..`error`, default `info`) |
//! | `DX_TEST_MODE` | `true` tags outgoing events as test data |
//! | `DX_FORCE_OFFLINE_MODE` | `true` forces offline mode |
//! | `DISABLE_DX_TRACKING` | `true` disables tracking entirely |
//!
//! # Files
//!
//! Credentials are cached at `~/.local/share/dx/config.json` and the event
//! queue lives next to it at `~/.local/share/dx/events.json`. Both are
//! created with owner-only permissions.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;

/// Log verbosity environment variable.
pub const ENV_LOG_LEVEL: &str = "DX_LOG_LEVEL";

/// Test mode environment variable.
pub const ENV_TEST_MODE: &str = "DX_TEST_MODE";

/// Forced offline mode environment variable.
pub const ENV_FORCE_OFFLINE_MODE: &str = "DX_FORCE_OFFLINE_MODE";

/// Tracking kill-switch environment variable.
pub const ENV_DISABLE_TRACKING: &str = "DISABLE_DX_TRACKING";

/// Data directory components relative to home: `.local/share/dx`.
const DATA_DIR_PARTS: [&str; 3] = [".local", "share", "dx"];

/// Credentials cache filename.
const CONFIG_FILE: &str = "config.json";

/// Event queue filename.
const EVENTS_FILE: &str = "events.json";

/// Errors that can occur while reading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `DX_LOG_LEVEL` could not be parsed as a log level.
    #[error("invalid value for {ENV_LOG_LEVEL}: '{value}'")]
    InvalidLogLevel { value: String },

    /// Failed to determine home directory.
    #[error("failed to determine home directory")]
    NoHomeDirectory,

    /// Credentials file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Credentials file contents could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Environment flags for a single tracker run, resolved once at startup.
#[derive(Debug, Clone)]
pub struct TrackingEnv {
    /// Log verbosity, from `DX_LOG_LEVEL`.
    pub log_level: Level,

    /// Outgoing events carry `test_data: true`, from `DX_TEST_MODE`.
    pub test_mode: bool,

    /// Offline mode is forced regardless of credentials, from
    /// `DX_FORCE_OFFLINE_MODE`.
    pub force_offline: bool,

    /// Tracking is disabled entirely, from `DISABLE_DX_TRACKING`.
    pub disabled: bool,
}

impl TrackingEnv {
    /// Reads all tracking flags from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidLogLevel` if `DX_LOG_LEVEL` is set to
    /// something that is not a log level. This is the only environment
    /// parse failure that is fatal to tracker construction.
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_level = match env::var(ENV_LOG_LEVEL) {
            Ok(value) if !value.is_empty() => {
                value
                    .parse::<Level>()
                    .map_err(|_| ConfigError::InvalidLogLevel { value })?
            }
            _ => Level::INFO,
        };

        Ok(Self {
            log_level,
            test_mode: env_flag(ENV_TEST_MODE),
            force_offline: env_flag(ENV_FORCE_OFFLINE_MODE),
            disabled: env_flag(ENV_DISABLE_TRACKING),
        })
    }
}

/// Returns true when the variable is set to exactly `"true"`.
fn env_flag(key: &str) -> bool {
    env::var(key).is_ok_and(|v| v == "true")
}

/// Locations of the credentials cache and the event queue file.
#[derive(Debug, Clone)]
pub struct DataPaths {
    /// Credentials cache path.
    pub config_path: PathBuf,

    /// Event queue path.
    pub events_path: PathBuf,
}

impl DataPaths {
    /// Resolves the default paths under `~/.local/share/dx/`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoHomeDirectory` if the home directory cannot
    /// be determined.
    pub fn from_home() -> Result<Self, ConfigError> {
        let base_dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDirectory)?;
        let mut dir = base_dirs.home_dir().to_path_buf();
        for part in DATA_DIR_PARTS {
            dir.push(part);
        }
        Ok(Self::in_dir(&dir))
    }

    /// Places both files inside `dir`. Used by tests and embedders.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config_path: dir.join(CONFIG_FILE),
            events_path: dir.join(EVENTS_FILE),
        }
    }
}

/// Cached credentials for the analytics API.
///
/// Written lazily on the first successful GitHub CLI derivation and read on
/// every tracker construction. Never mutated in place; saving rewrites the
/// whole file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token for the analytics API.
    pub dx_api_token: String,

    /// GitHub username attached to outgoing events.
    pub github_username: String,
}

impl Credentials {
    /// Returns true when both fields are non-empty.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.dx_api_token.is_empty() && !self.github_username.is_empty()
    }

    /// Loads credentials from `path`.
    ///
    /// An absent file is `Ok(None)`; an unreadable or unparseable file is
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` or `ConfigError::Json` on read or parse
    /// failure.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)?;
        let credentials = serde_json::from_str(&contents)?;
        Ok(Some(credentials))
    }

    /// Saves credentials to `path`, creating parent directories as needed.
    ///
    /// The file is written with owner-only permissions on unix.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` on write failure.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }
}
