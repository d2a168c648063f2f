//! Manager configuration: the shared wait timeout and the diagnostic toggles.
//!
//! Read from `~/.tether/config.toml` by default:
//!
//! ```toml
//! timeout_secs = 5.0
//!
//! [debug]
//! print = false
//! warn = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Timeout applied when no config overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> f64 {
    DEFAULT_TIMEOUT.as_secs_f64()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config")]
    Syntax(#[from] toml::de::Error),
    #[error("timeout_secs must be a finite, non-negative number of seconds, got {value}")]
    InvalidTimeout { value: f64 },
}

impl ConfigError {
    /// The file the error came from, when there was one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => Some(path),
            Self::Syntax(_) | Self::InvalidTimeout { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    /// Shared wait timeout in seconds. Default: 5.0.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            debug: DebugConfig::default(),
        }
    }
}

/// Which manager diagnostics reach the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Informational messages (binds, unbinds, starts). Default: false.
    #[serde(default)]
    pub print: bool,
    /// Warnings (timeouts, out-of-scope tags, cancelled starts). Default: true.
    #[serde(default = "default_true")]
    pub warn: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            print: false,
            warn: true,
        }
    }
}

impl ManagerConfig {
    /// The configured timeout.
    ///
    /// Falls back to [`DEFAULT_TIMEOUT`] if `timeout_secs` was set to
    /// something [`ManagerConfig::validate`] would reject.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_secs).unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.timeout_secs.is_finite() || Duration::try_from_secs_f64(self.timeout_secs).is_err()
        {
            return Err(ConfigError::InvalidTimeout {
                value: self.timeout_secs,
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {}", path.display(), source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {}", path.display(), source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.tether/config.toml`, if a home directory is known.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".tether").join("config.toml"))
    }

    /// Load the default config file. `Ok(None)` when there is none.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        let Some(path) = Self::default_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }
}
