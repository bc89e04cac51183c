//! User configuration.
//!
//! Read from `$META_COMPOSER_CONFIG` or `~/.meta-composer/config.yaml`. A
//! missing file is not an error; every field has a default. A few
//! environment variables override what the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::platform;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "META_COMPOSER_CONFIG";

/// Environment variable overriding [`Config::http_timeout_secs`].
pub const HTTP_TIMEOUT_ENV: &str = "META_COMPOSER_HTTP_TIMEOUT";

/// Environment variable overriding [`Config::rpc_timeout_ms`].
pub const RPC_TIMEOUT_ENV: &str = "META_COMPOSER_RPC_TIMEOUT";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Runtime settings shared by the resource modules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct Config {
    /// Timeout for fetching remote documents, in seconds.
    pub http_timeout_secs: u64,
    /// Timeout for each Neovim RPC call, in milliseconds.
    pub rpc_timeout_ms: u64,
    /// Neovim address used when neither an argument nor `$NVIM` names one.
    pub nvim_server: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            rpc_timeout_ms: u64::try_from(nvim_rpc::DEFAULT_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
            nvim_server: None,
        }
    }
}

impl Config {
    /// Loads the config file (if any) and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed,
    /// or if an override is not a positive integer.
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => default_path(),
        };
        let config = match path {
            Some(path) => Self::from_path(&path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Reads a config file, returning defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadFile`] or [`Error::Yaml`] for unreadable or
    /// malformed files.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_yaml(&content)
    }

    /// Parses YAML config text. Empty input yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] for malformed YAML or unknown keys.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment overrides, looking variables up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a timeout override is not a positive
    /// integer.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(HTTP_TIMEOUT_ENV) {
            self.http_timeout_secs = parse_positive(HTTP_TIMEOUT_ENV, &value)?;
        }
        if let Some(value) = lookup(RPC_TIMEOUT_ENV) {
            self.rpc_timeout_ms = parse_positive(RPC_TIMEOUT_ENV, &value)?;
        }
        Ok(self)
    }

    /// HTTP timeout as a [`Duration`].
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// RPC timeout as a [`Duration`].
    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

fn default_path() -> Option<PathBuf> {
    platform::home_dir()
        .ok()
        .map(|home| home.join(".meta-composer").join("config.yaml"))
}

fn parse_positive(key: &str, value: &str) -> Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::Config(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.rpc_timeout(), Duration::from_millis(2000));
        assert!(config.nvim_server.is_none());
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let config = Config::from_yaml("rpc_timeout_ms: 500\n").unwrap();
        assert_eq!(config.rpc_timeout_ms, 500);
        assert_eq!(config.http_timeout_secs, 30);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = Config::from_yaml("http_timeout: 5\n").unwrap_err();
        assert!(matches!(err, Error::Yaml(_)));
    }

    #[test]
    fn missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let config = Config::from_path(&temp.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "nvim_server: /tmp/nvim.sock\nhttp_timeout_secs: 5\n").unwrap();

        let config = Config::from_path(&path).unwrap();
        assert_eq!(config.nvim_server.as_deref(), Some("/tmp/nvim.sock"));
        assert_eq!(config.http_timeout_secs, 5);
    }

    #[test]
    fn env_overrides_win() {
        let config = Config::default()
            .with_overrides(|key| match key {
                HTTP_TIMEOUT_ENV => Some("7".to_string()),
                RPC_TIMEOUT_ENV => Some(" 250 ".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.http_timeout_secs, 7);
        assert_eq!(config.rpc_timeout_ms, 250);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let err = Config::default()
            .with_overrides(|key| (key == RPC_TIMEOUT_ENV).then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(RPC_TIMEOUT_ENV));

        let err = Config::default()
            .with_overrides(|key| (key == HTTP_TIMEOUT_ENV).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
