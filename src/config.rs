use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::driver::RetryPolicy;
use crate::error::TrackerError;

pub const DEFAULT_DATA_DIR: &str = ".tasktrack";

/// Runtime settings. Read from `<data-dir>/config.json` when present, then
/// overridden by `TASKTRACK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Base URL the client delivers queued requests to.
    pub server_url: String,
    /// Address `serve` listens on.
    pub listen_addr: String,
    pub retry_secs: u64,
    pub corrupt_retry_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            server_url: "http://127.0.0.1:3000".into(),
            listen_addr: "127.0.0.1:3000".into(),
            retry_secs: 300,
            corrupt_retry_ms: 50,
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Resolves the data directory (flag, then `TASKTRACK_DIR`, then the
    /// default) and loads the configuration found there.
    pub fn load(data_dir_flag: Option<&Path>) -> Result<Self, TrackerError> {
        let data_dir = data_dir_flag
            .map(Path::to_path_buf)
            .or_else(|| env::var_os("TASKTRACK_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let mut config = Self::from_dir(&data_dir)?;
        config.apply_env(|name| env::var(name).ok())?;
        Ok(config)
    }

    /// Loads `config.json` from `data_dir`, falling back to defaults.
    pub fn from_dir(data_dir: &Path) -> Result<Self, TrackerError> {
        let path = data_dir.join("config.json");
        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| TrackerError::config(format!("Failed to read {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| TrackerError::config(format!("Invalid {}: {e}", path.display())))?
        } else {
            Self::default()
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), TrackerError> {
        if let Some(url) = lookup("TASKTRACK_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(addr) = lookup("TASKTRACK_ADDR") {
            self.listen_addr = addr;
        }
        if let Some(secs) = parse_var(&lookup, "TASKTRACK_RETRY_SECS")? {
            self.retry_secs = secs;
        }
        if let Some(ms) = parse_var(&lookup, "TASKTRACK_CORRUPT_RETRY_MS")? {
            self.corrupt_retry_ms = ms;
        }
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.data_dir.join("server.db")
    }

    pub fn client_db_path(&self) -> PathBuf {
        self.data_dir.join("client.db")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            connectivity: Duration::from_secs(self.retry_secs),
            corrupted: Duration::from_millis(self.corrupt_retry_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, TrackerError> {
        self.listen_addr
            .parse()
            .map_err(|e| TrackerError::config(format!("Invalid listen address '{}': {e}", self.listen_addr)))
    }

    /// Writes the current settings as `config.json`.
    pub fn save(&self) -> Result<(), TrackerError> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(self.config_path(), raw)
            .map_err(|e| TrackerError::config(format!("Failed to write config: {e}")))
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, TrackerError>
where
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| TrackerError::config(format!("{name}='{raw}' is invalid: {e}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_when_no_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::from_dir(dir.path()).unwrap();
        assert_eq!(config.retry_secs, 300);
        assert_eq!(config.server_db_path(), dir.path().join("server.db"));
        assert_eq!(config.retry_policy().connectivity, Duration::from_secs(300));
    }

    #[test]
    fn file_then_env_overrides() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("config.json"),
            r#"{ "server_url": "http://example:8080", "retry_secs": 10 }"#,
        )
        .unwrap();
        let mut config = Config::from_dir(dir.path()).unwrap();
        assert_eq!(config.server_url, "http://example:8080");
        assert_eq!(config.listen_addr, "127.0.0.1:3000");

        config
            .apply_env(|name| match name {
                "TASKTRACK_RETRY_SECS" => Some("5".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.retry_secs, 5);
        assert_eq!(config.server_url, "http://example:8080");
    }

    #[test]
    fn bad_env_value_is_a_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(|name| (name == "TASKTRACK_CORRUPT_RETRY_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ConfigError);
    }

    #[test]
    fn saved_config_reloads() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::from_dir(dir.path()).unwrap();
        config.listen_addr = "0.0.0.0:9000".into();
        config.save().unwrap();
        let reloaded = Config::from_dir(dir.path()).unwrap();
        assert_eq!(reloaded, config);
        assert!(reloaded.listen_addr().is_ok());
    }
}
