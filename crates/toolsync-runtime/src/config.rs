//! Client configuration: built-in defaults, optionally overlaid by a TOML file.
//!
//! ```toml
//! api_url = "http://robot.local:3000"
//! request_timeout_ms = 5000
//!
//! [poll]
//! status_ms = 1000
//!
//! [reconnect]
//! initial_delay_ms = 3000
//! max_delay_ms = 30000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toolsync_core::{ReconnectPolicy, SettingError};
use toolsync_transport::{ChannelOptions, PollConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid config: {0}")]
    Setting(#[from] SettingError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub stream_path: String,
    pub request_timeout_ms: u64,
    pub poll: PollConfig,
    pub reconnect: ReconnectPolicy,
    /// Credential file; the CLI falls back to a per-user default when unset.
    pub credentials_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            stream_path: "/stream".to_string(),
            request_timeout_ms: 10_000,
            poll: PollConfig::default(),
            reconnect: ReconnectPolicy::default(),
            credentials_path: None,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url is empty".into()));
        }
        if !self.stream_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "stream_path must start with '/', got {:?}",
                self.stream_path
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(SettingError::NotPositive("request_timeout_ms").into());
        }
        self.poll.validate()?;
        self.reconnect.validate()?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            reconnect: self.reconnect.clone(),
            poll: self.poll.clone(),
        }
    }
}
