use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::events::ReconnectConfig;
use crate::job::request::{MAX_DURATION, MIN_DURATION};
use crate::upload::YoutubePrivacy;
use crate::ClipperError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Where the clip service lives
    pub server: ServerConfig,

    /// Polling and push-channel timing
    pub progress: ProgressConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the HTTP API
    pub base_url: String,

    /// Base URL of the push channel; derived from `base_url` when unset
    pub ws_url: Option<String>,

    /// Per-request timeout
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Interval between status polls while a job runs
    pub poll_interval_ms: u64,

    /// First push-channel reconnect delay
    pub reconnect_initial_ms: u64,

    /// Upper bound on the reconnect delay
    pub reconnect_max_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Clip length used when `--duration` is not given
    pub default_duration: u32,

    /// YouTube privacy used when `--privacy` is not given
    pub default_privacy: YoutubePrivacy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            ws_url: None,
            request_timeout_secs: 30,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
            reconnect_initial_ms: 1000,
            reconnect_max_ms: 30_000,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_duration: 30,
            default_privacy: YoutubePrivacy::Private,
        }
    }
}

impl ServerConfig {
    /// Push-channel base URL, `ws(s)://` mirroring the HTTP scheme when not configured
    pub fn push_url(&self) -> String {
        if let Some(ws_url) = &self.ws_url {
            return ws_url.trim_end_matches('/').to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        }
    }
}

impl ProgressConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(self.reconnect_initial_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms),
            ..ReconnectConfig::default()
        }
    }
}

impl Config {
    /// Load configuration from `path`, the default locations, or create a default file
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: Config = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::debug!("Wrote default configuration to {}", config_path.display());
            Ok(config)
        }
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // A project-local file wins
        let local_config = PathBuf::from("clipper.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("clipper").join("config.yaml"))
    }

    /// Session cookie file kept next to the configuration file in use
    pub fn cookie_path(config_file: &Path) -> PathBuf {
        config_file.with_file_name("cookies.yaml")
    }

    /// Point the client at another server, e.g. from `--server`
    pub fn with_server(mut self, base_url: Option<String>) -> Result<Self> {
        if let Some(base_url) = base_url {
            self.server.base_url = base_url;
            self.validate()?;
        }
        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(&self.server.base_url)
            .map_err(|e| ClipperError::Config(format!("Invalid server URL '{}': {}", self.server.base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClipperError::Config(format!("Server URL must be http(s): {}", self.server.base_url)).into());
        }

        if let Some(ws_url) = &self.server.ws_url {
            let ws = Url::parse(ws_url)
                .map_err(|e| ClipperError::Config(format!("Invalid push URL '{}': {}", ws_url, e)))?;
            if !matches!(ws.scheme(), "ws" | "wss") {
                return Err(ClipperError::Config(format!("Push URL must be ws(s): {}", ws_url)).into());
            }
        }

        if self.progress.poll_interval_ms == 0 {
            return Err(ClipperError::Config("Poll interval must be greater than zero".into()).into());
        }

        if self.progress.reconnect_initial_ms > self.progress.reconnect_max_ms {
            return Err(ClipperError::Config("Reconnect initial delay exceeds the maximum".into()).into());
        }

        if !(MIN_DURATION..=MAX_DURATION).contains(&self.app.default_duration) {
            return Err(ClipperError::Config(format!(
                "Default duration must be between {} and {} seconds",
                MIN_DURATION, MAX_DURATION
            ))
            .into());
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Server: {}", self.server.base_url);
        println!("  Push Channel: {}", self.server.push_url());
        println!("  Request Timeout: {}s", self.server.request_timeout_secs);
        println!("  Poll Interval: {}ms", self.progress.poll_interval_ms);
        println!("  Default Duration: {}s", self.app.default_duration);
        println!("  Default Privacy: {:?}", self.app.default_privacy);
    }
}
