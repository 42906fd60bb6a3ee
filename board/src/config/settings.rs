//! Settings file management

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::errors::BoardError;
use crate::logs::LogLevel;
use crate::models::record::Source;

/// Board settings, read from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Local HTTP API
    #[serde(default)]
    pub server: ServerSettings,

    /// Milliseconds between merge ticks
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// Seconds between scheduled refreshes; 0 disables the refresh worker
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Per-source fetch timeout in milliseconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_ms: u64,

    /// Run one refresh before the workers start
    #[serde(default = "default_true")]
    pub seed_on_start: bool,

    /// Demo signal simulator
    #[serde(default)]
    pub simulate: SimulateSettings,

    /// Upstream listing URLs
    #[serde(default)]
    pub sources: SourcesSettings,

    /// CORS-forwarding reverse proxy
    #[serde(default)]
    pub proxy: ProxySettings,
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    3000
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_fetch_timeout() -> u64 {
    5000
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            tick_interval_ms: default_tick_interval(),
            refresh_interval_secs: default_refresh_interval(),
            fetch_timeout_ms: default_fetch_timeout(),
            seed_on_start: true,
            simulate: SimulateSettings::default(),
            sources: SourcesSettings::default(),
            proxy: ProxySettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file yields the defaults
    pub async fn load(path: &Path) -> Result<Self, BoardError> {
        if tokio::fs::metadata(path).await.is_err() {
            info!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let settings: Settings = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the board cannot run with
    pub fn validate(&self) -> Result<(), BoardError> {
        if self.tick_interval_ms == 0 {
            return Err(BoardError::ConfigError(
                "tick_interval_ms must be positive".to_string(),
            ));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(BoardError::ConfigError(
                "fetch_timeout_ms must be positive".to_string(),
            ));
        }
        for source in Source::ALL {
            if let Some(url) = self.sources.url_for(source) {
                Url::parse(url).map_err(|e| {
                    BoardError::ConfigError(format!("{} url {:?}: {}", source, url, e))
                })?;
            }
        }
        if self.proxy.enabled {
            let target = self.proxy.target.as_deref().ok_or_else(|| {
                BoardError::ConfigError("proxy.target is required when the proxy is enabled".to_string())
            })?;
            Url::parse(target)
                .map_err(|e| BoardError::ConfigError(format!("proxy.target {:?}: {}", target, e)))?;
            if self.proxy.timeout_secs == 0 {
                return Err(BoardError::ConfigError(
                    "proxy.timeout_secs must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Local HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Demo simulator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateSettings {
    /// Animate deployments when no upstream signal arrives
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fixed RNG seed for reproducible demos
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulateSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: None,
        }
    }
}

/// Upstream listing URLs; a source without one serves the demo listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesSettings {
    #[serde(default)]
    pub github: Option<String>,

    #[serde(default)]
    pub jenkins: Option<String>,

    #[serde(default)]
    pub argocd: Option<String>,
}

impl SourcesSettings {
    pub fn url_for(&self, source: Source) -> Option<&str> {
        match source {
            Source::Github => self.github.as_deref(),
            Source::Jenkins => self.jenkins.as_deref(),
            Source::Argocd => self.argocd.as_deref(),
        }
    }
}

/// Reverse proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_proxy_port")]
    pub port: u16,

    /// Upstream every request is forwarded to
    #[serde(default)]
    pub target: Option<String>,

    #[serde(default = "default_proxy_timeout")]
    pub timeout_secs: u64,
}

fn default_proxy_port() -> u16 {
    8081
}

fn default_proxy_timeout() -> u64 {
    30
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_server_host(),
            port: default_proxy_port(),
            target: None,
            timeout_secs: default_proxy_timeout(),
        }
    }
}
