//! Server configuration

use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration, read from `KPF_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// kubectl binary used for queries and forwards
    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    /// Wait between graceful and forced termination on stop
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Remote port used when none is given and detection fails
    #[serde(default = "default_remote_port")]
    pub default_remote_port: u16,

    /// Open terminal windows for logs; false runs them headless
    #[serde(default = "default_log_windows")]
    pub log_windows: bool,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Port for the health/metrics endpoint; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_grace_period_ms() -> u64 {
    500
}

fn default_remote_port() -> u16 {
    forward_lib::port::DEFAULT_REMOTE_PORT
}

fn default_log_windows() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            kubectl: default_kubectl(),
            grace_period_ms: default_grace_period_ms(),
            default_remote_port: default_remote_port(),
            log_windows: default_log_windows(),
            log_json: false,
            metrics_port: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix("KPF"))
    }

    /// Load configuration from an environment source
    pub fn from_env(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source.try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}
