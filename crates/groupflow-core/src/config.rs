use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GroupflowError, Result};

/// Top-level configuration, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub plans: PlansConfig,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GroupflowError::ConfigNotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| GroupflowError::Config(e.to_string()))
    }

    pub fn plans_dir(&self) -> PathBuf {
        PathBuf::from(&self.plans.dir)
    }
}

/// Where the host runtime lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Client identity sent with submissions and the event subscription.
    /// Generated when absent.
    #[serde(default)]
    pub client_id: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            client_id: None,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8188".to_string()
}

/// Task runner timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Fallback poll interval while waiting on a submitted job. Cancellation
    /// is observed within one interval.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Slice length for cancellation-responsive sleeps.
    #[serde(default = "default_sleep_slice_ms")]
    pub sleep_slice_ms: u64,
    /// Extra wait after completion detection so host state settles.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            sleep_slice_ms: default_sleep_slice_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl RunnerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn sleep_slice(&self) -> Duration {
        Duration::from_millis(self.sleep_slice_ms.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_sleep_slice_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    100
}

/// Named-plan persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    #[serde(default = "default_plans_dir")]
    pub dir: String,
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            dir: default_plans_dir(),
        }
    }
}

fn default_plans_dir() -> String {
    "plans".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8189".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.host.base_url, "http://127.0.0.1:8188");
        assert_eq!(config.runner.poll_interval_ms, 500);
        assert_eq!(config.runner.sleep_slice_ms, 100);
        assert_eq!(config.plans.dir, "plans");
        assert!(config.gateway.is_none());
    }

    #[test]
    fn parse_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [host]
            base_url = "http://10.0.0.5:8188"

            [runner]
            poll_interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.host.base_url, "http://10.0.0.5:8188");
        assert_eq!(config.runner.poll_interval_ms, 250);
        // Untouched sections keep their defaults
        assert_eq!(config.runner.sleep_slice_ms, 100);
        assert_eq!(config.plans.dir, "plans");
    }

    #[test]
    fn missing_file_is_config_not_found() {
        let err = AppConfig::load("/nonexistent/groupflow.toml").unwrap_err();
        assert!(matches!(err, GroupflowError::ConfigNotFound(_)));
    }
}
