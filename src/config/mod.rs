//! Provisioner configuration
//!
//! Loaded from `~/.workspace-provisioner/config.yaml` when present; every field
//! has a default so a missing file is not an error. CLI flags override values
//! after loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default configurator API endpoint
pub const DEFAULT_API_URL: &str = "http://localhost:12345";

/// Default readiness poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Default readiness retry budget (queries = budget + 1)
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default config file location: ~/.workspace-provisioner/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".workspace-provisioner")
        .join("config.yaml")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// What the orchestrator does when a cluster never reports running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessPolicy {
    /// Record the timeout on the stage report and continue with the next stage
    #[default]
    Proceed,
    /// Abort the run with the stage marked as failed
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProvisionerConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_coordination_timeout_secs")]
    pub coordination_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub readiness_policy: ReadinessPolicy,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            coordination_timeout_secs: default_coordination_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_retries: default_max_retries(),
            readiness_policy: ReadinessPolicy::default(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_coordination_timeout_secs() -> u64 {
    180
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl ProvisionerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn coordination_timeout(&self) -> Duration {
        Duration::from_secs(self.coordination_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_readiness_policy(mut self, policy: ReadinessPolicy) -> Self {
        self.readiness_policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api-url",
                reason: "must not be empty".to_string(),
            });
        }
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "api-url",
                reason: format!("'{}' is not an http(s) URL", self.api_url),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request-timeout-secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.coordination_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "coordination-timeout-secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// SBIO: Pure business logic (no I/O)
// ============================================================================

/// Parse and validate config from a YAML string
pub fn parse_config(content: &str) -> Result<ProvisionerConfig, ConfigError> {
    let config: ProvisionerConfig =
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

// ============================================================================
// I/O boundary functions
// ============================================================================

/// Load config from the default location
pub fn load_config() -> Result<ProvisionerConfig, ConfigError> {
    load_config_from(&default_config_path())
}

/// Load config from a specific path; a missing file yields the defaults
pub fn load_config_from(path: &Path) -> Result<ProvisionerConfig, ConfigError> {
    let path = expand_path(path);
    if !path.exists() {
        return Ok(ProvisionerConfig::default());
    }
    let content = std::fs::read_to_string(&path)?;
    parse_config(&content)
}
