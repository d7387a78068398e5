//! ---
//! updraft_section: "01-core-functionality"
//! updraft_subsection: "module"
//! updraft_type: "source"
//! updraft_scope: "code"
//! updraft_description: "Shared runtime primitives for the Updraft workspace."
//! updraft_version: "v0.0.0-prealpha"
//! updraft_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_token_env() -> String {
    "UPDRAFT_ACCESS_TOKEN".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_lease_duration() -> Duration {
    Duration::from_secs(120)
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(8)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// Primary configuration object for the Updraft client runtime.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the deployment backend, e.g. `https://api.example.com`.
    pub api_url: String,
    /// Environment variable holding the account access token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Per-request timeout applied by the transport adapter.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Lease handling knobs for update sessions.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Duration requested on every lease renewal. The renewal loop fires at
    /// half this interval.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_lease_duration")]
    pub duration: Duration,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            duration: default_lease_duration(),
        }
    }
}

/// Retry policy applied to calls classified as retry-safe.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles per attempt.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: Duration,
    /// Upper bound on the backoff between attempts.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_max_backoff")]
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

/// Logging destination and format selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory receiving the rolling daily log files.
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    /// Optional file name prefix; defaults to the service name.
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Stdout formatting.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            file_prefix: None,
            format: default_log_format(),
        }
    }
}

/// Metadata describing where a [`ClientConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedClientConfig {
    pub config: ClientConfig,
    pub source: PathBuf,
}

impl ClientConfig {
    pub const ENV_CONFIG_PATH: &'static str = "UPDRAFT_CONFIG";

    /// Load configuration from disk, respecting the `UPDRAFT_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedClientConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedClientConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedClientConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<ClientConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the account access token from the configured environment variable.
    pub fn resolve_access_token(&self) -> Result<String> {
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("access token variable {} is not set", self.token_env))?;
        if token.trim().is_empty() {
            return Err(anyhow!("access token variable {} is empty", self.token_env));
        }
        Ok(token)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(anyhow!(
                "api_url must be an http(s) endpoint, got {}",
                self.api_url
            ));
        }
        if self.lease.duration < Duration::from_secs(10) {
            return Err(anyhow!(
                "lease duration below 10s leaves no room for renewal round-trips"
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(anyhow!(
                "retry.initial_backoff must not exceed retry.max_backoff"
            ));
        }
        Ok(())
    }
}
