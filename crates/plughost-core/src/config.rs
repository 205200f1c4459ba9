use crate::relay::TERMINATION_MARKER;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Flag appended to the plugin command line when verbose logging is on
pub const VERBOSE_FLAG: &str = "-v";

/// Timing and marker settings for a stream relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// How long a closing relay waits for the marker after the last flush
    /// (in milliseconds)
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Sleep between drain attempts when nothing is pending (in milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Byte sequence the plugin prints once it is done
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            marker: default_marker(),
        }
    }
}

impl RelayConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period_ms = grace_period.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval_ms = poll_interval.as_millis() as u64;
        self
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.marker.is_empty() {
            return Err(anyhow::anyhow!("marker cannot be empty"));
        }

        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("poll_interval_ms must be greater than 0"));
        }

        if self.poll_interval_ms > self.grace_period_ms {
            return Err(anyhow::anyhow!(
                "poll_interval_ms cannot be greater than grace_period_ms"
            ));
        }

        Ok(())
    }
}

/// Configuration for retry logic used when connecting to the plugin
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Minimum delay between retry attempts (in milliseconds)
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,

    /// Maximum delay between retry attempts (in milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Maximum number of attempts (1 means a single attempt, no retries)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Jitter factor for randomizing delays (0.0 to 1.0)
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    /// Create a RetryConfig with no retries (fail fast)
    pub fn no_retry() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            max_attempts: 1,
            jitter_factor: 0.0,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(anyhow::anyhow!(
                "min_delay_ms cannot be greater than max_delay_ms"
            ));
        }

        if self.jitter_factor < 0.0 || self.jitter_factor > 1.0 {
            return Err(anyhow::anyhow!("jitter_factor must be between 0.0 and 1.0"));
        }

        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("max_attempts must be at least 1"));
        }

        if self.max_attempts > 10 {
            return Err(anyhow::anyhow!(
                "max_attempts should not exceed 10 to avoid excessive retries"
            ));
        }

        Ok(())
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Logging settings handed to the launcher instead of a process-wide logger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `plughost=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Filter directive to use, raised to `debug` when verbose output is on.
    pub fn effective_level(&self, verbose: bool) -> &str {
        if verbose { "debug" } else { self.level.as_str() }
    }
}

/// How the host reaches the plugin's RPC interface
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Transport {
    /// No RPC channel; only the output streams are relayed
    #[default]
    Detached,
    Sse {
        url: String,
    },
}

/// Plugin launch configuration
#[derive(Default, Debug, Clone, PartialEq, Builder)]
#[builder(setter(into, strip_option))]
pub struct LauncherConfig {
    pub name: String,
    pub version: String,
    /// Path of the plugin executable
    pub command: String,
    #[builder(default)]
    #[builder(setter(custom))]
    pub args: Vec<String>,
    #[builder(default)]
    #[builder(setter(custom))]
    pub env: HashMap<String, String>,
    #[builder(default)]
    pub working_directory: Option<PathBuf>,
    #[builder(default)]
    pub verbose: bool,
    #[builder(default)]
    pub transport: Transport,
    #[builder(default)]
    pub retry_config: RetryConfig,
    #[builder(default)]
    pub relay: RelayConfig,
    #[builder(default)]
    pub log: LogConfig,
}

impl LauncherConfig {
    pub fn builder() -> LauncherConfigBuilder {
        LauncherConfigBuilder::default()
    }

    /// Arguments passed to the plugin, with the verbosity flag appended when
    /// requested.
    pub fn plugin_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        if self.verbose {
            args.push(VERBOSE_FLAG.to_string());
        }
        args
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.command.trim().is_empty() {
            return Err(anyhow::anyhow!("plugin command cannot be empty"));
        }

        self.relay.validate()?;
        self.retry_config.validate()?;
        Ok(())
    }
}

impl LauncherConfigBuilder {
    pub fn args<S: ToString, I: IntoIterator<Item = S>>(&mut self, iter: I) -> &mut Self {
        let args: Vec<String> = iter.into_iter().map(|s| s.to_string()).collect();
        self.args = Some(args);
        self
    }

    pub fn env<T: ToString>(&mut self, key: T, value: T) -> &mut Self {
        let map = self.env.get_or_insert_with(HashMap::new);
        map.insert(key.to_string(), value.to_string());
        self
    }
}

// Default value functions for serde
fn default_grace_period_ms() -> u64 {
    10_000
}
fn default_poll_interval_ms() -> u64 {
    10
}
fn default_marker() -> String {
    TERMINATION_MARKER.to_string()
}
fn default_min_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_jitter_factor() -> f64 {
    0.1
}
fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_builder() -> LauncherConfigBuilder {
        let mut builder = LauncherConfig::builder();
        builder.name("scenario").version("0.1.0").command("./plugin");
        builder
    }

    #[test]
    fn test_relay_defaults() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grace_period(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.marker, TERMINATION_MARKER);
    }

    #[test]
    fn test_invalid_relay_config() {
        let config = RelayConfig::default().with_poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = RelayConfig::default()
            .with_grace_period(Duration::from_millis(5))
            .with_poll_interval(Duration::from_millis(50));
        assert!(config.validate().is_err());

        let config = RelayConfig::default().with_marker("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relay_config_partial_json() {
        let config: RelayConfig = serde_json::from_str(r#"{"gracePeriodMs": 250}"#).unwrap();
        assert_eq!(config.grace_period_ms, 250);
        assert_eq!(config.poll_interval_ms, 10);
        assert_eq!(config.marker, TERMINATION_MARKER);
    }

    #[test]
    fn test_retry_config() {
        assert!(RetryConfig::default().validate().is_ok());

        let config = RetryConfig::no_retry();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_attempts, 1);

        let config = RetryConfig {
            min_delay_ms: 1000,
            max_delay_ms: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_plugin_args_verbose_flag() {
        let config = base_builder().args(["--scenario", "smoke"]).build().unwrap();
        assert_eq!(config.plugin_args(), vec!["--scenario", "smoke"]);

        let config = base_builder().verbose(true).build().unwrap();
        assert_eq!(config.plugin_args(), vec![VERBOSE_FLAG]);
    }

    #[test]
    fn test_builder_defaults() {
        let config = base_builder().env("MODE", "test").build().unwrap();
        assert_eq!(config.transport, Transport::Detached);
        assert_eq!(config.relay, RelayConfig::default());
        assert_eq!(config.env.get("MODE").map(String::as_str), Some("test"));
        assert!(config.working_directory.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_command_rejected() {
        let config = LauncherConfig::builder()
            .name("x")
            .version("0")
            .command("  ")
            .build()
            .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let log = LogConfig::default();
        assert_eq!(log.effective_level(false), "info");
        assert_eq!(log.effective_level(true), "debug");
    }
}
