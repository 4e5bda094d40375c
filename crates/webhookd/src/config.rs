//! Process configuration: layered file + environment loading, following the
//! teacher's `api::config::Config::load()` shape.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookdConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}

/// Priority queue tuning: concurrency cap and tick cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

fn default_max_concurrent() -> usize {
    10
}
fn default_tick_interval_ms() -> u64 {
    1000
}

/// Process-wide retry defaults, used when a `dispatch` caller supplies none.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    domain::models::DEFAULT_MAX_ATTEMPTS
}
fn default_initial_delay_ms() -> u64 {
    domain::models::DEFAULT_INITIAL_DELAY_MS
}
fn default_backoff_multiplier() -> f64 {
    domain::models::DEFAULT_BACKOFF_MULTIPLIER
}
fn default_timeout_ms() -> u64 {
    domain::models::DEFAULT_TIMEOUT_MS
}

/// Local Prometheus scrape listener, run by the `metrics-exporter-prometheus`
/// crate itself (no axum server in this binary).
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    #[serde(default = "default_metrics_addr")]
    pub listen_addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen_addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_addr() -> String {
    "0.0.0.0:9000".to_string()
}

impl WebhookdConfig {
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml
    /// 2. config/local.toml (optional, not in git)
    /// 3. environment variables with a `WEBHOOKD__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("WEBHOOKD").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate().map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "WEBHOOKD__DATABASE__URL environment variable must be set".to_string(),
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> domain::models::RetryPolicyConfig {
        domain::models::RetryPolicyConfig {
            initial_delay_ms: self.retry.initial_delay_ms,
            backoff_multiplier: self.retry.backoff_multiplier,
            max_attempts: self.retry.max_attempts,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("missing required configuration: {0}")]
    MissingRequired(String),
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_config_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.tick_interval_ms, 1000);
    }

    #[test]
    fn test_retry_config_defaults_match_domain_constants() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, domain::models::DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.initial_delay_ms, domain::models::DEFAULT_INITIAL_DELAY_MS);
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, "json");
    }
}
