// Configuration File Support
//
// TOML configuration for the quotaguard service with environment variable
// overrides. Loaded from ~/.config/quotaguard/config.toml unless a path is given.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::rate_limit::{CounterStore, InMemoryCounterStore, RateLimitConfig};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Counter store configuration
    pub store: StoreConfig,

    /// Rate limit and quota configuration
    pub rate_limit: RateLimitConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Counter store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend (memory, redis)
    pub backend: String,

    /// Redis URL (if backend is redis)
    pub redis_url: Option<String>,

    /// Per-operation timeout in milliseconds
    pub op_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            redis_url: None,
            op_timeout_ms: 200,
        }
    }
}

impl StoreConfig {
    /// Per-operation timeout
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Build the configured counter store
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unknown, or Redis is selected but
    /// unreachable or not compiled in.
    pub async fn connect(&self) -> Result<Arc<dyn CounterStore>> {
        match self.backend.to_lowercase().as_str() {
            "memory" => Ok(Arc::new(InMemoryCounterStore::new())),
            "redis" => self.connect_redis().await,
            other => anyhow::bail!("Unknown store backend: {}", other),
        }
    }

    #[cfg(feature = "redis")]
    async fn connect_redis(&self) -> Result<Arc<dyn CounterStore>> {
        let url = self
            .redis_url
            .as_deref()
            .context("Redis backend selected but no redis_url configured")?;
        let store = crate::rate_limit::RedisCounterStore::connect(url, self.op_timeout())
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", url))?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "redis"))]
    async fn connect_redis(&self) -> Result<Arc<dyn CounterStore>> {
        anyhow::bail!("Redis backend requested but quotaguard was built without the `redis` feature")
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to expose /metrics
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or
    /// if the resulting configuration is invalid.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/quotaguard/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "quotaguard", "QuotaGuard") {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config").join("quotaguard").join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - QUOTAGUARD_LOG_LEVEL
    /// - QUOTAGUARD_LOG_FORMAT
    /// - QUOTAGUARD_STORE_BACKEND
    /// - QUOTAGUARD_REDIS_URL
    /// - QUOTAGUARD_PORT
    /// - QUOTAGUARD_METRICS_ENABLED
    /// - the QUOTAGUARD_* rate limit variables, see [`RateLimitConfig::apply_env_overrides`]
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("QUOTAGUARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("QUOTAGUARD_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Ok(backend) = std::env::var("QUOTAGUARD_STORE_BACKEND") {
            self.store.backend = backend;
        }
        if let Ok(url) = std::env::var("QUOTAGUARD_REDIS_URL") {
            self.store.redis_url = Some(url);
        }

        if let Ok(port) = std::env::var("QUOTAGUARD_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        if let Ok(enabled) = std::env::var("QUOTAGUARD_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse().unwrap_or(self.metrics.enabled);
        }

        self.rate_limit = self.rate_limit.apply_env_overrides();
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}. Must be one of: trace, debug, info, warn, error", self.logging.level),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!("Invalid log format: {}. Must be one of: json, pretty, compact", self.logging.format),
        }

        match self.store.backend.to_lowercase().as_str() {
            "memory" => {}
            "redis" => {
                if self.store.redis_url.is_none() {
                    anyhow::bail!("Store backend 'redis' requires redis_url");
                }
            }
            _ => anyhow::bail!("Invalid store backend: {}. Must be 'memory' or 'redis'", self.store.backend),
        }
        if self.store.op_timeout_ms == 0 {
            anyhow::bail!("Store operation timeout must be > 0");
        }

        self.rate_limit
            .validate()
            .context("Invalid rate_limit configuration")?;

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging.level.to_lowercase().parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::FailurePolicy;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.rate_limit_per_window, 10);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_redis_without_url() {
        let mut config = Config::default();
        config.store.backend = "redis".to_string();
        assert!(config.validate().is_err());

        config.store.redis_url = Some("redis://127.0.0.1/".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_unknown_backend() {
        let mut config = Config::default();
        config.store.backend = "etcd".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_window() {
        let mut config = Config::default();
        config.rate_limit.rate_window_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("Rate window"));
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_from_path(&path);
        assert!(config.is_ok());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[store]
backend = "redis"
redis_url = "redis://cache:6379/"
op_timeout_ms = 500

[rate_limit]
rate_limit_per_window = 2
rate_window_secs = 5
failure_policy = "fail_closed"
atomic_expiry = true

[server]
port = 9000
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config: Config = toml::from_str(&fs::read_to_string(temp_file.path()).unwrap()).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.store.redis_url.as_deref(), Some("redis://cache:6379/"));
        assert_eq!(config.store.op_timeout(), Duration::from_millis(500));
        assert_eq!(config.rate_limit.rate_limit_per_window, 2);
        assert_eq!(config.rate_limit.rate_window_secs, 5);
        assert_eq!(config.rate_limit.daily_quota_ttl_secs, 90_000);
        assert_eq!(config.rate_limit.failure_policy, FailurePolicy::FailClosed);
        assert!(config.rate_limit.atomic_expiry);
        assert_eq!(config.server.port, 9000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#;

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("QUOTAGUARD_REDIS_URL", "redis://env-host/");
        std::env::set_var("QUOTAGUARD_RATE_LIMIT_PER_WINDOW", "7");
        std::env::set_var("QUOTAGUARD_FAILURE_POLICY", "closed");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.store.redis_url.as_deref(), Some("redis://env-host/"));
        assert_eq!(config.rate_limit.rate_limit_per_window, 7);
        assert_eq!(config.rate_limit.failure_policy, FailurePolicy::FailClosed);

        std::env::remove_var("QUOTAGUARD_REDIS_URL");
        std::env::remove_var("QUOTAGUARD_RATE_LIMIT_PER_WINDOW");
        std::env::remove_var("QUOTAGUARD_FAILURE_POLICY");
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        std::env::set_var("QUOTAGUARD_PORT", "not-a-port");
        std::env::set_var("QUOTAGUARD_DAILY_QUOTA_TTL_SECS", "soon");

        let config = Config::default().apply_env_overrides();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.daily_quota_ttl_secs, 90_000);

        std::env::remove_var("QUOTAGUARD_PORT");
        std::env::remove_var("QUOTAGUARD_DAILY_QUOTA_TTL_SECS");
    }

    #[tokio::test]
    async fn test_connect_memory_store() {
        let store = StoreConfig::default().connect().await.unwrap();
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_connect_unknown_backend() {
        let config = StoreConfig {
            backend: "etcd".to_string(),
            ..StoreConfig::default()
        };
        assert!(config.connect().await.is_err());
    }

    #[test]
    fn test_config_path() {
        assert!(Config::config_path().ends_with("config.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }
}
