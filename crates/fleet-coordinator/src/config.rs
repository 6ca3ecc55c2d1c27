//! Fleet Coordinator configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use crate::coordinator::CoordinatorConfig;
use crate::lease::LeaseConfig;
use crate::meetings::ProviderConfig;
use crate::reconciler::ReconcilerConfig;
use crate::store::RedisStoreConfig;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default Redis per-command response timeout in milliseconds.
pub const DEFAULT_REDIS_RESPONSE_TIMEOUT_MS: u64 = 1000;

/// Default Redis connection attempt timeout in milliseconds.
pub const DEFAULT_REDIS_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Default health endpoint bind address.
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8090";

/// Default leadership key in the shared store.
pub const DEFAULT_LEASE_KEY: &str = "fleet:leader";

/// Default lease TTL in milliseconds.
pub const DEFAULT_LEASE_TTL_MS: u64 = 3000;

/// Default heartbeat interval in milliseconds (TTL / 3).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 1000;

/// Default reconciliation sweep interval in milliseconds.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;

/// Default SCAN COUNT hint.
pub const DEFAULT_SCAN_BATCH_SIZE: usize = 100;

/// Default number of failed external deletions before a mapping is dropped.
pub const DEFAULT_MAX_MEETING_DELETE_ATTEMPTS: u32 = 5;

/// Default TTL of the failed-deletion counter in seconds.
pub const DEFAULT_CLEANUP_ATTEMPTS_TTL_SECONDS: u64 = 3600;

/// Default bound on graceful shutdown waits in milliseconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

/// Default meeting provider request timeout in milliseconds.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5000;

/// Default server ID prefix.
pub const DEFAULT_SERVER_ID_PREFIX: &str = "fc";

/// Fleet Coordinator configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Sensitive fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Shared store connection URL.
    /// Protected by `SecretString` because it may embed a password.
    pub redis_url: SecretString,

    /// Bound on each Redis command round trip in milliseconds.
    pub redis_response_timeout_ms: u64,

    /// Bound on each Redis connection attempt in milliseconds.
    pub redis_connect_timeout_ms: u64,

    /// Identity written into the leadership record.
    pub server_id: String,

    /// Health endpoint bind address (default: "0.0.0.0:8090").
    pub health_bind_address: String,

    /// Leadership key (default: "fleet:leader").
    pub lease_key: String,

    /// Lease expiry in milliseconds.
    pub lease_ttl_ms: u64,

    /// Heartbeat (acquire-or-renew) interval in milliseconds. Always < `lease_ttl_ms`.
    pub heartbeat_interval_ms: u64,

    /// Reconciliation sweep interval in milliseconds.
    pub sweep_interval_ms: u64,

    /// SCAN COUNT hint used for prefix scans.
    pub scan_batch_size: usize,

    /// Failed external deletions tolerated before a meeting mapping is dropped.
    pub max_meeting_delete_attempts: u32,

    /// TTL of the failed-deletion counter in seconds.
    pub cleanup_attempts_ttl_seconds: u64,

    /// Bound on each graceful shutdown wait in milliseconds.
    pub shutdown_timeout_ms: u64,

    /// Meeting provider API base URL.
    pub meeting_provider_url: String,

    /// Meeting provider API key.
    pub meeting_provider_api_key: SecretString,

    /// Meeting provider per-request timeout in milliseconds.
    pub meeting_provider_timeout_ms: u64,

    /// Emit JSON-formatted logs.
    pub log_json: bool,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("redis_url", &"[REDACTED]")
            .field("redis_response_timeout_ms", &self.redis_response_timeout_ms)
            .field("redis_connect_timeout_ms", &self.redis_connect_timeout_ms)
            .field("server_id", &self.server_id)
            .field("health_bind_address", &self.health_bind_address)
            .field("lease_key", &self.lease_key)
            .field("lease_ttl_ms", &self.lease_ttl_ms)
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("sweep_interval_ms", &self.sweep_interval_ms)
            .field("scan_batch_size", &self.scan_batch_size)
            .field(
                "max_meeting_delete_attempts",
                &self.max_meeting_delete_attempts,
            )
            .field(
                "cleanup_attempts_ttl_seconds",
                &self.cleanup_attempts_ttl_seconds,
            )
            .field("shutdown_timeout_ms", &self.shutdown_timeout_ms)
            .field("meeting_provider_url", &self.meeting_provider_url)
            .field("meeting_provider_api_key", &"[REDACTED]")
            .field(
                "meeting_provider_timeout_ms",
                &self.meeting_provider_timeout_ms,
            )
            .field("log_json", &self.log_json)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parsed_or<T: std::str::FromStr>(vars: &HashMap<String, String>, name: &str, default: T) -> T {
    vars.get(name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis_url = SecretString::from(required(vars, "REDIS_URL")?);
        let meeting_provider_url = required(vars, "MEETING_PROVIDER_URL")?;
        let meeting_provider_api_key =
            SecretString::from(required(vars, "MEETING_PROVIDER_API_KEY")?);

        let health_bind_address = vars
            .get("FC_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let lease_key = vars
            .get("FC_LEASE_KEY")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LEASE_KEY.to_string());

        let redis_response_timeout_ms = parsed_or(
            vars,
            "FC_REDIS_RESPONSE_TIMEOUT_MS",
            DEFAULT_REDIS_RESPONSE_TIMEOUT_MS,
        );
        let redis_connect_timeout_ms = parsed_or(
            vars,
            "FC_REDIS_CONNECT_TIMEOUT_MS",
            DEFAULT_REDIS_CONNECT_TIMEOUT_MS,
        );
        let lease_ttl_ms = parsed_or(vars, "FC_LEASE_TTL_MS", DEFAULT_LEASE_TTL_MS);
        let heartbeat_interval_ms =
            parsed_or(vars, "FC_HEARTBEAT_INTERVAL_MS", DEFAULT_HEARTBEAT_INTERVAL_MS);
        let sweep_interval_ms = parsed_or(vars, "FC_SWEEP_INTERVAL_MS", DEFAULT_SWEEP_INTERVAL_MS);
        let scan_batch_size = parsed_or(vars, "FC_SCAN_BATCH_SIZE", DEFAULT_SCAN_BATCH_SIZE);
        let max_meeting_delete_attempts = parsed_or(
            vars,
            "FC_MAX_MEETING_DELETE_ATTEMPTS",
            DEFAULT_MAX_MEETING_DELETE_ATTEMPTS,
        );
        let cleanup_attempts_ttl_seconds = parsed_or(
            vars,
            "FC_CLEANUP_ATTEMPTS_TTL_SECONDS",
            DEFAULT_CLEANUP_ATTEMPTS_TTL_SECONDS,
        );
        let shutdown_timeout_ms =
            parsed_or(vars, "FC_SHUTDOWN_TIMEOUT_MS", DEFAULT_SHUTDOWN_TIMEOUT_MS);
        let meeting_provider_timeout_ms = parsed_or(
            vars,
            "MEETING_PROVIDER_TIMEOUT_MS",
            DEFAULT_PROVIDER_TIMEOUT_MS,
        );
        let log_json = parsed_or(vars, "FC_LOG_JSON", false);

        if lease_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "FC_LEASE_TTL_MS must be greater than zero".to_string(),
            ));
        }

        // A heartbeat that is not strictly shorter than the TTL lets the lease
        // lapse between renewals.
        if heartbeat_interval_ms == 0 || heartbeat_interval_ms >= lease_ttl_ms {
            return Err(ConfigError::InvalidValue(format!(
                "FC_HEARTBEAT_INTERVAL_MS ({heartbeat_interval_ms}) must be between 1 and \
                 FC_LEASE_TTL_MS ({lease_ttl_ms}) exclusive"
            )));
        }

        if redis_response_timeout_ms == 0 || redis_connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "FC_REDIS_RESPONSE_TIMEOUT_MS and FC_REDIS_CONNECT_TIMEOUT_MS must be greater \
                 than zero"
                    .to_string(),
            ));
        }

        if sweep_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "FC_SWEEP_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }

        if scan_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "FC_SCAN_BATCH_SIZE must be greater than zero".to_string(),
            ));
        }

        let server_id = vars.get("FC_SERVER_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_SERVER_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            redis_url,
            redis_response_timeout_ms,
            redis_connect_timeout_ms,
            server_id,
            health_bind_address,
            lease_key,
            lease_ttl_ms,
            heartbeat_interval_ms,
            sweep_interval_ms,
            scan_batch_size,
            max_meeting_delete_attempts,
            cleanup_attempts_ttl_seconds,
            shutdown_timeout_ms,
            meeting_provider_url,
            meeting_provider_api_key,
            meeting_provider_timeout_ms,
            log_json,
        })
    }

    #[must_use]
    pub fn redis_store_config(&self) -> RedisStoreConfig {
        RedisStoreConfig {
            response_timeout: Duration::from_millis(self.redis_response_timeout_ms),
            connection_timeout: Duration::from_millis(self.redis_connect_timeout_ms),
        }
    }

    #[must_use]
    pub fn lease_config(&self) -> LeaseConfig {
        LeaseConfig {
            key: self.lease_key.clone(),
            ttl: Duration::from_millis(self.lease_ttl_ms),
        }
    }

    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            scan_batch_size: self.scan_batch_size,
            max_meeting_delete_attempts: self.max_meeting_delete_attempts,
            cleanup_attempts_ttl: Duration::from_secs(self.cleanup_attempts_ttl_seconds),
        }
    }

    #[must_use]
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            shutdown_timeout: Duration::from_millis(self.shutdown_timeout_ms),
        }
    }

    #[must_use]
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.meeting_provider_url.clone(),
            api_key: self.meeting_provider_api_key.clone(),
            timeout: Duration::from_millis(self.meeting_provider_timeout_ms),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([
            (
                "REDIS_URL".to_string(),
                "redis://:hunter2@localhost:6379".to_string(),
            ),
            (
                "MEETING_PROVIDER_URL".to_string(),
                "https://api.calls.example.com/v1".to_string(),
            ),
            (
                "MEETING_PROVIDER_API_KEY".to_string(),
                "sk-live-abcdef".to_string(),
            ),
        ])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        assert_eq!(
            config.redis_url.expose_secret(),
            "redis://:hunter2@localhost:6379"
        );
        assert_eq!(config.health_bind_address, DEFAULT_HEALTH_BIND_ADDRESS);
        assert_eq!(config.lease_key, DEFAULT_LEASE_KEY);
        assert_eq!(config.lease_ttl_ms, 3000);
        assert_eq!(config.heartbeat_interval_ms, 1000);
        assert_eq!(config.sweep_interval_ms, 1000);
        assert_eq!(config.scan_batch_size, DEFAULT_SCAN_BATCH_SIZE);
        assert_eq!(config.max_meeting_delete_attempts, 5);
        assert_eq!(config.cleanup_attempts_ttl_seconds, 3600);
        assert_eq!(config.shutdown_timeout_ms, 5000);
        assert_eq!(config.meeting_provider_timeout_ms, 5000);
        assert!(!config.log_json);
        // Server ID should be auto-generated
        assert!(config.server_id.starts_with("fc-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert("FC_SERVER_ID".to_string(), "fc-custom-001".to_string());
        vars.insert(
            "FC_HEALTH_BIND_ADDRESS".to_string(),
            "127.0.0.1:9000".to_string(),
        );
        vars.insert("FC_LEASE_KEY".to_string(), "party:leader".to_string());
        vars.insert("FC_LEASE_TTL_MS".to_string(), "9000".to_string());
        vars.insert("FC_HEARTBEAT_INTERVAL_MS".to_string(), "2000".to_string());
        vars.insert("FC_SWEEP_INTERVAL_MS".to_string(), "500".to_string());
        vars.insert("FC_SCAN_BATCH_SIZE".to_string(), "250".to_string());
        vars.insert(
            "FC_MAX_MEETING_DELETE_ATTEMPTS".to_string(),
            "3".to_string(),
        );
        vars.insert("FC_LOG_JSON".to_string(), "true".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.server_id, "fc-custom-001");
        assert_eq!(config.health_bind_address, "127.0.0.1:9000");
        assert_eq!(config.lease_key, "party:leader");
        assert_eq!(config.lease_ttl_ms, 9000);
        assert_eq!(config.heartbeat_interval_ms, 2000);
        assert_eq!(config.sweep_interval_ms, 500);
        assert_eq!(config.scan_batch_size, 250);
        assert_eq!(config.max_meeting_delete_attempts, 3);
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let mut vars = base_vars();
        vars.insert("FC_SWEEP_INTERVAL_MS".to_string(), "soon".to_string());
        vars.insert("FC_SCAN_BATCH_SIZE".to_string(), "-1".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.sweep_interval_ms, DEFAULT_SWEEP_INTERVAL_MS);
        assert_eq!(config.scan_batch_size, DEFAULT_SCAN_BATCH_SIZE);
    }

    #[test]
    fn test_from_vars_missing_redis_url() {
        let mut vars = base_vars();
        vars.remove("REDIS_URL");

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "REDIS_URL"));
    }

    #[test]
    fn test_from_vars_missing_provider_key() {
        let mut vars = base_vars();
        vars.remove("MEETING_PROVIDER_API_KEY");

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "MEETING_PROVIDER_API_KEY")
        );
    }

    #[test]
    fn test_heartbeat_must_be_shorter_than_ttl() {
        let mut vars = base_vars();
        vars.insert("FC_LEASE_TTL_MS".to_string(), "3000".to_string());
        vars.insert("FC_HEARTBEAT_INTERVAL_MS".to_string(), "3000".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut vars = base_vars();
        vars.insert("FC_LEASE_TTL_MS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_zero_redis_timeout_rejected() {
        let mut vars = base_vars();
        vars.insert("FC_REDIS_RESPONSE_TIMEOUT_MS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_component_configs() {
        let config = Config::from_vars(&base_vars()).unwrap();

        let lease = config.lease_config();
        assert_eq!(lease.key, "fleet:leader");
        assert_eq!(lease.ttl, Duration::from_secs(3));

        let reconciler = config.reconciler_config();
        assert_eq!(reconciler.sweep_interval, Duration::from_secs(1));
        assert_eq!(reconciler.cleanup_attempts_ttl, Duration::from_secs(3600));

        let redis = config.redis_store_config();
        assert_eq!(redis.response_timeout, Duration::from_secs(1));
        assert_eq!(redis.connection_timeout, Duration::from_secs(2));

        let coordinator = config.coordinator_config();
        assert_eq!(coordinator.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(coordinator.shutdown_timeout, Duration::from_secs(5));

        let provider = config.provider_config();
        assert_eq!(provider.base_url, "https://api.calls.example.com/v1");
        assert_eq!(provider.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let config = Config::from_vars(&base_vars()).expect("Config should load successfully");

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("sk-live"));
    }
}
