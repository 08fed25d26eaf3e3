//! Shared configuration loader for Fleet Gateway services
//!
//! Environment-driven configuration with validation and .env support. All
//! variables carry the `FLEET_GATEWAY_` prefix, with unprefixed fallbacks
//! (`DATABASE_URL`, `KAFKA_BROKERS`, `HOST`, `PORT`) for compatibility with
//! standard deployment tooling. Override hierarchy: defaults < .env <
//! environment.
//!
//! # Example
//!
//! ```no_run
//! use fleet_gateway_core::config::{BrokerConfig, ConfigLoader, DatabaseConfig, ServiceConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! fleet_gateway_core::config::load_dotenv();
//!
//! let service = ServiceConfig::from_env()?;
//! let database = DatabaseConfig::from_env()?;
//! let broker = BrokerConfig::from_env()?;
//!
//! service.validate()?;
//! database.validate()?;
//! broker.validate()?;
//! # Ok(())
//! # }
//! ```

use crate::error::FleetGatewayError;
use std::time::Duration;
use url::Url;

/// Configuration loader trait
///
/// Standardized loading and validation of configuration from environment
/// variables.
pub trait ConfigLoader: Sized {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a required variable is missing or a
    /// value cannot be parsed.
    fn from_env() -> Result<Self, FleetGatewayError>;

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` naming the offending key if any check
    /// fails.
    fn validate(&self) -> Result<(), FleetGatewayError>;
}

/// HTTP service configuration
///
/// # Environment Variables
///
/// - `FLEET_GATEWAY_SERVICE_HOST` (optional, fallback `HOST`): bind host (default: "0.0.0.0")
/// - `FLEET_GATEWAY_SERVICE_PORT` (optional, fallback `PORT`): bind port (default: 8084)
/// - `FLEET_GATEWAY_SERVICE_WORKERS` (optional): worker threads (default: CPU count)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Service bind host
    pub host: String,
    /// Service bind port
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8084,
            workers: num_cpus::get(),
        }
    }
}

impl ConfigLoader for ServiceConfig {
    fn from_env() -> Result<Self, FleetGatewayError> {
        let host = std::env::var("FLEET_GATEWAY_SERVICE_HOST")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| ServiceConfig::default().host);

        let port = parse_env_var_fallback(
            "FLEET_GATEWAY_SERVICE_PORT",
            "PORT",
            ServiceConfig::default().port,
        )?;

        let workers = parse_env_var(
            "FLEET_GATEWAY_SERVICE_WORKERS",
            ServiceConfig::default().workers,
        )?;

        Ok(Self {
            host,
            port,
            workers,
        })
    }

    fn validate(&self) -> Result<(), FleetGatewayError> {
        if self.host.is_empty() {
            return Err(FleetGatewayError::ConfigurationError {
                message: "host must not be empty".to_string(),
                key: Some("FLEET_GATEWAY_SERVICE_HOST".to_string()),
            });
        }

        if self.port == 0 {
            return Err(FleetGatewayError::ConfigurationError {
                message: "port must be greater than 0".to_string(),
                key: Some("FLEET_GATEWAY_SERVICE_PORT".to_string()),
            });
        }

        if self.workers == 0 {
            return Err(FleetGatewayError::ConfigurationError {
                message: "workers must be greater than 0".to_string(),
                key: Some("FLEET_GATEWAY_SERVICE_WORKERS".to_string()),
            });
        }

        Ok(())
    }
}

/// Route catalog database configuration
///
/// # Environment Variables
///
/// - `FLEET_GATEWAY_DATABASE_URL` (required, fallback `DATABASE_URL`): PostgreSQL URL
/// - `FLEET_GATEWAY_DATABASE_MAX_CONNECTIONS` (optional): pool maximum (default: 10)
/// - `FLEET_GATEWAY_DATABASE_MIN_CONNECTIONS` (optional): pool minimum (default: 1)
/// - `FLEET_GATEWAY_DATABASE_ACQUIRE_TIMEOUT` (optional): acquire timeout in seconds (default: 30)
/// - `FLEET_GATEWAY_DATABASE_IDLE_TIMEOUT` (optional): idle timeout in seconds (default: 600)
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    pub min_connections: u32,
    /// Pool acquire timeout
    pub acquire_timeout: Duration,
    /// Idle connection timeout
    pub idle_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/fleet_gateway".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl ConfigLoader for DatabaseConfig {
    fn from_env() -> Result<Self, FleetGatewayError> {
        let url = std::env::var("FLEET_GATEWAY_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .map_err(|_| FleetGatewayError::ConfigurationError {
                message: "DATABASE_URL or FLEET_GATEWAY_DATABASE_URL must be set".to_string(),
                key: Some("FLEET_GATEWAY_DATABASE_URL".to_string()),
            })?;

        let max_connections = parse_env_var(
            "FLEET_GATEWAY_DATABASE_MAX_CONNECTIONS",
            DatabaseConfig::default().max_connections,
        )?;

        let min_connections = parse_env_var(
            "FLEET_GATEWAY_DATABASE_MIN_CONNECTIONS",
            DatabaseConfig::default().min_connections,
        )?;

        let acquire_timeout_secs = parse_env_var("FLEET_GATEWAY_DATABASE_ACQUIRE_TIMEOUT", 30u64)?;

        let idle_timeout_secs = parse_env_var("FLEET_GATEWAY_DATABASE_IDLE_TIMEOUT", 600u64)?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
        })
    }

    fn validate(&self) -> Result<(), FleetGatewayError> {
        let parsed = Url::parse(&self.url).map_err(|e| FleetGatewayError::ConfigurationError {
            message: format!("Invalid DATABASE_URL: {}", e),
            key: Some("FLEET_GATEWAY_DATABASE_URL".to_string()),
        })?;

        if parsed.scheme() != "postgres" && parsed.scheme() != "postgresql" {
            return Err(FleetGatewayError::ConfigurationError {
                message: format!(
                    "DATABASE_URL must use the postgres scheme, got '{}'",
                    parsed.scheme()
                ),
                key: Some("FLEET_GATEWAY_DATABASE_URL".to_string()),
            });
        }

        if self.max_connections == 0 {
            return Err(FleetGatewayError::ConfigurationError {
                message: "max_connections must be greater than 0".to_string(),
                key: Some("FLEET_GATEWAY_DATABASE_MAX_CONNECTIONS".to_string()),
            });
        }

        if self.min_connections > self.max_connections {
            return Err(FleetGatewayError::ConfigurationError {
                message: format!(
                    "min_connections ({}) cannot exceed max_connections ({})",
                    self.min_connections, self.max_connections
                ),
                key: Some("FLEET_GATEWAY_DATABASE_MIN_CONNECTIONS".to_string()),
            });
        }

        if self.acquire_timeout.as_secs() == 0 {
            return Err(FleetGatewayError::ConfigurationError {
                message: "acquire_timeout must be greater than 0 seconds".to_string(),
                key: Some("FLEET_GATEWAY_DATABASE_ACQUIRE_TIMEOUT".to_string()),
            });
        }

        Ok(())
    }
}

/// Message broker configuration
///
/// Covers the Kafka producer (activation events) and consumer (position feed)
/// sides of the relay.
///
/// # Environment Variables
///
/// - `FLEET_GATEWAY_KAFKA_BROKERS` (optional, fallback `KAFKA_BROKERS`): bootstrap servers (default: "localhost:9092")
/// - `FLEET_GATEWAY_ACTIVATION_TOPIC` (optional): activation event topic (default: "route.activation")
/// - `FLEET_GATEWAY_POSITION_TOPIC` (optional): inbound position topic (default: "route.position")
/// - `FLEET_GATEWAY_CONSUMER_GROUP` (optional): consumer group id (default: "fleet-gateway-relay")
/// - `FLEET_GATEWAY_BROKER_CONNECT_RETRIES` (optional): startup probe retries (default: 5)
/// - `FLEET_GATEWAY_BROKER_CONNECT_DELAY_MS` (optional): probe base backoff (default: 500)
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Kafka bootstrap servers, comma separated host:port pairs
    pub brokers: String,
    /// Topic the relay publishes activation events to
    pub activation_topic: String,
    /// Topic the relay consumes position updates from
    pub position_topic: String,
    /// Consumer group id for the position feed
    pub consumer_group: String,
    /// Bounded retries for the startup connectivity probe
    pub connect_max_retries: u32,
    /// Base backoff between probe attempts, milliseconds
    pub connect_base_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            activation_topic: "route.activation".to_string(),
            position_topic: "route.position".to_string(),
            consumer_group: "fleet-gateway-relay".to_string(),
            connect_max_retries: 5,
            connect_base_delay_ms: 500,
        }
    }
}

impl ConfigLoader for BrokerConfig {
    fn from_env() -> Result<Self, FleetGatewayError> {
        let brokers = std::env::var("FLEET_GATEWAY_KAFKA_BROKERS")
            .or_else(|_| std::env::var("KAFKA_BROKERS"))
            .unwrap_or_else(|_| BrokerConfig::default().brokers);

        let activation_topic = std::env::var("FLEET_GATEWAY_ACTIVATION_TOPIC")
            .unwrap_or_else(|_| BrokerConfig::default().activation_topic);

        let position_topic = std::env::var("FLEET_GATEWAY_POSITION_TOPIC")
            .unwrap_or_else(|_| BrokerConfig::default().position_topic);

        let consumer_group = std::env::var("FLEET_GATEWAY_CONSUMER_GROUP")
            .unwrap_or_else(|_| BrokerConfig::default().consumer_group);

        let connect_max_retries = parse_env_var(
            "FLEET_GATEWAY_BROKER_CONNECT_RETRIES",
            BrokerConfig::default().connect_max_retries,
        )?;

        let connect_base_delay_ms = parse_env_var(
            "FLEET_GATEWAY_BROKER_CONNECT_DELAY_MS",
            BrokerConfig::default().connect_base_delay_ms,
        )?;

        Ok(Self {
            brokers,
            activation_topic,
            position_topic,
            consumer_group,
            connect_max_retries,
            connect_base_delay_ms,
        })
    }

    fn validate(&self) -> Result<(), FleetGatewayError> {
        if self.brokers.is_empty() {
            return Err(FleetGatewayError::ConfigurationError {
                message: "brokers must not be empty".to_string(),
                key: Some("FLEET_GATEWAY_KAFKA_BROKERS".to_string()),
            });
        }

        for (field, value, key) in [
            (
                "activation_topic",
                &self.activation_topic,
                "FLEET_GATEWAY_ACTIVATION_TOPIC",
            ),
            (
                "position_topic",
                &self.position_topic,
                "FLEET_GATEWAY_POSITION_TOPIC",
            ),
            (
                "consumer_group",
                &self.consumer_group,
                "FLEET_GATEWAY_CONSUMER_GROUP",
            ),
        ] {
            if value.is_empty() {
                return Err(FleetGatewayError::ConfigurationError {
                    message: format!("{} must not be empty", field),
                    key: Some(key.to_string()),
                });
            }
        }

        if self.activation_topic == self.position_topic {
            return Err(FleetGatewayError::ConfigurationError {
                message: "activation_topic and position_topic must differ".to_string(),
                key: Some("FLEET_GATEWAY_POSITION_TOPIC".to_string()),
            });
        }

        if self.connect_base_delay_ms == 0 {
            return Err(FleetGatewayError::ConfigurationError {
                message: "connect_base_delay_ms must be greater than 0".to_string(),
                key: Some("FLEET_GATEWAY_BROKER_CONNECT_DELAY_MS".to_string()),
            });
        }

        Ok(())
    }
}

/// Parse an environment variable with a default value
///
/// # Errors
///
/// Returns a `ConfigurationError` if the variable is set but cannot be parsed
/// as `T`.
fn parse_env_var<T>(key: &str, default: T) -> Result<T, FleetGatewayError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .ok()
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| FleetGatewayError::ConfigurationError {
                    message: format!("Failed to parse {}: {}", key, e),
                    key: Some(key.to_string()),
                })
        })
        .unwrap_or(Ok(default))
}

/// Parse an environment variable with an unprefixed fallback and a default
///
/// The prefixed variable wins when both are set; the default applies only
/// when neither is.
///
/// # Errors
///
/// Returns a `ConfigurationError` naming the variable that supplied the
/// value if it cannot be parsed as `T`.
fn parse_env_var_fallback<T>(
    primary: &str,
    fallback: &str,
    default: T,
) -> Result<T, FleetGatewayError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let (key, raw) = match std::env::var(primary) {
        Ok(value) => (primary, value),
        Err(_) => match std::env::var(fallback) {
            Ok(value) => (fallback, value),
            Err(_) => return Ok(default),
        },
    };

    raw.parse::<T>()
        .map_err(|e| FleetGatewayError::ConfigurationError {
            message: format!("Failed to parse {}: {}", key, e),
            key: Some(key.to_string()),
        })
}

/// Load a .env file if present
///
/// Missing .env files are not an error; any other failure is reported on
/// stderr and startup continues with the process environment.
pub fn load_dotenv() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn set_test_env(key: &str, value: &str) {
        env::set_var(key, value);
    }

    fn clear_test_env(key: &str) {
        env::remove_var(key);
    }

    #[test]
    fn test_service_config_default() {
        let config = ServiceConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8084);
        assert!(config.workers > 0);
    }

    #[test]
    fn test_service_config_from_env() {
        set_test_env("FLEET_GATEWAY_SERVICE_HOST", "127.0.0.1");
        set_test_env("FLEET_GATEWAY_SERVICE_PORT", "9090");
        set_test_env("FLEET_GATEWAY_SERVICE_WORKERS", "4");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.workers, 4);

        clear_test_env("FLEET_GATEWAY_SERVICE_HOST");
        clear_test_env("FLEET_GATEWAY_SERVICE_PORT");
        clear_test_env("FLEET_GATEWAY_SERVICE_WORKERS");
    }

    #[test]
    fn test_service_config_port_fallback() {
        clear_test_env("FLEET_GATEWAY_SERVICE_PORT");
        set_test_env("PORT", "9393");

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.port, 9393);

        clear_test_env("PORT");
    }

    #[test]
    fn test_service_config_validation_zero_port() {
        let mut config = ServiceConfig::default();
        config.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_service_config_validation_zero_workers() {
        let mut config = ServiceConfig::default();
        config.workers = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_config_requires_url() {
        clear_test_env("FLEET_GATEWAY_DATABASE_URL");
        clear_test_env("DATABASE_URL");

        let result = DatabaseConfig::from_env();
        assert!(matches!(
            result,
            Err(FleetGatewayError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_database_config_url_fallback() {
        clear_test_env("FLEET_GATEWAY_DATABASE_URL");
        set_test_env("DATABASE_URL", "postgresql://fallback/routes");

        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.url, "postgresql://fallback/routes");

        clear_test_env("DATABASE_URL");
    }

    #[test]
    fn test_database_config_validation_rejects_non_postgres_scheme() {
        let mut config = DatabaseConfig::default();
        config.url = "mysql://localhost/routes".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_config_validation_invalid_url() {
        let mut config = DatabaseConfig::default();
        config.url = "not-a-valid-url".to_string();

        let result = config.validate();
        assert!(matches!(
            result,
            Err(FleetGatewayError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_database_config_validation_min_exceeds_max() {
        let mut config = DatabaseConfig::default();
        config.min_connections = 30;
        config.max_connections = 20;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_broker_config_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.brokers, "localhost:9092");
        assert_eq!(config.activation_topic, "route.activation");
        assert_eq!(config.position_topic, "route.position");
        assert_eq!(config.consumer_group, "fleet-gateway-relay");
        assert_eq!(config.connect_max_retries, 5);
    }

    #[test]
    fn test_broker_config_from_env() {
        set_test_env("FLEET_GATEWAY_KAFKA_BROKERS", "kafka1:9092,kafka2:9092");
        set_test_env("FLEET_GATEWAY_ACTIVATION_TOPIC", "fleet.activation");
        set_test_env("FLEET_GATEWAY_POSITION_TOPIC", "fleet.position");

        let config = BrokerConfig::from_env().unwrap();
        assert_eq!(config.brokers, "kafka1:9092,kafka2:9092");
        assert_eq!(config.activation_topic, "fleet.activation");
        assert_eq!(config.position_topic, "fleet.position");

        clear_test_env("FLEET_GATEWAY_KAFKA_BROKERS");
        clear_test_env("FLEET_GATEWAY_ACTIVATION_TOPIC");
        clear_test_env("FLEET_GATEWAY_POSITION_TOPIC");
    }

    #[test]
    fn test_broker_config_brokers_fallback() {
        clear_test_env("FLEET_GATEWAY_KAFKA_BROKERS");
        set_test_env("KAFKA_BROKERS", "fallback:9092");

        let config = BrokerConfig::from_env().unwrap();
        assert_eq!(config.brokers, "fallback:9092");

        clear_test_env("KAFKA_BROKERS");
    }

    #[test]
    fn test_broker_config_validation_same_topics() {
        let mut config = BrokerConfig::default();
        config.position_topic = config.activation_topic.clone();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_broker_config_validation_empty_group() {
        let mut config = BrokerConfig::default();
        config.consumer_group = String::new();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_env_var_with_default() {
        let result: u32 = parse_env_var("NON_EXISTENT_VAR", 42).unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn test_parse_env_var_invalid_value() {
        set_test_env("TEST_INVALID_VAR", "not-a-number");
        let result: Result<u32, _> = parse_env_var("TEST_INVALID_VAR", 42);
        assert!(result.is_err());
        clear_test_env("TEST_INVALID_VAR");
    }

    #[test]
    fn test_parse_env_var_fallback_resolution_order() {
        clear_test_env("TEST_PFB_PRIMARY");
        clear_test_env("TEST_PFB_FALLBACK");

        let value: u16 = parse_env_var_fallback("TEST_PFB_PRIMARY", "TEST_PFB_FALLBACK", 42).unwrap();
        assert_eq!(value, 42);

        set_test_env("TEST_PFB_FALLBACK", "2222");
        let value: u16 = parse_env_var_fallback("TEST_PFB_PRIMARY", "TEST_PFB_FALLBACK", 42).unwrap();
        assert_eq!(value, 2222);

        set_test_env("TEST_PFB_PRIMARY", "1111");
        let value: u16 = parse_env_var_fallback("TEST_PFB_PRIMARY", "TEST_PFB_FALLBACK", 42).unwrap();
        assert_eq!(value, 1111);

        clear_test_env("TEST_PFB_PRIMARY");
        clear_test_env("TEST_PFB_FALLBACK");
    }
}
