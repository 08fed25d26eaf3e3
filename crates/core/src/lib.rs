//! # Fleet Gateway Core
//!
//! Shared building blocks for the Fleet Gateway route-tracking platform.
//!
//! ## Modules
//!
//! - `config`: Environment-driven configuration loading and validation
//! - `database`: Shared PostgreSQL connection pool for the route catalog
//! - `error`: Workspace-level error types
//! - `models`: Domain models (`Route`, `Position`)
//! - `retry`: Bounded exponential backoff utilities

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod retry;

// Re-export commonly used types
pub use config::{load_dotenv, BrokerConfig, ConfigLoader, DatabaseConfig, ServiceConfig};
pub use database::{DatabasePool, PoolStats};
pub use error::FleetGatewayError;
pub use models::{Position, Route};
pub use retry::{retry_with_backoff, RetryPolicy};

/// Result type alias for Fleet Gateway operations
pub type Result<T> = std::result::Result<T, FleetGatewayError>;
