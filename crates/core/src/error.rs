//! Shared error types for Fleet Gateway services

use thiserror::Error;

/// Top-level error type for Fleet Gateway operations
///
/// Service crates define their own domain errors; this type covers the
/// concerns shared across the workspace (configuration, validation,
/// database access, network reachability).
#[derive(Debug, Error)]
pub enum FleetGatewayError {
    /// Configuration loading or validation failed
    #[error("Configuration error: {message}")]
    ConfigurationError {
        message: String,
        /// The environment variable or config key at fault, when known
        key: Option<String>,
    },

    /// A value failed domain validation
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    /// Database query or pool failure
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// A remote dependency could not be reached
    #[error("Network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl FleetGatewayError {
    /// Whether retrying the failed operation can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FleetGatewayError::DatabaseError(_) | FleetGatewayError::NetworkError { .. } => true,
            FleetGatewayError::ConfigurationError { .. }
            | FleetGatewayError::ValidationError { .. } => false,
        }
    }
}
