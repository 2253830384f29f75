//! Error types for AlertGate

use std::time::Duration;

use thiserror::Error;

/// Result type alias using AlertGate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for AlertGate operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error for loosely-typed configuration input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown IANA timezone name
    #[error("invalid timezone '{timezone}'")]
    InvalidTimezone { timezone: String },

    /// A channel queue reached its configured capacity
    #[error("queue full for channel {channel_id} (max: {max_size})")]
    QueueFull { channel_id: String, max_size: usize },

    /// Flush requested without a delivery target
    #[error("no delivery callback configured")]
    NoDeliveryCallback,

    /// Delivery callback failure
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Delivery callback exceeded its deadline
    #[error("delivery timed out after {0:?}")]
    DeliveryTimeout(Duration),

    /// Background work requested outside an async runtime
    #[error("no Tokio runtime available: {0}")]
    Runtime(String),

    /// Event publisher failure
    #[error("Publish error: {0}")]
    Publish(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }

    /// Create a publish error
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
