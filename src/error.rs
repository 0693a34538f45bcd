//! Error handling module for nas-dr
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Library code returns these; the binary wraps them with anyhow context.

use thiserror::Error;

/// Main error type for nas-dr
#[derive(Error, Debug)]
pub enum NasDrError {
    /// IO errors (file operations, terminal, child processes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Inventory and settings errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A remote command could not be submitted or its output collected
    #[error("Remote command failed: {0}")]
    Remote(String),

    /// Opening or closing a site connection failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Action history store errors
    #[error("History error: {0}")]
    History(String),

    /// State errors (mutex poisoning, invalid state)
    #[error("State error: {0}")]
    State(String),
}

/// Result type alias for nas-dr operations
pub type Result<T> = std::result::Result<T, NasDrError>;

// Convenient error constructors
impl NasDrError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a remote command error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a history store error
    pub fn history(msg: impl Into<String>) -> Self {
        Self::History(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}
