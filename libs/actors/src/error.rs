//! Actor Runtime Error Types
//!
//! One error type covers the whole runtime: user task failures caught at the
//! message boundary, failures carried by futures, pool precondition
//! violations and configuration problems.
//!
//! `ActorError` is `Clone` so that a single failure stored in a future can
//! be handed to every waiter.

use std::any::Any;
use thiserror::Error;

/// Main actor runtime error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// A message or call closure returned an error
    #[error("Task failed: {message}")]
    Task { message: String },

    /// A message or call closure panicked
    #[error("Task panicked: {message}")]
    Panicked { message: String },

    /// The future was cancelled before it completed
    #[error("Future cancelled")]
    Cancelled,

    /// A bounded wait ran out of time
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Work was submitted to a pool that has been shut down
    #[error("Pool '{pool}' has been shut down")]
    PoolShutdown { pool: String },

    /// The result of a future was already moved out by another owner
    #[error("Future result already taken")]
    ResultTaken,

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },

    /// OS thread creation failed
    #[error("Spawn error: {message}")]
    Spawn { message: String },
}

/// Result type alias for actor runtime operations
pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    /// Create a task error
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }

    /// Create a panic error from a `catch_unwind` payload
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        Self::Panicked {
            message: panic_message(payload.as_ref()),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Create a pool shutdown error
    pub fn pool_shutdown(pool: impl Into<String>) -> Self {
        Self::PoolShutdown { pool: pool.into() }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Create a spawn error
    pub fn spawn(source: &std::io::Error) -> Self {
        Self::Spawn {
            message: source.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Task { .. } => "task",
            Self::Panicked { .. } => "panic",
            Self::Cancelled => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::PoolShutdown { .. } => "pool_shutdown",
            Self::ResultTaken => "result_taken",
            Self::Configuration { .. } => "configuration",
            Self::Spawn { .. } => "spawn",
        }
    }

    /// True for failures raised by user code rather than by the runtime
    pub fn is_user_failure(&self) -> bool {
        matches!(self, Self::Task { .. } | Self::Panicked { .. })
    }
}

/// Extract a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
