//! Error taxonomy shared across the engine.
//!
//! Covers the ways an invocation can fail: timeouts, broker connectivity faults,
//! configuration problems, user handler failures and cooperative cancellation.

use thiserror::Error;

/// Top-level error type returned by engine APIs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Response or stream-processing timeout elapsed.
    #[error("timeout exceeded: {0}")]
    Timeout(String),

    /// Broker connectivity failure. Handled by the circuit breaker wrapper.
    #[error("stream broker error: {0}")]
    StreamOs(String),

    /// Unresolved `${VAR}`, missing handler, or a misconfigured event.
    #[error("configuration error: {0}")]
    Config(String),

    /// An exception raised by a user step, surfaced as the invocation result.
    #[error("handler error: {0}")]
    Handler(String),

    /// Cooperative cancellation of an in-flight task.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Engine-internal assertion violated (duplicate running event, missing init).
    #[error("engine assertion failed: {0}")]
    Assertion(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio::time::error::Elapsed> for EngineError {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        EngineError::Timeout(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
