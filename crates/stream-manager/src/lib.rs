//! # Stream Manager
//!
//! The broker-agnostic stream I/O contract ([`StreamManager`]), the
//! connection-level circuit breaker, and stream metrics hooks.

pub mod circuit_breaker;
pub mod event;
pub mod manager;
pub mod stats;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use event::StreamEvent;
pub use manager::{StreamManager, StreamReadItem, WriteStreamMessage};
