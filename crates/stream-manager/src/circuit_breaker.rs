//! Consecutive-failure circuit breaker with doubling exponential back-off.
//!
//! One breaker per stream manager connection: failure count and state are
//! driven by `StreamsConfig.num_failures_open_circuit_breaker`, and the
//! back-off schedule (double each consecutive failure, capped at
//! `max_backoff_seconds`, reset to `initial_backoff_seconds` on success) by
//! `StreamsConfig.initial_backoff_seconds` / `max_backoff_seconds`.

use std::sync::Mutex;
use std::time::Duration;

/// Whether the breaker currently considers the connection healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

struct Inner {
    consecutive_failures: u32,
    next_backoff_secs: f64,
    state: CircuitState,
}

/// Tracks consecutive connection failures and hands back the delay to wait
/// before retrying.
pub struct CircuitBreaker {
    initial_backoff_secs: f64,
    max_backoff_secs: f64,
    num_failures_to_open: u32,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(initial_backoff_secs: f64, max_backoff_secs: f64, num_failures_to_open: u32) -> Self {
        CircuitBreaker {
            initial_backoff_secs,
            max_backoff_secs,
            num_failures_to_open,
            inner: Mutex::new(Inner {
                consecutive_failures: 0,
                next_backoff_secs: initial_backoff_secs,
                state: CircuitState::Closed,
            }),
        }
    }

    /// Records a connection failure. Returns the new state and the back-off
    /// duration the caller should sleep before retrying.
    pub fn record_failure(&self) -> (CircuitState, Duration) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.consecutive_failures += 1;
        inner.state = if inner.consecutive_failures >= self.num_failures_to_open {
            CircuitState::Open
        } else {
            CircuitState::Closed
        };
        let backoff = inner.next_backoff_secs;
        inner.next_backoff_secs = (inner.next_backoff_secs * 2.0).min(self.max_backoff_secs);
        (inner.state, Duration::from_secs_f64(backoff))
    }

    /// Records a successful connection, resetting the failure history.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("circuit breaker lock poisoned");
        inner.consecutive_failures = 0;
        inner.next_backoff_secs = self.initial_backoff_secs;
        inner.state = CircuitState::Closed;
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker lock poisoned").state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().expect("circuit breaker lock poisoned").consecutive_failures
    }
}
