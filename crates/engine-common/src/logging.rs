//! Structured logging setup.
//!
//! Provides the `start` / `done` / `failed` / `stats` event shapes the engine emits
//! for every invocation, on top of `tracing`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize compact, human-readable tracing output. Suitable for local development.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true)
                .compact(),
        )
        .init();
}

/// Initialize JSON tracing output, for production log aggregation.
pub fn init_tracing_json() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_level(true)
                .with_current_span(true),
        )
        .init();
}

/// Log the start of an event invocation.
#[macro_export]
macro_rules! log_start {
    ($app_key:expr, $event_name:expr) => {
        tracing::info!(app_key = %$app_key, event_name = %$event_name, "start");
    };
}

/// Log successful completion of an event invocation.
#[macro_export]
macro_rules! log_done {
    ($app_key:expr, $event_name:expr, $elapsed_ms:expr) => {
        tracing::info!(app_key = %$app_key, event_name = %$event_name, elapsed_ms = $elapsed_ms, "done");
    };
}

/// Log a failed event invocation.
#[macro_export]
macro_rules! log_failed {
    ($app_key:expr, $event_name:expr, $err:expr) => {
        tracing::error!(app_key = %$app_key, event_name = %$event_name, error = %$err, "failed");
    };
}
