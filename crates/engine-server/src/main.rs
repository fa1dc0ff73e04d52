//! Host process binary: boots the [`engine::Server`], serves health and
//! metrics over HTTP, and shuts down applications gracefully on Ctrl-C or
//! SIGTERM.

mod handlers;
mod shutdown;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use engine::Server;
use engine_config::load_server_config;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("ENGINE_SERVER_CONFIG").unwrap_or_else(|_| "server-config.json".to_string());
    engine_config::load_dotenv(".env");

    let server_config = load_server_config(&config_path)?;
    if server_config.logging.json {
        engine_common::init_tracing_json();
    } else {
        engine_common::init_tracing();
    }

    tracing::info!(config_path, "starting engine server");

    let server = Arc::new(Server::new());

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let bind_addr: SocketAddr = std::env::var("ENGINE_SERVER_BIND_ADDR")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await?;

    tracing::info!("shutdown signal received, stopping applications");
    match tokio::time::timeout(SHUTDOWN_GRACE, server.stop()).await {
        Ok(Ok(())) => tracing::info!("all applications stopped cleanly"),
        Ok(Err(e)) => tracing::error!(error = %e, "error while stopping applications"),
        Err(_) => tracing::warn!("grace period elapsed before all applications stopped"),
    }

    Ok(())
}
