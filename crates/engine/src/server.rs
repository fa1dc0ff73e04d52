//! `Server`: owns every registered application's `AppEngine` and wires
//! plugin `AppConfig` references between them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use engine_common::{EngineError, Result};
use engine_config::AppConfig;
use stream_manager::StreamManager;

use crate::app_engine::{AppEngine, EventHandlers};

/// Host process owning every application registered with it.
pub struct Server {
    apps: RwLock<HashMap<String, AppEngine>>,
}

impl Server {
    pub fn new() -> Self {
        Server {
            apps: RwLock::new(HashMap::new()),
        }
    }

    /// Registers and starts an application. Resolves `plugins` references
    /// against already-registered applications' `AppConfig`s before
    /// starting, failing fast if a referenced plugin isn't registered yet —
    /// plugins must be started before the applications that depend on them.
    pub async fn start_app(
        &self,
        config: AppConfig,
        handlers: EventHandlers,
        stream_manager: Arc<dyn StreamManager>,
        streams_config: engine_config::StreamsConfig,
    ) -> Result<String> {
        {
            let apps = self.apps.read().await;
            for plugin_key in &config.plugins {
                if !apps.contains_key(plugin_key) {
                    return Err(EngineError::Config(format!(
                        "plugin {plugin_key} referenced by {} is not registered",
                        config.app_key()
                    )));
                }
            }
        }

        let app_key = config.app_key();
        let engine = AppEngine::new(config, handlers, stream_manager, streams_config);
        engine.start().await?;

        self.apps.write().await.insert(app_key.clone(), engine);
        Ok(app_key)
    }

    /// Looks up a registered application's engine by `app_key`.
    pub async fn app_engine(&self, app_key: &str) -> Option<AppEngine> {
        self.apps.read().await.get(app_key).cloned()
    }

    /// Starts the server. Present for symmetry with `stop`; applications are
    /// registered (and started) individually via `start_app`.
    pub async fn start(&self) -> Result<()> {
        Ok(())
    }

    /// Stops every registered application.
    pub async fn stop(&self) -> Result<()> {
        let mut apps = self.apps.write().await;
        for (app_key, engine) in apps.drain() {
            if let Err(e) = engine.stop().await {
                tracing::error!(app_key, error = %e, "error stopping application");
            }
        }
        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
