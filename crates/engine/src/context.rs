//! `EventContext`: the per-invocation handle passed to every step.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use engine_common::naming::new_id;

/// Carries identity, track ids and auth info through a single event
/// invocation, from the initial request/stream-read to the final
/// postprocess step.
#[derive(Debug, Clone)]
pub struct EventContext {
    pub app_key: String,
    pub event_name: String,
    pub track_ids: HashMap<String, String>,
    pub auth_info: Option<Value>,
    pub creation_ts: DateTime<Utc>,
}

impl EventContext {
    pub fn new(app_key: impl Into<String>, event_name: impl Into<String>) -> Self {
        EventContext {
            app_key: app_key.into(),
            event_name: event_name.into(),
            track_ids: HashMap::new(),
            auth_info: None,
            creation_ts: Utc::now(),
        }
    }

    pub fn with_track_ids(mut self, track_ids: HashMap<String, String>) -> Self {
        self.track_ids = track_ids;
        self
    }

    pub fn with_auth_info(mut self, auth_info: Option<Value>) -> Self {
        self.auth_info = auth_info;
        self
    }

    pub fn track_id(&self, key: &str) -> Option<&str> {
        self.track_ids.get(key).map(String::as_str)
    }

    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.creation_ts).num_milliseconds()
    }

    /// Builds the root context for a service loop, stamping fresh
    /// `track.request_id` / `track.request_ts` ids that every iteration
    /// yielded by the generator will inherit.
    pub fn new_root(app_key: impl Into<String>, event_name: impl Into<String>) -> Self {
        let now = Utc::now();
        let mut track_ids = HashMap::new();
        track_ids.insert("track.request_id".to_string(), new_id());
        track_ids.insert("track.request_ts".to_string(), now.to_rfc3339());
        EventContext {
            app_key: app_key.into(),
            event_name: event_name.into(),
            track_ids,
            auth_info: None,
            creation_ts: now,
        }
    }

    /// Derives a per-iteration context that inherits this context's
    /// trackIds but stamps a fresh `track.operation_id`.
    pub fn derive_iteration(&self) -> Self {
        let mut track_ids = self.track_ids.clone();
        track_ids.insert("track.operation_id".to_string(), new_id());
        EventContext {
            app_key: self.app_key.clone(),
            event_name: self.event_name.clone(),
            track_ids,
            auth_info: self.auth_info.clone(),
            creation_ts: Utc::now(),
        }
    }
}
