//! Configuration data model: `AppConfig`, `EventDescriptor` and the server-level
//! settings that surround them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Reserved queue token meaning "no suffix, write to the bare stream name".
pub const AUTO: &str = "AUTO";

/// Default processing group assigned to an event with no explicit `group`.
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// The six event shapes an application can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Get,
    Post,
    Multipart,
    Stream,
    Service,
    Setup,
}

/// What happens to the queue label of a message forwarded downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueStrategy {
    /// Re-use the upstream message's queue label on the outbound write.
    Propagate,
    /// Always write using the event's own configured queue.
    Drop,
}

/// Supported on-wire payload compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Lz4,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}

/// Supported payload serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Serialization {
    Json,
    MsgPack,
}

impl Default for Serialization {
    fn default() -> Self {
        Serialization::Json
    }
}

/// Authentication types an event may require. Token validation itself is out of
/// scope here; only the declaration is modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthType {
    Unsecured,
    Basic,
    Bearer,
    Refresh,
}

/// A stream an event consumes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadStreamDescriptor {
    pub name: String,
    pub consumer_group: String,
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,
}

/// A stream an event writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteStreamDescriptor {
    pub name: String,
    #[serde(default = "default_queues")]
    pub queues: Vec<String>,
    #[serde(default)]
    pub queue_strategy: Option<QueueStrategy>,
    /// Approximate cap passed to the broker's trim-on-write (0 disables trimming).
    #[serde(default)]
    pub target_max_len: u64,
}

fn default_queues() -> Vec<String> {
    vec![AUTO.to_string()]
}

/// Wire-format and batching knobs for an event's stream I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_read_stream_timeout_ms")]
    pub read_stream_timeout_ms: u64,
    #[serde(default = "default_read_stream_interval_ms")]
    pub read_stream_interval_ms: u64,
    /// Per-message processing deadline; a message still running past this
    /// is left unacknowledged rather than awaited indefinitely.
    #[serde(default = "default_stream_timeout_ms")]
    pub stream_timeout_ms: u64,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub serialization: Serialization,
}

fn default_batch_size() -> usize {
    100
}

fn default_read_stream_timeout_ms() -> u64 {
    1000
}

fn default_read_stream_interval_ms() -> u64 {
    1000
}

fn default_stream_timeout_ms() -> u64 {
    30_000
}

impl Default for StreamSettings {
    fn default() -> Self {
        StreamSettings {
            batch_size: default_batch_size(),
            read_stream_timeout_ms: default_read_stream_timeout_ms(),
            read_stream_interval_ms: default_read_stream_interval_ms(),
            stream_timeout_ms: default_stream_timeout_ms(),
            compression: Compression::default(),
            serialization: Serialization::default(),
        }
    }
}

/// Per-event settings not tied to stream I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub logging_extra_fields: Vec<String>,
}

fn default_response_timeout_secs() -> u64 {
    60
}

impl Default for EventSettings {
    fn default() -> Self {
        EventSettings {
            response_timeout_secs: default_response_timeout_secs(),
            stream: StreamSettings::default(),
            logging_extra_fields: Vec::new(),
        }
    }
}

/// Declaration of a single event exposed by an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDescriptor {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub read_stream: Option<ReadStreamDescriptor>,
    #[serde(default)]
    pub write_stream: Option<WriteStreamDescriptor>,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub auth: Vec<AuthType>,
    #[serde(default = "default_group")]
    pub group: String,
    /// Reference to the compiled step chain. Handler discovery/compilation is
    /// out of scope; this is an opaque identifier resolved by the host.
    #[serde(rename = "impl")]
    pub impl_ref: String,
    #[serde(default)]
    pub settings: EventSettings,
    #[serde(default)]
    pub dataobjects: Vec<String>,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

impl EventDescriptor {
    pub fn is_continuous(&self) -> bool {
        matches!(self.event_type, EventType::Stream | EventType::Service)
    }
}

/// Broker connection and resilience settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    pub stream_manager: String,
    pub connection_str: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_delay_auto_start_seconds")]
    pub delay_auto_start_seconds: f64,
    #[serde(default = "default_initial_backoff_seconds")]
    pub initial_backoff_seconds: f64,
    #[serde(default = "default_max_backoff_seconds")]
    pub max_backoff_seconds: f64,
    #[serde(default = "default_num_failures_open_circuit_breaker")]
    pub num_failures_open_circuit_breaker: u32,
}

fn default_delay_auto_start_seconds() -> f64 {
    3.0
}

fn default_initial_backoff_seconds() -> f64 {
    1.0
}

fn default_max_backoff_seconds() -> f64 {
    60.0
}

fn default_num_failures_open_circuit_breaker() -> u32 {
    1
}

/// Logging configuration: level and whether to emit JSON-formatted lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: default_log_level(),
            json: false,
        }
    }
}

/// Server-level (host-process) configuration: the parts of `ServerConfig` that
/// are not per-application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub streams: StreamsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Application identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub name: String,
    pub version: String,
}

/// Engine-level tuning shared by every event in an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_read_stream_timeout_ms")]
    pub read_stream_timeout_ms: u64,
    #[serde(default = "default_read_stream_interval_ms")]
    pub read_stream_interval_ms: u64,
    #[serde(default)]
    pub track_headers: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            read_stream_timeout_ms: default_read_stream_timeout_ms(),
            read_stream_interval_ms: default_read_stream_interval_ms(),
            track_headers: Vec::new(),
        }
    }
}

/// An application's full declaration: identity, engine tuning, plugin
/// references, and its event map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: App,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub plugins: Vec<String>,
    pub events: HashMap<String, EventDescriptor>,
}

impl AppConfig {
    /// `"<name>.<version>"`, used to register this application with the `Server`.
    pub fn app_key(&self) -> String {
        engine_common::naming::app_key(&self.app.name, &self.app.version)
    }

    pub fn event(&self, name: &str) -> Option<&EventDescriptor> {
        self.events.get(name)
    }

    /// Events that run once during startup, in declaration order.
    pub fn setup_events(&self) -> Vec<(&str, &EventDescriptor)> {
        let mut setup: Vec<_> = self
            .events
            .iter()
            .filter(|(_, e)| e.event_type == EventType::Setup)
            .map(|(name, e)| (name.as_str(), e))
            .collect();
        setup.sort_by_key(|(name, _)| *name);
        setup
    }
}
