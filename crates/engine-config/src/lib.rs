//! # Engine Config
//!
//! The configuration data model (`AppConfig`, `EventDescriptor`, `ServerConfig`)
//! and the JSON loading/substitution pipeline that produces it.

pub mod loader;
pub mod model;
pub mod substitution;

pub use loader::{load_app_config, load_dotenv, load_server_config, parse_app_config_json, parse_server_config_json};
pub use model::{
    App, AppConfig, AuthType, Compression, EngineSettings, EventDescriptor, EventSettings,
    EventType, LoggingConfig, QueueStrategy, ReadStreamDescriptor, Serialization, ServerConfig,
    StreamSettings, StreamsConfig, WriteStreamDescriptor, AUTO, DEFAULT_GROUP,
};
