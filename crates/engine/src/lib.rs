//! # Engine
//!
//! The core runtime: per-invocation context, the event handler contract,
//! effective-event resolution, `AppEngine` and `Server`.

pub mod app_engine;
pub mod context;
pub mod effective_events;
pub mod handler;
pub mod server;
pub mod service;

pub use app_engine::{AppEngine, EventHandlers};
pub use context::EventContext;
pub use effective_events::{resolve_effective_events, EffectiveEvent};
pub use handler::{EventHandler, HandlerOutput};
pub use server::Server;
pub use service::ServiceGenerator;
