//! # Engine Common
//!
//! Shared infrastructure used by every crate in the workspace: the error taxonomy,
//! structured logging setup, and naming/id-generation helpers.

pub mod error;
pub mod logging;
pub mod naming;

pub use error::{EngineError, Result};
pub use logging::{init_tracing, init_tracing_json};
