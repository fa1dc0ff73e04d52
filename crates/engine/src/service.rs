//! Generator hook driving `SERVICE` events.
//!
//! A `SERVICE` event has no inbound stream or request; instead it is driven
//! by a generator that yields payloads for as long as the service runs
//! (e.g. polling an external source on an interval). `Ok(None)` ends the
//! service loop. A `STREAM` event's own consumer loop is driven directly
//! off the broker, not this trait; only its auto-derived SERVICE sibling
//! (when the handler also registers a generator) uses it.

use async_trait::async_trait;
use serde_json::Value;

use engine_common::Result;

use crate::context::EventContext;

#[async_trait]
pub trait ServiceGenerator: Send + Sync {
    async fn next(&self, ctx: &mut EventContext) -> Result<Option<Value>>;
}
