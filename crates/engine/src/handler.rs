//! Event handler contract.
//!
//! Step handler discovery and compilation into a pipeline is out of scope
//! here (the host resolves `EventDescriptor.impl_ref` to a concrete
//! [`EventHandler`] itself); what the engine owns is the lazy sequencing
//! around that chain: an optional `preprocess` pass, the handler body, and an
//! optional `postprocess` pass, with null-tolerant batch results so a step
//! can emit zero, one, or many downstream messages per invocation.

use async_trait::async_trait;
use serde_json::Value;

use engine_common::Result;

use crate::context::EventContext;

/// The result of running an event's handler body. A `Batch` lets one
/// invocation fan out into several outbound messages; `None` entries within a
/// batch are dropped silently (null-tolerant batching) rather than failing
/// the whole invocation.
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    Single(Option<Value>),
    Batch(Vec<Option<Value>>),
}

impl HandlerOutput {
    /// Flattens into the payloads that should actually be written/returned,
    /// dropping `None`s.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            HandlerOutput::Single(v) => v.into_iter().collect(),
            HandlerOutput::Batch(items) => items.into_iter().flatten().collect(),
        }
    }
}

/// A compiled event: the unit the engine drives through preprocess /
/// handle / postprocess.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Runs before the handler body. Receives the raw inbound payload (the
    /// request body, or a decoded stream message) and may transform it or
    /// reject the invocation outright.
    async fn preprocess(&self, payload: Value, ctx: &mut EventContext) -> Result<Value> {
        let _ = &ctx;
        Ok(payload)
    }

    /// Runs the event's step chain.
    async fn handle(&self, payload: Value, ctx: &mut EventContext) -> Result<HandlerOutput>;

    /// Runs after the handler body, once per non-`None` result it produced.
    async fn postprocess(&self, result: Value, ctx: &mut EventContext) -> Result<Value> {
        let _ = &ctx;
        Ok(result)
    }
}
