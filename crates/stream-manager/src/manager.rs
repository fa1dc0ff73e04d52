//! The broker-agnostic `StreamManager` contract: `connect`,
//! `ensure_consumer_group`, `read_stream`, `write_stream`,
//! `ack_read_stream`, `close`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use engine_common::Result;

use crate::event::StreamEvent;

/// A single item returned by [`StreamManager::read_stream`]. A message whose
/// declared type has no registered handler is surfaced as `UnknownType`
/// rather than failing the whole read.
#[derive(Debug, Clone)]
pub enum StreamReadItem {
    Event(StreamEvent),
    UnknownType {
        msg_internal_id: String,
        msg_type: String,
    },
}

/// Everything needed to write a message onto an outbound stream.
#[derive(Debug, Clone)]
pub struct WriteStreamMessage {
    pub msg_type: String,
    pub payload: Value,
    pub queue: String,
    pub track_ids: HashMap<String, String>,
    pub auth_info: Option<Value>,
    /// Approximate cap for trim-on-write; 0 disables trimming.
    pub target_max_len: u64,
}

/// Broker-agnostic interface for reading and writing streams.
///
/// Implementations own their own connectivity and must be safe to share
/// across the tasks that read and write concurrently: the engine keeps two
/// independent connection pools (read, write) against a single manager
/// instance.
#[async_trait]
pub trait StreamManager: Send + Sync {
    /// Establishes both the read and write connection pools.
    async fn connect(&self, connection_str: &str) -> Result<()>;

    /// Creates the named consumer group if it doesn't already exist.
    /// Idempotent: a "group already exists" response from the broker is not
    /// an error.
    async fn ensure_consumer_group(&self, stream: &str, consumer_group: &str) -> Result<()>;

    /// Reads up to `batch_size` pending messages for `consumer_id` in
    /// `consumer_group`, blocking up to `timeout_ms`. `known_msg_types` lists
    /// the message types the caller has a handler for; anything else comes
    /// back as `UnknownType` rather than failing the read. Returns an empty
    /// vec on timeout with no messages available.
    async fn read_stream(
        &self,
        stream: &str,
        consumer_group: &str,
        consumer_id: &str,
        known_msg_types: &[String],
        batch_size: usize,
        timeout_ms: u64,
    ) -> Result<Vec<StreamReadItem>>;

    /// Writes a message to `stream`, returning the broker-assigned message id.
    async fn write_stream(&self, stream: &str, message: WriteStreamMessage) -> Result<String>;

    /// Acknowledges successful processing of a message, removing it from the
    /// consumer group's pending entries list.
    async fn ack_read_stream(
        &self,
        stream: &str,
        consumer_group: &str,
        msg_internal_id: &str,
    ) -> Result<()>;

    /// Releases both connection pools.
    async fn close(&self) -> Result<()>;
}
