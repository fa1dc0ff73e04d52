//! Wire-independent stream event representation.
//!
//! Every message decoded off a broker carries its own internal id, payload,
//! queue label and a bag of track ids threaded through logging and onward
//! propagation.

use std::collections::HashMap;

use serde_json::Value;

/// A message read off a stream, independent of the concrete broker binding.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    /// Broker-assigned message id (e.g. a Redis Streams entry id).
    pub msg_internal_id: String,
    /// Declared message type, used to pick the handler among an event's
    /// possibly multiple accepted data object types.
    pub msg_type: String,
    /// Decoded payload.
    pub payload: Value,
    /// Queue label the message was written under. `AUTO` for the default queue.
    pub queue: String,
    /// Track ids propagated through logging and onward writes: `stream.name`,
    /// `stream.msg_id`, `stream.consumer_group`, `stream.submit_ts`,
    /// `stream.event_ts`, `stream.event_id`, `stream.read_ts`, any configured
    /// `track_headers`, and a fresh `track.operation_id`.
    pub track_ids: HashMap<String, String>,
    /// Base64-decoded auth info the producer attached, if any.
    pub auth_info: Option<Value>,
}

impl StreamEvent {
    pub fn track_id(&self, key: &str) -> Option<&str> {
        self.track_ids.get(key).map(String::as_str)
    }
}
