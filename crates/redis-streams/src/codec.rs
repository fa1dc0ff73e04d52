//! Message encode/decode: the flat field map written to and read from a
//! Redis Streams entry.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use serde_json::Value;

use engine_common::naming::new_id;
use engine_common::{EngineError, Result};
use stream_manager::{StreamEvent, WriteStreamMessage};

/// Queue label used when a decoded message carries no explicit `queue` field,
/// for backward compatibility with producers that predate queue labeling.
pub const DEFAULT_QUEUE: &str = "AUTO";

/// Builds the flat field map written to a stream entry.
pub fn encode_message(message: &WriteStreamMessage) -> Result<HashMap<String, String>> {
    let mut fields = HashMap::new();
    fields.insert("id".to_string(), new_id());
    fields.insert("type".to_string(), message.msg_type.clone());
    fields.insert("submit_ts".to_string(), Utc::now().to_rfc3339());
    let event_ts = message
        .payload
        .get("event_ts")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    fields.insert("event_ts".to_string(), event_ts);

    for (k, v) in &message.track_ids {
        fields.insert(k.clone(), v.clone());
    }

    if let Some(auth_info) = &message.auth_info {
        let encoded = BASE64.encode(serde_json::to_vec(auth_info)?);
        fields.insert("auth_info".to_string(), encoded);
    }

    fields.insert("ser".to_string(), "json".to_string());
    fields.insert("comp".to_string(), "none".to_string());
    fields.insert("payload".to_string(), serde_json::to_string(&message.payload)?);
    fields.insert("queue".to_string(), message.queue.clone());

    Ok(fields)
}

/// Decodes a raw stream entry's field map into a [`StreamEvent`].
pub fn decode_message(
    msg_internal_id: &str,
    fields: &HashMap<String, String>,
    stream_name: &str,
    consumer_group: &str,
    track_headers: &[String],
) -> Result<StreamEvent> {
    let raw_payload = fields
        .get("payload")
        .ok_or_else(|| EngineError::StreamOs("stream entry missing payload field".to_string()))?;
    let payload: Value = serde_json::from_str(raw_payload)?;

    let msg_type = fields.get("type").cloned().unwrap_or_default();
    let queue = fields.get("queue").cloned().unwrap_or_else(|| DEFAULT_QUEUE.to_string());

    let mut track_ids = HashMap::new();
    track_ids.insert("stream.name".to_string(), stream_name.to_string());
    track_ids.insert("stream.msg_id".to_string(), msg_internal_id.to_string());
    track_ids.insert("stream.consumer_group".to_string(), consumer_group.to_string());
    track_ids.insert(
        "stream.submit_ts".to_string(),
        fields.get("submit_ts").cloned().unwrap_or_default(),
    );
    track_ids.insert(
        "stream.event_ts".to_string(),
        fields.get("event_ts").cloned().unwrap_or_default(),
    );
    track_ids.insert(
        "stream.event_id".to_string(),
        fields.get("id").cloned().unwrap_or_default(),
    );
    track_ids.insert("stream.read_ts".to_string(), Utc::now().to_rfc3339());
    for header in track_headers {
        track_ids.insert(header.clone(), fields.get(header).cloned().unwrap_or_default());
    }
    track_ids.insert("track.operation_id".to_string(), new_id());

    let auth_info = match fields.get("auth_info") {
        Some(encoded) if !encoded.is_empty() => {
            let decoded = BASE64
                .decode(encoded)
                .map_err(|e| EngineError::StreamOs(format!("invalid auth_info base64: {e}")))?;
            Some(serde_json::from_slice(&decoded)?)
        }
        _ => None,
    };

    Ok(StreamEvent {
        msg_internal_id: msg_internal_id.to_string(),
        msg_type,
        payload,
        queue,
        track_ids,
        auth_info,
    })
}
