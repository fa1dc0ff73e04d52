//! End-to-end check of outbound queue-label resolution: `PROPAGATE` carries
//! the upstream queue forward, `DROP` always uses the event's own configured
//! queue, regardless of what the inbound message carried. Also checks that a
//! `writeStream` naming multiple queues fans each result out to every one of
//! them, and that the effective stream name gets the right `.<queue>` suffix.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use engine::{AppEngine, EventContext, EventHandler, EventHandlers, HandlerOutput};
use engine_common::Result;
use engine_config::{parse_app_config_json, StreamsConfig};
use stream_manager::{StreamManager, StreamReadItem, WriteStreamMessage};

struct PassThrough;

#[async_trait]
impl EventHandler for PassThrough {
    async fn handle(&self, payload: Value, _ctx: &mut EventContext) -> Result<HandlerOutput> {
        Ok(HandlerOutput::Single(Some(payload)))
    }
}

#[derive(Default)]
struct RecordingStreamManager {
    writes: Mutex<Vec<(String, String)>>,
}

impl RecordingStreamManager {
    fn written_queues(&self) -> Vec<String> {
        self.writes.lock().unwrap().iter().map(|(_, q)| q.clone()).collect()
    }

    fn written_streams(&self) -> Vec<String> {
        self.writes.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }
}

#[async_trait]
impl StreamManager for RecordingStreamManager {
    async fn connect(&self, _connection_str: &str) -> Result<()> {
        Ok(())
    }
    async fn ensure_consumer_group(&self, _stream: &str, _consumer_group: &str) -> Result<()> {
        Ok(())
    }
    async fn read_stream(
        &self,
        _stream: &str,
        _consumer_group: &str,
        _consumer_id: &str,
        _known_msg_types: &[String],
        _batch_size: usize,
        _timeout_ms: u64,
    ) -> Result<Vec<StreamReadItem>> {
        Ok(Vec::new())
    }
    async fn write_stream(&self, stream: &str, message: WriteStreamMessage) -> Result<String> {
        self.writes.lock().unwrap().push((stream.to_string(), message.queue));
        Ok("0-1".to_string())
    }
    async fn ack_read_stream(&self, _stream: &str, _consumer_group: &str, _msg_internal_id: &str) -> Result<()> {
        Ok(())
    }
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn streams_config() -> StreamsConfig {
    StreamsConfig {
        stream_manager: "recording".to_string(),
        connection_str: "recording://local".to_string(),
        username: None,
        password: None,
        delay_auto_start_seconds: 0.0,
        initial_backoff_seconds: 0.01,
        max_backoff_seconds: 0.02,
        num_failures_open_circuit_breaker: 1,
    }
}

#[tokio::test]
async fn propagate_strategy_forwards_upstream_queue() {
    let raw = r#"{
        "app": { "name": "orders", "version": "1.0" },
        "events": {
            "reshuffle": {
                "type": "GET",
                "impl": "orders.reshuffle",
                "write_stream": {
                    "name": "orders-out",
                    "queues": ["DEFAULT"],
                    "queue_strategy": "PROPAGATE"
                }
            }
        }
    }"#;
    let config = parse_app_config_json(raw).unwrap();
    let stream_manager = Arc::new(RecordingStreamManager::default());
    let handlers = EventHandlers::new().with_handler("reshuffle", Arc::new(PassThrough));
    let engine = AppEngine::new(config, handlers, stream_manager.clone(), streams_config());
    engine.start().await.unwrap();

    let mut track_ids = std::collections::HashMap::new();
    track_ids.insert("stream.queue".to_string(), "high-prio".to_string());
    let ctx = EventContext::new(engine.app_key(), "reshuffle").with_track_ids(track_ids);

    engine.execute("reshuffle", json!({"order_id": "abc"}), ctx).await.unwrap();
    engine.stop().await.unwrap();

    assert_eq!(stream_manager.written_queues(), ["high-prio"]);
    assert_eq!(stream_manager.written_streams(), ["orders-out.DEFAULT"]);
}

#[tokio::test]
async fn drop_strategy_always_uses_configured_queue() {
    let raw = r#"{
        "app": { "name": "orders", "version": "1.0" },
        "events": {
            "reshuffle": {
                "type": "GET",
                "impl": "orders.reshuffle",
                "write_stream": {
                    "name": "orders-out",
                    "queues": ["configured-queue"],
                    "queue_strategy": "DROP"
                }
            }
        }
    }"#;
    let config = parse_app_config_json(raw).unwrap();
    let stream_manager = Arc::new(RecordingStreamManager::default());
    let handlers = EventHandlers::new().with_handler("reshuffle", Arc::new(PassThrough));
    let engine = AppEngine::new(config, handlers, stream_manager.clone(), streams_config());
    engine.start().await.unwrap();

    let mut track_ids = std::collections::HashMap::new();
    track_ids.insert("stream.queue".to_string(), "high-prio".to_string());
    let ctx = EventContext::new(engine.app_key(), "reshuffle").with_track_ids(track_ids);

    engine.execute("reshuffle", json!({"order_id": "abc"}), ctx).await.unwrap();
    engine.stop().await.unwrap();

    assert_eq!(stream_manager.written_queues(), ["configured-queue"]);
    assert_eq!(stream_manager.written_streams(), ["orders-out.configured-queue"]);
}

#[tokio::test]
async fn propagate_with_auto_queue_and_auto_upstream_has_no_suffix() {
    let raw = r#"{
        "app": { "name": "orders", "version": "1.0" },
        "events": {
            "reshuffle": {
                "type": "GET",
                "impl": "orders.reshuffle",
                "write_stream": {
                    "name": "orders-out",
                    "queues": ["AUTO"],
                    "queue_strategy": "PROPAGATE"
                }
            }
        }
    }"#;
    let config = parse_app_config_json(raw).unwrap();
    let stream_manager = Arc::new(RecordingStreamManager::default());
    let handlers = EventHandlers::new().with_handler("reshuffle", Arc::new(PassThrough));
    let engine = AppEngine::new(config, handlers, stream_manager.clone(), streams_config());
    engine.start().await.unwrap();

    let ctx = EventContext::new(engine.app_key(), "reshuffle");
    engine.execute("reshuffle", json!({"order_id": "abc"}), ctx).await.unwrap();
    engine.stop().await.unwrap();

    assert_eq!(stream_manager.written_queues(), ["AUTO"]);
    assert_eq!(stream_manager.written_streams(), ["orders-out"]);
}

#[tokio::test]
async fn drop_strategy_fans_result_out_to_every_configured_queue() {
    let raw = r#"{
        "app": { "name": "orders", "version": "1.0" },
        "events": {
            "reshuffle": {
                "type": "GET",
                "impl": "orders.reshuffle",
                "write_stream": {
                    "name": "orders-out",
                    "queues": ["north", "south"],
                    "queue_strategy": "DROP"
                }
            }
        }
    }"#;
    let config = parse_app_config_json(raw).unwrap();
    let stream_manager = Arc::new(RecordingStreamManager::default());
    let handlers = EventHandlers::new().with_handler("reshuffle", Arc::new(PassThrough));
    let engine = AppEngine::new(config, handlers, stream_manager.clone(), streams_config());
    engine.start().await.unwrap();

    let ctx = EventContext::new(engine.app_key(), "reshuffle");
    engine.execute("reshuffle", json!({"order_id": "abc"}), ctx).await.unwrap();
    engine.stop().await.unwrap();

    let mut streams = stream_manager.written_streams();
    streams.sort();
    assert_eq!(streams, ["orders-out.north", "orders-out.south"]);
    let mut queues = stream_manager.written_queues();
    queues.sort();
    assert_eq!(queues, ["north", "south"]);
}
