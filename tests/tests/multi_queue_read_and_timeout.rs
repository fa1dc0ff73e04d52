//! A `readStream` declaring more than one queue consumes each queue's
//! effective stream into a single cycle batch; a handler that outlives
//! `stream.timeout_ms` is left unacknowledged rather than awaited forever.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use engine::{AppEngine, EventContext, EventHandler, EventHandlers, HandlerOutput};
use engine_common::Result;
use engine_config::{parse_app_config_json, StreamsConfig};
use stream_manager::{StreamEvent, StreamManager, StreamReadItem, WriteStreamMessage};

struct EchoHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for EchoHandler {
    async fn handle(&self, payload: Value, _ctx: &mut EventContext) -> Result<HandlerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HandlerOutput::Single(Some(payload)))
    }
}

struct StuckHandler;

#[async_trait]
impl EventHandler for StuckHandler {
    async fn handle(&self, _payload: Value, _ctx: &mut EventContext) -> Result<HandlerOutput> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("timeout should have cancelled this task first")
    }
}

#[derive(Default)]
struct QueueFanoutStreamManager {
    served: Mutex<Vec<String>>,
    acked: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl StreamManager for QueueFanoutStreamManager {
    async fn connect(&self, _connection_str: &str) -> Result<()> {
        Ok(())
    }
    async fn ensure_consumer_group(&self, stream: &str, _consumer_group: &str) -> Result<()> {
        self.served.lock().unwrap().push(stream.to_string());
        Ok(())
    }
    async fn read_stream(
        &self,
        stream: &str,
        _consumer_group: &str,
        _consumer_id: &str,
        known_msg_types: &[String],
        _batch_size: usize,
        _timeout_ms: u64,
    ) -> Result<Vec<StreamReadItem>> {
        let mut served = self.served.lock().unwrap();
        if served.iter().filter(|s| s.as_str() == stream).count() > 1 {
            return Ok(Vec::new());
        }
        served.push(stream.to_string());

        let msg_type = known_msg_types.first().cloned().unwrap_or_else(|| "orders.OrderCreated".to_string());
        Ok(vec![StreamReadItem::Event(StreamEvent {
            msg_internal_id: format!("{stream}-0"),
            msg_type,
            payload: json!({"from": stream}),
            queue: "AUTO".to_string(),
            track_ids: HashMap::new(),
            auth_info: None,
        })])
    }
    async fn write_stream(&self, _stream: &str, _message: WriteStreamMessage) -> Result<String> {
        Ok("0-1".to_string())
    }
    async fn ack_read_stream(&self, stream: &str, _consumer_group: &str, msg_internal_id: &str) -> Result<()> {
        self.acked.lock().unwrap().push((stream.to_string(), msg_internal_id.to_string()));
        Ok(())
    }
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn streams_config() -> StreamsConfig {
    StreamsConfig {
        stream_manager: "fanout".to_string(),
        connection_str: "fanout://local".to_string(),
        username: None,
        password: None,
        delay_auto_start_seconds: 0.0,
        initial_backoff_seconds: 0.01,
        max_backoff_seconds: 0.02,
        num_failures_open_circuit_breaker: 1,
    }
}

#[tokio::test]
async fn read_stream_consumes_every_declared_queue_into_one_cycle() {
    let raw = r#"{
        "app": { "name": "orders", "version": "1.0" },
        "events": {
            "on_order": {
                "type": "STREAM",
                "impl": "orders.on_order",
                "dataobjects": ["orders.OrderCreated"],
                "read_stream": {
                    "name": "orders-in",
                    "consumer_group": "orders-group",
                    "queues": ["north", "south"]
                }
            }
        }
    }"#;
    let config = parse_app_config_json(raw).unwrap();
    let stream_manager = Arc::new(QueueFanoutStreamManager::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let handlers = EventHandlers::new().with_handler("on_order", Arc::new(EchoHandler { calls: calls.clone() }));

    let engine = AppEngine::new(config, handlers, stream_manager.clone(), streams_config());
    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.stop().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let mut acked: Vec<String> = stream_manager.acked.lock().unwrap().iter().map(|(s, _)| s.clone()).collect();
    acked.sort();
    assert_eq!(acked, ["orders-in.north", "orders-in.south"]);
}

#[tokio::test]
async fn stuck_handler_past_stream_timeout_is_left_unacknowledged() {
    let raw = r#"{
        "app": { "name": "orders", "version": "1.0" },
        "events": {
            "on_order": {
                "type": "STREAM",
                "impl": "orders.on_order",
                "dataobjects": ["orders.OrderCreated"],
                "read_stream": { "name": "orders-in", "consumer_group": "orders-group" },
                "settings": { "stream": { "stream_timeout_ms": 20 } }
            }
        }
    }"#;
    let config = parse_app_config_json(raw).unwrap();
    let stream_manager = Arc::new(QueueFanoutStreamManager::default());
    let handlers = EventHandlers::new().with_handler("on_order", Arc::new(StuckHandler));

    let engine = AppEngine::new(config, handlers, stream_manager.clone(), streams_config());
    engine.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.stop().await.unwrap();

    assert!(stream_manager.acked.lock().unwrap().is_empty());
}
