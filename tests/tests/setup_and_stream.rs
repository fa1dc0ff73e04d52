//! `SETUP` events run once during `start()`; stream consumption acks known
//! message types and leaves unknown ones unacknowledged rather than failing
//! the whole read cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use engine::{AppEngine, EventContext, EventHandler, EventHandlers, HandlerOutput};
use engine_common::Result;
use engine_config::{parse_app_config_json, StreamsConfig};
use stream_manager::{StreamEvent, StreamManager, StreamReadItem, WriteStreamMessage};

struct CountingHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EventHandler for CountingHandler {
    async fn handle(&self, payload: Value, _ctx: &mut EventContext) -> Result<HandlerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HandlerOutput::Single(Some(payload)))
    }
}

struct OneShotReadStreamManager {
    served: Mutex<bool>,
    acked: Mutex<Vec<String>>,
}

impl Default for OneShotReadStreamManager {
    fn default() -> Self {
        OneShotReadStreamManager { served: Mutex::new(false), acked: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl StreamManager for OneShotReadStreamManager {
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
        known_msg_types: &[String],
        _batch_size: usize,
        _timeout_ms: u64,
    ) -> Result<Vec<StreamReadItem>> {
        let mut served = self.served.lock().unwrap();
        if *served {
            return Ok(Vec::new());
        }
        *served = true;

        let known_type = known_msg_types.first().cloned().unwrap_or_else(|| "orders.OrderCreated".to_string());
        Ok(vec![
            StreamReadItem::Event(StreamEvent {
                msg_internal_id: "1-0".to_string(),
                msg_type: known_type,
                payload: json!({"order_id": "abc"}),
                queue: "AUTO".to_string(),
                track_ids: HashMap::new(),
                auth_info: None,
            }),
            StreamReadItem::UnknownType {
                msg_internal_id: "2-0".to_string(),
                msg_type: "orders.SomethingElse".to_string(),
            },
        ])
    }
    async fn write_stream(&self, _stream: &str, _message: WriteStreamMessage) -> Result<String> {
        Ok("0-1".to_string())
    }
    async fn ack_read_stream(&self, _stream: &str, _consumer_group: &str, msg_internal_id: &str) -> Result<()> {
        self.acked.lock().unwrap().push(msg_internal_id.to_string());
        Ok(())
    }
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn streams_config() -> StreamsConfig {
    StreamsConfig {
        stream_manager: "oneshot".to_string(),
        connection_str: "oneshot://local".to_string(),
        username: None,
        password: None,
        delay_auto_start_seconds: 0.0,
        initial_backoff_seconds: 0.01,
        max_backoff_seconds: 0.02,
        num_failures_open_circuit_breaker: 1,
    }
}

#[tokio::test]
async fn setup_event_runs_once_before_stream_consumption_starts() {
    let raw = r#"{
        "app": { "name": "orders", "version": "1.0" },
        "events": {
            "warm_cache": { "type": "SETUP", "impl": "orders.warm_cache" },
            "on_order": {
                "type": "STREAM",
                "impl": "orders.on_order",
                "dataobjects": ["orders.OrderCreated"],
                "read_stream": { "name": "orders-in", "consumer_group": "orders-group" }
            }
        }
    }"#;
    let config = parse_app_config_json(raw).unwrap();
    let stream_manager = Arc::new(OneShotReadStreamManager::default());
    let setup_calls = Arc::new(AtomicUsize::new(0));
    let stream_calls = Arc::new(AtomicUsize::new(0));

    let handlers = EventHandlers::new()
        .with_handler("warm_cache", Arc::new(CountingHandler { calls: setup_calls.clone() }))
        .with_handler("on_order", Arc::new(CountingHandler { calls: stream_calls.clone() }));

    let engine = AppEngine::new(config, handlers, stream_manager.clone(), streams_config());
    engine.start().await.unwrap();

    assert_eq!(setup_calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    engine.stop().await.unwrap();

    assert_eq!(stream_calls.load(Ordering::SeqCst), 1);
    assert_eq!(stream_manager.acked.lock().unwrap().as_slice(), ["1-0"]);
}
