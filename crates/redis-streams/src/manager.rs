//! `RedisStreamManager`: the Redis Streams reference binding for
//! [`StreamManager`].
//!
//! Two independent connection pools (read, write) are kept so a blocking
//! `XREADGROUP` never contends with outbound `XADD`/`XACK` traffic.
//! `XGROUP CREATE ... MKSTREAM` treats a `BUSYGROUP` response (group already
//! exists) as success rather than an error.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tokio::sync::RwLock;

use engine_common::{EngineError, Result};
use stream_manager::{StreamManager, StreamReadItem, WriteStreamMessage};

use crate::codec::{decode_message, encode_message};

fn stream_os_err(e: redis::RedisError) -> EngineError {
    EngineError::StreamOs(e.to_string())
}

fn is_busygroup(e: &redis::RedisError) -> bool {
    e.to_string().contains("BUSYGROUP")
}

pub struct RedisStreamManager {
    track_headers: Vec<String>,
    read_conn: RwLock<Option<ConnectionManager>>,
    write_conn: RwLock<Option<ConnectionManager>>,
}

impl RedisStreamManager {
    pub fn new(track_headers: Vec<String>) -> Self {
        RedisStreamManager {
            track_headers,
            read_conn: RwLock::new(None),
            write_conn: RwLock::new(None),
        }
    }

    async fn read_connection(&self) -> Result<ConnectionManager> {
        self.read_conn
            .read()
            .await
            .clone()
            .ok_or_else(|| EngineError::StreamOs("read connection pool not connected".to_string()))
    }

    async fn write_connection(&self) -> Result<ConnectionManager> {
        self.write_conn
            .read()
            .await
            .clone()
            .ok_or_else(|| EngineError::StreamOs("write connection pool not connected".to_string()))
    }
}

#[async_trait]
impl StreamManager for RedisStreamManager {
    async fn connect(&self, connection_str: &str) -> Result<()> {
        let client = redis::Client::open(connection_str).map_err(stream_os_err)?;
        let read = client.get_connection_manager().await.map_err(stream_os_err)?;
        let write = client.get_connection_manager().await.map_err(stream_os_err)?;
        *self.read_conn.write().await = Some(read);
        *self.write_conn.write().await = Some(write);
        Ok(())
    }

    async fn ensure_consumer_group(&self, stream: &str, consumer_group: &str) -> Result<()> {
        let mut conn = self.write_connection().await?;
        let result: redis::RedisResult<String> =
            conn.xgroup_create_mkstream(stream, consumer_group, "0").await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_busygroup(&e) => Ok(()),
            Err(e) => Err(stream_os_err(e)),
        }
    }

    async fn read_stream(
        &self,
        stream: &str,
        consumer_group: &str,
        consumer_id: &str,
        known_msg_types: &[String],
        batch_size: usize,
        timeout_ms: u64,
    ) -> Result<Vec<StreamReadItem>> {
        let mut conn = self.read_connection().await?;
        let opts = StreamReadOptions::default()
            .group(consumer_group, consumer_id)
            .count(batch_size)
            .block(timeout_ms as usize);

        let reply: StreamReadReply = conn
            .xread_options(&[stream], &[">"], &opts)
            .await
            .map_err(stream_os_err)?;

        let mut items = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let mut fields = HashMap::new();
                for (field, value) in &entry.map {
                    if let Ok(s) = redis::from_redis_value::<String>(value) {
                        fields.insert(field.clone(), s);
                    }
                }
                let event = decode_message(&entry.id, &fields, stream, consumer_group, &self.track_headers)?;
                if known_msg_types.is_empty() || known_msg_types.iter().any(|t| t == &event.msg_type) {
                    items.push(StreamReadItem::Event(event));
                } else {
                    items.push(StreamReadItem::UnknownType {
                        msg_internal_id: event.msg_internal_id,
                        msg_type: event.msg_type,
                    });
                }
            }
        }
        Ok(items)
    }

    async fn write_stream(&self, stream: &str, message: WriteStreamMessage) -> Result<String> {
        let mut conn = self.write_connection().await?;
        let fields = encode_message(&message)?;
        let queue_label = message.queue.clone();
        let id: String = if message.target_max_len > 0 {
            conn.xadd_maxlen(
                stream,
                StreamMaxlen::Approx(message.target_max_len as usize),
                "*",
                &fields.into_iter().collect::<Vec<_>>(),
            )
            .await
            .map_err(stream_os_err)?
        } else {
            conn.xadd(stream, "*", &fields.into_iter().collect::<Vec<_>>())
                .await
                .map_err(stream_os_err)?
        };
        stream_manager::stats::record_written(stream, &queue_label);
        Ok(id)
    }

    async fn ack_read_stream(&self, stream: &str, consumer_group: &str, msg_internal_id: &str) -> Result<()> {
        let mut conn = self.write_connection().await?;
        let acked: i64 = conn
            .xack(stream, consumer_group, &[msg_internal_id])
            .await
            .map_err(stream_os_err)?;
        if acked != 1 {
            return Err(EngineError::StreamOs(format!(
                "expected to ack 1 message, acked {acked} for id {msg_internal_id}"
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.read_conn.write().await = None;
        *self.write_conn.write().await = None;
        Ok(())
    }
}
