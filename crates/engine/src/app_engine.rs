//! `AppEngine`: runs one application's effective events.
//!
//! Owns `start`/`stop`, request/response `execute`, outbound fan-out to
//! write streams, the stream consumer loop (randomized startup delay,
//! per-event exclusive token, ack-on-success / no-ack-on-failure), and the
//! generator-driven loop for native `SERVICE` events.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::Rng;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use engine_common::naming::{effective_stream_name, new_id};
use engine_common::{EngineError, Result};
use engine_config::{
    AppConfig, EventDescriptor, EventType, QueueStrategy, ReadStreamDescriptor, StreamsConfig, AUTO,
};
use stream_manager::{CircuitBreaker, StreamEvent, StreamManager, StreamReadItem, WriteStreamMessage};

use crate::context::EventContext;
use crate::effective_events::{resolve_effective_events, EffectiveEvent};
use crate::handler::EventHandler;
use crate::service::ServiceGenerator;

/// Handlers and generators a host registers before calling [`AppEngine::start`].
#[derive(Default)]
pub struct EventHandlers {
    pub handlers: HashMap<String, Arc<dyn EventHandler>>,
    pub generators: HashMap<String, Arc<dyn ServiceGenerator>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, event_name: impl Into<String>, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(event_name.into(), handler);
        self
    }

    pub fn with_generator(mut self, event_name: impl Into<String>, generator: Arc<dyn ServiceGenerator>) -> Self {
        self.generators.insert(event_name.into(), generator);
        self
    }
}

struct Inner {
    config: AppConfig,
    effective_events: HashMap<String, EffectiveEvent>,
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    generators: HashMap<String, Arc<dyn ServiceGenerator>>,
    stream_manager: Arc<dyn StreamManager>,
    streams_config: StreamsConfig,
    breaker: CircuitBreaker,
    consumer_id: String,
    running: AtomicBool,
    stop_notify: Notify,
    exclusive_tokens: HashMap<String, Arc<Mutex<()>>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Drives one application's effective events: request/response dispatch,
/// stream consumption, and service generators.
#[derive(Clone)]
pub struct AppEngine {
    inner: Arc<Inner>,
}

impl AppEngine {
    pub fn new(
        config: AppConfig,
        handlers: EventHandlers,
        stream_manager: Arc<dyn StreamManager>,
        streams_config: StreamsConfig,
    ) -> Self {
        let generator_names: HashSet<String> = handlers.generators.keys().cloned().collect();
        let effective_events = resolve_effective_events(&config, &generator_names);
        let breaker = CircuitBreaker::new(
            streams_config.initial_backoff_seconds,
            streams_config.max_backoff_seconds,
            streams_config.num_failures_open_circuit_breaker,
        );
        let exclusive_tokens = effective_events
            .iter()
            .filter(|(_, e)| e.is_continuous())
            .map(|(name, _)| (name.clone(), Arc::new(Mutex::new(()))))
            .collect();

        AppEngine {
            inner: Arc::new(Inner {
                config,
                effective_events,
                handlers: handlers.handlers,
                generators: handlers.generators,
                stream_manager,
                streams_config,
                breaker,
                consumer_id: new_id(),
                running: AtomicBool::new(false),
                stop_notify: Notify::new(),
                exclusive_tokens,
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn app_key(&self) -> String {
        self.inner.config.app_key()
    }

    /// Runs every `SETUP` event once, then spawns a loop per continuous
    /// (`STREAM`/`SERVICE`) event.
    pub async fn start(&self) -> Result<()> {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Assertion(format!(
                "app engine for {} is already running",
                self.app_key()
            )));
        }

        self.inner
            .stream_manager
            .connect(&self.inner.streams_config.connection_str)
            .await?;

        for (name, _) in self.inner.config.setup_events() {
            let ctx = EventContext::new(self.app_key(), name);
            self.execute(name, Value::Null, ctx).await?;
        }

        let mut handles = Vec::new();
        for (name, effective) in &self.inner.effective_events {
            if !effective.is_continuous() {
                continue;
            }
            let engine = self.clone();
            let name = name.clone();
            let event_type = effective.descriptor.event_type;
            let handle = match event_type {
                EventType::Stream => tokio::spawn(async move { engine.read_stream_loop(&name).await }),
                EventType::Service => tokio::spawn(async move { engine.service_loop(&name).await }),
                _ => continue,
            };
            handles.push(handle);
        }

        *self.inner.task_handles.lock().await = handles;
        Ok(())
    }

    /// Signals every running loop to stop and awaits their completion.
    pub async fn stop(&self) -> Result<()> {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.stop_notify.notify_waiters();

        let handles = std::mem::take(&mut *self.inner.task_handles.lock().await);
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.stream_manager.close().await
    }

    /// Runs a single event invocation to completion, returning every
    /// non-null result the handler produced (after postprocess).
    pub async fn execute(&self, event_name: &str, payload: Value, mut ctx: EventContext) -> Result<Vec<Value>> {
        self.execute_event(event_name, payload, &mut ctx).await
    }

    async fn execute_event(&self, event_name: &str, payload: Value, ctx: &mut EventContext) -> Result<Vec<Value>> {
        let effective = self.inner.effective_events.get(event_name).ok_or_else(|| {
            EngineError::Config(format!("event {event_name} is not declared in {}", self.app_key()))
        })?;
        let handler = self
            .inner
            .handlers
            .get(event_name)
            .ok_or_else(|| EngineError::Config(format!("no handler registered for event {event_name}")))?
            .clone();
        let response_timeout = Duration::from_secs(effective.descriptor.settings.response_timeout_secs);
        let write_stream = effective.descriptor.write_stream.clone();

        let results = tokio::time::timeout(response_timeout, run_handler_chain(handler, payload, ctx))
            .await
            .map_err(|_| {
                EngineError::Timeout(format!(
                    "event {event_name} exceeded {}s",
                    effective.descriptor.settings.response_timeout_secs
                ))
            })??;

        if let Some(write) = write_stream {
            let ctx_ref: &EventContext = ctx;
            let batch_size = effective.descriptor.settings.stream.batch_size.max(1);
            for chunk in results.chunks(batch_size) {
                let writes = chunk.iter().map(|value| self.write_stream_result(&write, value.clone(), ctx_ref));
                for outcome in join_all(writes).await {
                    outcome?;
                }
            }
        }

        Ok(results)
    }

    /// Fans a single handler result out to every queue configured on
    /// `write`, one outbound write per queue.
    async fn write_stream_result(
        &self,
        write: &engine_config::WriteStreamDescriptor,
        payload: Value,
        ctx: &EventContext,
    ) -> Result<()> {
        let strategy = write.queue_strategy.unwrap_or(QueueStrategy::Drop);
        let upstream_queue = ctx.track_id("stream.queue").unwrap_or(AUTO).to_string();

        for configured_queue in &write.queues {
            let (name_queue, label) = match strategy {
                QueueStrategy::Drop => (configured_queue.clone(), configured_queue.clone()),
                QueueStrategy::Propagate => {
                    let name_queue = if configured_queue == AUTO {
                        upstream_queue.clone()
                    } else {
                        configured_queue.clone()
                    };
                    (name_queue, upstream_queue.clone())
                }
            };
            let stream_name = effective_stream_name(&write.name, &name_queue);

            let message = WriteStreamMessage {
                msg_type: ctx.event_name.clone(),
                payload: payload.clone(),
                queue: label,
                track_ids: ctx.track_ids.clone(),
                auth_info: ctx.auth_info.clone(),
                target_max_len: write.target_max_len,
            };
            self.inner.stream_manager.write_stream(&stream_name, message).await?;
        }
        Ok(())
    }

    async fn read_stream_loop(&self, event_name: &str) {
        let descriptor = self.inner.effective_events[event_name].descriptor.clone();
        let read = match &descriptor.read_stream {
            Some(r) => r.clone(),
            None => {
                tracing::error!(event_name, "stream event declared with no read_stream descriptor");
                return;
            }
        };
        let token = self.inner.exclusive_tokens[event_name].clone();
        let streams: Vec<String> = read.queues.iter().map(|q| effective_stream_name(&read.name, q)).collect();

        let jitter_secs = rand::thread_rng().gen_range(0.0..=self.inner.streams_config.delay_auto_start_seconds.max(0.0));
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(jitter_secs)) => {}
            _ = self.inner.stop_notify.notified() => return,
        }

        for stream_name in &streams {
            if let Err(e) = self
                .inner
                .stream_manager
                .ensure_consumer_group(stream_name, &read.consumer_group)
                .await
            {
                tracing::error!(event_name, stream = %stream_name, error = %e, "failed to ensure consumer group, stream loop exiting");
                return;
            }
        }

        while self.is_running() {
            let guard_fut = token.lock();
            tokio::select! {
                _ = self.inner.stop_notify.notified() => break,
                guard = guard_fut => {
                    let cycle_result = self.read_stream_cycle(event_name, &descriptor, &read, &streams).await;
                    drop(guard);
                    match cycle_result {
                        Ok(read_count) => {
                            self.inner.breaker.record_success();
                            if read_count == 0 {
                                let interval = Duration::from_millis(descriptor.settings.stream.read_stream_interval_ms);
                                tokio::select! {
                                    _ = tokio::time::sleep(interval) => {}
                                    _ = self.inner.stop_notify.notified() => break,
                                }
                            }
                        }
                        Err(e) => {
                            let (_, backoff) = self.inner.breaker.record_failure();
                            tracing::error!(event_name, stream = %read.name, error = %e, backoff_secs = backoff.as_secs_f64(), "read cycle failed");
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {}
                                _ = self.inner.stop_notify.notified() => break,
                            }
                        }
                    }
                }
            }
        }
    }

    /// Runs one read/dispatch/ack cycle, returning the number of messages read
    /// (including unknown-type ones) so the caller can decide whether to wait
    /// out `read_stream_interval_ms` before polling again.
    async fn read_stream_cycle(
        &self,
        event_name: &str,
        descriptor: &EventDescriptor,
        read: &ReadStreamDescriptor,
        streams: &[String],
    ) -> Result<usize> {
        let start = std::time::Instant::now();

        let mut items: Vec<(String, StreamReadItem)> = Vec::new();
        for stream_name in streams {
            let batch = self
                .inner
                .stream_manager
                .read_stream(
                    stream_name,
                    &read.consumer_group,
                    &self.inner.consumer_id,
                    &descriptor.dataobjects,
                    descriptor.settings.stream.batch_size,
                    descriptor.settings.stream.read_stream_timeout_ms,
                )
                .await?;
            stream_manager::stats::record_read(stream_name, &read.consumer_group, batch.len());
            items.extend(batch.into_iter().map(|item| (stream_name.clone(), item)));
        }
        let item_count = items.len();
        let timeout = Duration::from_millis(descriptor.settings.stream.stream_timeout_ms);

        let mut tasks = Vec::new();
        for (stream_name, item) in items {
            match item {
                StreamReadItem::Event(event) => {
                    let engine = self.clone();
                    let event_name = event_name.to_string();
                    let consumer_group = read.consumer_group.clone();
                    tasks.push(tokio::spawn(async move {
                        let processing = engine.process_stream_event(&event_name, &stream_name, &consumer_group, event);
                        if tokio::time::timeout(timeout, processing).await.is_err() {
                            stream_manager::stats::record_failed(&stream_name, &event_name);
                            tracing::error!(
                                event_name,
                                stream = %stream_name,
                                "processing exceeded stream timeout, message left unacknowledged"
                            );
                        }
                    }));
                }
                StreamReadItem::UnknownType { msg_internal_id, msg_type } => {
                    tracing::warn!(
                        event_name,
                        stream = %stream_name,
                        msg_internal_id,
                        msg_type,
                        "unknown message type, left unacknowledged"
                    );
                }
            }
        }
        for task in tasks {
            let _ = task.await;
        }

        stream_manager::stats::record_cycle_duration(&read.name, start.elapsed().as_secs_f64());
        Ok(item_count)
    }

    async fn process_stream_event(
        &self,
        event_name: &str,
        stream_name: &str,
        consumer_group: &str,
        event: StreamEvent,
    ) {
        let mut track_ids = event.track_ids.clone();
        track_ids.insert("stream.queue".to_string(), event.queue.clone());
        let mut ctx = EventContext::new(self.app_key(), event_name)
            .with_track_ids(track_ids)
            .with_auth_info(event.auth_info.clone());

        let start = std::time::Instant::now();
        match self.execute_event(event_name, event.payload.clone(), &mut ctx).await {
            Ok(_) => {
                if let Err(e) = self
                    .inner
                    .stream_manager
                    .ack_read_stream(stream_name, consumer_group, &event.msg_internal_id)
                    .await
                {
                    tracing::error!(event_name, error = %e, "failed to ack message");
                }
                tracing::info!(event_name, elapsed_ms = start.elapsed().as_millis() as u64, "done");
            }
            Err(e) => {
                stream_manager::stats::record_failed(stream_name, event_name);
                tracing::error!(event_name, error = %e, "failed, message left unacknowledged for redelivery");
            }
        }
    }

    async fn service_loop(&self, event_name: &str) {
        let generator_key = self.inner.effective_events[event_name].generator_key.clone();
        let Some(generator) = self.inner.generators.get(&generator_key).cloned() else {
            tracing::error!(event_name, "service event has no registered generator, loop exiting");
            return;
        };
        let token = self.inner.exclusive_tokens[event_name].clone();
        let root_ctx = EventContext::new_root(self.app_key(), event_name);

        while self.is_running() {
            let _guard = token.lock().await;
            let mut ctx = root_ctx.derive_iteration();

            tokio::select! {
                _ = self.inner.stop_notify.notified() => break,
                next = generator.next(&mut ctx) => {
                    match next {
                        Ok(Some(payload)) => {
                            if let Err(e) = self.execute_event(event_name, payload, &mut ctx).await {
                                tracing::error!(event_name, error = %e, "service iteration failed");
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            tracing::error!(event_name, error = %e, "service generator failed, loop exiting");
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn run_handler_chain(
    handler: Arc<dyn EventHandler>,
    payload: Value,
    ctx: &mut EventContext,
) -> Result<Vec<Value>> {
    let pre = handler.preprocess(payload, ctx).await?;
    let output = handler.handle(pre, ctx).await?;
    let mut results = Vec::with_capacity(1);
    for value in output.into_values() {
        results.push(handler.postprocess(value, ctx).await?);
    }
    Ok(results)
}
