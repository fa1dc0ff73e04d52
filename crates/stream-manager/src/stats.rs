//! Stream stats / metrics hooks.
//!
//! A small set of `prometheus` counters/histograms a host process can
//! scrape, independent of whichever concrete broker binding is in use.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    pub static ref STREAM_MESSAGES_READ: CounterVec = register_counter_vec!(
        "engine_stream_messages_read_total",
        "Messages read off a stream, by stream name and consumer group",
        &["stream", "consumer_group"]
    )
    .expect("metric registration");
    pub static ref STREAM_MESSAGES_WRITTEN: CounterVec = register_counter_vec!(
        "engine_stream_messages_written_total",
        "Messages written to a stream, by stream name and queue",
        &["stream", "queue"]
    )
    .expect("metric registration");
    pub static ref STREAM_MESSAGES_FAILED: CounterVec = register_counter_vec!(
        "engine_stream_messages_failed_total",
        "Messages whose processing raised an error, by stream name and event",
        &["stream", "event_name"]
    )
    .expect("metric registration");
    pub static ref STREAM_READ_CYCLE_DURATION: HistogramVec = register_histogram_vec!(
        "engine_stream_read_cycle_duration_seconds",
        "Duration of a single read-process-ack cycle, by stream name",
        &["stream"]
    )
    .expect("metric registration");
}

pub fn record_read(stream: &str, consumer_group: &str, count: usize) {
    STREAM_MESSAGES_READ
        .with_label_values(&[stream, consumer_group])
        .inc_by(count as f64);
}

pub fn record_written(stream: &str, queue: &str) {
    STREAM_MESSAGES_WRITTEN.with_label_values(&[stream, queue]).inc();
}

pub fn record_failed(stream: &str, event_name: &str) {
    STREAM_MESSAGES_FAILED.with_label_values(&[stream, event_name]).inc();
}

pub fn record_cycle_duration(stream: &str, elapsed_secs: f64) {
    STREAM_READ_CYCLE_DURATION.with_label_values(&[stream]).observe(elapsed_secs);
}
