//! Naming and ID-generation helpers.

use uuid::Uuid;

/// Special queue token meaning "the bare stream name, no queue suffix".
pub const QUEUE_AUTO: &str = "AUTO";

/// Builds the `app_key` used to register an application in the `Server`: `"<name>.<version>"`.
pub fn app_key(name: &str, version: &str) -> String {
    format!("{name}.{version}")
}

/// Builds the name of a pipeline-stage effective event: `"<event>$<stage>"`.
pub fn stage_event_name(event_name: &str, stage: &str) -> String {
    format!("{event_name}${stage}")
}

/// Builds the name of the auto-derived SERVICE sibling of a STREAM event.
pub fn service_sibling_name(event_name: &str) -> String {
    format!("{event_name}$__service__")
}

/// Generates a new random id, used for `request_id` / `operation_id` track fields.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Computes the effective stream name for a configured queue, given the base stream
/// name. `AUTO` never contributes a suffix.
pub fn effective_stream_name(base: &str, queue: &str) -> String {
    if queue == QUEUE_AUTO {
        base.to_string()
    } else {
        format!("{base}.{queue}")
    }
}
