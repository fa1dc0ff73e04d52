//! Resolves an `AppConfig`'s declared events into the map of effective
//! events the engine actually drives.
//!
//! A `STREAM` event whose handler also exports a service generator gets an
//! auto-derived `SERVICE` sibling (named `<event>$__service__`) that is
//! driven by the same generator loop as a native `SERVICE` event, so
//! scheduling and liveness checks can treat the two uniformly. `SETUP`
//! events are passed through unchanged; the engine runs them once at start.

use std::collections::{HashMap, HashSet};

use engine_common::naming::service_sibling_name;
use engine_config::{AppConfig, EventDescriptor, EventType};

/// A single event as the engine will actually run it: the original
/// declaration, plus whether it was auto-derived rather than declared.
#[derive(Debug, Clone)]
pub struct EffectiveEvent {
    pub name: String,
    pub descriptor: EventDescriptor,
    pub is_auto_service: bool,
    /// Name under which this event's generator/handler is registered.
    /// Equal to `name` except for an auto-derived SERVICE sibling, which
    /// shares its originating STREAM event's registration.
    pub generator_key: String,
}

impl EffectiveEvent {
    pub fn is_continuous(&self) -> bool {
        self.descriptor.is_continuous()
    }
}

/// Builds the effective event map for an application. `generator_names` is
/// the set of event names for which a service generator was registered;
/// only a `STREAM` event whose name appears there gets the auto-derived
/// sibling.
pub fn resolve_effective_events(
    config: &AppConfig,
    generator_names: &HashSet<String>,
) -> HashMap<String, EffectiveEvent> {
    let mut effective = HashMap::new();

    for (name, descriptor) in &config.events {
        effective.insert(
            name.clone(),
            EffectiveEvent {
                name: name.clone(),
                descriptor: descriptor.clone(),
                is_auto_service: false,
                generator_key: name.clone(),
            },
        );

        if descriptor.event_type == EventType::Stream && generator_names.contains(name) {
            let service_name = service_sibling_name(name);
            let mut service_descriptor = descriptor.clone();
            service_descriptor.event_type = EventType::Service;
            service_descriptor.read_stream = None;
            service_descriptor.write_stream = None;
            effective.insert(
                service_name.clone(),
                EffectiveEvent {
                    name: service_name,
                    descriptor: service_descriptor,
                    is_auto_service: true,
                    generator_key: name.clone(),
                },
            );
        }
    }

    effective
}
