//! Shared fixtures for the integration tests.

// Each integration test binary compiles its own copy of this module and uses
// a different subset of it.
#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;

use efield_daq::events::{DomainEvent, InMemoryEventBus};

/// Every event type the core can publish.
pub const ALL_EVENT_TYPES: [&str; 14] = [
    "motionstarted",
    "motioncompleted",
    "motionfailed",
    "motionstopped",
    "emergencystoptriggered",
    "positionupdated",
    "scanstarted",
    "scanpointacquired",
    "scanprogress",
    "scanpaused",
    "scanresumed",
    "scancompleted",
    "scancancelled",
    "scanfailed",
];

/// Bus subscriber recording every published event in arrival order.
pub struct EventRecorder {
    events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl EventRecorder {
    /// Subscribe a recorder to every event type on `bus`.
    pub fn attach(bus: &InMemoryEventBus) -> Self {
        let events: Arc<Mutex<Vec<DomainEvent>>> = Arc::new(Mutex::new(Vec::new()));
        for event_type in ALL_EVENT_TYPES {
            let log = Arc::clone(&events);
            bus.subscribe(event_type, move |event| log.lock().push(event.clone()));
        }
        Self { events }
    }

    /// All recorded events so far.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    /// Recorded events of one type.
    pub fn of_type(&self, event_type: &str) -> Vec<DomainEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.event_type() == event_type)
            .cloned()
            .collect()
    }

    /// Number of recorded events of one type.
    pub fn count(&self, event_type: &str) -> usize {
        self.of_type(event_type).len()
    }

    /// The scan-lifecycle events (everything prefixed `scan`), in order.
    pub fn scan_events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.event_type().starts_with("scan"))
            .cloned()
            .collect()
    }
}
