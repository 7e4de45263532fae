//! Compliance Logger
//!
//! Stamps and forwards audit events to a sink without ever failing the caller

use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::audit::{AuditError, AuditEvent, AuditSink};
use crate::engine::clock::{Clock, SystemClock};

pub struct ComplianceLogger {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    dropped: AtomicUsize,
}

impl ComplianceLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            clock: Arc::new(SystemClock),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Append an event. `details` should be a JSON object; anything else
    /// is stored under a single `detail` key.
    ///
    /// Sink failures are reported via tracing and counted, never returned.
    pub fn log_event(&self, event_name: &str, details: Value) {
        let mut event = AuditEvent::new(event_name, self.clock.now());
        match details {
            Value::Object(map) => {
                for (key, value) in map {
                    event = event.with_detail(&key, value);
                }
            }
            Value::Null => {}
            other => event = event.with_detail("detail", other),
        }

        let rendered = Value::Object(event.details.clone());
        if event.is_failure() {
            warn!(event = %event.event, details = %rendered, "audit");
        } else {
            info!(event = %event.event, details = %rendered, "audit");
        }

        if let Err(e) = self.sink.write_event(&event) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(event = %event.event, error = %e, "failed to write audit event");
        }
    }

    /// Number of events the sink rejected
    pub fn dropped_events(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// In-memory sink, observable from tests and embedding callers
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn events_named(&self, event: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event == event)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn write_event(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}
