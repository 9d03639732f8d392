//! Assignment event bus — trait for reporting resolved segments to whatever
//! analytics pipeline the host wires in.
//!
//! The engine accepts an `Arc<dyn EventSink>`; emission is a side effect and
//! never changes the segment a call returns.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::SegmentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentEventType {
    /// A fresh segment was derived and persisted.
    Assigned,
    /// A stored, still-valid segment was returned without a write.
    Reused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentEvent {
    pub event_id: Uuid,
    pub event_type: SegmentEventType,
    pub storage_key: String,
    pub segment_id: SegmentId,
    pub retention_days: u32,
    pub timestamp: DateTime<Utc>,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: SegmentEvent);
}

/// No-op sink for hosts that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: SegmentEvent) {}
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<SegmentEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SegmentEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_type(&self, event_type: SegmentEventType) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: SegmentEvent) {
        self.events.lock().push(event);
    }
}

pub fn make_event(
    event_type: SegmentEventType,
    storage_key: impl Into<String>,
    segment_id: SegmentId,
    retention_days: u32,
    timestamp: DateTime<Utc>,
) -> SegmentEvent {
    SegmentEvent {
        event_id: Uuid::new_v4(),
        event_type,
        storage_key: storage_key.into(),
        segment_id,
        retention_days,
        timestamp,
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
