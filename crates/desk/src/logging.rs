use std::collections::VecDeque;

use serde::Serialize;

pub const DEFAULT_EVENT_CAPACITY: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeskLogEventKind {
    DailyReset,
    Execution,
    AdmissionDenied,
    AutoClose,
    Reconciled,
    Halt,
    Unhalt,
    Cooldown,
    MasterHaltEnabled,
    MasterHaltDisabled,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeskLogEvent {
    pub ts: u64,
    pub kind: DeskLogEventKind,
    pub message: String,
}

impl DeskLogEvent {
    pub fn new(ts: u64, kind: DeskLogEventKind, message: impl Into<String>) -> Self {
        Self {
            ts,
            kind,
            message: message.into(),
        }
    }
}

pub trait DeskLogWriter {
    fn write(&mut self, event: DeskLogEvent);
}

/// Keeps the most recent `capacity` events in arrival order.
#[derive(Debug, Clone)]
pub struct InMemoryDeskLog {
    capacity: usize,
    events: VecDeque<DeskLogEvent>,
}

impl Default for InMemoryDeskLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl InMemoryDeskLog {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event log capacity must be positive");

        Self {
            capacity,
            events: VecDeque::new(),
        }
    }

    pub fn events(&self) -> impl DoubleEndedIterator<Item = &DeskLogEvent> + ExactSizeIterator {
        self.events.iter()
    }

    pub fn recent(&self, count: usize) -> Vec<DeskLogEvent> {
        let skip = self.events.len().saturating_sub(count);
        self.events.iter().skip(skip).cloned().collect()
    }
}

impl DeskLogWriter for InMemoryDeskLog {
    fn write(&mut self, event: DeskLogEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }
}
