use std::collections::VecDeque;

use ledger::HOUR_MS;

/// Execution timestamps inside the trailing hour, oldest first.
#[derive(Debug, Clone, Default)]
pub struct RateWindow {
    stamps: VecDeque<u64>,
}

impl RateWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, ts_ms: u64) {
        self.stamps.push_back(ts_ms);
    }

    /// Prunes entries older than one hour before `now_ms` and returns how many
    /// remain.
    pub fn count(&mut self, now_ms: u64) -> usize {
        let cutoff = now_ms.saturating_sub(HOUR_MS);
        while self.stamps.front().is_some_and(|ts| *ts < cutoff) {
            self.stamps.pop_front();
        }
        self.stamps.len()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }
}
