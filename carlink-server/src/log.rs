//! Log sinks for the human-readable activity log.

use crate::handler::LogSink;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Forwards each line to `tracing` under the `carlink::log` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append(&self, text: &str) {
        tracing::info!(target: "carlink::log", "{}", text.trim_end());
    }
}

/// Bounded in-memory log of the most recent lines, for a status display.
pub struct MessageLog {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl MessageLog {
    /// Number of lines kept by [`MessageLog::default`].
    pub const DEFAULT_CAPACITY: usize = 25;

    /// Creates a log keeping at most `capacity` lines.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Returns the retained lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    /// Returns true if any retained line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }

    /// Drops every retained line.
    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl LogSink for MessageLog {
    fn append(&self, text: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(text.trim_end().to_string());
    }
}
