use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Target used for operator-facing log lines forwarded to `tracing`.
pub const LOG_TARGET: &str = "bulk_sender::log";

/// Append-only stream of operator-facing log lines.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: &str);
}

impl<S: LogSink + ?Sized> LogSink for &S {
    fn emit(&self, line: &str) {
        (**self).emit(line)
    }
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn emit(&self, line: &str) {
        (**self).emit(line)
    }
}

/// Forwards every line to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, line: &str) {
        tracing::info!(target: LOG_TARGET, "{line}");
    }
}

/// A single operator log line with the time it was emitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Thread-safe, bounded buffer of log lines for hosts that display a log panel
#[derive(Clone, Debug)]
pub struct LogCapture {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    max_entries: usize,
    forward_to_tracing: bool,
}

impl LogCapture {
    /// Create a new LogCapture keeping at most `max_entries` lines
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            max_entries: max_entries.max(1),
            forward_to_tracing: false,
        }
    }

    /// Also forward captured lines to `tracing`
    pub fn forwarding(mut self) -> Self {
        self.forward_to_tracing = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the captured entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Snapshot of the captured messages, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lock().iter().map(|entry| entry.message.clone()).collect()
    }

    /// Remove and return every captured entry
    pub fn drain(&self) -> Vec<LogEntry> {
        self.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Renders the buffer the way the log panel shows it.
    pub fn transcript(&self) -> String {
        let mut out = String::from("Logs:");
        for entry in self.lock().iter() {
            out.push_str("\n> ");
            out.push_str(&entry.message);
        }
        out
    }
}

impl Default for LogCapture {
    fn default() -> Self {
        Self::new(1000)
    }
}

impl LogSink for LogCapture {
    fn emit(&self, line: &str) {
        if self.forward_to_tracing {
            TracingSink.emit(line);
        }

        let mut entries = self.lock();

        // Enforce max entries limit
        if entries.len() >= self.max_entries {
            entries.pop_front(); // Remove oldest entry
        }

        entries.push_back(LogEntry {
            timestamp: Utc::now(),
            message: line.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_keeps_order() {
        let capture = LogCapture::new(10);
        capture.emit("first");
        capture.emit("second");
        assert_eq!(capture.lines(), ["first", "second"]);
        assert_eq!(capture.transcript(), "Logs:\n> first\n> second");
    }

    #[test]
    fn test_capture_evicts_oldest() {
        let capture = LogCapture::new(2);
        for line in ["a", "b", "c"] {
            capture.emit(line);
        }
        assert_eq!(capture.lines(), ["b", "c"]);
    }

    #[test]
    fn test_drain_empties_buffer() {
        let capture = LogCapture::default();
        capture.emit("x");
        let drained = capture.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].message, "x");
        assert!(capture.is_empty());
    }

    #[test]
    fn test_clones_share_buffer() {
        let capture = LogCapture::new(5);
        let sink: Arc<dyn LogSink> = Arc::new(capture.clone());
        sink.emit("via arc");
        assert_eq!(capture.len(), 1);
    }
}
