//! Destinations for guest log output

use elastic_wasm_api::LogLevel;
use std::sync::{Mutex, PoisonError};

/// `tracing` target used for everything a guest logs
pub const GUEST_TARGET: &str = "elastic_wasm::guest";

/// Receives `(level, message)` pairs from `elastic_log` and from the
/// capability surface's own call trace.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Forwards guest logs to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: GUEST_TARGET, "{}", message),
            LogLevel::Info => tracing::info!(target: GUEST_TARGET, "{}", message),
            LogLevel::Warn => tracing::warn!(target: GUEST_TARGET, "{}", message),
            LogLevel::Error => tracing::error!(target: GUEST_TARGET, "{}", message),
            LogLevel::Critical => {
                tracing::error!(target: GUEST_TARGET, critical = true, "{}", message)
            }
        }
    }
}

/// A single captured log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Keeps every log line in memory, in call order
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured entries
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries whose message equals `message`
    pub fn find(&self, message: &str) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.message == message)
            .collect()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogEntry {
                level,
                message: message.to_owned(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.log(LogLevel::Info, "first");
        sink.log(LogLevel::Error, "second");

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "first");
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(sink.find("second").len(), 1);
    }

    #[test]
    fn test_tracing_sink_accepts_every_level() {
        let sink = TracingSink;
        for raw in 0..5 {
            sink.log(LogLevel::from(raw), "message");
        }
    }
}
