//! Status reporting for hosts driving a client or server
//!
//! The transfer core reports human-readable status through a `LogSink`. A
//! CLI forwards to the `log` facade; a UI host can drain a channel instead.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Tag attached to every status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub severity: Severity,
}

/// Receiver of (message, severity) pairs
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, severity: Severity);

    fn info(&self, message: &str) {
        self.log(message, Severity::Info);
    }

    fn success(&self, message: &str) {
        self.log(message, Severity::Success);
    }

    fn warning(&self, message: &str) {
        self.log(message, Severity::Warning);
    }

    fn error(&self, message: &str) {
        self.log(message, Severity::Error);
    }
}

/// Forwards to the `log` crate; whatever logger the binary installed decides
/// where it ends up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => log::info!("{}", message),
            Severity::Warning => log::warn!("{}", message),
            Severity::Error => log::error!("{}", message),
        }
    }
}

/// Pushes records onto an unbounded channel. Records sent after the receiver
/// is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<LogRecord>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LogRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn log(&self, message: &str, severity: Severity) {
        let _ = self.tx.send(LogRecord {
            message: message.to_string(),
            severity,
        });
    }
}

/// Keeps every record in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, severity: Severity, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.severity == severity && r.message.contains(needle))
    }

    pub fn clear(&self) {
        match self.records.lock() {
            Ok(mut records) => records.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl LogSink for MemorySink {
    fn log(&self, message: &str, severity: Severity) {
        let record = LogRecord {
            message: message.to_string(),
            severity,
        };
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.info("listening");
        sink.error("bad frame");

        assert_eq!(sink.records().len(), 2);
        assert!(sink.contains(Severity::Error, "bad"));
        assert!(!sink.contains(Severity::Info, "bad"));

        sink.clear();
        assert!(sink.records().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        sink.warning("first");
        sink.success("second");

        assert_eq!(rx.recv().await.unwrap().severity, Severity::Warning);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.message, "second");
        assert_eq!(second.severity, Severity::Success);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.info("nobody listening");
    }

    #[test]
    fn test_severity_tags() {
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(Severity::Error.to_string(), "error");
    }
}
