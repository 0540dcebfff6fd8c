//! Logging backends that receive classified access log records.

use std::sync::{Arc, Mutex};
use tracing::Level;

use crate::record::RequestRecord;

/// Destination for access log records.
///
/// Shared by every in-flight request, so implementations must tolerate
/// concurrent `emit` calls.
pub trait LogSink: Send + Sync + 'static {
    fn emit(&self, level: Level, message: &'static str, record: &RequestRecord);
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

macro_rules! access_event {
    ($level:expr, $message:ident, $record:ident) => {
        tracing::event!(
            target: "access_log",
            $level,
            remote_ip = %$record.remote_ip,
            time = %$record.time(),
            host = %$record.host,
            request = %$record.request,
            status = $record.status,
            size = $record.size,
            user_agent = %$record.user_agent,
            request_id = $record.request_id.as_deref(),
            error = $record.error.as_deref(),
            "{}",
            $message
        )
    };
}

impl LogSink for TracingSink {
    fn emit(&self, level: Level, message: &'static str, record: &RequestRecord) {
        // event! needs a constant level
        match level {
            Level::ERROR => access_event!(Level::ERROR, message, record),
            Level::WARN => access_event!(Level::WARN, message, record),
            Level::DEBUG => access_event!(Level::DEBUG, message, record),
            Level::TRACE => access_event!(Level::TRACE, message, record),
            _ => access_event!(Level::INFO, message, record),
        }
    }
}

/// A captured `emit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub level: Level,
    pub message: &'static str,
    pub record: RequestRecord,
}

/// Keeps every record in memory. Handy for asserting on access logs in tests.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, in emission order
    pub fn entries(&self) -> Vec<Entry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemorySink {
    fn emit(&self, level: Level, message: &'static str, record: &RequestRecord) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Entry {
                level,
                message,
                record: record.clone(),
            });
    }
}
