// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-instance log sink.
//!
//! Every notice an instance emits is a [`LogRecord`] handed to its
//! [`LogSink`]. The C surfaces forward records to the master's logger
//! callback; Rust callers can use [`LogFacadeSink`], which routes them into
//! the `log` facade.

use std::sync::Mutex;

use crate::config::LOG_PLACEHOLDER;
use crate::error::{Error, Status};

/// One structured log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord<'a> {
    pub status: Status,
    pub category: &'a str,
    pub instance: &'a str,
    pub message: String,
}

impl<'a> LogRecord<'a> {
    /// Record categorised by its status label.
    ///
    /// An empty instance name is replaced by a placeholder.
    pub fn new(status: Status, instance: &'a str, message: impl Into<String>) -> Self {
        Self {
            status,
            category: status.label(),
            instance: placeholder(instance),
            message: message.into(),
        }
    }

    /// Record describing `error`, with the status its severity maps to.
    pub fn from_error(instance: &'a str, error: &Error) -> Self {
        Self::new(error.status(), instance, error.to_string())
    }

    #[must_use]
    pub fn with_category(mut self, category: &'a str) -> Self {
        self.category = placeholder(category);
        self
    }
}

fn placeholder(value: &str) -> &str {
    if value.is_empty() {
        LOG_PLACEHOLDER
    } else {
        value
    }
}

/// Destination of instance log records.
pub trait LogSink: Send + Sync {
    fn log(&self, record: &LogRecord<'_>);
}

/// Forwards records to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFacadeSink;

impl LogSink for LogFacadeSink {
    fn log(&self, record: &LogRecord<'_>) {
        let level = match record.status {
            Status::Ok | Status::Pending => log::Level::Info,
            Status::Warning | Status::Discard => log::Level::Warn,
            Status::Error | Status::Fatal => log::Level::Error,
        };
        log::log!(
            level,
            "[epfmu] {} [{}] {}",
            record.instance,
            record.category,
            record.message
        );
    }
}

/// Keeps records in memory; used by tests and by drivers that print a
/// summary after the run.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(Status, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded `(status, message)` pairs, oldest first.
    pub fn records(&self) -> Vec<(Status, String)> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of records with the given status.
    pub fn count(&self, status: Status) -> usize {
        self.records().iter().filter(|(s, _)| *s == status).count()
    }
}

impl LogSink for MemorySink {
    fn log(&self, record: &LogRecord<'_>) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((record.status, record.message.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        let record = LogRecord::new(Status::Warning, "", "no weather file");
        assert_eq!(record.instance, "unknown");
        assert_eq!(record.category, "warning");
        assert_eq!(record.with_category("").category, "unknown");
    }

    #[test]
    fn test_error_record_uses_severity() {
        let record = LogRecord::from_error("house", &Error::Disconnected);
        assert_eq!(record.status, Status::Fatal);
        assert_eq!(record.category, "fatal");
        assert_eq!(record.instance, "house");
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.log(&LogRecord::new(Status::Ok, "a", "one"));
        sink.log(&LogRecord::new(Status::Warning, "a", "two"));
        LogFacadeSink.log(&LogRecord::new(Status::Error, "a", "three"));
        assert_eq!(sink.count(Status::Warning), 1);
        assert_eq!(sink.records()[0], (Status::Ok, "one".to_string()));
    }
}
