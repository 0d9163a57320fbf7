//! In-memory session action log.
//!
//! Keeps the most recent operations (logins, commands, failures) for the
//! current process only — there is deliberately no persistence. Capped so a
//! long session can't grow without bound.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Local};

use crate::constants::MAX_LOG_ENTRIES;

/// One logged operation.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    /// Render as "YYYY-MM-DD HH:MM:SS - message".
    #[allow(dead_code)]
    pub fn render(&self) -> String {
        format!(
            "{} - {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message
        )
    }
}

/// Bounded log of recent operations, newest last.
pub struct ActionLog {
    entries: Mutex<VecDeque<LogEntry>>,
    cap: usize,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
        }
    }

    /// Append an entry, dropping the oldest once over capacity.
    pub fn record(&self, message: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.push_back(LogEntry {
            timestamp: Local::now(),
            message: message.into(),
        });
        while entries.len() > self.cap {
            entries.pop_front();
        }
    }

    /// Snapshot of all retained entries, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new()
    }
}
