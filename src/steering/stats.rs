use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Most recent errors kept per task.
const ERROR_LOG_CAP: usize = 20;

/// Per-task throughput and failure counters. Owned exclusively by the task's
/// runtime; created on start, dropped on stop (reset = stop + start).
#[derive(Debug, Clone, Serialize)]
pub struct TaskStats {
    pub messages_processed: u64,
    pub messages_forwarded: u64,
    pub messages_failed: u64,
    pub last_activity: Option<DateTime<Utc>>,
    pub start_time: DateTime<Utc>,
    pub errors: VecDeque<String>,
}

impl TaskStats {
    pub fn new() -> Self {
        Self {
            messages_processed: 0,
            messages_forwarded: 0,
            messages_failed: 0,
            last_activity: None,
            start_time: Utc::now(),
            errors: VecDeque::new(),
        }
    }

    pub fn record_processed(&mut self) {
        self.messages_processed += 1;
        self.last_activity = Some(Utc::now());
    }

    pub fn record_forwarded(&mut self) {
        self.messages_forwarded += 1;
    }

    pub fn record_failure(&mut self, error: impl AsRef<str>) {
        self.messages_failed += 1;
        if self.errors.len() == ERROR_LOG_CAP {
            self.errors.pop_front();
        }
        self.errors
            .push_back(format!("{}: {}", Utc::now().to_rfc3339(), error.as_ref()));
    }
}

impl Default for TaskStats {
    fn default() -> Self {
        Self::new()
    }
}
