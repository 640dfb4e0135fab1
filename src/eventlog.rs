//! Bounded in-memory log of structured game events

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Oldest entries are dropped past this
pub const MAX_LOG_ENTRIES: usize = 1000;

/// Event type names
pub mod events {
    pub const SESSION_STARTED: &str = "session_started";
    pub const GAME_OVER: &str = "game_over";
    pub const SCORE_SUBMITTED: &str = "score_submitted";
    pub const SUSPICIOUS_SCORE: &str = "suspicious_score_detected";
    pub const SCORE_REJECTED: &str = "score_rejected";
    pub const VIOLATION_RECORDED: &str = "violation_recorded";
    pub const NICKNAME_SET: &str = "nickname_set";
    pub const NICKNAME_PROMPT: &str = "nickname_prompt";
    pub const SKIN_UNLOCKED: &str = "skin_unlocked";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_ms: f64,
    pub event_type: String,
    pub data: serde_json::Value,
    pub session_id: String,
}

#[derive(Debug, Clone)]
pub struct GameLog {
    session_id: String,
    entries: VecDeque<LogEntry>,
}

impl GameLog {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            entries: VecDeque::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, event_type: &str, data: serde_json::Value, now_ms: f64) {
        log::debug!("[GameLog] {event_type}: {data}");
        if self.entries.len() == MAX_LOG_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp_ms: now_ms,
            event_type: event_type.to_string(),
            data,
            session_id: self.session_id.clone(),
        });
    }

    /// Up to `count` most recent entries, oldest first
    pub fn recent(&self, count: usize) -> Vec<&LogEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).collect()
    }

    /// Count entries of one type
    pub fn count(&self, event_type: &str) -> usize {
        self.entries.iter().filter(|e| e.event_type == event_type).count()
    }

    /// Whole log as pretty JSON
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.entries)
    }
}
