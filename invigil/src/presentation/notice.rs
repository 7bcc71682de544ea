//! User-visible notices
//!
//! The terminal analog of the product's toast notifications. Feature
//! bindings and the process panel push leveled notices here; the CLI drains
//! and prints them.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        write!(f, "{label}")
    }
}

/// A single user-visible notice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Ordered sink of notices awaiting display
pub struct NoticeLog {
    entries: Mutex<Vec<Notice>>,
}

impl NoticeLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Append a notice
    pub fn push(&self, level: NoticeLevel, message: impl Into<String>) {
        self.entries.lock().push(Notice {
            level,
            message: message.into(),
            at: Utc::now(),
        });
    }

    /// Append an informational notice
    pub fn info(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message);
    }

    /// Append a success notice
    pub fn success(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message);
    }

    /// Append a warning notice
    pub fn warning(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Warning, message);
    }

    /// Append an error notice
    pub fn error(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message);
    }

    /// Take every pending notice, oldest first
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Copy of pending notices without consuming them
    pub fn pending(&self) -> Vec<Notice> {
        self.entries.lock().clone()
    }

    /// Number of pending notices
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no notices are pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NoticeLog {
    fn default() -> Self {
        Self::new()
    }
}
