//! Core process types and data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a tracked process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(Uuid);

impl ProcessId {
    /// Create a new unique process ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProcessId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of cancellable work, used for display grouping only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    /// Biometric identity verification
    Verification,

    /// Evidence or capture upload
    Upload,

    /// Camera or device scan
    Scan,

    /// Fraud or risk analysis
    Analysis,

    /// Live exam-hall monitoring session
    Monitoring,
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Verification => "verification",
            Self::Upload => "upload",
            Self::Scan => "scan",
            Self::Analysis => "analysis",
            Self::Monitoring => "monitoring",
        };
        write!(f, "{label}")
    }
}

/// Teardown closure owned by a registered process, invoked at most once
pub type Teardown = Box<dyn FnOnce() + Send>;

/// A tracked unit of cancellable work, owned by the registry
pub struct Process {
    /// Unique identifier, never reused
    pub id: ProcessId,

    /// Display grouping
    pub kind: ProcessKind,

    /// Human-readable label supplied by the registrant
    pub description: String,

    /// Registration timestamp, never mutated
    pub started_at: DateTime<Utc>,

    /// Insertion sequence for stable display ordering
    pub(crate) seq: u64,

    /// Caller-supplied cleanup, consumed on cancellation
    pub(crate) on_cancel: Option<Teardown>,
}

impl Process {
    /// Snapshot view of this record without the teardown closure
    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.id,
            kind: self.kind,
            description: self.description.clone(),
            started_at: self.started_at,
        }
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// Clonable view of a live process, delivered to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: ProcessId,
    pub kind: ProcessKind,
    pub description: String,
    pub started_at: DateTime<Utc>,
}

impl ProcessSnapshot {
    /// Seconds elapsed since registration, clamped at zero
    pub fn elapsed_secs(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_seconds()
            .max(0)
    }

    /// Compact elapsed-time label for display: `42s`, `3m 12s`, `1h 5m`
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_secs())
    }
}

/// Format an elapsed second count for the process panel
pub fn format_elapsed(elapsed: i64) -> String {
    if elapsed < 60 {
        format!("{elapsed}s")
    } else if elapsed < 3600 {
        format!("{}m {}s", elapsed / 60, elapsed % 60)
    } else {
        format!("{}h {}m", elapsed / 3600, (elapsed % 3600) / 60)
    }
}
