//! Live process panel
//!
//! Mirrors the registry's live list through a subscription, renders it as a
//! table, and drives per-process and bulk cancellation with user feedback.

use comfy_table::{presets::UTF8_FULL, Table};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::registry::{ProcessId, ProcessKind, ProcessRegistry, ProcessSnapshot, Subscription};

use super::notice::NoticeLog;

/// Glyph shown for each process kind, matching the dashboard widget
fn kind_glyph(kind: ProcessKind) -> &'static str {
    match kind {
        ProcessKind::Verification => "🔐",
        ProcessKind::Upload => "📤",
        ProcessKind::Scan => "📷",
        ProcessKind::Analysis => "🔍",
        ProcessKind::Monitoring => "👁",
    }
}

/// Subscriber-backed view of the registry with cancel controls
pub struct ProcessPanel {
    registry: Arc<ProcessRegistry>,
    notices: Arc<NoticeLog>,
    mirror: Arc<Mutex<Vec<ProcessSnapshot>>>,
    subscription: Subscription,
}

impl ProcessPanel {
    /// Attach to a registry; the mirror stays current from this point on
    pub fn attach(registry: Arc<ProcessRegistry>, notices: Arc<NoticeLog>) -> Self {
        let mirror = Arc::new(Mutex::new(registry.list()));
        let sink = Arc::clone(&mirror);
        let subscription = registry.subscribe(move |live| {
            *sink.lock() = live.to_vec();
        });

        Self {
            registry,
            notices,
            mirror,
            subscription,
        }
    }

    /// Current mirrored process list
    pub fn processes(&self) -> Vec<ProcessSnapshot> {
        self.mirror.lock().clone()
    }

    /// Cancel a single process, reporting success or failure as a notice.
    ///
    /// Returns whether the process was live.
    pub fn cancel(&self, id: ProcessId) -> bool {
        match self.registry.cancel(id) {
            Ok(cancelled) => {
                self.notices
                    .success(format!("Cancelled: {}", cancelled.description));
                true
            }
            Err(_) => {
                let description = self
                    .mirror
                    .lock()
                    .iter()
                    .find(|snapshot| snapshot.id == id)
                    .map(|snapshot| snapshot.description.clone())
                    .unwrap_or_else(|| id.to_string());
                self.notices
                    .error(format!("Failed to cancel: {description}"));
                false
            }
        }
    }

    /// Cancel every live process, reporting the swept count
    pub fn cancel_all(&self) -> usize {
        let count = self.registry.cancel_all();
        let plural = if count == 1 { "" } else { "es" };
        self.notices
            .success(format!("Cancelled {count} active process{plural}"));
        count
    }

    /// Render the live list as a table; a quiet line when nothing is running
    pub fn render(&self) -> String {
        let live = self.processes();
        if live.is_empty() {
            return String::from("No active processes");
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["", "Kind", "Description", "Elapsed"]);
        for snapshot in &live {
            table.add_row(vec![
                kind_glyph(snapshot.kind).to_string(),
                snapshot.kind.to_string(),
                snapshot.description.clone(),
                snapshot.elapsed_display(),
            ]);
        }

        format!("Active processes ({})\n{table}", live.len())
    }

    /// Stop mirroring registry updates
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }
}
