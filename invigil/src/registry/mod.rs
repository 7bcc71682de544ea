//! Process Registry
//!
//! The single in-memory source of truth for all currently outstanding
//! cancellable operations, regardless of which feature created them.
//! Features register work with a teardown closure, the presentation layer
//! subscribes for live updates, and cancellation (individual or bulk) drives
//! teardown exactly once per process.
//!
//! Registry operations are synchronous and never suspend; mutation and the
//! subscriber notification that follows happen within one turn of the
//! cooperative scheduler.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod process;
pub mod timer;

pub use process::{format_elapsed, Process, ProcessId, ProcessKind, ProcessSnapshot, Teardown};
pub use timer::{cancellable_call, CallCancel, CancellableTimer, TimerCancel, TimerCompletion, TimerOutcome};

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry errors
///
/// All registry operations are total; the only reportable failure is a
/// cancel aimed at an id that is no longer (or never was) live.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no live process with id {0}")]
    UnknownProcess(ProcessId),
}

/// Subscriber callback invoked with the full live list on every mutation
pub type Listener = dyn Fn(&[ProcessSnapshot]) + Send + Sync;

type ListenerMap = HashMap<Uuid, Arc<Listener>>;

/// The process-wide table of live cancellable operations
///
/// Constructed explicitly at application start and shared by reference
/// (`Arc`) with every feature binding and the presentation layer.
pub struct ProcessRegistry {
    table: Mutex<Table>,
    listeners: Arc<Mutex<ListenerMap>>,
}

struct Table {
    entries: HashMap<ProcessId, Process>,
    next_seq: u64,
}

impl ProcessRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            table: Mutex::new(Table {
                entries: HashMap::new(),
                next_seq: 0,
            }),
            listeners: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a new process and synchronously notify all subscribers.
    ///
    /// A fresh id is generated for every call, so no two live processes can
    /// collide. Returns the id the caller uses for completion or stale-result
    /// checks.
    pub fn register<F>(
        &self,
        kind: ProcessKind,
        description: impl Into<String>,
        on_cancel: F,
    ) -> ProcessId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = ProcessId::new();
        let snapshots = {
            let mut table = self.table.lock();
            let seq = table.next_seq;
            table.next_seq += 1;
            table.entries.insert(
                id,
                Process {
                    id,
                    kind,
                    description: description.into(),
                    started_at: chrono::Utc::now(),
                    seq,
                    on_cancel: Some(Box::new(on_cancel)),
                },
            );
            snapshot_list(&table)
        };

        debug!(%id, %kind, "process registered");
        self.notify(&snapshots);
        id
    }

    /// Cancel a live process: run its teardown, remove it, notify subscribers.
    ///
    /// The entry is removed before the teardown runs, so teardown is invoked
    /// at most once per process even under repeated or re-entrant cancel
    /// calls. A panicking teardown is caught and logged; the process is gone
    /// either way. Cancelling an unknown id reports `UnknownProcess` and
    /// leaves subscribers untouched (no state changed).
    pub fn cancel(&self, id: ProcessId) -> Result<ProcessSnapshot> {
        let mut process = {
            let mut table = self.table.lock();
            table
                .entries
                .remove(&id)
                .ok_or(RegistryError::UnknownProcess(id))?
        };

        let snapshot = process.snapshot();
        run_teardown(&mut process);

        let snapshots = snapshot_list(&self.table.lock());
        debug!(%id, "process cancelled");
        self.notify(&snapshots);
        Ok(snapshot)
    }

    /// Cancel every process live at call time.
    ///
    /// Teardowns run in insertion order, continuing past individual panics;
    /// the table is cleared in one step and subscribers receive exactly one
    /// notification for the whole sweep. Processes registered while the
    /// sweep's teardowns run are untouched. Returns the number of processes
    /// that were live.
    pub fn cancel_all(&self) -> usize {
        let mut drained: Vec<Process> = {
            let mut table = self.table.lock();
            table.entries.drain().map(|(_, process)| process).collect()
        };
        drained.sort_by_key(|process| process.seq);

        for process in &mut drained {
            run_teardown(process);
        }

        let snapshots = snapshot_list(&self.table.lock());
        debug!(count = drained.len(), "all processes cancelled");
        self.notify(&snapshots);
        drained.len()
    }

    /// Remove a process that finished naturally. No teardown runs.
    ///
    /// This is the registrant's own path after its async work resolved;
    /// returns false (and skips notification) when the id is not live,
    /// which happens when the process was cancelled in the meantime.
    pub fn complete(&self, id: ProcessId) -> bool {
        let snapshots = {
            let mut table = self.table.lock();
            if table.entries.remove(&id).is_none() {
                return false;
            }
            snapshot_list(&table)
        };

        debug!(%id, "process completed");
        self.notify(&snapshots);
        true
    }

    /// Whether the id is still live.
    ///
    /// Feature bindings re-query this before applying a late-arriving async
    /// result; a missing id means the result is stale and must be discarded.
    pub fn contains(&self, id: ProcessId) -> bool {
        self.table.lock().entries.contains_key(&id)
    }

    /// Current live processes in insertion order
    pub fn list(&self) -> Vec<ProcessSnapshot> {
        snapshot_list(&self.table.lock())
    }

    /// Number of live processes
    pub fn len(&self) -> usize {
        self.table.lock().entries.len()
    }

    /// Whether no process is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a listener invoked with the full live list after every
    /// register, cancel, cancel-all, and completion. Returns a handle whose
    /// `unsubscribe` is an idempotent deregistration.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[ProcessSnapshot]) + Send + Sync + 'static,
    {
        let key = Uuid::new_v4();
        self.listeners.lock().insert(key, Arc::new(listener));
        Subscription {
            key,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Deliver a snapshot to every current listener.
    ///
    /// Listener closures run outside the table lock so they may re-query the
    /// registry freely.
    fn notify(&self, snapshots: &[ProcessSnapshot]) {
        let active: Vec<Arc<Listener>> = self.listeners.lock().values().cloned().collect();
        for listener in active {
            listener(snapshots);
        }
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`ProcessRegistry::subscribe`]
///
/// Dropping the handle does not deregister the listener; call
/// [`Subscription::unsubscribe`] to stop receiving notifications.
pub struct Subscription {
    key: Uuid,
    listeners: std::sync::Weak<Mutex<ListenerMap>>,
}

impl Subscription {
    /// Remove the listener. Calling this more than once is a safe no-op.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().remove(&self.key);
        }
    }
}

fn snapshot_list(table: &Table) -> Vec<ProcessSnapshot> {
    let mut live: Vec<&Process> = table.entries.values().collect();
    live.sort_by_key(|process| process.seq);
    live.iter().map(|process| process.snapshot()).collect()
}

fn run_teardown(process: &mut Process) {
    let Some(teardown) = process.on_cancel.take() else {
        return;
    };
    if catch_unwind(AssertUnwindSafe(teardown)).is_err() {
        warn!(id = %process.id, description = %process.description, "process teardown panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn flag_pair() -> (Arc<AtomicBool>, impl FnOnce() + Send + 'static) {
        let flag = Arc::new(AtomicBool::new(false));
        let setter = Arc::clone(&flag);
        (flag, move || {
            setter.store(true, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_register_then_list() {
        let registry = ProcessRegistry::new();
        let a = registry.register(ProcessKind::Verification, "Face verification", || {});
        let b = registry.register(ProcessKind::Analysis, "Full scan", || {});

        let live = registry.list();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].id, a);
        assert_eq!(live[1].id, b);
    }

    #[test]
    fn test_cancel_runs_teardown_once() {
        let registry = ProcessRegistry::new();
        let (flag, teardown) = flag_pair();
        let id = registry.register(ProcessKind::Verification, "Face verification", teardown);

        let cancelled = registry.cancel(id).expect("process was live");
        assert_eq!(cancelled.description, "Face verification");
        assert!(flag.load(Ordering::SeqCst));
        assert!(registry.list().is_empty());
    }

    #[test]
    fn test_double_cancel_reports_unknown() {
        let registry = ProcessRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = registry.register(ProcessKind::Scan, "Device sweep", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.cancel(id).is_ok());
        assert_eq!(registry.cancel(id), Err(RegistryError::UnknownProcess(id)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_unknown_does_not_notify() {
        let registry = ProcessRegistry::new();
        let notifications = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&notifications);
        let _sub = registry.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.cancel(ProcessId::new()).is_err());
        assert_eq!(notifications.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_all_sweeps_everything_with_one_notification() {
        let registry = ProcessRegistry::new();
        let (f1, t1) = flag_pair();
        let (f2, t2) = flag_pair();
        let (f3, t3) = flag_pair();
        registry.register(ProcessKind::Verification, "p1", t1);
        registry.register(ProcessKind::Upload, "p2", t2);
        registry.register(ProcessKind::Monitoring, "p3", t3);

        let notifications = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&notifications);
        let _sub = registry.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(registry.cancel_all(), 3);
        assert!(f1.load(Ordering::SeqCst));
        assert!(f2.load(Ordering::SeqCst));
        assert!(f3.load(Ordering::SeqCst));
        assert!(registry.is_empty());
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_all_on_empty_registry() {
        let registry = ProcessRegistry::new();
        assert_eq!(registry.cancel_all(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_panicking_teardown_still_removes_entry() {
        let registry = ProcessRegistry::new();
        let broken = registry.register(ProcessKind::Analysis, "broken", || {
            panic!("teardown failure");
        });
        let (flag, teardown) = flag_pair();
        registry.register(ProcessKind::Scan, "healthy", teardown);

        assert_eq!(registry.cancel_all(), 2);
        assert!(!registry.contains(broken));
        assert!(flag.load(Ordering::SeqCst));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_complete_skips_teardown() {
        let registry = ProcessRegistry::new();
        let (flag, teardown) = flag_pair();
        let id = registry.register(ProcessKind::Verification, "Face verification", teardown);

        assert!(registry.complete(id));
        assert!(!flag.load(Ordering::SeqCst));
        assert!(registry.list().is_empty());

        // A second completion, or a cancel, finds nothing
        assert!(!registry.complete(id));
        assert!(registry.cancel(id).is_err());
    }

    #[test]
    fn test_subscriber_sees_every_mutation() {
        let registry = ProcessRegistry::new();
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&sizes);
        let sub = registry.subscribe(move |live| {
            log.lock().push(live.len());
        });

        let id = registry.register(ProcessKind::Upload, "Evidence upload", || {});
        registry.register(ProcessKind::Scan, "Device sweep", || {});
        registry.cancel(id).unwrap();
        registry.cancel_all();

        assert_eq!(*sizes.lock(), vec![1, 2, 1, 0]);

        sub.unsubscribe();
        sub.unsubscribe();
        registry.register(ProcessKind::Upload, "after unsubscribe", || {});
        assert_eq!(*sizes.lock(), vec![1, 2, 1, 0]);
    }

    #[test]
    fn test_listener_may_requery_registry() {
        let registry = Arc::new(ProcessRegistry::new());
        let observed = Arc::new(AtomicUsize::new(usize::MAX));
        let inner = Arc::clone(&registry);
        let seen = Arc::clone(&observed);
        let _sub = registry.subscribe(move |live| {
            // The delivered list matches the table at notification time
            assert_eq!(inner.len(), live.len());
            seen.store(live.len(), Ordering::SeqCst);
        });

        registry.register(ProcessKind::Monitoring, "Hall session", || {});
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_contains_tracks_liveness() {
        let registry = ProcessRegistry::new();
        let id = registry.register(ProcessKind::Analysis, "Full scan", || {});
        assert!(registry.contains(id));
        registry.cancel(id).unwrap();
        assert!(!registry.contains(id));
    }
}
