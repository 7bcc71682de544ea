//! Cancellable suspension primitives
//!
//! Simulated asynchronous work is built from two pieces: a delayed callback
//! that can be pre-empted before it fires, and an in-flight service call that
//! can be aborted. Both ride the tokio cooperative scheduler; neither spawns
//! a dedicated thread.

use futures::future::{AbortHandle, Abortable};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};

/// How a scheduled timer ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The delay elapsed and the callback ran exactly once
    Fired,

    /// The timer was cancelled before firing; the callback never ran
    Cancelled,
}

impl TimerOutcome {
    /// True when the wrapped callback ran
    pub fn fired(self) -> bool {
        matches!(self, Self::Fired)
    }
}

/// Cancel handle for a scheduled timer
///
/// Cloneable so a teardown closure and its owning binding can share it.
/// Cancelling twice, or after the callback already ran, is a safe no-op.
#[derive(Clone)]
pub struct TimerCancel {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl TimerCancel {
    /// Pre-empt the timer. The callback will not run if it has not run yet.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            self.notify.notify_one();
        }
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Completion signal for a scheduled timer
pub struct TimerCompletion {
    rx: oneshot::Receiver<()>,
}

impl TimerCompletion {
    /// Wait for the timer to resolve.
    ///
    /// Resolves `Fired` only after the callback has run; a cancelled timer
    /// resolves `Cancelled` and never reports success.
    pub async fn wait(self) -> TimerOutcome {
        match self.rx.await {
            Ok(()) => TimerOutcome::Fired,
            Err(_) => TimerOutcome::Cancelled,
        }
    }
}

/// A delayed callback with a cancel handle
pub struct CancellableTimer;

impl CancellableTimer {
    /// Schedule `callback` to run once after `delay`.
    ///
    /// If the returned handle is cancelled before the delay elapses the
    /// callback never runs. The cancelled flag is re-checked after the sleep
    /// completes so a cancellation racing the deadline still suppresses the
    /// callback.
    pub fn schedule<F>(delay: Duration, callback: F) -> (TimerCancel, TimerCompletion)
    where
        F: FnOnce() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());
        let (done_tx, done_rx) = oneshot::channel();

        let flag = Arc::clone(&cancelled);
        let wakeup = Arc::clone(&notify);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if flag.load(Ordering::SeqCst) {
                        return;
                    }
                    callback();
                    let _ = done_tx.send(());
                }
                _ = wakeup.notified() => {}
            }
        });

        (
            TimerCancel { cancelled, notify },
            TimerCompletion { rx: done_rx },
        )
    }

    /// A pure cancellable delay with no callback.
    ///
    /// Completion resolves `Fired` once the delay elapses uncancelled.
    pub fn delay(delay: Duration) -> (TimerCancel, TimerCompletion) {
        Self::schedule(delay, || {})
    }
}

/// Abort handle for an in-flight cancellable call
#[derive(Clone)]
pub struct CallCancel {
    handle: AbortHandle,
}

impl CallCancel {
    /// Abort the wrapped call. Safe to invoke after completion.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}

/// Wrap a future so it can be aborted mid-flight.
///
/// The returned future yields `Err(Aborted)` if `cancel` wins the race,
/// mirroring an aborted network request.
pub fn cancellable_call<F>(future: F) -> (CallCancel, Abortable<F>)
where
    F: Future,
{
    let (handle, registration) = AbortHandle::new_pair();
    let wrapped = Abortable::new(future, registration);
    (CallCancel { handle }, wrapped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_timer_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let (cancel, completion) = CancellableTimer::schedule(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(completion.wait().await, TimerOutcome::Fired);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Cancelling after the fact is a no-op
        cancel.cancel();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_timer_never_fires() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let (cancel, completion) = CancellableTimer::schedule(Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        cancel.cancel();
        assert_eq!(completion.wait().await, TimerOutcome::Cancelled);

        // Wait past the original deadline; the callback must stay unfired
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (cancel, completion) =
            CancellableTimer::schedule(Duration::from_millis(50), || {});

        let alias = cancel.clone();
        cancel.cancel();
        alias.cancel();
        assert!(cancel.is_cancelled());
        assert_eq!(completion.wait().await, TimerOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancellable_call_aborts() {
        let (cancel, call) = cancellable_call(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            42
        });

        cancel.cancel();
        assert!(call.await.is_err());
    }

    #[tokio::test]
    async fn test_cancellable_call_completes() {
        let (_cancel, call) = cancellable_call(async { 7 });
        assert_eq!(call.await, Ok(7));
    }
}
