//! Asynchronous confirmation gate
//!
//! Replaces the blocking browser-style confirm dialog with explicit modal
//! state: a requester parks a question and awaits the decision; whoever
//! drives the UI answers it with [`ConfirmGate::resolve`]. At most one
//! question is pending at a time; a newer request supersedes the old one,
//! which resolves as declined.

use parking_lot::Mutex;
use tokio::sync::oneshot;

struct PendingConfirm {
    prompt: String,
    tx: oneshot::Sender<bool>,
}

/// The decision future handed to a requester
pub struct ConfirmDecision {
    rx: oneshot::Receiver<bool>,
}

impl ConfirmDecision {
    /// Wait for the operator's answer.
    ///
    /// Resolves false when the request was superseded or the gate went away.
    pub async fn wait(self) -> bool {
        self.rx.await.unwrap_or(false)
    }
}

/// Modal-confirmation state decoupled from any particular UI mechanism
pub struct ConfirmGate {
    pending: Mutex<Option<PendingConfirm>>,
}

impl ConfirmGate {
    /// Create a gate with no pending question
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Park a question and return the decision future
    pub fn request(&self, prompt: impl Into<String>) -> ConfirmDecision {
        let (tx, rx) = oneshot::channel();
        let superseded = self.pending.lock().replace(PendingConfirm {
            prompt: prompt.into(),
            tx,
        });
        if let Some(old) = superseded {
            let _ = old.tx.send(false);
        }
        ConfirmDecision { rx }
    }

    /// The currently pending question, if any
    pub fn pending_prompt(&self) -> Option<String> {
        self.pending
            .lock()
            .as_ref()
            .map(|pending| pending.prompt.clone())
    }

    /// Answer the pending question. Returns false when nothing was pending.
    pub fn resolve(&self, decision: bool) -> bool {
        match self.pending.lock().take() {
            Some(pending) => {
                let _ = pending.tx.send(decision);
                true
            }
            None => false,
        }
    }
}

impl Default for ConfirmGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_then_resolve() {
        let gate = ConfirmGate::new();
        let decision = gate.request("Cancel all processes?");

        assert_eq!(gate.pending_prompt().as_deref(), Some("Cancel all processes?"));
        assert!(gate.resolve(true));
        assert!(decision.wait().await);
        assert!(gate.pending_prompt().is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_request() {
        let gate = ConfirmGate::new();
        assert!(!gate.resolve(true));
    }

    #[tokio::test]
    async fn test_newer_request_supersedes() {
        let gate = ConfirmGate::new();
        let first = gate.request("first?");
        let second = gate.request("second?");

        assert_eq!(gate.pending_prompt().as_deref(), Some("second?"));
        assert!(!first.wait().await);

        gate.resolve(true);
        assert!(second.wait().await);
    }

    #[tokio::test]
    async fn test_declined_decision() {
        let gate = ConfirmGate::new();
        let decision = gate.request("proceed?");
        gate.resolve(false);
        assert!(!decision.wait().await);
    }
}
