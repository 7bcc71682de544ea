//! Application context
//!
//! Owns the registry and its collaborators for the lifetime of the process.
//! Everything is constructed here and passed by reference; no component
//! reaches for a global.

use std::sync::Arc;

use crate::config::InvigilConfig;
use crate::features::{BiometricVerifier, FraudScanner, HallMonitor};
use crate::presentation::{ConfirmGate, NoticeLog, ProcessPanel};
use crate::registry::ProcessRegistry;
use crate::services::{KvStore, MockVerificationService, VerificationService};

/// Top-level wiring of the cancellation core and its feature bindings
pub struct App {
    config: InvigilConfig,
    registry: Arc<ProcessRegistry>,
    store: Arc<KvStore>,
    notices: Arc<NoticeLog>,
    confirm: Arc<ConfirmGate>,
    biometric: BiometricVerifier,
    fraud: FraudScanner,
    monitor: HallMonitor,
}

impl App {
    /// Construct the full application context from configuration
    pub fn new(config: InvigilConfig) -> Self {
        let registry = Arc::new(ProcessRegistry::new());
        let store = Arc::new(KvStore::new());
        let notices = Arc::new(NoticeLog::new());
        let confirm = Arc::new(ConfirmGate::new());

        let service: Arc<dyn VerificationService> = Arc::new(
            MockVerificationService::new(Arc::clone(&store))
                .with_outage_rate(config.simulation.outage_rate)
                .with_latency(config.timings.service_latency()),
        );

        let biometric = BiometricVerifier::new(
            Arc::clone(&registry),
            Arc::clone(&service),
            Arc::clone(&store),
            Arc::clone(&notices),
            config.timings.clone(),
            config.thresholds.clone(),
        );
        let fraud = FraudScanner::new(
            Arc::clone(&registry),
            Arc::clone(&service),
            Arc::clone(&notices),
            config.timings.clone(),
        );
        let monitor = HallMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&service),
            Arc::clone(&store),
            Arc::clone(&notices),
            config.timings.clone(),
        );

        Self {
            config,
            registry,
            store,
            notices,
            confirm,
            biometric,
            fraud,
            monitor,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &InvigilConfig {
        &self.config
    }

    /// The shared process registry
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    /// The simulated persistence layer
    pub fn store(&self) -> &Arc<KvStore> {
        &self.store
    }

    /// The notice sink feature bindings report through
    pub fn notices(&self) -> &Arc<NoticeLog> {
        &self.notices
    }

    /// The confirmation gate for destructive bulk actions
    pub fn confirm(&self) -> &Arc<ConfirmGate> {
        &self.confirm
    }

    /// Biometric verification binding
    pub fn biometric(&self) -> &BiometricVerifier {
        &self.biometric
    }

    /// Fraud detection binding
    pub fn fraud(&self) -> &FraudScanner {
        &self.fraud
    }

    /// Exam-hall monitoring binding
    pub fn monitor(&self) -> &HallMonitor {
        &self.monitor
    }

    /// Attach a live process panel to the registry
    pub fn attach_panel(&self) -> ProcessPanel {
        ProcessPanel::attach(Arc::clone(&self.registry), Arc::clone(&self.notices))
    }

    /// Tear down every live process at application stop.
    ///
    /// Returns how many processes were swept.
    pub fn shutdown(&self) -> usize {
        self.registry.cancel_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_app_is_quiet() {
        let app = App::new(InvigilConfig::default());
        assert!(app.registry().is_empty());
        assert!(app.store().is_empty());
        assert_eq!(app.shutdown(), 0);
    }
}
