//! Full-scan fraud detection binding
//!
//! The scan is a chain of cancellable step timers, each advancing progress
//! by 5–15%. Cancellation pre-empts the current step and resets the scan;
//! at 100% the binding completes its registry entry itself and persists a
//! risk assessment from the service.

use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::TimingConfig;
use crate::presentation::NoticeLog;
use crate::registry::{CancellableTimer, ProcessId, ProcessKind, ProcessRegistry, TimerCancel};
use crate::services::{RiskAssessment, VerificationService};

use super::{FeatureError, Result};

#[derive(Default)]
struct ScanState {
    in_progress: bool,
    progress: f64,
    process_id: Option<ProcessId>,
    step_timer: Option<TimerCancel>,
    last_assessment: Option<RiskAssessment>,
}

/// Fraud detection feature binding
pub struct FraudScanner {
    registry: Arc<ProcessRegistry>,
    service: Arc<dyn VerificationService>,
    notices: Arc<NoticeLog>,
    timings: TimingConfig,
    state: Arc<Mutex<ScanState>>,
}

impl FraudScanner {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        service: Arc<dyn VerificationService>,
        notices: Arc<NoticeLog>,
        timings: TimingConfig,
    ) -> Self {
        Self {
            registry,
            service,
            notices,
            timings,
            state: Arc::new(Mutex::new(ScanState::default())),
        }
    }

    /// Start the full system scan.
    ///
    /// Teardown is idempotent and shared by individual-cancel and cancel-all:
    /// it pre-empts the current step timer, zeroes progress, and reverts the
    /// scan to "not in progress".
    pub fn start_full_scan(&self) -> Result<ProcessId> {
        {
            let mut locked = self.state.lock();
            if locked.in_progress {
                return Err(FeatureError::AlreadyRunning(String::from(
                    "fraud detection scan",
                )));
            }
            locked.in_progress = true;
            locked.progress = 0.0;
            locked.last_assessment = None;
        }

        let process_id = self.registry.register(
            ProcessKind::Analysis,
            "Full system fraud detection scan",
            {
                let state = Arc::clone(&self.state);
                let notices = Arc::clone(&self.notices);
                move || {
                    let mut locked = state.lock();
                    if let Some(timer) = locked.step_timer.take() {
                        timer.cancel();
                    }
                    let was_running = locked.in_progress;
                    locked.in_progress = false;
                    locked.progress = 0.0;
                    locked.process_id = None;
                    drop(locked);
                    if was_running {
                        notices.success("Fraud detection scan cancelled");
                    }
                }
            },
        );
        self.state.lock().process_id = Some(process_id);
        self.notices
            .info("Starting comprehensive fraud detection scan...");

        self.spawn_scan_driver(process_id);
        Ok(process_id)
    }

    fn spawn_scan_driver(&self, process_id: ProcessId) {
        let registry = Arc::clone(&self.registry);
        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let notices = Arc::clone(&self.notices);
        let step_delay = self.timings.scan_step_delay();

        tokio::spawn(async move {
            loop {
                if !registry.contains(process_id) {
                    return;
                }

                let (timer, completion) = CancellableTimer::schedule(step_delay, {
                    let state = Arc::clone(&state);
                    move || {
                        let mut locked = state.lock();
                        if !locked.in_progress {
                            return;
                        }
                        let increment = rand::rng().random_range(5.0..15.0);
                        locked.progress = (locked.progress + increment).min(100.0);
                    }
                });
                state.lock().step_timer = Some(timer);

                if !completion.wait().await.fired() {
                    return;
                }
                if state.lock().progress < 100.0 {
                    continue;
                }

                // Scan finished; fetch and persist the assessment. A service
                // failure here only costs the stored record.
                let assessment = match service.assess_fraud("FULL_SCAN").await {
                    Ok(assessment) => Some(assessment),
                    Err(error) => {
                        warn!(%error, "fraud assessment call failed after scan");
                        None
                    }
                };

                if !registry.contains(process_id) {
                    debug!(id = %process_id, "discarding stale scan completion");
                    return;
                }
                registry.complete(process_id);

                let mut locked = state.lock();
                locked.in_progress = false;
                locked.step_timer = None;
                locked.process_id = None;
                locked.last_assessment = assessment;
                drop(locked);

                notices.success("Fraud detection scan completed successfully");
                return;
            }
        });
    }

    /// Cancel a running scan through the registry. Returns whether a scan
    /// was live.
    pub fn cancel(&self) -> bool {
        let live = self.state.lock().process_id;
        match live {
            Some(id) => self.registry.cancel(id).is_ok(),
            None => false,
        }
    }

    /// Whether a scan is currently running
    pub fn in_progress(&self) -> bool {
        self.state.lock().in_progress
    }

    /// Progress percentage in [0, 100]
    pub fn progress(&self) -> f64 {
        self.state.lock().progress
    }

    /// Assessment recorded by the most recent completed scan
    pub fn last_assessment(&self) -> Option<RiskAssessment> {
        self.state.lock().last_assessment.clone()
    }
}
