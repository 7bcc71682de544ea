//! Exam-hall monitoring session binding
//!
//! A session is one long-lived `Monitoring` process. While it is live,
//! recurring device sweeps run against the service and their findings are
//! appended to the persisted session record. Stopping the session is the
//! natural-completion path; cancellation marks the record cancelled.

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TimingConfig;
use crate::presentation::NoticeLog;
use crate::registry::{CancellableTimer, ProcessId, ProcessKind, ProcessRegistry, TimerCancel};
use crate::services::{KvStore, MonitoringSession, SessionStatus, VerificationService};

use super::{FeatureError, Result};

#[derive(Default)]
struct MonitorState {
    session: Option<MonitoringSession>,
    process_id: Option<ProcessId>,
    sweep_timer: Option<TimerCancel>,
    sweeps_run: usize,
    high_risk_total: usize,
}

/// Exam-hall monitoring feature binding
pub struct HallMonitor {
    registry: Arc<ProcessRegistry>,
    service: Arc<dyn VerificationService>,
    store: Arc<KvStore>,
    notices: Arc<NoticeLog>,
    timings: TimingConfig,
    state: Arc<Mutex<MonitorState>>,
}

impl HallMonitor {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        service: Arc<dyn VerificationService>,
        store: Arc<KvStore>,
        notices: Arc<NoticeLog>,
        timings: TimingConfig,
    ) -> Self {
        Self {
            registry,
            service,
            store,
            notices,
            timings,
            state: Arc::new(Mutex::new(MonitorState::default())),
        }
    }

    /// Open a monitoring session and register it as a live process.
    ///
    /// Fails when a session is already active or the service cannot open
    /// one; the failure is surfaced as an error notice either way.
    pub async fn start(
        &self,
        exam_id: &str,
        hall_id: &str,
        planned_minutes: u32,
    ) -> Result<ProcessId> {
        if self.state.lock().session.is_some() {
            return Err(FeatureError::AlreadyRunning(String::from(
                "monitoring session",
            )));
        }

        let session = match self
            .service
            .open_monitoring_session(exam_id, hall_id, planned_minutes)
            .await
        {
            Ok(session) => session,
            Err(error) => {
                self.notices.error("Failed to start monitoring session");
                return Err(error.into());
            }
        };
        let session_id = session.session_id;

        let process_id = self.registry.register(
            ProcessKind::Monitoring,
            format!("Exam hall monitoring session ({hall_id})"),
            {
                let state = Arc::clone(&self.state);
                let store = Arc::clone(&self.store);
                let notices = Arc::clone(&self.notices);
                move || {
                    let mut locked = state.lock();
                    if let Some(timer) = locked.sweep_timer.take() {
                        timer.cancel();
                    }
                    let was_active = locked.session.take().is_some();
                    locked.process_id = None;
                    drop(locked);
                    if was_active {
                        close_session_record(&store, session_id, SessionStatus::Cancelled);
                        notices.info("Monitoring session cancelled");
                    }
                }
            },
        );

        {
            let mut locked = self.state.lock();
            locked.session = Some(session);
            locked.process_id = Some(process_id);
            locked.sweeps_run = 0;
            locked.high_risk_total = 0;
        }
        self.notices
            .success("Monitoring session started successfully");

        self.spawn_sweep_driver(process_id, session_id);
        Ok(process_id)
    }

    fn spawn_sweep_driver(&self, process_id: ProcessId, session_id: Uuid) {
        let registry = Arc::clone(&self.registry);
        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let notices = Arc::clone(&self.notices);
        let interval = self.timings.sweep_interval();

        tokio::spawn(async move {
            loop {
                if !registry.contains(process_id) {
                    return;
                }

                let (timer, completion) = CancellableTimer::delay(interval);
                state.lock().sweep_timer = Some(timer);
                if !completion.wait().await.fired() {
                    return;
                }
                if !registry.contains(process_id) {
                    debug!(id = %process_id, "session gone, skipping device sweep");
                    return;
                }

                match service.sweep_devices(session_id).await {
                    Ok(sweep) => {
                        let high_risk = sweep.high_risk_count();
                        let mut locked = state.lock();
                        locked.sweeps_run += 1;
                        locked.high_risk_total += high_risk;
                        drop(locked);

                        if high_risk > 0 {
                            notices.warning(format!(
                                "Device sweep flagged {high_risk} high-risk device(s)"
                            ));
                        }
                    }
                    Err(error) => {
                        warn!(%error, "device sweep failed");
                    }
                }
            }
        });
    }

    /// Stop the session on its natural path: the registry entry is removed
    /// without running teardown, then the record is marked stopped.
    pub fn stop(&self) -> bool {
        let (process_id, session_id) = {
            let mut locked = self.state.lock();
            let Some(session) = locked.session.take() else {
                return false;
            };
            if let Some(timer) = locked.sweep_timer.take() {
                timer.cancel();
            }
            (locked.process_id.take(), session.session_id)
        };

        if let Some(id) = process_id {
            self.registry.complete(id);
        }
        close_session_record(&self.store, session_id, SessionStatus::Stopped);
        self.notices.success("Monitoring session stopped");
        true
    }

    /// Whether a session is active
    pub fn is_active(&self) -> bool {
        self.state.lock().session.is_some()
    }

    /// The active session, if any
    pub fn session(&self) -> Option<MonitoringSession> {
        self.state.lock().session.clone()
    }

    /// Completed device sweeps in the current session
    pub fn sweeps_run(&self) -> usize {
        self.state.lock().sweeps_run
    }

    /// High-risk findings accumulated across sweeps
    pub fn high_risk_total(&self) -> usize {
        self.state.lock().high_risk_total
    }
}

/// Mark the persisted session record with a terminal status
fn close_session_record(store: &KvStore, session_id: Uuid, status: SessionStatus) {
    let key = format!("exam_session:{session_id}");
    let Some(mut record) = store.get(&key) else {
        return;
    };
    if let Some(object) = record.as_object_mut() {
        object.insert(
            String::from("status"),
            serde_json::to_value(status).unwrap_or_else(|_| json!("stopped")),
        );
        object.insert(String::from("endedAt"), json!(Utc::now().to_rfc3339()));
        store.set(key, record);
    }
}
