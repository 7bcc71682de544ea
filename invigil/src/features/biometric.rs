//! Multi-factor biometric verification binding
//!
//! Each factor (fingerprint, face, signature) runs as its own registered
//! process: a capture-window timer, then a scoring call against the
//! verification service. Cancellation pre-empts whichever phase is in
//! flight; a service outage substitutes a locally generated score that is
//! explicitly marked as a simulated fallback.

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{ThresholdConfig, TimingConfig};
use crate::presentation::NoticeLog;
use crate::registry::{
    cancellable_call, CallCancel, CancellableTimer, ProcessId, ProcessKind, ProcessRegistry,
    TimerCompletion,
};
use crate::services::{BiometricFactor, KvStore, VerificationService};

use super::{FeatureError, Result, ScoreOrigin};

/// Capitalized factor label for descriptions and notices
fn title(factor: BiometricFactor) -> &'static str {
    match factor {
        BiometricFactor::Fingerprint => "Fingerprint",
        BiometricFactor::Face => "Face",
        BiometricFactor::Signature => "Signature",
    }
}

/// Step indicator for the verification flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerificationStep {
    /// Waiting for captures; the "not in progress" state teardown reverts to
    #[default]
    Capture,

    /// At least one factor is being processed
    Processing,

    /// Every started factor has a score
    Review,
}

/// An applied per-factor score with its origin marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorResult {
    /// Match percentage
    pub score: u8,

    pub origin: ScoreOrigin,
}

/// Fixed per-factor score fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorScores {
    pub fingerprint: Option<FactorResult>,
    pub face: Option<FactorResult>,
    pub signature: Option<FactorResult>,
}

impl FactorScores {
    /// Score for one factor, if applied
    pub fn get(&self, factor: BiometricFactor) -> Option<FactorResult> {
        match factor {
            BiometricFactor::Fingerprint => self.fingerprint,
            BiometricFactor::Face => self.face,
            BiometricFactor::Signature => self.signature,
        }
    }

    fn set(&mut self, factor: BiometricFactor, result: FactorResult) {
        match factor {
            BiometricFactor::Fingerprint => self.fingerprint = Some(result),
            BiometricFactor::Face => self.face = Some(result),
            BiometricFactor::Signature => self.signature = Some(result),
        }
    }

    fn applied(&self) -> impl Iterator<Item = FactorResult> {
        [self.fingerprint, self.face, self.signature]
            .into_iter()
            .flatten()
    }
}

/// Aggregate verification outcome across applied factors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    /// No factor scored yet
    Pending,

    /// Every applied factor met the verify threshold
    Verified,

    /// At least one applied factor fell below the threshold
    NeedsReview,
}

/// Phase of an in-flight factor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorStage {
    /// Capture window still open
    Capture,

    /// Capture window elapsed; scoring call outstanding
    Scoring,
}

struct InFlightFactor {
    process_id: ProcessId,
    stage: FactorStage,
    call: Option<CallCancel>,
}

#[derive(Default)]
struct VerifierState {
    aadhaar: Option<String>,
    step: VerificationStep,
    scores: FactorScores,
    in_flight: HashMap<BiometricFactor, InFlightFactor>,
}

/// Biometric verification feature binding
pub struct BiometricVerifier {
    registry: Arc<ProcessRegistry>,
    service: Arc<dyn VerificationService>,
    store: Arc<KvStore>,
    notices: Arc<NoticeLog>,
    timings: TimingConfig,
    thresholds: ThresholdConfig,
    state: Arc<Mutex<VerifierState>>,
}

impl BiometricVerifier {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        service: Arc<dyn VerificationService>,
        store: Arc<KvStore>,
        notices: Arc<NoticeLog>,
        timings: TimingConfig,
        thresholds: ThresholdConfig,
    ) -> Self {
        Self {
            registry,
            service,
            store,
            notices,
            timings,
            thresholds,
            state: Arc::new(Mutex::new(VerifierState::default())),
        }
    }

    /// Set the candidate's Aadhaar number. Must be exactly 12 digits.
    pub fn set_candidate(&self, aadhaar: &str) -> Result<()> {
        let valid = aadhaar.len() == 12 && aadhaar.bytes().all(|byte| byte.is_ascii_digit());
        if !valid {
            return Err(FeatureError::InvalidInput(String::from(
                "Aadhaar number must be 12 digits",
            )));
        }
        self.state.lock().aadhaar = Some(aadhaar.to_string());
        Ok(())
    }

    /// Upload a simulated capture for `factor` as its own cancellable
    /// process; the persisted file record backs the later scoring call.
    ///
    /// Returns the upload's process id and the capture reference to pass to
    /// [`Self::start_factor`].
    pub fn upload_capture(&self, factor: BiometricFactor) -> Result<(ProcessId, String)> {
        self.require_candidate()?;

        let capture_ref = format!("capture/{factor}/{}", Uuid::new_v4());
        let (timer, completion) = CancellableTimer::delay(self.timings.upload_delay());

        let process_id = self.registry.register(
            ProcessKind::Upload,
            format!("{} capture upload", title(factor)),
            {
                let notices = Arc::clone(&self.notices);
                let timer = timer.clone();
                move || {
                    timer.cancel();
                    notices.info(format!("{} capture upload cancelled", title(factor)));
                }
            },
        );

        let registry = Arc::clone(&self.registry);
        let store = Arc::clone(&self.store);
        let notices = Arc::clone(&self.notices);
        let stored_ref = capture_ref.clone();
        tokio::spawn(async move {
            if !completion.wait().await.fired() {
                return;
            }
            if !registry.contains(process_id) {
                debug!(%factor, "discarding stale upload completion");
                return;
            }

            store.set(
                format!("file:{}", Uuid::new_v4()),
                json!({
                    "captureRef": stored_ref,
                    "factor": factor.to_string(),
                    "size": rand::rng().random_range(100_000..1_100_000),
                    "uploadedAt": chrono::Utc::now().to_rfc3339(),
                }),
            );
            registry.complete(process_id);
            notices.success(format!("{} image uploaded successfully", title(factor)));
        });

        Ok((process_id, capture_ref))
    }

    /// Begin verification of one factor.
    ///
    /// Registers a `Verification` process whose teardown cancels the capture
    /// timer, aborts any in-flight scoring call, reverts the step indicator
    /// when nothing else is running, and surfaces a cancellation notice.
    pub fn start_factor(&self, factor: BiometricFactor, capture_ref: &str) -> Result<ProcessId> {
        self.require_candidate()?;
        if self.state.lock().in_flight.contains_key(&factor) {
            return Err(FeatureError::AlreadyRunning(format!(
                "{factor} verification"
            )));
        }

        let (timer, completion) = CancellableTimer::schedule(self.timings.capture_window(), {
            let state = Arc::clone(&self.state);
            move || {
                if let Some(entry) = state.lock().in_flight.get_mut(&factor) {
                    entry.stage = FactorStage::Scoring;
                }
            }
        });

        let process_id = self.registry.register(
            ProcessKind::Verification,
            format!("{} verification", title(factor)),
            {
                let state = Arc::clone(&self.state);
                let notices = Arc::clone(&self.notices);
                let timer = timer.clone();
                move || {
                    timer.cancel();
                    let mut locked = state.lock();
                    if let Some(entry) = locked.in_flight.remove(&factor) {
                        if let Some(call) = entry.call {
                            call.cancel();
                        }
                    }
                    if locked.in_flight.is_empty() {
                        locked.step = VerificationStep::Capture;
                    }
                    drop(locked);
                    notices.info(format!("{factor} verification cancelled"));
                }
            },
        );

        {
            let mut locked = self.state.lock();
            locked.step = VerificationStep::Processing;
            locked.in_flight.insert(
                factor,
                InFlightFactor {
                    process_id,
                    stage: FactorStage::Capture,
                    call: None,
                },
            );
        }
        self.notices
            .info(format!("Processing {factor} verification..."));

        self.spawn_scoring(factor, process_id, capture_ref.to_string(), completion);
        Ok(process_id)
    }

    fn spawn_scoring(
        &self,
        factor: BiometricFactor,
        process_id: ProcessId,
        capture_ref: String,
        completion: TimerCompletion,
    ) {
        let registry = Arc::clone(&self.registry);
        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let notices = Arc::clone(&self.notices);
        let thresholds = self.thresholds.clone();

        tokio::spawn(async move {
            // Cancelled during the capture window: nothing to score
            if !completion.wait().await.fired() {
                return;
            }

            let (call_cancel, call) =
                cancellable_call(service.verify_biometric(factor, &capture_ref));
            {
                let mut locked = state.lock();
                match locked.in_flight.get_mut(&factor) {
                    Some(entry) if entry.process_id == process_id => {
                        entry.call = Some(call_cancel);
                    }
                    // Cancelled between the timer firing and this point
                    _ => return,
                }
            }

            let result = match call.await {
                Err(_) => {
                    debug!(%factor, "verification call aborted");
                    return;
                }
                Ok(Ok(outcome)) => FactorResult {
                    score: (outcome.confidence * 100.0).round() as u8,
                    origin: ScoreOrigin::Service,
                },
                Ok(Err(error)) => {
                    warn!(%factor, %error, "verification service failed, substituting simulated score");
                    FactorResult {
                        score: rand::rng().random_range(70..100),
                        origin: ScoreOrigin::SimulatedFallback,
                    }
                }
            };

            // The result belongs to this process id; anything else in the
            // registry is none of our business. A missing id means the
            // process was cancelled while the call was outstanding.
            if !registry.contains(process_id) {
                debug!(%factor, id = %process_id, "discarding stale verification result");
                return;
            }
            registry.complete(process_id);

            {
                let mut locked = state.lock();
                locked.in_flight.remove(&factor);
                locked.scores.set(factor, result);
                if locked.in_flight.is_empty() {
                    locked.step = VerificationStep::Review;
                }
            }

            let label = title(factor);
            match result.origin {
                ScoreOrigin::SimulatedFallback => notices.success(format!(
                    "{label} verification completed (simulated fallback, {}%)",
                    result.score
                )),
                ScoreOrigin::Service if result.score >= thresholds.auto_approve_threshold => {
                    notices.success(format!(
                        "{label} verification auto-approved ({}%)",
                        result.score
                    ));
                }
                ScoreOrigin::Service if result.score >= thresholds.verify_threshold => {
                    notices.success(format!(
                        "{label} verification successful ({}%)",
                        result.score
                    ));
                }
                ScoreOrigin::Service => notices.warning(format!(
                    "{label} verification needs manual review ({}%)",
                    result.score
                )),
            }
        });
    }

    /// Cancel every in-flight factor and clear scores and candidate data
    pub fn reset(&self) {
        let live: Vec<ProcessId> = self
            .state
            .lock()
            .in_flight
            .values()
            .map(|entry| entry.process_id)
            .collect();
        for id in live {
            let _ = self.registry.cancel(id);
        }

        let mut locked = self.state.lock();
        locked.aadhaar = None;
        locked.scores = FactorScores::default();
        locked.step = VerificationStep::Capture;
        drop(locked);
        self.notices.info("Verification process reset");
    }

    /// Current step indicator
    pub fn step(&self) -> VerificationStep {
        self.state.lock().step
    }

    /// Applied per-factor scores
    pub fn scores(&self) -> FactorScores {
        self.state.lock().scores
    }

    /// Phase of an in-flight factor, if any
    pub fn factor_stage(&self, factor: BiometricFactor) -> Option<FactorStage> {
        self.state
            .lock()
            .in_flight
            .get(&factor)
            .map(|entry| entry.stage)
    }

    /// Aggregate outcome across applied factors
    pub fn status(&self) -> VerificationStatus {
        let locked = self.state.lock();
        let mut any = false;
        let mut all_pass = true;
        for result in locked.scores.applied() {
            any = true;
            all_pass &= result.score >= self.thresholds.verify_threshold;
        }
        match (any, all_pass) {
            (false, _) => VerificationStatus::Pending,
            (true, true) => VerificationStatus::Verified,
            (true, false) => VerificationStatus::NeedsReview,
        }
    }

    fn require_candidate(&self) -> Result<()> {
        if self.state.lock().aadhaar.is_none() {
            return Err(FeatureError::InvalidInput(String::from(
                "candidate Aadhaar number not set",
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_scores_fixed_fields() {
        let mut scores = FactorScores::default();
        assert!(scores.get(BiometricFactor::Face).is_none());

        scores.set(
            BiometricFactor::Face,
            FactorResult {
                score: 92,
                origin: ScoreOrigin::Service,
            },
        );
        assert_eq!(scores.get(BiometricFactor::Face).unwrap().score, 92);
        assert!(scores.fingerprint.is_none());
        assert_eq!(scores.applied().count(), 1);
    }

    #[test]
    fn test_title_labels() {
        assert_eq!(title(BiometricFactor::Fingerprint), "Fingerprint");
        assert_eq!(title(BiometricFactor::Signature), "Signature");
    }
}
