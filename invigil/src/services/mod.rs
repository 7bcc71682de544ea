//! Mock service boundary
//!
//! The registry's collaborator for simulated verification and detection
//! outcomes. Nothing here performs real biometric matching or fraud
//! modelling: confidence and risk values come from random-number generation
//! and static lookup tables, persisted to the in-memory store the way the
//! surrounding product records them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod mock;
pub mod store;

pub use mock::MockVerificationService;
pub use store::KvStore;

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Service boundary errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Simulated outage; callers fall back to a locally generated result
    #[error("verification service unavailable")]
    Unavailable,

    #[error("no monitoring session with id {0}")]
    SessionNotFound(String),
}

/// Biometric factor submitted for verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiometricFactor {
    Fingerprint,
    Face,
    Signature,
}

impl BiometricFactor {
    /// All factors, in the order the capture flow presents them
    pub const ALL: [BiometricFactor; 3] = [Self::Fingerprint, Self::Face, Self::Signature];
}

impl fmt::Display for BiometricFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fingerprint => "fingerprint",
            Self::Face => "face",
            Self::Signature => "signature",
        };
        write!(f, "{label}")
    }
}

/// Outcome of a single biometric verification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiometricOutcome {
    pub verification_id: Uuid,
    pub factor: BiometricFactor,

    /// Match confidence in [0.70, 1.00)
    pub confidence: f64,

    pub recorded_at: DateTime<Utc>,
}

/// Severity bucket for risk scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Bucket a raw risk score: high above 0.7, medium above 0.4
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            Self::High
        } else if score > 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        };
        write!(f, "{label}")
    }
}

/// Result of a full fraud-detection pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub detection_id: Uuid,
    pub subject: String,

    /// Raw risk score in [0, 1)
    pub risk_score: f64,

    pub level: RiskLevel,
    pub findings: Vec<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Status of a monitoring session record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Stopped,
    Cancelled,
}

/// A live exam-hall monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSession {
    pub session_id: Uuid,
    pub exam_id: String,
    pub hall_id: String,
    pub planned_minutes: u32,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

/// A device detected during a sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceFinding {
    pub device: String,
    pub risk: RiskLevel,
    pub detected_at: DateTime<Utc>,
}

/// Outcome of one device sweep inside a monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSweep {
    pub session_id: Uuid,
    pub devices: Vec<DeviceFinding>,
    pub swept_at: DateTime<Utc>,
}

impl DeviceSweep {
    /// Count of findings at high risk
    pub fn high_risk_count(&self) -> usize {
        self.devices
            .iter()
            .filter(|finding| finding.risk == RiskLevel::High)
            .count()
    }
}

/// The external collaborator feature bindings await inside their scheduled
/// callbacks.
///
/// Implementations may fail with [`ServiceError::Unavailable`]; the binding
/// contract requires callers to fall back to a locally generated result
/// rather than leave a process hanging.
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Score one biometric factor for the given capture reference
    async fn verify_biometric(
        &self,
        factor: BiometricFactor,
        capture_ref: &str,
    ) -> Result<BiometricOutcome>;

    /// Run a full fraud-detection pass over the given subject
    async fn assess_fraud(&self, subject: &str) -> Result<RiskAssessment>;

    /// Open and persist a monitoring session
    async fn open_monitoring_session(
        &self,
        exam_id: &str,
        hall_id: &str,
        planned_minutes: u32,
    ) -> Result<MonitoringSession>;

    /// Sweep for devices within a live session, appending findings to its
    /// record
    async fn sweep_devices(&self, session_id: Uuid) -> Result<DeviceSweep>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_buckets() {
        assert_eq!(RiskLevel::from_score(0.95), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.71), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.7), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.41), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.4), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
    }

    #[test]
    fn test_high_risk_count() {
        let sweep = DeviceSweep {
            session_id: Uuid::new_v4(),
            devices: vec![
                DeviceFinding {
                    device: String::from("Smartphone"),
                    risk: RiskLevel::High,
                    detected_at: Utc::now(),
                },
                DeviceFinding {
                    device: String::from("Calculator"),
                    risk: RiskLevel::Low,
                    detected_at: Utc::now(),
                },
            ],
            swept_at: Utc::now(),
        };
        assert_eq!(sweep.high_risk_count(), 1);
    }
}
