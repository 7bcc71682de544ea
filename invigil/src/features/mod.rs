//! Per-feature process bindings
//!
//! Each feature that performs simulated asynchronous work follows the same
//! contract: register a process with an idempotent teardown closure, remove
//! the entry itself on natural completion (no teardown), and discard any
//! async result whose process id is no longer live.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod biometric;
pub mod fraud;
pub mod monitoring;

pub use biometric::{BiometricVerifier, FactorResult, FactorScores, VerificationStatus, VerificationStep};
pub use fraud::FraudScanner;
pub use monitoring::HallMonitor;

/// Result type for feature-binding operations
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Feature-binding errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeatureError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} already in progress")]
    AlreadyRunning(String),

    #[error(transparent)]
    Service(#[from] crate::services::ServiceError),
}

/// Where an applied score came from.
///
/// A service outage never leaves a process hanging: the binding substitutes
/// a locally generated score, but the substitution stays visible downstream
/// through this marker instead of masquerading as a real result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrigin {
    /// Scored by the verification service
    Service,

    /// Locally generated after a service failure
    SimulatedFallback,
}

impl fmt::Display for ScoreOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Service => "service",
            Self::SimulatedFallback => "simulated fallback",
        };
        write!(f, "{label}")
    }
}
