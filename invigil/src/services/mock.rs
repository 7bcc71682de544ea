//! Random-outcome implementation of the service boundary

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::store::KvStore;
use super::{
    BiometricFactor, BiometricOutcome, DeviceFinding, DeviceSweep, MonitoringSession, Result,
    RiskAssessment, RiskLevel, ServiceError, SessionStatus, VerificationService,
};

/// Device types a sweep can surface
const DEVICE_TYPES: [&str; 5] = [
    "Smartphone",
    "Smartwatch",
    "Bluetooth earpiece",
    "Programmable calculator",
    "Hidden camera",
];

/// Simulated verification backend
///
/// Outcomes are random draws persisted to the in-memory store. A
/// configurable outage rate makes calls fail with
/// [`ServiceError::Unavailable`] so the bindings' fallback path is
/// exercised; set it to zero for deterministic availability.
pub struct MockVerificationService {
    store: Arc<KvStore>,
    outage_rate: f64,
    latency: Duration,
}

impl MockVerificationService {
    /// Create a service persisting into `store`
    pub fn new(store: Arc<KvStore>) -> Self {
        Self {
            store,
            outage_rate: 0.0,
            latency: Duration::from_millis(25),
        }
    }

    /// Probability in [0, 1] that any call fails with a simulated outage
    pub fn with_outage_rate(mut self, outage_rate: f64) -> Self {
        self.outage_rate = outage_rate.clamp(0.0, 1.0);
        self
    }

    /// Simulated network latency applied to every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_round_trip(&self) -> Result<()> {
        tokio::time::sleep(self.latency).await;
        let outage = self.outage_rate > 0.0 && rand::rng().random_bool(self.outage_rate);
        if outage {
            debug!("simulated service outage");
            return Err(ServiceError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl VerificationService for MockVerificationService {
    async fn verify_biometric(
        &self,
        factor: BiometricFactor,
        capture_ref: &str,
    ) -> Result<BiometricOutcome> {
        self.simulate_round_trip().await?;

        let outcome = BiometricOutcome {
            verification_id: Uuid::new_v4(),
            factor,
            confidence: rand::rng().random_range(0.70..1.00),
            recorded_at: Utc::now(),
        };

        self.store.set(
            format!("biometric:{}", outcome.verification_id),
            json!({
                "id": outcome.verification_id,
                "factor": factor.to_string(),
                "captureRef": capture_ref,
                "confidence": outcome.confidence,
                "timestamp": outcome.recorded_at.to_rfc3339(),
            }),
        );

        Ok(outcome)
    }

    async fn assess_fraud(&self, subject: &str) -> Result<RiskAssessment> {
        self.simulate_round_trip().await?;

        let risk_score: f64 = rand::rng().random_range(0.0..1.0);
        let level = RiskLevel::from_score(risk_score);

        let mut findings = Vec::new();
        if level == RiskLevel::High {
            findings.push(String::from("Multiple faces detected"));
            findings.push(String::from("Suspicious behavior patterns"));
        }
        if level != RiskLevel::Low {
            findings.push(String::from("Inconsistent lighting patterns"));
        }
        findings.push(String::from("Standard verification completed"));

        let assessment = RiskAssessment {
            detection_id: Uuid::new_v4(),
            subject: subject.to_string(),
            risk_score,
            level,
            findings,
            recorded_at: Utc::now(),
        };

        self.store.set(
            format!("fraud:{}", assessment.detection_id),
            serde_json::to_value(&assessment).unwrap_or_default(),
        );

        Ok(assessment)
    }

    async fn open_monitoring_session(
        &self,
        exam_id: &str,
        hall_id: &str,
        planned_minutes: u32,
    ) -> Result<MonitoringSession> {
        self.simulate_round_trip().await?;

        let session = MonitoringSession {
            session_id: Uuid::new_v4(),
            exam_id: exam_id.to_string(),
            hall_id: hall_id.to_string(),
            planned_minutes,
            status: SessionStatus::Active,
            started_at: Utc::now(),
        };

        self.store.set(
            format!("exam_session:{}", session.session_id),
            serde_json::to_value(&session).unwrap_or_default(),
        );

        Ok(session)
    }

    async fn sweep_devices(&self, session_id: Uuid) -> Result<DeviceSweep> {
        self.simulate_round_trip().await?;

        let key = format!("exam_session:{session_id}");
        let mut record = self
            .store
            .get(&key)
            .ok_or_else(|| ServiceError::SessionNotFound(session_id.to_string()))?;

        let mut rng = rand::rng();
        let count = rng.random_range(0..=3);
        let swept_at = Utc::now();
        let devices: Vec<DeviceFinding> = (0..count)
            .map(|_| {
                let device = DEVICE_TYPES[rng.random_range(0..DEVICE_TYPES.len())];
                let roll: f64 = rng.random_range(0.0..1.0);
                DeviceFinding {
                    device: device.to_string(),
                    risk: if roll > 0.8 {
                        RiskLevel::High
                    } else if roll > 0.5 {
                        RiskLevel::Medium
                    } else {
                        RiskLevel::Low
                    },
                    detected_at: swept_at,
                }
            })
            .collect();

        if let Some(object) = record.as_object_mut() {
            let sweeps = object
                .entry("device_findings")
                .or_insert_with(|| json!([]));
            if let Some(list) = sweeps.as_array_mut() {
                for finding in &devices {
                    list.push(serde_json::to_value(finding).unwrap_or_default());
                }
            }
            self.store.set(key, record);
        }

        Ok(DeviceSweep {
            session_id,
            devices,
            swept_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> MockVerificationService {
        MockVerificationService::new(Arc::new(KvStore::new()))
            .with_latency(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_verify_biometric_persists_record() {
        let store = Arc::new(KvStore::new());
        let service = MockVerificationService::new(Arc::clone(&store))
            .with_latency(Duration::from_millis(1));

        let outcome = service
            .verify_biometric(BiometricFactor::Face, "capture-1")
            .await
            .expect("service is available");

        assert!((0.70..1.00).contains(&outcome.confidence));
        assert_eq!(store.get_by_prefix("biometric:").len(), 1);
    }

    #[tokio::test]
    async fn test_outage_rate_of_one_always_fails() {
        let service = service().with_outage_rate(1.0);
        let result = service.assess_fraud("FULL_SCAN").await;
        assert_eq!(result.unwrap_err(), ServiceError::Unavailable);
    }

    #[tokio::test]
    async fn test_fraud_findings_match_level() {
        let service = service();
        let assessment = service.assess_fraud("FULL_SCAN").await.unwrap();

        assert_eq!(assessment.level, RiskLevel::from_score(assessment.risk_score));
        assert_eq!(
            assessment.findings.last().map(String::as_str),
            Some("Standard verification completed")
        );
        if assessment.level == RiskLevel::High {
            assert!(assessment
                .findings
                .iter()
                .any(|finding| finding == "Multiple faces detected"));
        }
    }

    #[tokio::test]
    async fn test_sweep_requires_live_session() {
        let service = service();
        let missing = service.sweep_devices(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(ServiceError::SessionNotFound(_))));

        let session = service
            .open_monitoring_session("EXAM-9", "HALL-A1", 120)
            .await
            .unwrap();
        let sweep = service.sweep_devices(session.session_id).await.unwrap();
        assert_eq!(sweep.session_id, session.session_id);
        assert!(sweep.devices.len() <= 3);
    }
}
