//! Configuration for timings, thresholds, and simulation behavior

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvigilConfig {
    pub timings: TimingConfig,
    pub thresholds: ThresholdConfig,
    pub simulation: SimulationConfig,
}

/// Delays driving the simulated asynchronous work
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Capture window before a biometric factor is scored
    pub capture_window_ms: u64,

    /// Simulated evidence-upload duration
    pub upload_delay_ms: u64,

    /// Interval between fraud-scan progress steps
    pub scan_step_delay_ms: u64,

    /// Interval between monitoring device sweeps
    pub sweep_interval_ms: u64,

    /// Simulated service round-trip latency
    pub service_latency_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            capture_window_ms: 3000,
            upload_delay_ms: 800,
            scan_step_delay_ms: 400,
            sweep_interval_ms: 5000,
            service_latency_ms: 25,
        }
    }
}

impl TimingConfig {
    pub fn capture_window(&self) -> Duration {
        Duration::from_millis(self.capture_window_ms)
    }

    pub fn upload_delay(&self) -> Duration {
        Duration::from_millis(self.upload_delay_ms)
    }

    pub fn scan_step_delay(&self) -> Duration {
        Duration::from_millis(self.scan_step_delay_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn service_latency(&self) -> Duration {
        Duration::from_millis(self.service_latency_ms)
    }

    /// Divide every delay by `divisor`, flooring at one millisecond.
    /// Used by the demo's fast mode.
    pub fn scaled_down(mut self, divisor: u64) -> Self {
        let divisor = divisor.max(1);
        for delay in [
            &mut self.capture_window_ms,
            &mut self.upload_delay_ms,
            &mut self.scan_step_delay_ms,
            &mut self.sweep_interval_ms,
            &mut self.service_latency_ms,
        ] {
            *delay = (*delay / divisor).max(1);
        }
        self
    }
}

/// Score thresholds for verification outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Minimum percentage for a factor to count as verified
    pub verify_threshold: u8,

    /// Percentage at or above which a factor is auto-approved
    pub auto_approve_threshold: u8,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            verify_threshold: 85,
            auto_approve_threshold: 95,
        }
    }
}

/// Knobs for the simulated service boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Probability in [0, 1] that a service call fails with an outage
    pub outage_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { outage_rate: 0.0 }
    }
}

impl InvigilConfig {
    /// Load configuration from a TOML file
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save configuration to a TOML file
    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InvigilConfig::default();
        assert_eq!(config.timings.capture_window_ms, 3000);
        assert_eq!(config.timings.scan_step_delay_ms, 400);
        assert_eq!(config.thresholds.verify_threshold, 85);
        assert_eq!(config.simulation.outage_rate, 0.0);
    }

    #[test]
    fn test_scaled_down_floors_at_one() {
        let timings = TimingConfig::default().scaled_down(10_000);
        assert_eq!(timings.capture_window_ms, 1);
        assert_eq!(timings.sweep_interval_ms, 1);
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invigil.toml");

        let mut config = InvigilConfig::default();
        config.thresholds.verify_threshold = 90;
        config.save_to_path(&path).unwrap();

        let loaded = InvigilConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.thresholds.verify_threshold, 90);
        assert_eq!(loaded.timings.capture_window_ms, 3000);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "[timings]\ncapture_window_ms = 100\n").unwrap();

        let loaded = InvigilConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.timings.capture_window_ms, 100);
        assert_eq!(loaded.timings.upload_delay_ms, 800);
        assert_eq!(loaded.thresholds.auto_approve_threshold, 95);
    }
}
