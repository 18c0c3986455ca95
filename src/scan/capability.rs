//! Empirical characterization of the acquisition chain's sustainable rate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::hardware::AcquisitionPort;

/// Measured acquisition-rate capability of the ADC chain.
///
/// Fly-scan pre-flight validation compares the configured demands against
/// this measurement: the `guaranteed_rate_3sigma` lower bound must cover the
/// rate required by the spatial-gap constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionRateCapability {
    /// Mean sustained rate over the measurement window, in Hz.
    pub mean_rate_hz: f64,
    /// Standard deviation of the instantaneous rate, in Hz.
    pub std_dev_hz: f64,
    /// Duration of the measurement window, in seconds.
    pub duration_s: f64,
    /// Number of samples observed during the window.
    pub sample_count: usize,
    /// When the measurement was taken.
    pub timestamp: DateTime<Utc>,
}

impl AcquisitionRateCapability {
    /// Build a capability from already-known statistics, stamped now.
    pub fn new(mean_rate_hz: f64, std_dev_hz: f64, duration_s: f64, sample_count: usize) -> Self {
        Self {
            mean_rate_hz,
            std_dev_hz,
            duration_s,
            sample_count,
            timestamp: Utc::now(),
        }
    }

    /// Rate the chain sustains with three-sigma confidence, in Hz.
    pub fn guaranteed_rate_3sigma(&self) -> f64 {
        self.mean_rate_hz - 3.0 * self.std_dev_hz
    }

    /// Relative rate jitter (`std_dev / mean`); zero for a zero mean.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean_rate_hz > 0.0 {
            self.std_dev_hz / self.mean_rate_hz
        } else {
            0.0
        }
    }

    /// Characterize an acquisition port by sampling it for `duration`.
    ///
    /// The mean rate is the observed sample count over the window; the
    /// standard deviation is computed from the instantaneous rates between
    /// consecutive samples.
    pub async fn measure(
        port: &dyn AcquisitionPort,
        duration: Duration,
    ) -> anyhow::Result<AcquisitionRateCapability> {
        let started = tokio::time::Instant::now();
        let mut last = started;
        let mut instantaneous_rates = Vec::new();
        let mut sample_count = 0usize;

        while started.elapsed() < duration {
            port.acquire_sample().await?;
            sample_count += 1;
            let now = tokio::time::Instant::now();
            let dt = (now - last).as_secs_f64();
            if dt > 0.0 {
                instantaneous_rates.push(1.0 / dt);
            }
            last = now;
        }

        let elapsed = started.elapsed().as_secs_f64();
        let mean_rate_hz = if elapsed > 0.0 {
            sample_count as f64 / elapsed
        } else {
            0.0
        };
        let std_dev_hz = std_dev(&instantaneous_rates);

        Ok(AcquisitionRateCapability::new(
            mean_rate_hz,
            std_dev_hz,
            elapsed,
            sample_count,
        ))
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_sigma_lower_bound() {
        let capability = AcquisitionRateCapability::new(100.0, 5.0, 1.0, 100);
        assert!((capability.guaranteed_rate_3sigma() - 85.0).abs() < 1e-12);
    }

    #[test]
    fn coefficient_of_variation() {
        let capability = AcquisitionRateCapability::new(50.0, 5.0, 1.0, 50);
        assert!((capability.coefficient_of_variation() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn std_dev_of_constant_series_is_zero() {
        assert_eq!(std_dev(&[10.0, 10.0, 10.0]), 0.0);
        assert_eq!(std_dev(&[10.0]), 0.0);
    }
}
