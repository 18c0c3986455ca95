//! Demodulated field measurements and scan point results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scan::Position2D;

/// One demodulated probe sample: in-phase and quadrature voltages for the
/// three probe axes, with its acquisition timestamp and an uncertainty
/// estimate in volts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageMeasurement {
    /// X axis, in-phase component (V).
    pub ux_i: f64,
    /// X axis, quadrature component (V).
    pub ux_q: f64,
    /// Y axis, in-phase component (V).
    pub uy_i: f64,
    /// Y axis, quadrature component (V).
    pub uy_q: f64,
    /// Z axis, in-phase component (V).
    pub uz_i: f64,
    /// Z axis, quadrature component (V).
    pub uz_q: f64,
    /// Acquisition timestamp.
    pub timestamp: DateTime<Utc>,
    /// Uncertainty estimate (V).
    pub uncertainty: f64,
}

impl VoltageMeasurement {
    /// A measurement with all six components set to `value`, stamped now.
    pub fn uniform(value: f64) -> Self {
        Self {
            ux_i: value,
            ux_q: value,
            uy_i: value,
            uy_q: value,
            uz_i: value,
            uz_q: value,
            timestamp: Utc::now(),
            uncertainty: 0.0,
        }
    }

    /// Arithmetic mean of a batch of samples.
    ///
    /// The six voltage components are averaged independently; the timestamp of
    /// the last sample is preserved and uncertainties are summed, which
    /// over-estimates the combined uncertainty rather than understating it.
    /// Returns `None` for an empty batch.
    pub fn average(samples: &[VoltageMeasurement]) -> Option<VoltageMeasurement> {
        let last = samples.last()?;
        let n = samples.len() as f64;
        let sum = |f: fn(&VoltageMeasurement) -> f64| samples.iter().map(f).sum::<f64>();
        Some(VoltageMeasurement {
            ux_i: sum(|m| m.ux_i) / n,
            ux_q: sum(|m| m.ux_q) / n,
            uy_i: sum(|m| m.uy_i) / n,
            uy_q: sum(|m| m.uy_q) / n,
            uz_i: sum(|m| m.uz_i) / n,
            uz_q: sum(|m| m.uz_q) / n,
            timestamp: last.timestamp,
            uncertainty: sum(|m| m.uncertainty),
        })
    }
}

/// One recorded point of a scan: where the probe was (or was predicted to
/// be), what it measured, and its position in the acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanPointResult {
    /// Stage position of the sample. For fly scans this is a prediction from
    /// the motion profile, not a readback.
    pub position: Position2D,
    /// The (possibly averaged) measurement at that position.
    pub measurement: VoltageMeasurement,
    /// Trajectory index (step scan) or arrival order (fly scan).
    pub point_index: usize,
}
