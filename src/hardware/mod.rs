//! Hardware port contracts consumed by the executors and the motion control
//! service.
//!
//! The core never talks to stage or ADC drivers directly: it is written
//! against the two traits below, and adapters (real hardware or the
//! simulated implementations in [`mock`]) fill them in. Implementations must
//! be internally synchronized — ports are shared between the scan executors
//! and the motion control service.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::motion::MotionProfile;
use crate::scan::{Position2D, VoltageMeasurement};

pub mod mock;

/// Stage axis selector for homing and reference operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// X axis only.
    X,
    /// Y axis only.
    Y,
    /// Both axes.
    Both,
}

/// Capability: XY stage motion.
///
/// # Contract
/// - `move_to` is non-blocking: it returns a unique correlation id once the
///   move is underway. The implementation publishes `motionstarted`
///   immediately and later exactly one of `motioncompleted` or
///   `motionfailed` carrying the same id, on its own task.
/// - `stop` performs a decelerated stop and publishes `motionstopped`;
///   `emergency_stop` halts immediately and publishes
///   `emergencystoptriggered`.
/// - `home` is synchronous: it returns once the axis reached its origin.
#[async_trait]
pub trait MotionPort: Send + Sync {
    /// Start moving to an absolute target; returns the motion correlation id.
    async fn move_to(&self, target: Position2D) -> Result<String>;

    /// Current stage position (may be approximate during motion).
    async fn current_position(&self) -> Result<Position2D>;

    /// Whether the stage is currently in motion.
    async fn is_moving(&self) -> Result<bool>;

    /// Decelerated stop of any motion in progress.
    async fn stop(&self) -> Result<()>;

    /// Immediate halt of all motion.
    async fn emergency_stop(&self) -> Result<()>;

    /// Home the selected axis (or both) and wait for completion.
    async fn home(&self, axis: Axis) -> Result<()>;

    /// Redefine the current coordinate of the selected axis to `value` mm.
    async fn set_reference(&self, axis: Axis, value: f64) -> Result<()>;

    /// Hint the upcoming move's profile and estimated duration to the
    /// hardware, so simulators and predictive adapters can match timings.
    ///
    /// The default implementation ignores the hint.
    async fn set_motion_profile(
        &self,
        profile: &MotionProfile,
        estimated_duration_s: f64,
    ) -> Result<()> {
        let _ = (profile, estimated_duration_s);
        Ok(())
    }

    /// Upper travel limits `(max_x, max_y)` of the stage, in mm.
    async fn axis_limits(&self) -> Result<(f64, f64)>;
}

/// Capability: demodulated I/Q sample acquisition.
///
/// # Contract
/// - `acquire_sample` performs one discrete, blocking measurement.
/// - For streaming use, `configure_rate` then `start_streaming`; samples
///   accumulate in an internal queue and are fetched in acquisition order
///   with `drain_samples`. Timestamps are monotonic with acquisition.
#[async_trait]
pub trait AcquisitionPort: Send + Sync {
    /// Acquire one demodulated sample, blocking for one sample period.
    async fn acquire_sample(&self) -> Result<VoltageMeasurement>;

    /// Configure the streaming sample rate, in Hz.
    async fn configure_rate(&self, rate_hz: f64) -> Result<()>;

    /// Begin streaming samples into the internal queue.
    async fn start_streaming(&self) -> Result<()>;

    /// Stop streaming.
    async fn stop_streaming(&self) -> Result<()>;

    /// Remove and return all samples accumulated since the last drain.
    async fn drain_samples(&self) -> Result<Vec<VoltageMeasurement>>;
}
