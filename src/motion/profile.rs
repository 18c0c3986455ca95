//! Trapezoidal velocity profile for stage motion.

use serde::{Deserialize, Serialize};

use crate::error::{AppResult, ScanError};
use crate::validation::require_positive;

/// Velocity profile of a stage move: ramp from `min_speed` to `target_speed`
/// at `acceleration`, cruise, ramp back down at `deceleration`.
///
/// All values are strictly positive, with `min_speed <= target_speed`.
/// Speeds are in mm/s, accelerations in mm/s².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionProfile {
    /// Speed at the start and end of a segment, in mm/s.
    pub min_speed: f64,
    /// Cruise speed, in mm/s.
    pub target_speed: f64,
    /// Ramp-up rate, in mm/s².
    pub acceleration: f64,
    /// Ramp-down rate, in mm/s².
    pub deceleration: f64,
}

impl MotionProfile {
    /// Create a profile, validating its invariants.
    pub fn new(
        min_speed: f64,
        target_speed: f64,
        acceleration: f64,
        deceleration: f64,
    ) -> AppResult<Self> {
        let profile = Self {
            min_speed,
            target_speed,
            acceleration,
            deceleration,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// A degenerate flat profile cruising at `speed` from start to end.
    pub fn constant(speed: f64) -> AppResult<Self> {
        Self::new(speed, speed, speed.max(1.0), speed.max(1.0))
    }

    /// Validate positivity and speed ordering.
    pub fn validate(&self) -> AppResult<()> {
        require_positive("min_speed", self.min_speed)?;
        require_positive("target_speed", self.target_speed)?;
        require_positive("acceleration", self.acceleration)?;
        require_positive("deceleration", self.deceleration)?;
        if self.min_speed > self.target_speed {
            return Err(ScanError::ConfigInvalid(format!(
                "min_speed ({}) must not exceed target_speed ({})",
                self.min_speed, self.target_speed
            )));
        }
        Ok(())
    }

    /// Time to ramp from `min_speed` to `target_speed`, in seconds.
    pub(crate) fn accel_time(&self) -> f64 {
        (self.target_speed - self.min_speed) / self.acceleration
    }

    /// Distance covered during the ramp-up, in mm.
    pub(crate) fn accel_distance(&self) -> f64 {
        let t = self.accel_time();
        self.min_speed * t + 0.5 * self.acceleration * t * t
    }

    /// Time to ramp from `target_speed` back to `min_speed`, in seconds.
    pub(crate) fn decel_time(&self) -> f64 {
        (self.target_speed - self.min_speed) / self.deceleration
    }

    /// Distance covered during the ramp-down, in mm.
    pub(crate) fn decel_distance(&self) -> f64 {
        let t = self.decel_time();
        self.target_speed * t - 0.5 * self.deceleration * t * t
    }

    /// Whether a segment of `distance` mm fits the full trapezoid (ramp up,
    /// cruise, ramp down) as opposed to the short triangular fallback.
    pub(crate) fn is_trapezoidal(&self, distance: f64) -> bool {
        distance >= self.accel_distance() + self.decel_distance()
    }

    /// Estimated time to cover `distance` mm with this profile, in seconds.
    ///
    /// Segments long enough for a full trapezoid ramp up, cruise and ramp
    /// down; shorter segments fall back to a triangular estimate at the mean
    /// of `min_speed` and `target_speed`.
    pub fn estimated_duration(&self, distance: f64) -> f64 {
        if distance <= 0.0 {
            return 0.0;
        }
        if self.is_trapezoidal(distance) {
            let cruise = (distance - self.accel_distance() - self.decel_distance())
                / self.target_speed;
            self.accel_time() + cruise + self.decel_time()
        } else {
            distance / ((self.min_speed + self.target_speed) / 2.0)
        }
    }
}
