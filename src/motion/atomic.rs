//! Atomic motion: a single straight-line displacement with a velocity profile.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::motion::MotionProfile;
use crate::scan::Position2D;

/// Distance below which a displacement is treated as no motion at all.
const ZERO_MOTION_MM: f64 = 1e-9;

/// Tolerance for the exact-endpoint append in
/// [`AtomicMotion::acquisition_positions`], in mm.
const ENDPOINT_TOLERANCE_MM: f64 = 1e-6;

/// Execution state of an atomic motion segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    /// Not yet issued to the hardware.
    Pending,
    /// Issued and underway.
    Executing,
    /// Reached its endpoint.
    Completed,
    /// Aborted on a hardware error.
    Failed,
}

/// One relative straight-line segment `(dx, dy)` executed with a motion
/// profile.
///
/// Fly scans decompose their trajectory into a chain of atomic motions and
/// use each segment's velocity integral to predict where the probe will be
/// when each streamed sample is taken. The predictions are exactly that —
/// predictions from the profile, not position readbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicMotion {
    id: Uuid,
    dx: f64,
    dy: f64,
    profile: MotionProfile,
    state: MotionState,
}

impl AtomicMotion {
    /// Create a pending segment displacing by `(dx, dy)` mm.
    pub fn new(dx: f64, dy: f64, profile: MotionProfile) -> Self {
        Self {
            id: Uuid::new_v4(),
            dx,
            dy,
            profile,
            state: MotionState::Pending,
        }
    }

    /// The segment connecting two absolute positions.
    pub fn between(from: &Position2D, to: &Position2D, profile: MotionProfile) -> Self {
        Self::new(to.x - from.x, to.y - from.y, profile)
    }

    /// Segment identity.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// X displacement in mm.
    pub fn dx(&self) -> f64 {
        self.dx
    }

    /// Y displacement in mm.
    pub fn dy(&self) -> f64 {
        self.dy
    }

    /// The profile the segment is executed with.
    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    /// Current execution state.
    pub fn state(&self) -> MotionState {
        self.state
    }

    /// Mark the segment as issued to the hardware.
    pub fn mark_executing(&mut self) {
        self.state = MotionState::Executing;
    }

    /// Mark the segment as arrived.
    pub fn mark_completed(&mut self) {
        self.state = MotionState::Completed;
    }

    /// Mark the segment as aborted.
    pub fn mark_failed(&mut self) {
        self.state = MotionState::Failed;
    }

    /// Segment length in mm.
    pub fn distance(&self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// Estimated time to traverse the segment, in seconds.
    pub fn estimated_duration_seconds(&self) -> f64 {
        self.profile.estimated_duration(self.distance())
    }

    /// Stage speed `t` seconds after the segment starts, in mm/s.
    ///
    /// Piecewise over the trapezoid (ramp up, cruise, ramp down), constant at
    /// the mean speed for short triangular segments, and zero before the
    /// start and after the end of the motion.
    pub fn velocity_at_time(&self, t: f64) -> f64 {
        let distance = self.distance();
        if distance < ZERO_MOTION_MM {
            return 0.0;
        }
        let duration = self.estimated_duration_seconds();
        if t < 0.0 || t > duration {
            return 0.0;
        }

        if self.profile.is_trapezoidal(distance) {
            let t_acc = self.profile.accel_time();
            let t_dec = self.profile.decel_time();
            let t_cruise = duration - t_acc - t_dec;
            if t < t_acc {
                self.profile.min_speed + self.profile.acceleration * t
            } else if t < t_acc + t_cruise {
                self.profile.target_speed
            } else {
                let into_decel = t - t_acc - t_cruise;
                (self.profile.target_speed - self.profile.deceleration * into_decel).max(0.0)
            }
        } else {
            // Triangular fallback: the duration estimate assumes the mean of
            // min and target speed over the whole segment.
            (self.profile.min_speed + self.profile.target_speed) / 2.0
        }
    }

    /// Predicted sample positions along the segment at `rate_hz`.
    ///
    /// Integrates the velocity numerically at `dt = 1/rate_hz` from the
    /// segment start, emitting one position per sample instant until the
    /// accumulated distance reaches the segment length. The exact endpoint is
    /// always included; a time guard keeps floating-point drift from looping
    /// past the profile end.
    pub fn acquisition_positions(&self, start: &Position2D, rate_hz: f64) -> Vec<Position2D> {
        if rate_hz <= 0.0 {
            return Vec::new();
        }
        let distance = self.distance();
        if distance < ZERO_MOTION_MM {
            return vec![*start];
        }

        let (unit_x, unit_y) = (self.dx / distance, self.dy / distance);
        let dt = 1.0 / rate_hz;
        let duration = self.estimated_duration_seconds();

        let mut positions = Vec::new();
        let mut travelled = 0.0;
        let mut t = 0.0;
        while travelled < distance {
            positions.push(start.offset(unit_x * travelled, unit_y * travelled));
            travelled += self.velocity_at_time(t) * dt;
            t += dt;
            if t > duration + dt {
                break;
            }
        }

        let end = start.offset(self.dx, self.dy);
        let endpoint_missing = positions
            .last()
            .map_or(true, |last| last.distance_to(&end) > ENDPOINT_TOLERANCE_MM);
        if endpoint_missing {
            positions.push(end);
        }
        positions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> MotionProfile {
        MotionProfile {
            min_speed: 1.0,
            target_speed: 10.0,
            acceleration: 5.0,
            deceleration: 5.0,
        }
    }

    #[test]
    fn velocity_during_acceleration_phase() {
        let motion = AtomicMotion::new(50.0, 0.0, profile());
        assert!((motion.velocity_at_time(0.0) - 1.0).abs() < 1e-9);
        // v = min + a*t = 1 + 5*1 = 6 mm/s
        assert!((motion.velocity_at_time(1.0) - 6.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_during_cruise_phase() {
        let motion = AtomicMotion::new(100.0, 0.0, profile());
        // Ramp-up ends at t_acc = 1.8s; 3s is well inside the cruise.
        assert!((motion.velocity_at_time(3.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_during_deceleration_phase() {
        let motion = AtomicMotion::new(100.0, 0.0, profile());
        let duration = motion.estimated_duration_seconds();
        let v = motion.velocity_at_time(duration - 0.5);
        assert!(v > 0.0 && v < 10.0);
    }

    #[test]
    fn velocity_is_zero_outside_the_motion() {
        let motion = AtomicMotion::new(10.0, 0.0, profile());
        assert_eq!(motion.velocity_at_time(-1.0), 0.0);
        let after = motion.estimated_duration_seconds() + 10.0;
        assert_eq!(motion.velocity_at_time(after), 0.0);
    }

    #[test]
    fn straight_x_positions_are_monotonic_and_reach_the_end() {
        let motion = AtomicMotion::new(10.0, 0.0, profile());
        let start = Position2D::new(0.0, 0.0);
        let positions = motion.acquisition_positions(&start, 10.0);

        assert!(positions.len() > 5);
        assert!((positions[0].x - 0.0).abs() < 1e-9);
        let last = positions.last().unwrap();
        assert!((last.x - 10.0).abs() < 1e-6);
        assert!((last.y - 0.0).abs() < 1e-9);
        for pair in positions.windows(2) {
            assert!(pair[1].x >= pair[0].x);
        }
    }

    #[test]
    fn diagonal_positions_advance_on_both_axes() {
        let motion = AtomicMotion::new(10.0, 10.0, profile());
        let start = Position2D::new(5.0, 5.0);
        let positions = motion.acquisition_positions(&start, 20.0);

        assert!(positions.len() > 10);
        let last = positions.last().unwrap();
        assert!((last.x - 15.0).abs() < 1e-6);
        assert!((last.y - 15.0).abs() < 1e-6);
        for pair in positions.windows(2) {
            assert!(pair[1].x >= pair[0].x);
            assert!(pair[1].y >= pair[0].y);
        }
    }

    #[test]
    fn sample_rate_scales_position_count() {
        let motion = AtomicMotion::new(10.0, 0.0, profile());
        let start = Position2D::new(0.0, 0.0);
        let coarse = motion.acquisition_positions(&start, 1.0);
        let fine = motion.acquisition_positions(&start, 100.0);
        assert!(coarse.len() > 1);
        assert!(coarse.len() < 10);
        assert!(fine.len() > 50);
    }

    #[test]
    fn zero_rate_yields_no_positions() {
        let motion = AtomicMotion::new(10.0, 0.0, profile());
        assert!(motion
            .acquisition_positions(&Position2D::new(0.0, 0.0), 0.0)
            .is_empty());
    }

    #[test]
    fn zero_motion_yields_only_the_start() {
        let motion = AtomicMotion::new(0.0, 0.0, profile());
        let start = Position2D::new(5.0, 10.0);
        let positions = motion.acquisition_positions(&start, 100.0);
        assert_eq!(positions, vec![start]);
    }

    #[test]
    fn constant_speed_spacing_matches_rate() {
        let flat = MotionProfile {
            min_speed: 5.0,
            target_speed: 5.0,
            acceleration: 10.0,
            deceleration: 10.0,
        };
        let motion = AtomicMotion::new(50.0, 0.0, flat);
        let positions = motion.acquisition_positions(&Position2D::new(0.0, 0.0), 10.0);
        // 5mm/s at 10Hz: 0.5mm between consecutive samples.
        for pair in positions.windows(2).take(5) {
            let dx = pair[1].x - pair[0].x;
            assert!(dx > 0.0 && dx < 2.0);
        }
    }

    #[test]
    fn endpoint_distance_property_holds_for_assorted_profiles() {
        let cases = [
            (0.3, 0.0, profile()),
            (12.0, -7.0, profile()),
            (
                2.0,
                2.0,
                MotionProfile {
                    min_speed: 0.5,
                    target_speed: 2.0,
                    acceleration: 1.0,
                    deceleration: 3.0,
                },
            ),
        ];
        for (dx, dy, p) in cases {
            let motion = AtomicMotion::new(dx, dy, p);
            let start = Position2D::new(1.0, -1.0);
            let positions = motion.acquisition_positions(&start, 37.0);
            let end = start.offset(dx, dy);
            let closest = positions
                .iter()
                .map(|p| p.distance_to(&end))
                .fold(f64::INFINITY, f64::min);
            assert!(closest <= 1e-6, "endpoint missing for ({dx}, {dy})");
        }
    }

    #[test]
    fn state_transitions() {
        let mut motion = AtomicMotion::new(1.0, 0.0, profile());
        assert_eq!(motion.state(), MotionState::Pending);
        motion.mark_executing();
        assert_eq!(motion.state(), MotionState::Executing);
        motion.mark_completed();
        assert_eq!(motion.state(), MotionState::Completed);
    }
}
