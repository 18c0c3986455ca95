//! User-driven motion control with target chaining.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppResult, ScanError};
use crate::events::{DomainEvent, InMemoryEventBus, SubscriptionId};
use crate::hardware::{Axis, MotionPort};
use crate::scan::Position2D;

/// Output port through which motion-control state reaches a presentation
/// collaborator (UI panel, logger). Implementations must not block.
pub trait MotionOutputPort: Send + Sync {
    /// Present a stage position report.
    fn present_position(&self, position: Position2D, is_moving: bool);

    /// Present a failed user-driven motion operation.
    fn present_operation_failed(&self, reason: &str);
}

/// Forward `positionupdated` events from the bus to a motion output port.
///
/// Returns the subscription handle so the caller can detach the monitor.
pub fn monitor_position(
    bus: &InMemoryEventBus,
    output: Arc<dyn MotionOutputPort>,
) -> SubscriptionId {
    bus.subscribe("positionupdated", move |event| {
        if let DomainEvent::PositionUpdated {
            position,
            is_moving,
        } = event
        {
            output.present_position(*position, *is_moving);
        }
    })
}

/// Service behind the manual motion panel: absolute, relative and per-axis
/// moves, homing, stop and emergency stop — all fallible, none panicking
/// across the boundary.
///
/// # Target chaining
///
/// Successive commands compute their displacement from the last *commanded*
/// target rather than from the live stage position, so a burst of relative
/// moves queues up correctly instead of being clobbered by mid-motion
/// position reads. The cached target is invalidated by stop, emergency stop,
/// homing and reference changes, after which the next command reads the
/// physical position again. All targets are clamped to the axis limits.
pub struct MotionControlService {
    motion_port: Arc<dyn MotionPort>,
    output_port: Option<Arc<dyn MotionOutputPort>>,
    last_target: Mutex<Option<Position2D>>,
}

impl MotionControlService {
    /// Create a service driving `motion_port`.
    pub fn new(motion_port: Arc<dyn MotionPort>) -> Self {
        Self {
            motion_port,
            output_port: None,
            last_target: Mutex::new(None),
        }
    }

    /// Attach a presentation sink for operation failures.
    pub fn with_output_port(mut self, output_port: Arc<dyn MotionOutputPort>) -> Self {
        self.output_port = Some(output_port);
        self
    }

    /// Move to an absolute position, clamped to the axis limits.
    pub async fn move_absolute(&self, x: f64, y: f64) -> AppResult<()> {
        self.command_move(|_base| Position2D::new(x, y)).await
    }

    /// Move the X axis to `x`, keeping the chained Y target.
    pub async fn move_absolute_x(&self, x: f64) -> AppResult<()> {
        self.command_move(|base| Position2D::new(x, base.y)).await
    }

    /// Move the Y axis to `y`, keeping the chained X target.
    pub async fn move_absolute_y(&self, y: f64) -> AppResult<()> {
        self.command_move(|base| Position2D::new(base.x, y)).await
    }

    /// Move relative to the last commanded target (or the current position
    /// when no target is cached).
    pub async fn move_relative(&self, dx: f64, dy: f64) -> AppResult<()> {
        self.command_move(|base| base.offset(dx, dy)).await
    }

    /// Home the X axis.
    pub async fn home_x(&self) -> AppResult<()> {
        self.command_home(Axis::X).await
    }

    /// Home the Y axis.
    pub async fn home_y(&self) -> AppResult<()> {
        self.command_home(Axis::Y).await
    }

    /// Home both axes.
    pub async fn home_xy(&self) -> AppResult<()> {
        self.command_home(Axis::Both).await
    }

    /// Decelerated stop; invalidates the chained target.
    pub async fn stop(&self) -> AppResult<()> {
        self.invalidate_target();
        self.run_port_operation(self.motion_port.stop()).await
    }

    /// Immediate halt; invalidates the chained target.
    pub async fn emergency_stop(&self) -> AppResult<()> {
        self.invalidate_target();
        self.run_port_operation(self.motion_port.emergency_stop())
            .await
    }

    /// Redefine the current coordinate of `axis` to `value` mm; invalidates
    /// the chained target.
    pub async fn set_reference(&self, axis: Axis, value: f64) -> AppResult<()> {
        self.invalidate_target();
        self.run_port_operation(self.motion_port.set_reference(axis, value))
            .await
    }

    /// Current stage position.
    pub async fn current_position(&self) -> AppResult<Position2D> {
        self.motion_port
            .current_position()
            .await
            .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()))
    }

    /// Whether the stage is currently moving.
    pub async fn is_moving(&self) -> AppResult<bool> {
        self.motion_port
            .is_moving()
            .await
            .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()))
    }

    /// The target the next relative command will chain from, if cached.
    pub fn chained_target(&self) -> Option<Position2D> {
        *self.last_target.lock()
    }

    async fn command_move<F>(&self, to_target: F) -> AppResult<()>
    where
        F: FnOnce(Position2D) -> Position2D,
    {
        let result = self.try_move(to_target).await;
        if let Err(err) = &result {
            self.present_failure(err);
        }
        result
    }

    async fn try_move<F>(&self, to_target: F) -> AppResult<()>
    where
        F: FnOnce(Position2D) -> Position2D,
    {
        let limits = self
            .motion_port
            .axis_limits()
            .await
            .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()))?;

        // Chain from the last commanded target so queued commands compose;
        // fall back to the physical position when no target is cached.
        let base = match *self.last_target.lock() {
            Some(target) => target,
            None => self
                .motion_port
                .current_position()
                .await
                .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()))?,
        };

        let target = clamp_to_limits(to_target(base), limits);
        self.motion_port
            .move_to(target)
            .await
            .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()))?;
        *self.last_target.lock() = Some(target);
        Ok(())
    }

    async fn command_home(&self, axis: Axis) -> AppResult<()> {
        self.invalidate_target();
        self.run_port_operation(self.motion_port.home(axis)).await
    }

    async fn run_port_operation(
        &self,
        operation: impl std::future::Future<Output = anyhow::Result<()>>,
    ) -> AppResult<()> {
        let result = operation
            .await
            .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()));
        if let Err(err) = &result {
            self.present_failure(err);
        }
        result
    }

    fn invalidate_target(&self) {
        *self.last_target.lock() = None;
    }

    fn present_failure(&self, err: &ScanError) {
        warn!("motion operation failed: {err}");
        if let Some(output) = &self.output_port {
            output.present_operation_failed(&err.to_string());
        }
    }
}

fn clamp_to_limits(target: Position2D, (max_x, max_y): (f64, f64)) -> Position2D {
    Position2D::new(target.x.clamp(0.0, max_x), target.y.clamp(0.0, max_y))
}
