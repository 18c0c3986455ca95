//! Step-scan executor: move, wait, stabilize, average, record.

use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::error::{AppResult, ScanError};
use crate::events::InMemoryEventBus;
use crate::execution::{
    await_motion, hold_at_safe_point, publish_outbox, subscribe_motion_events, unsubscribe_all,
    MotionWait, MotionWaitResult, SafePoint,
};
use crate::hardware::{AcquisitionPort, MotionPort};
use crate::motion::MotionProfile;
use crate::scan::{
    Position2D, ScanPointResult, ScanStatus, ScanTrajectory, SharedScan, StepScanConfig,
    VoltageMeasurement,
};
use crate::settings::EngineSettings;

/// Executor for the stop-measure-move strategy.
///
/// For every trajectory point the executor issues a move, blocks on the
/// motion-done signal (set by the `motioncompleted`/`motionfailed` handlers),
/// lets the probe stabilize, averages the configured number of samples and
/// records the result on the aggregate. Cancellation is observed at every
/// safe point: before the move, while waiting, after stabilization and
/// between samples. A pause during a move is acknowledged after arrival —
/// mid-motion is never a safe point.
pub struct StepScanExecutor {
    motion_port: Arc<dyn MotionPort>,
    acquisition_port: Arc<dyn AcquisitionPort>,
    bus: Arc<InMemoryEventBus>,
    settings: EngineSettings,
}

impl StepScanExecutor {
    /// Create an executor over the given ports and bus.
    pub fn new(
        motion_port: Arc<dyn MotionPort>,
        acquisition_port: Arc<dyn AcquisitionPort>,
        bus: Arc<InMemoryEventBus>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            motion_port,
            acquisition_port,
            bus,
            settings,
        }
    }

    /// Drive `scan` over `trajectory`.
    ///
    /// Returns `true` when the scan completed, `false` when it was cancelled
    /// or failed. All error kinds are converted into a terminal scan state
    /// plus the corresponding event before returning.
    pub async fn execute(
        &self,
        scan: SharedScan,
        trajectory: &ScanTrajectory,
        config: &StepScanConfig,
    ) -> bool {
        let wait = Arc::new(MotionWait::new());
        let subscriptions = subscribe_motion_events(&self.bus, &wait, &scan);
        let outcome = self.run(&scan, trajectory, config, &wait).await;
        unsubscribe_all(&self.bus, subscriptions);

        if wait.emergency_seen() {
            warn!("step scan aborted by emergency stop");
        }

        let completed = match outcome {
            Ok(completed) => completed,
            Err(err) => {
                error!("step scan failed: {err}");
                let mut scan = scan.lock();
                if !scan.status().is_terminal() {
                    let _ = scan.fail(err.to_string());
                }
                false
            }
        };
        // Final drain: every terminal event queued above reaches the bus.
        publish_outbox(&self.bus, &scan);
        completed
    }

    async fn run(
        &self,
        scan: &SharedScan,
        trajectory: &ScanTrajectory,
        config: &StepScanConfig,
        wait: &MotionWait,
    ) -> AppResult<bool> {
        scan.lock().start()?;
        publish_outbox(&self.bus, scan);
        info!(points = trajectory.len(), "step scan running");

        let pause_poll = self.settings.pause_poll();
        for (index, position) in trajectory.iter().enumerate() {
            if hold_at_safe_point(&self.bus, scan, pause_poll).await == SafePoint::Abort {
                return Ok(false);
            }

            if let Some(speed) = config.motion_speed_mm_s {
                self.hint_move_speed(speed, position).await?;
            }

            let motion_id = self
                .motion_port
                .move_to(*position)
                .await
                .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()))?;
            let arrived = await_motion(
                &self.motion_port,
                scan,
                wait,
                &motion_id,
                self.settings.motion_wait_timeout(),
            )
            .await?;
            if arrived == MotionWaitResult::Aborted {
                return Ok(false);
            }

            // Pause requested during the move takes effect here, after arrival.
            if hold_at_safe_point(&self.bus, scan, pause_poll).await == SafePoint::Abort {
                return Ok(false);
            }

            if config.stabilization_delay_ms > 0 {
                sleep(Duration::from_millis(config.stabilization_delay_ms)).await;
                if hold_at_safe_point(&self.bus, scan, pause_poll).await == SafePoint::Abort {
                    return Ok(false);
                }
            }

            let mut samples = Vec::with_capacity(config.averaging_per_position);
            for _ in 0..config.averaging_per_position {
                if scan.lock().status() == ScanStatus::Cancelled {
                    return Ok(false);
                }
                let sample = self
                    .acquisition_port
                    .acquire_sample()
                    .await
                    .map_err(|e| ScanError::AcquisitionFailed(e.to_string()))?;
                samples.push(sample);
            }
            let averaged = VoltageMeasurement::average(&samples)
                .ok_or_else(|| ScanError::AcquisitionFailed("no samples acquired".to_string()))?;

            if scan.lock().status() == ScanStatus::Cancelled {
                return Ok(false);
            }
            scan.lock().add_point(ScanPointResult {
                position: *position,
                measurement: averaged,
                point_index: index,
            })?;
            publish_outbox(&self.bus, scan);
        }

        // The aggregate auto-completes on the last point; this covers a
        // trajectory/expected-points mismatch.
        {
            let mut scan = scan.lock();
            if scan.status() != ScanStatus::Completed {
                scan.complete()?;
            }
        }
        publish_outbox(&self.bus, scan);
        Ok(true)
    }

    /// Pass the configured inter-point speed to the hardware as a flat
    /// profile hint for the upcoming move.
    async fn hint_move_speed(&self, speed: f64, target: &Position2D) -> AppResult<()> {
        let profile = MotionProfile::constant(speed)?;
        let from = self
            .motion_port
            .current_position()
            .await
            .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()))?;
        let estimated = profile.estimated_duration(from.distance_to(target));
        if let Err(err) = self.motion_port.set_motion_profile(&profile, estimated).await {
            warn!("motion profile hint rejected: {err}");
        }
        Ok(())
    }
}
