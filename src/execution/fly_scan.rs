//! Fly-scan executor: continuous motion with concurrent sample ingestion.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{AppResult, ScanError};
use crate::events::InMemoryEventBus;
use crate::execution::{
    await_motion, hold_at_safe_point, publish_outbox, subscribe_motion_events, unsubscribe_all,
    MotionWait, MotionWaitResult, SafePoint,
};
use crate::hardware::{AcquisitionPort, MotionPort};
use crate::motion::AtomicMotion;
use crate::scan::{
    AcquisitionRateCapability, FlyScanConfig, Position2D, ScanPointResult, ScanStatus,
    ScanTrajectory, SharedScan, VoltageMeasurement,
};
use crate::settings::EngineSettings;

/// Executor for the continuous-motion strategy.
///
/// The trajectory is decomposed into a chain of [`AtomicMotion`] segments.
/// For each segment the executor precomputes the positions the probe is
/// predicted to occupy at every sample instant (from the velocity integral of
/// the motion profile), starts the move without blocking, and pairs streamed
/// samples with the predictions by arrival order while the stage is in
/// flight. Samples beyond the prediction list are clipped to the segment
/// endpoint. The aggregate may therefore accumulate more points than the grid
/// estimate; it is completed explicitly after the last segment.
pub struct FlyScanExecutor {
    motion_port: Arc<dyn MotionPort>,
    acquisition_port: Arc<dyn AcquisitionPort>,
    bus: Arc<InMemoryEventBus>,
    settings: EngineSettings,
}

/// Index-aligned pairing of streamed samples with predicted positions for
/// one segment.
struct SegmentPairing {
    predicted: Vec<Position2D>,
    used: usize,
    endpoint: Position2D,
    clipped: bool,
}

impl SegmentPairing {
    fn new(predicted: Vec<Position2D>, endpoint: Position2D) -> Self {
        Self {
            predicted,
            used: 0,
            endpoint,
            clipped: false,
        }
    }

    /// The predicted position for the next arriving sample; the segment
    /// endpoint once the predictions are exhausted.
    fn next_position(&mut self) -> Position2D {
        if let Some(position) = self.predicted.get(self.used) {
            self.used += 1;
            *position
        } else {
            if !self.clipped {
                warn!("more samples than predicted positions; clipping to segment endpoint");
                self.clipped = true;
            }
            self.endpoint
        }
    }
}

impl FlyScanExecutor {
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

    /// Drive `scan` over `trajectory` at the measured acquisition rate.
    ///
    /// Returns `true` when the scan completed, `false` when it was cancelled
    /// or failed (including pre-flight capability rejection, which issues no
    /// motion at all).
    pub async fn execute(
        &self,
        scan: SharedScan,
        trajectory: &ScanTrajectory,
        config: &FlyScanConfig,
        capability: &AcquisitionRateCapability,
    ) -> bool {
        let wait = Arc::new(MotionWait::new());
        let subscriptions = subscribe_motion_events(&self.bus, &wait, &scan);
        let outcome = self
            .run(&scan, trajectory, config, capability, &wait)
            .await;
        unsubscribe_all(&self.bus, subscriptions);
        // Safety net; stopping an idle streamer is a no-op.
        let _ = self.acquisition_port.stop_streaming().await;

        if wait.emergency_seen() {
            warn!("fly scan aborted by emergency stop");
        }

        let completed = match outcome {
            Ok(completed) => completed,
            Err(err) => {
                error!("fly scan failed: {err}");
                let mut scan = scan.lock();
                if !scan.status().is_terminal() {
                    let _ = scan.fail(err.to_string());
                }
                false
            }
        };
        publish_outbox(&self.bus, &scan);
        completed
    }

    /// Reject configurations the measured acquisition chain cannot sustain.
    fn validate_capability(
        &self,
        config: &FlyScanConfig,
        capability: &AcquisitionRateCapability,
    ) -> AppResult<()> {
        if config.desired_acquisition_rate_hz > capability.mean_rate_hz {
            return Err(ScanError::CapabilityInsufficient(format!(
                "desired rate {:.1} Hz exceeds the measured mean of {:.1} Hz",
                config.desired_acquisition_rate_hz, capability.mean_rate_hz
            )));
        }
        let required = config.required_rate_hz();
        let guaranteed = capability.guaranteed_rate_3sigma();
        if guaranteed < required {
            return Err(ScanError::CapabilityInsufficient(format!(
                "guaranteed rate {guaranteed:.1} Hz (3-sigma) is below the {required:.1} Hz \
                 required to keep sample gaps under {} mm at {} mm/s",
                config.max_spatial_gap_mm, config.motion_profile.target_speed
            )));
        }
        let cv = capability.coefficient_of_variation();
        if cv > self.settings.rate_cv_warn_threshold {
            warn!(
                "acquisition rate jitter is high: coefficient of variation {:.1}%",
                cv * 100.0
            );
        }
        Ok(())
    }

    async fn run(
        &self,
        scan: &SharedScan,
        trajectory: &ScanTrajectory,
        config: &FlyScanConfig,
        capability: &AcquisitionRateCapability,
        wait: &MotionWait,
    ) -> AppResult<bool> {
        scan.lock().start()?;
        publish_outbox(&self.bus, scan);

        self.validate_capability(config, capability)?;
        let rate_hz = capability.mean_rate_hz;
        info!(
            segments = trajectory.len().saturating_sub(1),
            rate_hz, "fly scan running"
        );

        // Position the stage on the first trajectory point before streaming.
        let first = *trajectory
            .get(0)
            .ok_or_else(|| ScanError::ConfigInvalid("empty trajectory".to_string()))?;
        let motion_id = self
            .motion_port
            .move_to(first)
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

        self.acquisition_port
            .configure_rate(rate_hz)
            .await
            .map_err(|e| ScanError::AcquisitionFailed(e.to_string()))?;
        self.acquisition_port
            .start_streaming()
            .await
            .map_err(|e| ScanError::AcquisitionFailed(e.to_string()))?;

        let mut next_point_index = 0usize;
        for window in trajectory.positions().windows(2) {
            let (segment_start, segment_end) = (window[0], window[1]);

            if self.hold_between_segments(scan).await? == SafePoint::Abort {
                let _ = self.acquisition_port.stop_streaming().await;
                return Ok(false);
            }

            let mut motion =
                AtomicMotion::between(&segment_start, &segment_end, config.motion_profile);
            let estimated = motion.estimated_duration_seconds();
            if let Err(err) = self
                .motion_port
                .set_motion_profile(&config.motion_profile, estimated)
                .await
            {
                warn!("motion profile hint rejected: {err}");
            }

            let mut pairing = SegmentPairing::new(
                motion.acquisition_positions(&segment_start, rate_hz),
                segment_end,
            );

            let motion_id = self
                .motion_port
                .move_to(segment_end)
                .await
                .map_err(|e| ScanError::MotionHardwareFailed(e.to_string()))?;
            motion.mark_executing();

            let deadline = tokio::time::Instant::now()
                + self.settings.motion_wait_timeout()
                + std::time::Duration::from_secs_f64(estimated);

            loop {
                let samples = self
                    .acquisition_port
                    .drain_samples()
                    .await
                    .map_err(|e| ScanError::AcquisitionFailed(e.to_string()))?;
                self.ingest(scan, &mut pairing, samples, &mut next_point_index)?;
                publish_outbox(&self.bus, scan);

                let status = scan.lock().status();
                if !matches!(status, ScanStatus::Running | ScanStatus::Paused) {
                    // Cancelled mid-motion: stop the stage, leave the port's
                    // queue clean. The aggregate is already terminal, so any
                    // in-flight samples are discarded.
                    let _ = self.motion_port.stop().await;
                    let _ = self.acquisition_port.stop_streaming().await;
                    let leftover = self.acquisition_port.drain_samples().await.unwrap_or_default();
                    if !leftover.is_empty() {
                        debug!(
                            count = leftover.len(),
                            "discarding in-flight samples after cancellation"
                        );
                    }
                    return Ok(false);
                }

                if let Some(outcome) = wait.take_outcome(&motion_id) {
                    match outcome {
                        None => {
                            motion.mark_completed();
                            break;
                        }
                        Some(fault) => {
                            motion.mark_failed();
                            let _ = self.acquisition_port.stop_streaming().await;
                            return Err(ScanError::MotionHardwareFailed(fault));
                        }
                    }
                }

                if tokio::time::Instant::now() >= deadline {
                    let _ = self.motion_port.stop().await;
                    let _ = self.acquisition_port.stop_streaming().await;
                    return Err(ScanError::MotionTimeout(
                        self.settings.motion_wait_timeout_s + estimated,
                    ));
                }

                wait.notified_within(self.settings.drain_interval()).await;
            }

            // Samples taken in the tail of the segment may still be queued.
            let samples = self
                .acquisition_port
                .drain_samples()
                .await
                .map_err(|e| ScanError::AcquisitionFailed(e.to_string()))?;
            self.ingest(scan, &mut pairing, samples, &mut next_point_index)?;
            publish_outbox(&self.bus, scan);
        }

        self.acquisition_port
            .stop_streaming()
            .await
            .map_err(|e| ScanError::AcquisitionFailed(e.to_string()))?;
        {
            let mut scan = scan.lock();
            if !scan.status().is_terminal() {
                scan.complete()?;
            }
        }
        publish_outbox(&self.bus, scan);
        Ok(true)
    }

    /// Record a batch of streamed samples against their predicted positions.
    fn ingest(
        &self,
        scan: &SharedScan,
        pairing: &mut SegmentPairing,
        samples: Vec<VoltageMeasurement>,
        next_point_index: &mut usize,
    ) -> AppResult<()> {
        for measurement in samples {
            let position = pairing.next_position();
            scan.lock().add_point(ScanPointResult {
                position,
                measurement,
                point_index: *next_point_index,
            })?;
            *next_point_index += 1;
        }
        Ok(())
    }

    /// Safe point between segments: pausing here suspends streaming so stale
    /// stationary samples do not bleed into the next segment's predictions.
    async fn hold_between_segments(&self, scan: &SharedScan) -> AppResult<SafePoint> {
        let status = scan.lock().status();
        match status {
            ScanStatus::Running => Ok(SafePoint::Proceed),
            ScanStatus::Paused => {
                self.acquisition_port
                    .stop_streaming()
                    .await
                    .map_err(|e| ScanError::AcquisitionFailed(e.to_string()))?;
                let held =
                    hold_at_safe_point(&self.bus, scan, self.settings.pause_poll()).await;
                if held == SafePoint::Abort {
                    return Ok(SafePoint::Abort);
                }
                // Drop whatever accumulated while the stage was holding.
                let stale = self.acquisition_port.drain_samples().await.unwrap_or_default();
                if !stale.is_empty() {
                    debug!(count = stale.len(), "discarding samples streamed during pause");
                }
                self.acquisition_port
                    .start_streaming()
                    .await
                    .map_err(|e| ScanError::AcquisitionFailed(e.to_string()))?;
                Ok(SafePoint::Proceed)
            }
            _ => Ok(SafePoint::Abort),
        }
    }
}
