//! Simulated hardware for development and testing.
//!
//! The simulated stage honors the `MotionPort` event contract (publishes
//! `motionstarted` synchronously, then exactly one completion or failure
//! event from its own task) with move durations derived from a configurable
//! speed or from the last `set_motion_profile` hint. The simulated ADC chain
//! produces constant or noisy I/Q samples on demand and supports streaming
//! into an internal queue.
//!
//! All timing uses `tokio::time`, so tests can run against a paused clock.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{sleep, Duration};
use uuid::Uuid;

use crate::events::{DomainEvent, InMemoryEventBus};
use crate::hardware::{AcquisitionPort, Axis, MotionPort};
use crate::motion::MotionProfile;
use crate::scan::{Position2D, VoltageMeasurement};

// =============================================================================
// MockMotionStage - Simulated XY Stage
// =============================================================================

/// Simulated XY stage publishing motion events on the bus.
///
/// Move duration is `distance / speed`, unless a `set_motion_profile` hint
/// was supplied, in which case the hinted duration is used for the next move.
/// A specific move (counting from 1) can be made to fail for error-path
/// tests.
pub struct MockMotionStage {
    bus: Arc<InMemoryEventBus>,
    position: Arc<RwLock<Position2D>>,
    moving: Arc<RwLock<bool>>,
    speed_mm_per_sec: f64,
    limits: (f64, f64),
    profile_hint: Arc<RwLock<Option<f64>>>,
    move_counter: AtomicUsize,
    fail_on_move: Option<usize>,
    current_move: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl MockMotionStage {
    /// Create a stage at the origin moving at 50 mm/s with 150 mm travel.
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self {
            bus,
            position: Arc::new(RwLock::new(Position2D::new(0.0, 0.0))),
            moving: Arc::new(RwLock::new(false)),
            speed_mm_per_sec: 50.0,
            limits: (150.0, 150.0),
            profile_hint: Arc::new(RwLock::new(None)),
            move_counter: AtomicUsize::new(0),
            fail_on_move: None,
            current_move: Mutex::new(None),
        }
    }

    /// Override the default motion speed, in mm/s.
    pub fn with_speed(mut self, speed_mm_per_sec: f64) -> Self {
        self.speed_mm_per_sec = speed_mm_per_sec;
        self
    }

    /// Override the travel limits `(max_x, max_y)`, in mm.
    pub fn with_limits(mut self, max_x: f64, max_y: f64) -> Self {
        self.limits = (max_x, max_y);
        self
    }

    /// Make the `n`-th move (counting from 1) fail with a simulated fault.
    pub fn with_failure_on_move(mut self, n: usize) -> Self {
        self.fail_on_move = Some(n);
        self
    }

    /// Place the stage at `position` instead of the origin.
    pub fn with_initial_position(mut self, position: Position2D) -> Self {
        self.position = Arc::new(RwLock::new(position));
        self
    }

    /// Number of moves issued so far.
    pub fn moves_issued(&self) -> usize {
        self.move_counter.load(Ordering::SeqCst)
    }

    fn abort_current_move(&self) {
        if let Some(handle) = self.current_move.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl MotionPort for MockMotionStage {
    async fn move_to(&self, target: Position2D) -> Result<String> {
        let motion_id = Uuid::new_v4().to_string();
        let start = *self.position.read().await;
        let hinted = self.profile_hint.write().await.take();
        let duration_s =
            hinted.unwrap_or_else(|| start.distance_to(&target) / self.speed_mm_per_sec);
        let move_number = self.move_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = self.fail_on_move == Some(move_number);

        *self.moving.write().await = true;
        self.bus.publish(&DomainEvent::MotionStarted {
            motion_id: motion_id.clone(),
            target_position: target,
        });

        let bus = Arc::clone(&self.bus);
        let position = Arc::clone(&self.position);
        let moving = Arc::clone(&self.moving);
        let id = motion_id.clone();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_secs_f64(duration_s)).await;
            if fail {
                *moving.write().await = false;
                bus.publish(&DomainEvent::MotionFailed {
                    motion_id: id,
                    error: format!("simulated axis fault on move {move_number}"),
                });
                return;
            }
            *position.write().await = target;
            *moving.write().await = false;
            bus.publish(&DomainEvent::MotionCompleted {
                motion_id: id,
                final_position: target,
                duration_ms: (duration_s * 1000.0) as u64,
            });
            bus.publish(&DomainEvent::PositionUpdated {
                position: target,
                is_moving: false,
            });
        });
        *self.current_move.lock() = Some(handle);

        Ok(motion_id)
    }

    async fn current_position(&self) -> Result<Position2D> {
        Ok(*self.position.read().await)
    }

    async fn is_moving(&self) -> Result<bool> {
        Ok(*self.moving.read().await)
    }

    async fn stop(&self) -> Result<()> {
        self.abort_current_move();
        *self.moving.write().await = false;
        self.bus.publish(&DomainEvent::MotionStopped {
            reason: "user_requested".to_string(),
        });
        Ok(())
    }

    async fn emergency_stop(&self) -> Result<()> {
        self.abort_current_move();
        *self.moving.write().await = false;
        self.bus.publish(&DomainEvent::EmergencyStopTriggered);
        Ok(())
    }

    async fn home(&self, axis: Axis) -> Result<()> {
        self.abort_current_move();
        *self.moving.write().await = false;
        let mut position = self.position.write().await;
        match axis {
            Axis::X => position.x = 0.0,
            Axis::Y => position.y = 0.0,
            Axis::Both => *position = Position2D::new(0.0, 0.0),
        }
        let homed = *position;
        drop(position);
        self.bus.publish(&DomainEvent::PositionUpdated {
            position: homed,
            is_moving: false,
        });
        Ok(())
    }

    async fn set_reference(&self, axis: Axis, value: f64) -> Result<()> {
        let mut position = self.position.write().await;
        match axis {
            Axis::X => position.x = value,
            Axis::Y => position.y = value,
            Axis::Both => *position = Position2D::new(value, value),
        }
        Ok(())
    }

    async fn set_motion_profile(
        &self,
        _profile: &MotionProfile,
        estimated_duration_s: f64,
    ) -> Result<()> {
        *self.profile_hint.write().await = Some(estimated_duration_s);
        Ok(())
    }

    async fn axis_limits(&self) -> Result<(f64, f64)> {
        Ok(self.limits)
    }
}

// =============================================================================
// MockAcquisition - Simulated ADC Chain
// =============================================================================

/// Simulated demodulation chain producing constant or noisy I/Q samples.
///
/// Discrete acquisition blocks for a configurable delay per sample; streaming
/// fills an internal queue at the configured rate until stopped. A specific
/// sample (counting from 1) can be made to fail for error-path tests.
pub struct MockAcquisition {
    value: f64,
    noise: f64,
    acquire_delay: Duration,
    sample_period: Arc<RwLock<Duration>>,
    queue: Arc<Mutex<VecDeque<VoltageMeasurement>>>,
    streamer: Mutex<Option<tokio::task::JoinHandle<()>>>,
    sample_counter: AtomicUsize,
    fail_on_sample: Option<usize>,
}

impl MockAcquisition {
    /// Create a chain reporting `value` volts on all six components.
    pub fn constant(value: f64) -> Self {
        Self {
            value,
            noise: 0.0,
            acquire_delay: Duration::ZERO,
            sample_period: Arc::new(RwLock::new(Duration::from_millis(10))),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            streamer: Mutex::new(None),
            sample_counter: AtomicUsize::new(0),
            fail_on_sample: None,
        }
    }

    /// Add uniform noise of the given amplitude to every component.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Make `acquire_sample` block for `delay` per call.
    pub fn with_acquire_delay(mut self, delay: Duration) -> Self {
        self.acquire_delay = delay;
        self
    }

    /// Make the `n`-th discrete sample (counting from 1) fail.
    pub fn with_failure_on_sample(mut self, n: usize) -> Self {
        self.fail_on_sample = Some(n);
        self
    }

    /// Number of discrete samples acquired so far.
    pub fn samples_acquired(&self) -> usize {
        self.sample_counter.load(Ordering::SeqCst)
    }
}

fn synth_sample(value: f64, noise: f64) -> VoltageMeasurement {
    let mut sample = VoltageMeasurement::uniform(value);
    if noise > 0.0 {
        let mut rng = rand::thread_rng();
        sample.ux_i += rng.gen_range(-noise..=noise);
        sample.ux_q += rng.gen_range(-noise..=noise);
        sample.uy_i += rng.gen_range(-noise..=noise);
        sample.uy_q += rng.gen_range(-noise..=noise);
        sample.uz_i += rng.gen_range(-noise..=noise);
        sample.uz_q += rng.gen_range(-noise..=noise);
        sample.uncertainty = noise;
    }
    sample
}

#[async_trait]
impl AcquisitionPort for MockAcquisition {
    async fn acquire_sample(&self) -> Result<VoltageMeasurement> {
        if !self.acquire_delay.is_zero() {
            sleep(self.acquire_delay).await;
        }
        let sample_number = self.sample_counter.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_sample == Some(sample_number) {
            bail!("simulated ADC fault on sample {sample_number}");
        }
        Ok(synth_sample(self.value, self.noise))
    }

    async fn configure_rate(&self, rate_hz: f64) -> Result<()> {
        if rate_hz <= 0.0 || !rate_hz.is_finite() {
            bail!("sample rate must be positive, got {rate_hz}");
        }
        *self.sample_period.write().await = Duration::from_secs_f64(1.0 / rate_hz);
        Ok(())
    }

    async fn start_streaming(&self) -> Result<()> {
        let period = *self.sample_period.read().await;
        let mut streamer = self.streamer.lock();
        if streamer.is_some() {
            bail!("already streaming");
        }
        let queue = Arc::clone(&self.queue);
        let value = self.value;
        let noise = self.noise;
        *streamer = Some(tokio::spawn(async move {
            loop {
                sleep(period).await;
                queue.lock().push_back(synth_sample(value, noise));
            }
        }));
        Ok(())
    }

    async fn stop_streaming(&self) -> Result<()> {
        if let Some(handle) = self.streamer.lock().take() {
            handle.abort();
        }
        Ok(())
    }

    async fn drain_samples(&self) -> Result<Vec<VoltageMeasurement>> {
        Ok(self.queue.lock().drain(..).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn stage_completes_moves_and_publishes_events() {
        let bus = Arc::new(InMemoryEventBus::new());
        let completed = Arc::new(Mutex::new(Vec::new()));
        let completed_log = Arc::clone(&completed);
        bus.subscribe("motioncompleted", move |event| {
            if let DomainEvent::MotionCompleted { motion_id, .. } = event {
                completed_log.lock().push(motion_id.clone());
            }
        });

        let stage = MockMotionStage::new(Arc::clone(&bus)).with_speed(10.0);
        let id = stage.move_to(Position2D::new(5.0, 0.0)).await.unwrap();
        assert!(stage.is_moving().await.unwrap());

        // 5mm at 10mm/s: settled after 500ms.
        sleep(Duration::from_millis(600)).await;
        assert!(!stage.is_moving().await.unwrap());
        assert_eq!(
            stage.current_position().await.unwrap(),
            Position2D::new(5.0, 0.0)
        );
        assert_eq!(*completed.lock(), vec![id]);
    }

    #[tokio::test(start_paused = true)]
    async fn stage_failure_injection_publishes_motionfailed() {
        let bus = Arc::new(InMemoryEventBus::new());
        let failures = Arc::new(Mutex::new(Vec::new()));
        let failure_log = Arc::clone(&failures);
        bus.subscribe("motionfailed", move |event| {
            if let DomainEvent::MotionFailed { error, .. } = event {
                failure_log.lock().push(error.clone());
            }
        });

        let stage = MockMotionStage::new(Arc::clone(&bus))
            .with_speed(1000.0)
            .with_failure_on_move(2);
        stage.move_to(Position2D::new(1.0, 0.0)).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        stage.move_to(Position2D::new(2.0, 0.0)).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        let failures = failures.lock();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("move 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn stage_honors_profile_hint_duration() {
        let bus = Arc::new(InMemoryEventBus::new());
        let stage = MockMotionStage::new(Arc::clone(&bus)).with_speed(1.0);
        let profile = MotionProfile::constant(5.0).unwrap();
        stage.set_motion_profile(&profile, 0.2).await.unwrap();

        stage.move_to(Position2D::new(10.0, 0.0)).await.unwrap();
        // Hinted 200ms beats the 10s the default speed would take.
        sleep(Duration::from_millis(300)).await;
        assert_eq!(
            stage.current_position().await.unwrap(),
            Position2D::new(10.0, 0.0)
        );
    }

    #[tokio::test]
    async fn discrete_acquisition_counts_and_fails_on_demand() {
        let adc = MockAcquisition::constant(1.0).with_failure_on_sample(3);
        assert!(adc.acquire_sample().await.is_ok());
        assert!(adc.acquire_sample().await.is_ok());
        assert!(adc.acquire_sample().await.is_err());
        assert_eq!(adc.samples_acquired(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_fills_and_drains_the_queue() {
        let adc = MockAcquisition::constant(2.0);
        adc.configure_rate(100.0).await.unwrap();
        adc.start_streaming().await.unwrap();
        sleep(Duration::from_millis(105)).await;
        adc.stop_streaming().await.unwrap();

        let samples = adc.drain_samples().await.unwrap();
        assert!(samples.len() >= 9, "got {} samples", samples.len());
        assert!(samples.iter().all(|s| s.ux_i == 2.0));
        assert!(adc.drain_samples().await.unwrap().is_empty());
    }
}
