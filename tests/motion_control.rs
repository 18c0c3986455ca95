//! Motion control service: target chaining, clamping, cache invalidation.

mod common;

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use efield_daq::events::InMemoryEventBus;
use efield_daq::hardware::mock::MockMotionStage;
use efield_daq::hardware::MotionPort;
use efield_daq::motion::{monitor_position, MotionControlService, MotionOutputPort};
use efield_daq::scan::Position2D;

use common::EventRecorder;

fn slow_stage(bus: &Arc<InMemoryEventBus>) -> Arc<MockMotionStage> {
    // 1 mm/s: moves stay in flight long enough to prove chaining does not
    // depend on completion.
    Arc::new(
        MockMotionStage::new(Arc::clone(bus))
            .with_speed(1.0)
            .with_limits(100.0, 100.0),
    )
}

#[tokio::test(start_paused = true)]
async fn relative_moves_chain_from_the_last_commanded_target() {
    let bus = Arc::new(InMemoryEventBus::new());
    let stage = slow_stage(&bus);
    let service = MotionControlService::new(Arc::clone(&stage) as Arc<dyn MotionPort>);

    service.move_relative(10.0, 5.0).await.unwrap();
    // The first move is nowhere near finished; the second must still chain.
    service.move_relative(2.5, 2.5).await.unwrap();

    assert_eq!(
        service.chained_target(),
        Some(Position2D::new(12.5, 7.5))
    );
}

#[tokio::test(start_paused = true)]
async fn chained_targets_are_clamped_to_the_axis_limits() {
    let bus = Arc::new(InMemoryEventBus::new());
    let stage = slow_stage(&bus);
    let service = MotionControlService::new(Arc::clone(&stage) as Arc<dyn MotionPort>);

    service.move_relative(80.0, 0.0).await.unwrap();
    service.move_relative(80.0, -20.0).await.unwrap();

    assert_eq!(
        service.chained_target(),
        Some(Position2D::new(100.0, 0.0))
    );
}

#[tokio::test(start_paused = true)]
async fn per_axis_absolute_moves_keep_the_other_axis_target() {
    let bus = Arc::new(InMemoryEventBus::new());
    let stage = slow_stage(&bus);
    let service = MotionControlService::new(Arc::clone(&stage) as Arc<dyn MotionPort>);

    service.move_absolute(20.0, 30.0).await.unwrap();
    service.move_absolute_x(50.0).await.unwrap();
    assert_eq!(service.chained_target(), Some(Position2D::new(50.0, 30.0)));

    service.move_absolute_y(5.0).await.unwrap();
    assert_eq!(service.chained_target(), Some(Position2D::new(50.0, 5.0)));
}

#[tokio::test(start_paused = true)]
async fn stop_and_homing_invalidate_the_chain() {
    let bus = Arc::new(InMemoryEventBus::new());
    let stage = slow_stage(&bus);
    let service = MotionControlService::new(Arc::clone(&stage) as Arc<dyn MotionPort>);

    service.move_relative(10.0, 10.0).await.unwrap();
    assert!(service.chained_target().is_some());
    service.stop().await.unwrap();
    assert!(service.chained_target().is_none());

    service.move_relative(5.0, 0.0).await.unwrap();
    assert!(service.chained_target().is_some());
    service.home_xy().await.unwrap();
    assert!(service.chained_target().is_none());

    // After homing, the next relative move chains from the physical position.
    service.move_relative(3.0, 4.0).await.unwrap();
    assert_eq!(service.chained_target(), Some(Position2D::new(3.0, 4.0)));
}

#[tokio::test(start_paused = true)]
async fn emergency_stop_publishes_the_event_and_clears_the_chain() {
    let bus = Arc::new(InMemoryEventBus::new());
    let recorder = EventRecorder::attach(&bus);
    let stage = slow_stage(&bus);
    let service = MotionControlService::new(Arc::clone(&stage) as Arc<dyn MotionPort>);

    service.move_relative(50.0, 50.0).await.unwrap();
    service.emergency_stop().await.unwrap();

    assert!(service.chained_target().is_none());
    assert_eq!(recorder.count("emergencystoptriggered"), 1);
    assert!(!stage.is_moving().await.unwrap());
}

#[derive(Default)]
struct RecordingMotionOutput {
    positions: Mutex<Vec<(f64, f64, bool)>>,
    failures: Mutex<Vec<String>>,
}

impl MotionOutputPort for RecordingMotionOutput {
    fn present_position(&self, position: Position2D, is_moving: bool) {
        self.positions
            .lock()
            .push((position.x, position.y, is_moving));
    }

    fn present_operation_failed(&self, reason: &str) {
        self.failures.lock().push(reason.to_string());
    }
}

#[tokio::test(start_paused = true)]
async fn position_monitor_forwards_updates_until_detached() {
    let bus = Arc::new(InMemoryEventBus::new());
    let stage = Arc::new(MockMotionStage::new(Arc::clone(&bus)).with_speed(1000.0));
    let output = Arc::new(RecordingMotionOutput::default());

    let subscription = monitor_position(&bus, Arc::clone(&output) as Arc<dyn MotionOutputPort>);

    stage.move_to(Position2D::new(5.0, 5.0)).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    let seen = output.positions.lock().len();
    assert!(seen >= 1, "no position updates forwarded");

    bus.unsubscribe("positionupdated", subscription);
    stage.move_to(Position2D::new(8.0, 8.0)).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(output.positions.lock().len(), seen);
}
