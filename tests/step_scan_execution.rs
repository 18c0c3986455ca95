//! End-to-end step-scan scenarios against simulated hardware.

mod common;

use std::sync::Arc;
use tokio::time::{sleep, Duration};

use efield_daq::events::{DomainEvent, InMemoryEventBus};
use efield_daq::hardware::mock::{MockAcquisition, MockMotionStage};
use efield_daq::hardware::{AcquisitionPort, MotionPort};
use efield_daq::scan::ScanStatus;
use efield_daq::service::{ScanApplicationService, StepScanRequest};
use efield_daq::settings::EngineSettings;

use common::EventRecorder;

fn request(nx: usize, ny: usize) -> StepScanRequest {
    StepScanRequest {
        x_min: 0.0,
        x_max: 10.0,
        y_min: 0.0,
        y_max: 10.0,
        x_nb_points: nx,
        y_nb_points: ny,
        scan_pattern: "SERPENTINE".to_string(),
        stabilization_delay_ms: 0,
        averaging_per_position: 1,
        motion_speed_mm_s: None,
    }
}

struct Bench {
    bus: Arc<InMemoryEventBus>,
    stage: Arc<MockMotionStage>,
    service: Arc<ScanApplicationService>,
    recorder: EventRecorder,
}

fn bench(bus: Arc<InMemoryEventBus>, stage: MockMotionStage, adc: MockAcquisition) -> Bench {
    let recorder = EventRecorder::attach(&bus);
    let stage = Arc::new(stage);
    let service = Arc::new(ScanApplicationService::new(
        Arc::clone(&stage) as Arc<dyn MotionPort>,
        Arc::new(adc) as Arc<dyn AcquisitionPort>,
        Arc::clone(&bus),
        EngineSettings::default(),
    ));
    Bench {
        bus,
        stage,
        service,
        recorder,
    }
}

#[tokio::test(start_paused = true)]
async fn s1_serpentine_happy_path_visits_points_in_order() {
    let bus = Arc::new(InMemoryEventBus::new());
    let bench = bench(
        Arc::clone(&bus),
        MockMotionStage::new(Arc::clone(&bus)).with_speed(1000.0),
        MockAcquisition::constant(1.0),
    );

    bench.service.execute_step_scan(&request(3, 3)).unwrap();
    let completed = bench.service.wait_for_scan_end().await.unwrap();
    assert!(completed);

    let points = bench.recorder.of_type("scanpointacquired");
    let visited: Vec<(f64, f64)> = points
        .iter()
        .map(|event| match event {
            DomainEvent::ScanPointAcquired { position, .. } => (position.x, position.y),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        visited,
        vec![
            (0.0, 0.0),
            (5.0, 0.0),
            (10.0, 0.0),
            (10.0, 5.0),
            (5.0, 5.0),
            (0.0, 5.0),
            (0.0, 10.0),
            (5.0, 10.0),
            (10.0, 10.0),
        ]
    );

    // Point indices equal trajectory order, measurements pass through.
    for (expected_index, event) in points.iter().enumerate() {
        if let DomainEvent::ScanPointAcquired {
            point_index,
            measurement,
            ..
        } = event
        {
            assert_eq!(*point_index, expected_index);
            assert_eq!(measurement.ux_i, 1.0);
            assert_eq!(measurement.uz_q, 1.0);
        }
    }

    // Event sequence: scanstarted first, exactly one terminal event last.
    let scan_events = bench.recorder.scan_events();
    assert_eq!(scan_events.first().map(DomainEvent::event_type), Some("scanstarted"));
    assert_eq!(scan_events.last().map(DomainEvent::event_type), Some("scancompleted"));
    assert_eq!(bench.recorder.count("scancompleted"), 1);
    assert_eq!(bench.recorder.count("scanfailed"), 0);
    assert_eq!(bench.recorder.count("scancancelled"), 0);

    let snapshot = bench.service.current_scan().unwrap();
    assert_eq!(snapshot.status, ScanStatus::Completed);
    assert_eq!(snapshot.points_acquired, 9);
}

#[tokio::test(start_paused = true)]
async fn s2_pause_after_three_points_then_resume() {
    let bus = Arc::new(InMemoryEventBus::new());
    let bench = bench(
        Arc::clone(&bus),
        MockMotionStage::new(Arc::clone(&bus)).with_speed(1000.0),
        MockAcquisition::constant(1.0),
    );

    // Pause the scan from a bus handler the moment the third point lands.
    let pauser = Arc::clone(&bench.service);
    bench.bus.subscribe("scanpointacquired", move |event| {
        if let DomainEvent::ScanPointAcquired { point_index: 2, .. } = event {
            pauser.pause_scan().unwrap();
        }
    });

    bench.service.execute_step_scan(&request(5, 2)).unwrap();

    // Wait for the pause to surface, hold 200ms, then resume.
    for _ in 0..200 {
        if bench.recorder.count("scanpaused") > 0 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(bench.recorder.count("scanpaused"), 1);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(
        bench.service.current_scan().unwrap().status,
        ScanStatus::Paused
    );
    bench.service.resume_scan().unwrap();

    let completed = bench.service.wait_for_scan_end().await.unwrap();
    assert!(completed);

    assert_eq!(bench.recorder.count("scanpointacquired"), 10);
    let paused = bench.recorder.of_type("scanpaused");
    assert!(matches!(
        paused.as_slice(),
        [DomainEvent::ScanPaused {
            current_point_index: 3,
            ..
        }]
    ));
    let resumed = bench.recorder.of_type("scanresumed");
    assert!(matches!(
        resumed.as_slice(),
        [DomainEvent::ScanResumed {
            resume_from_point_index: 3..=4,
            ..
        }]
    ));
    assert_eq!(
        bench.recorder.scan_events().last().map(DomainEvent::event_type),
        Some("scancompleted")
    );
}

#[tokio::test(start_paused = true)]
async fn s3_cancel_mid_scan_stops_early() {
    let bus = Arc::new(InMemoryEventBus::new());
    let bench = bench(
        Arc::clone(&bus),
        MockMotionStage::new(Arc::clone(&bus)).with_speed(1000.0),
        // 50ms per point comes from the acquisition side.
        MockAcquisition::constant(1.0).with_acquire_delay(Duration::from_millis(50)),
    );

    bench.service.execute_step_scan(&request(5, 4)).unwrap();
    sleep(Duration::from_millis(175)).await;
    bench.service.cancel_scan().unwrap();

    let completed = bench.service.wait_for_scan_end().await.unwrap();
    assert!(!completed);

    let acquired = bench.recorder.count("scanpointacquired");
    assert!(acquired < 20, "cancel came too late: {acquired} points");
    assert_eq!(bench.recorder.count("scancancelled"), 1);
    assert_eq!(bench.recorder.count("scancompleted"), 0);
    assert_eq!(
        bench.recorder.scan_events().last().map(DomainEvent::event_type),
        Some("scancancelled")
    );
    assert_eq!(
        bench.service.current_scan().unwrap().status,
        ScanStatus::Cancelled
    );
}

#[tokio::test(start_paused = true)]
async fn s4_motion_failure_fails_the_scan_with_the_injected_reason() {
    let bus = Arc::new(InMemoryEventBus::new());
    let bench = bench(
        Arc::clone(&bus),
        MockMotionStage::new(Arc::clone(&bus))
            .with_speed(1000.0)
            .with_failure_on_move(3),
        MockAcquisition::constant(1.0),
    );

    bench.service.execute_step_scan(&request(3, 3)).unwrap();
    let completed = bench.service.wait_for_scan_end().await.unwrap();
    assert!(!completed);

    assert_eq!(bench.recorder.count("scanpointacquired"), 2);
    let failed = bench.recorder.of_type("scanfailed");
    assert_eq!(failed.len(), 1);
    if let DomainEvent::ScanFailed { reason, .. } = &failed[0] {
        assert!(
            reason.contains("simulated axis fault"),
            "reason does not carry the injected fault: {reason}"
        );
    }
    assert_eq!(
        bench.recorder.scan_events().last().map(DomainEvent::event_type),
        Some("scanfailed")
    );

    let snapshot = bench.service.current_scan().unwrap();
    assert_eq!(snapshot.status, ScanStatus::Failed);
    assert!(snapshot
        .failure_reason
        .as_deref()
        .unwrap_or_default()
        .contains("simulated axis fault"));
    assert_eq!(bench.stage.moves_issued(), 3);
}

#[tokio::test(start_paused = true)]
async fn only_one_scan_runs_at_a_time() {
    let bus = Arc::new(InMemoryEventBus::new());
    let bench = bench(
        Arc::clone(&bus),
        MockMotionStage::new(Arc::clone(&bus)).with_speed(1000.0),
        MockAcquisition::constant(1.0).with_acquire_delay(Duration::from_millis(20)),
    );

    bench.service.execute_step_scan(&request(3, 3)).unwrap();
    let second = bench.service.execute_step_scan(&request(3, 3));
    assert!(second.is_err());

    assert!(bench.service.wait_for_scan_end().await.unwrap());
    // A terminal scan frees the slot.
    bench.service.execute_step_scan(&request(2, 2)).unwrap();
    assert!(bench.service.wait_for_scan_end().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn averaging_reduces_noisy_samples_to_one_point() {
    let bus = Arc::new(InMemoryEventBus::new());
    let bench = bench(
        Arc::clone(&bus),
        MockMotionStage::new(Arc::clone(&bus)).with_speed(1000.0),
        MockAcquisition::constant(2.0).with_noise(0.1),
    );

    let mut req = request(2, 2);
    req.averaging_per_position = 8;
    bench.service.execute_step_scan(&req).unwrap();
    assert!(bench.service.wait_for_scan_end().await.unwrap());

    let points = bench.recorder.of_type("scanpointacquired");
    assert_eq!(points.len(), 4);
    for event in points {
        if let DomainEvent::ScanPointAcquired { measurement, .. } = event {
            // Mean of 8 samples with +-0.1 noise stays near the base value.
            assert!((measurement.ux_i - 2.0).abs() < 0.1);
            // Conservative uncertainty: eight noisy samples summed.
            assert!(measurement.uncertainty > 0.7);
        }
    }
}
