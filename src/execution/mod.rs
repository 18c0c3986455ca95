//! Scan executors and the event-synchronized motion wait they share.

mod fly_scan;
mod signal;
mod step_scan;

pub use fly_scan::FlyScanExecutor;
pub use step_scan::StepScanExecutor;

pub(crate) use signal::MotionWait;

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{AppResult, ScanError};
use crate::events::{DomainEvent, InMemoryEventBus, SubscriptionId};
use crate::hardware::MotionPort;
use crate::scan::{ScanStatus, SharedScan};

/// Poll granularity of the motion wait loop. The wait is primarily driven by
/// the notify signal; this slice only bounds how stale a cancel check can be.
const WAIT_POLL_SLICE: Duration = Duration::from_millis(10);

/// Outcome of holding at a cancel/pause safe point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SafePoint {
    /// The scan is running; continue with the next step.
    Proceed,
    /// The scan reached a terminal state; unwind without touching it again.
    Abort,
}

/// Outcome of waiting for a motion-done signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MotionWaitResult {
    /// The pending motion completed.
    Arrived,
    /// The scan was cancelled while the motion was underway.
    Aborted,
}

/// Wire the motion-event handlers an executor needs for one run.
///
/// `motioncompleted` and `motionfailed` record their outcome on the wait
/// signal; `emergencystoptriggered` additionally cancels the scan so every
/// blocking point unwinds promptly. Returns the handles for
/// [`unsubscribe_all`], which must run on every exit path.
pub(crate) fn subscribe_motion_events(
    bus: &InMemoryEventBus,
    wait: &Arc<MotionWait>,
    scan: &SharedScan,
) -> Vec<(&'static str, SubscriptionId)> {
    let mut subscriptions = Vec::with_capacity(3);

    let completed_wait = Arc::clone(wait);
    subscriptions.push((
        "motioncompleted",
        bus.subscribe("motioncompleted", move |event| {
            if let DomainEvent::MotionCompleted { motion_id, .. } = event {
                completed_wait.record_outcome(motion_id, None);
            }
        }),
    ));

    let failed_wait = Arc::clone(wait);
    subscriptions.push((
        "motionfailed",
        bus.subscribe("motionfailed", move |event| {
            if let DomainEvent::MotionFailed { motion_id, error } = event {
                failed_wait.record_outcome(motion_id, Some(error.clone()));
            }
        }),
    ));

    let emergency_wait = Arc::clone(wait);
    let emergency_scan = Arc::clone(scan);
    subscriptions.push((
        "emergencystoptriggered",
        bus.subscribe("emergencystoptriggered", move |_event| {
            // Cancel the scan; the executor publishes the queued event at its
            // next drain. Ignore the error if the scan is already terminal.
            let _ = emergency_scan.lock().cancel();
            emergency_wait.record_emergency();
        }),
    ));

    subscriptions
}

/// Remove the handlers installed by [`subscribe_motion_events`].
pub(crate) fn unsubscribe_all(
    bus: &InMemoryEventBus,
    subscriptions: Vec<(&'static str, SubscriptionId)>,
) {
    for (event_type, id) in subscriptions {
        bus.unsubscribe(event_type, id);
    }
}

/// Drain the scan outbox and publish every queued event.
///
/// The lock is released before publishing so handlers (which may themselves
/// lock the scan, like the emergency-stop handler) cannot deadlock.
pub(crate) fn publish_outbox(bus: &InMemoryEventBus, scan: &SharedScan) {
    let events = scan.lock().drain_events();
    for event in &events {
        bus.publish(event);
    }
}

/// Hold until the scan is neither paused nor freshly mutated.
///
/// Publishes queued events on every iteration so pause/resume/cancel events
/// surface promptly, and busy-waits at `pause_poll` granularity while paused.
pub(crate) async fn hold_at_safe_point(
    bus: &InMemoryEventBus,
    scan: &SharedScan,
    pause_poll: Duration,
) -> SafePoint {
    loop {
        publish_outbox(bus, scan);
        let status = scan.lock().status();
        match status {
            ScanStatus::Paused => sleep(pause_poll).await,
            ScanStatus::Cancelled | ScanStatus::Failed | ScanStatus::Completed => {
                return SafePoint::Abort
            }
            _ => return SafePoint::Proceed,
        }
    }
}

/// Wait for the completion of `motion_id`, bounded by `timeout`.
///
/// Cancellation is observed every poll slice: a cancelled scan gets the port
/// stopped and the wait unwound. A pause during the move is acknowledged only
/// after arrival (the safe point is after the stage settles), so a paused
/// scan keeps waiting here.
pub(crate) async fn await_motion(
    motion_port: &Arc<dyn MotionPort>,
    scan: &SharedScan,
    wait: &MotionWait,
    motion_id: &str,
    timeout: Duration,
) -> AppResult<MotionWaitResult> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let status = scan.lock().status();
        if !matches!(status, ScanStatus::Running | ScanStatus::Paused) {
            let _ = motion_port.stop().await;
            return Ok(MotionWaitResult::Aborted);
        }

        if let Some(outcome) = wait.take_outcome(motion_id) {
            return match outcome {
                None => Ok(MotionWaitResult::Arrived),
                Some(error) => Err(ScanError::MotionHardwareFailed(error)),
            };
        }

        let now = tokio::time::Instant::now();
        if now >= deadline {
            let _ = motion_port.stop().await;
            return Err(ScanError::MotionTimeout(timeout.as_secs_f64()));
        }
        wait.notified_within(WAIT_POLL_SLICE.min(deadline - now)).await;
    }
}
