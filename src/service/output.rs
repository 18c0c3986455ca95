//! Output port through which scan lifecycle changes reach a presenter.
//!
//! The core never holds a presenter directly: the service subscribes a small
//! bridge to the event bus which translates scan events into output-port
//! calls. Port failures are swallowed and logged — presentation can never
//! take a scan down.

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::events::{DomainEvent, InMemoryEventBus, SubscriptionId};

/// Presentation sink for scan lifecycle changes (UI presenter, progress
/// logger). Implementations must be quick; long work belongs on a task the
/// implementation spawns itself.
pub trait ScanOutputPort: Send + Sync {
    /// A scan started with the given configuration.
    fn present_scan_started(&self, scan_id: Uuid, config: &Value) -> anyhow::Result<()>;

    /// Progress update with the most recent point's data.
    fn present_scan_progress(&self, current: usize, total: usize, point: &Value)
        -> anyhow::Result<()>;

    /// The scan paused after `point_index` points.
    fn present_scan_paused(&self, scan_id: Uuid, point_index: usize) -> anyhow::Result<()>;

    /// The scan resumed from `point_index`.
    fn present_scan_resumed(&self, scan_id: Uuid, point_index: usize) -> anyhow::Result<()>;

    /// The scan completed with `total_points` recorded.
    fn present_scan_completed(&self, scan_id: Uuid, total_points: usize) -> anyhow::Result<()>;

    /// The scan failed for the given reason.
    fn present_scan_failed(&self, scan_id: Uuid, reason: &str) -> anyhow::Result<()>;

    /// The scan was cancelled.
    fn present_scan_cancelled(&self, scan_id: Uuid) -> anyhow::Result<()>;
}

/// Event-to-port bridge, stateful only for the last acquired point (progress
/// events follow their point event on the same publishing task, so pairing
/// them through a slot is race-free).
struct ScanPresentationBridge {
    output: Arc<dyn ScanOutputPort>,
    last_point: Mutex<Option<Value>>,
}

impl ScanPresentationBridge {
    fn handle(&self, event: &DomainEvent) {
        let result = match event {
            DomainEvent::ScanStarted { scan_id, config } => {
                let config = serde_json::to_value(config).unwrap_or(Value::Null);
                self.output.present_scan_started(*scan_id, &config)
            }
            DomainEvent::ScanPointAcquired {
                position,
                measurement,
                point_index,
                ..
            } => {
                *self.last_point.lock() = Some(json!({
                    "position": position,
                    "measurement": measurement,
                    "point_index": point_index,
                }));
                Ok(())
            }
            DomainEvent::ScanProgress { current, total, .. } => {
                let point = self.last_point.lock().take().unwrap_or(Value::Null);
                self.output.present_scan_progress(*current, *total, &point)
            }
            DomainEvent::ScanPaused {
                scan_id,
                current_point_index,
            } => self
                .output
                .present_scan_paused(*scan_id, *current_point_index),
            DomainEvent::ScanResumed {
                scan_id,
                resume_from_point_index,
            } => self
                .output
                .present_scan_resumed(*scan_id, *resume_from_point_index),
            DomainEvent::ScanCompleted {
                scan_id,
                total_points,
            } => self.output.present_scan_completed(*scan_id, *total_points),
            DomainEvent::ScanFailed { scan_id, reason } => {
                self.output.present_scan_failed(*scan_id, reason)
            }
            DomainEvent::ScanCancelled { scan_id } => {
                self.output.present_scan_cancelled(*scan_id)
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            warn!(
                event_type = event.event_type(),
                "scan output port rejected presentation: {err}"
            );
        }
    }
}

/// Subscribe `output` to every scan lifecycle event on `bus`.
///
/// Returns the subscription handles so a caller that outlives its presenter
/// can detach them.
pub fn attach_scan_presenter(
    bus: &InMemoryEventBus,
    output: Arc<dyn ScanOutputPort>,
) -> Vec<(&'static str, SubscriptionId)> {
    const SCAN_EVENTS: [&str; 8] = [
        "scanstarted",
        "scanpointacquired",
        "scanprogress",
        "scanpaused",
        "scanresumed",
        "scancompleted",
        "scanfailed",
        "scancancelled",
    ];

    let bridge = Arc::new(ScanPresentationBridge {
        output,
        last_point: Mutex::new(None),
    });

    SCAN_EVENTS
        .iter()
        .map(|event_type| {
            let bridge = Arc::clone(&bridge);
            (
                *event_type,
                bus.subscribe(event_type, move |event| bridge.handle(event)),
            )
        })
        .collect()
}
