//! Domain events published by the core.
//!
//! Every event carries an immutable payload and maps to a stable lowercase
//! type name — the key used for bus subscriptions. Late subscribers miss
//! earlier publications; nothing is retained.

use serde::Serialize;
use uuid::Uuid;

use crate::scan::{Position2D, ScanConfig, VoltageMeasurement};

/// Events emitted by the motion layer, the scan aggregate and the executors.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum DomainEvent {
    /// A motion command was accepted and is underway.
    MotionStarted {
        /// Correlation id returned by `MotionPort::move_to`.
        motion_id: String,
        /// Where the stage is heading.
        target_position: Position2D,
    },
    /// The motion identified by `motion_id` reached its target.
    MotionCompleted {
        /// Correlation id of the finished motion.
        motion_id: String,
        /// Stage position at completion.
        final_position: Position2D,
        /// Wall-clock duration of the motion.
        duration_ms: u64,
    },
    /// The motion identified by `motion_id` aborted on a hardware error.
    MotionFailed {
        /// Correlation id of the failed motion.
        motion_id: String,
        /// Driver-reported error description.
        error: String,
    },
    /// Motion was stopped before reaching its target.
    MotionStopped {
        /// Why the stop was issued (e.g. `user_requested`).
        reason: String,
    },
    /// The emergency stop was triggered; all motion halted immediately.
    EmergencyStopTriggered,
    /// Periodic stage position report.
    PositionUpdated {
        /// Current stage position.
        position: Position2D,
        /// Whether the stage is currently in motion.
        is_moving: bool,
    },
    /// A scan left the `Created` state.
    ScanStarted {
        /// Scan identity.
        scan_id: Uuid,
        /// The configuration the scan runs with.
        config: ScanConfig,
    },
    /// One point was recorded on the scan aggregate.
    ScanPointAcquired {
        /// Scan identity.
        scan_id: Uuid,
        /// Position of the sample (predicted for fly scans).
        position: Position2D,
        /// The recorded measurement.
        measurement: VoltageMeasurement,
        /// Trajectory index (step) or arrival order (fly).
        point_index: usize,
    },
    /// Coarse progress summary, emitted alongside each accepted point.
    ScanProgress {
        /// Scan identity.
        scan_id: Uuid,
        /// Points recorded so far.
        current: usize,
        /// Grid-point estimate of the total.
        total: usize,
    },
    /// The scan was paused at a safe point.
    ScanPaused {
        /// Scan identity.
        scan_id: Uuid,
        /// Number of points recorded when the pause took effect.
        current_point_index: usize,
    },
    /// The scan resumed from a pause.
    ScanResumed {
        /// Scan identity.
        scan_id: Uuid,
        /// Index the scan resumes from.
        resume_from_point_index: usize,
    },
    /// The scan finished with all points recorded.
    ScanCompleted {
        /// Scan identity.
        scan_id: Uuid,
        /// Final point count.
        total_points: usize,
    },
    /// The scan was cancelled by the operator or an emergency stop.
    ScanCancelled {
        /// Scan identity.
        scan_id: Uuid,
    },
    /// The scan stopped on an unrecoverable error.
    ScanFailed {
        /// Scan identity.
        scan_id: Uuid,
        /// What went wrong.
        reason: String,
    },
}

impl DomainEvent {
    /// The stable lowercase name keying bus subscriptions for this event.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::MotionStarted { .. } => "motionstarted",
            DomainEvent::MotionCompleted { .. } => "motioncompleted",
            DomainEvent::MotionFailed { .. } => "motionfailed",
            DomainEvent::MotionStopped { .. } => "motionstopped",
            DomainEvent::EmergencyStopTriggered => "emergencystoptriggered",
            DomainEvent::PositionUpdated { .. } => "positionupdated",
            DomainEvent::ScanStarted { .. } => "scanstarted",
            DomainEvent::ScanPointAcquired { .. } => "scanpointacquired",
            DomainEvent::ScanProgress { .. } => "scanprogress",
            DomainEvent::ScanPaused { .. } => "scanpaused",
            DomainEvent::ScanResumed { .. } => "scanresumed",
            DomainEvent::ScanCompleted { .. } => "scancompleted",
            DomainEvent::ScanCancelled { .. } => "scancancelled",
            DomainEvent::ScanFailed { .. } => "scanfailed",
        }
    }
}
