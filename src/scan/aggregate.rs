//! The scan aggregate: identity, lifecycle state machine, point accumulation.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppResult, ScanError};
use crate::events::DomainEvent;
use crate::scan::{FlyScanConfig, ScanConfig, ScanPointResult, ScanStatus, StepScanConfig};

/// Which scan strategy an aggregate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    /// Stop-measure-move over the grid; exactly `expected_points` results.
    Step,
    /// Continuous motion; the real sample count is motion-derived and may
    /// exceed the grid estimate.
    Fly,
}

/// Shared handle to a scan.
///
/// The executor holds exclusive mutation rights for the duration of a run;
/// the application service only performs the short status transitions
/// (pause/resume/cancel). Every critical section is a handful of field
/// accesses, so a plain mutex is sufficient.
pub type SharedScan = Arc<Mutex<Scan>>;

/// Immutable status view handed to readers outside the executor task.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSnapshot {
    /// Scan identity.
    pub scan_id: Uuid,
    /// Lifecycle state at snapshot time.
    pub status: ScanStatus,
    /// Number of points recorded so far.
    pub points_acquired: usize,
    /// Grid-point estimate of the total.
    pub expected_points: usize,
    /// Failure reason, if the scan failed.
    pub failure_reason: Option<String>,
}

/// A single 2D scan: one step scan or one fly scan.
///
/// The aggregate owns its lifecycle state machine and its ordered point list,
/// and queues one domain event per state transition in an internal outbox.
/// Callers drain the outbox with [`Scan::drain_events`] after each mutation
/// and publish the events themselves; the aggregate never touches the bus.
#[derive(Debug)]
pub struct Scan {
    scan_id: Uuid,
    kind: ScanKind,
    config: ScanConfig,
    status: ScanStatus,
    points: Vec<ScanPointResult>,
    expected_points: usize,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    outbox: Vec<DomainEvent>,
}

impl Scan {
    /// Create a step scan in the `Created` state.
    pub fn step(config: StepScanConfig) -> Self {
        let expected_points = config.total_points();
        Self::new(ScanKind::Step, ScanConfig::Step(config), expected_points)
    }

    /// Create a fly scan in the `Created` state.
    pub fn fly(config: FlyScanConfig) -> Self {
        let expected_points = config.total_points();
        Self::new(ScanKind::Fly, ScanConfig::Fly(config), expected_points)
    }

    fn new(kind: ScanKind, config: ScanConfig, expected_points: usize) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            kind,
            config,
            status: ScanStatus::Created,
            points: Vec::new(),
            expected_points,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            failure_reason: None,
            outbox: Vec::new(),
        }
    }

    /// Scan identity.
    pub fn scan_id(&self) -> Uuid {
        self.scan_id
    }

    /// Scan strategy.
    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    /// The configuration the scan was built from.
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn status(&self) -> ScanStatus {
        self.status
    }

    /// Points recorded so far, in acquisition order.
    pub fn points(&self) -> &[ScanPointResult] {
        &self.points
    }

    /// Grid-point estimate of the total point count.
    pub fn expected_points(&self) -> usize {
        self.expected_points
    }

    /// Creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Start timestamp, if the scan has started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// End timestamp, once the scan reached a terminal state.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Failure reason, if the scan failed.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Immutable status view for readers outside the executor task.
    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            scan_id: self.scan_id,
            status: self.status,
            points_acquired: self.points.len(),
            expected_points: self.expected_points,
            failure_reason: self.failure_reason.clone(),
        }
    }

    /// Return and clear the queued domain events.
    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Transition `Created -> Running`.
    pub fn start(&mut self) -> AppResult<()> {
        if self.status != ScanStatus::Created {
            return Err(self.rejected("start"));
        }
        self.status = ScanStatus::Running;
        self.started_at = Some(Utc::now());
        self.outbox.push(DomainEvent::ScanStarted {
            scan_id: self.scan_id,
            config: self.config.clone(),
        });
        Ok(())
    }

    /// Transition `Running -> Paused`.
    pub fn pause(&mut self) -> AppResult<()> {
        if !self.status.can_pause() {
            return Err(self.rejected("pause"));
        }
        self.status = ScanStatus::Paused;
        self.outbox.push(DomainEvent::ScanPaused {
            scan_id: self.scan_id,
            current_point_index: self.points.len(),
        });
        Ok(())
    }

    /// Transition `Paused -> Running`.
    pub fn resume(&mut self) -> AppResult<()> {
        if !self.status.can_resume() {
            return Err(self.rejected("resume"));
        }
        self.status = ScanStatus::Running;
        self.outbox.push(DomainEvent::ScanResumed {
            scan_id: self.scan_id,
            resume_from_point_index: self.points.len(),
        });
        Ok(())
    }

    /// Transition `Running | Paused -> Cancelled`.
    pub fn cancel(&mut self) -> AppResult<()> {
        if !self.status.can_cancel() {
            return Err(self.rejected("cancel"));
        }
        self.status = ScanStatus::Cancelled;
        self.ended_at = Some(Utc::now());
        self.outbox.push(DomainEvent::ScanCancelled {
            scan_id: self.scan_id,
        });
        Ok(())
    }

    /// Transition `Running -> Completed`.
    pub fn complete(&mut self) -> AppResult<()> {
        if self.status != ScanStatus::Running {
            return Err(self.rejected("complete"));
        }
        self.finish_completed();
        Ok(())
    }

    /// Transition `Running | Paused -> Failed` with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) -> AppResult<()> {
        if self.status.is_terminal() || self.status == ScanStatus::Created {
            return Err(self.rejected("fail"));
        }
        let reason = reason.into();
        self.status = ScanStatus::Failed;
        self.ended_at = Some(Utc::now());
        self.failure_reason = Some(reason.clone());
        self.outbox.push(DomainEvent::ScanFailed {
            scan_id: self.scan_id,
            reason,
        });
        Ok(())
    }

    /// Record one point result while running.
    ///
    /// Step scans accept at most `expected_points` results and auto-complete
    /// when the last one arrives. Fly scans accept any number of results (the
    /// real count is motion-derived) and are completed explicitly by their
    /// executor.
    pub fn add_point(&mut self, result: ScanPointResult) -> AppResult<()> {
        if self.status != ScanStatus::Running {
            return Err(self.rejected("add_point"));
        }
        if self.kind == ScanKind::Step && self.points.len() >= self.expected_points {
            return Err(ScanError::InvalidStateTransition(format!(
                "step scan already holds all {} points",
                self.expected_points
            )));
        }

        self.outbox.push(DomainEvent::ScanPointAcquired {
            scan_id: self.scan_id,
            position: result.position,
            measurement: result.measurement,
            point_index: result.point_index,
        });
        self.points.push(result);
        self.outbox.push(DomainEvent::ScanProgress {
            scan_id: self.scan_id,
            current: self.points.len(),
            total: self.expected_points,
        });

        if self.kind == ScanKind::Step && self.points.len() == self.expected_points {
            self.finish_completed();
        }
        Ok(())
    }

    fn finish_completed(&mut self) {
        self.status = ScanStatus::Completed;
        self.ended_at = Some(Utc::now());
        self.outbox.push(DomainEvent::ScanCompleted {
            scan_id: self.scan_id,
            total_points: self.points.len(),
        });
    }

    fn rejected(&self, action: &str) -> ScanError {
        ScanError::InvalidStateTransition(format!(
            "cannot {action} scan {} from state {}",
            self.scan_id, self.status
        ))
    }
}
