//! Application service orchestrating scan lifecycles.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppResult, ScanError};
use crate::events::{InMemoryEventBus, SubscriptionId};
use crate::execution::{FlyScanExecutor, StepScanExecutor};
use crate::hardware::{AcquisitionPort, MotionPort};
use crate::scan::{
    AcquisitionRateCapability, Scan, ScanSnapshot, ScanTrajectory, SharedScan,
};
use crate::service::dto::{FlyScanRequest, StepScanRequest};
use crate::service::output::{attach_scan_presenter, ScanOutputPort};
use crate::settings::EngineSettings;

struct ActiveScan {
    scan: SharedScan,
    worker: Option<tokio::task::JoinHandle<bool>>,
}

/// Front door of the scan engine.
///
/// Parses and validates configuration DTOs, enforces the single-active-scan
/// invariant, hands the aggregate and trajectory to the matching executor on
/// a worker task, and relays pause/resume/cancel requests to the aggregate
/// (the executor acknowledges them at its next safe point and publishes the
/// queued events).
///
/// The service owns the current scan exclusively; other tasks observe it
/// through [`ScanApplicationService::current_scan`] snapshots and through the
/// event stream.
pub struct ScanApplicationService {
    motion_port: Arc<dyn MotionPort>,
    acquisition_port: Arc<dyn AcquisitionPort>,
    bus: Arc<InMemoryEventBus>,
    settings: EngineSettings,
    current: Mutex<Option<ActiveScan>>,
    presentation: Vec<(&'static str, SubscriptionId)>,
}

impl ScanApplicationService {
    /// Create a service over the given ports and bus.
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
            current: Mutex::new(None),
            presentation: Vec::new(),
        }
    }

    /// Attach a presentation sink, wired through the event bus.
    pub fn with_output_port(mut self, output: Arc<dyn ScanOutputPort>) -> Self {
        self.presentation = attach_scan_presenter(&self.bus, output);
        self
    }

    /// Start a step scan from a raw request.
    ///
    /// Returns the new scan id, or an error if the request is invalid or a
    /// scan is already active. Must be called from within a tokio runtime.
    pub fn execute_step_scan(&self, request: &StepScanRequest) -> AppResult<Uuid> {
        let config = request.to_config()?;
        let trajectory = ScanTrajectory::generate(
            &config.scan_zone,
            config.x_nb_points,
            config.y_nb_points,
            config.pattern,
        )?;

        let mut slot = self.current.lock();
        Self::ensure_idle(&slot)?;

        let scan: SharedScan = Arc::new(Mutex::new(Scan::step(config.clone())));
        let scan_id = scan.lock().scan_id();
        let executor = StepScanExecutor::new(
            Arc::clone(&self.motion_port),
            Arc::clone(&self.acquisition_port),
            Arc::clone(&self.bus),
            self.settings.clone(),
        );
        let worker_scan = Arc::clone(&scan);
        let worker = tokio::spawn(async move {
            executor.execute(worker_scan, &trajectory, &config).await
        });
        *slot = Some(ActiveScan {
            scan,
            worker: Some(worker),
        });
        info!(%scan_id, "step scan dispatched");
        Ok(scan_id)
    }

    /// Start a fly scan from a raw request and a measured rate capability.
    ///
    /// Returns the new scan id, or an error if the request is invalid or a
    /// scan is already active. Capability shortfalls are detected by the
    /// executor's pre-flight validation and surface as a `scanfailed` event.
    /// Must be called from within a tokio runtime.
    pub fn execute_fly_scan(
        &self,
        request: &FlyScanRequest,
        capability: AcquisitionRateCapability,
    ) -> AppResult<Uuid> {
        let config = request.to_config()?;
        let trajectory = ScanTrajectory::generate(
            &config.scan_zone,
            config.x_nb_points,
            config.y_nb_points,
            config.pattern,
        )?;

        let mut slot = self.current.lock();
        Self::ensure_idle(&slot)?;

        let scan: SharedScan = Arc::new(Mutex::new(Scan::fly(config.clone())));
        let scan_id = scan.lock().scan_id();
        let executor = FlyScanExecutor::new(
            Arc::clone(&self.motion_port),
            Arc::clone(&self.acquisition_port),
            Arc::clone(&self.bus),
            self.settings.clone(),
        );
        let worker_scan = Arc::clone(&scan);
        let worker = tokio::spawn(async move {
            executor
                .execute(worker_scan, &trajectory, &config, &capability)
                .await
        });
        *slot = Some(ActiveScan {
            scan,
            worker: Some(worker),
        });
        info!(%scan_id, "fly scan dispatched");
        Ok(scan_id)
    }

    /// Pause the active scan; takes effect at the executor's next safe point.
    pub fn pause_scan(&self) -> AppResult<()> {
        self.with_active(|scan| scan.lock().pause())
    }

    /// Resume the paused scan.
    pub fn resume_scan(&self) -> AppResult<()> {
        self.with_active(|scan| scan.lock().resume())
    }

    /// Cancel the active scan; the executor unwinds at its next safe point.
    pub fn cancel_scan(&self) -> AppResult<()> {
        self.with_active(|scan| scan.lock().cancel())
    }

    /// Status snapshot of the current scan, if any.
    pub fn current_scan(&self) -> Option<ScanSnapshot> {
        self.current
            .lock()
            .as_ref()
            .map(|active| active.scan.lock().snapshot())
    }

    /// Wait for the running executor to finish.
    ///
    /// Returns the executor's completion flag, or `None` when no worker is
    /// pending (no scan dispatched, or already awaited).
    pub async fn wait_for_scan_end(&self) -> Option<bool> {
        let worker = self
            .current
            .lock()
            .as_mut()
            .and_then(|active| active.worker.take())?;
        worker.await.ok()
    }

    fn ensure_idle(slot: &Option<ActiveScan>) -> AppResult<()> {
        if let Some(active) = slot {
            if !active.scan.lock().status().is_terminal() {
                return Err(ScanError::ScanInProgress);
            }
        }
        Ok(())
    }

    fn with_active<F>(&self, operation: F) -> AppResult<()>
    where
        F: FnOnce(&SharedScan) -> AppResult<()>,
    {
        let slot = self.current.lock();
        let active = slot.as_ref().ok_or(ScanError::NoActiveScan)?;
        operation(&active.scan)
    }
}

impl Drop for ScanApplicationService {
    fn drop(&mut self) {
        for (event_type, id) in self.presentation.drain(..) {
            self.bus.unsubscribe(event_type, id);
        }
    }
}
