//! Custom error types for the scan engine.
//!
//! `ScanError` consolidates every failure class that can surface from the
//! core: configuration problems caught at the service boundary, capability
//! shortfalls detected by fly-scan pre-flight validation, motion and
//! acquisition faults observed during execution, and state-machine violations
//! on the scan aggregate. Executors convert each of these into a terminal scan
//! state plus a `scanfailed` (or `scancancelled`) event; the application
//! service surfaces them to its caller as `Result`s.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, ScanError>;

/// Crate-wide error taxonomy.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Malformed configuration DTO: bad bounds, grid below 2x2, non-finite
    /// coordinates, unknown pattern name. Never reaches an executor.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Fly-scan pre-flight validation failed; no motion was issued.
    #[error("Acquisition capability insufficient: {0}")]
    CapabilityInsufficient(String),

    /// The motion-done signal was not received within the configured bound.
    #[error("Motion timeout after {0:.1}s")]
    MotionTimeout(f64),

    /// A `motionfailed` event was observed for the pending motion id.
    #[error("Motion hardware failed: {0}")]
    MotionHardwareFailed(String),

    /// An `emergencystoptriggered` event was observed.
    #[error("Emergency stop triggered")]
    EmergencyStop,

    /// The acquisition port returned an error.
    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    /// The scan aggregate rejected a mutation. Indicates an executor bug; the
    /// attempted transition is carried in the message.
    #[error("Invalid scan state transition: {0}")]
    InvalidStateTransition(String),

    /// A scan is already active; at most one scan runs at a time.
    #[error("A scan is already in progress")]
    ScanInProgress,

    /// An operation required an active scan but none exists.
    #[error("No scan is currently active")]
    NoActiveScan,
}
