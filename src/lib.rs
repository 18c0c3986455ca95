//! # Electric-Field Imaging Bench Controller
//!
//! This crate is the acquisition controller for a 2D electric-field imaging
//! bench: a motorized XY stage carries a three-axis field probe over a
//! specimen while an excitation source drives the field and an ADC chain
//! digitizes demodulated in-phase/quadrature samples. The crate orchestrates
//! the two scan strategies of the bench — step scans (stop, measure, move) and
//! fly scans (acquire during continuous motion) — on top of an in-process
//! event fabric that connects motion hardware, acquisition hardware, and
//! presentation collaborators.
//!
//! ## Crate Structure
//!
//! - **`events`**: The typed in-process event bus and the domain events that
//!   flow over it (motion lifecycle, scan lifecycle, per-point acquisitions).
//! - **`scan`**: Scan value objects (positions, zones, grids, measurements),
//!   the `Scan` aggregate with its lifecycle state machine, and trajectory
//!   generation over the scan grid.
//! - **`motion`**: Trapezoidal motion profiles, atomic motion segments with
//!   velocity integration and predicted sample positions, and the
//!   user-driven `MotionControlService` with target chaining.
//! - **`hardware`**: The `MotionPort` and `AcquisitionPort` traits that
//!   hardware adapters implement, plus simulated implementations for
//!   development and testing.
//! - **`execution`**: The step-scan and fly-scan executors that drive a scan
//!   against the ports, synchronized through motion events.
//! - **`service`**: The `ScanApplicationService` front door (one scan at a
//!   time, DTO validation, worker-task dispatch) and the output ports through
//!   which lifecycle changes are presented.
//! - **`settings`**: Engine tunables loaded from TOML files and environment
//!   variables.
//! - **`telemetry`**: Structured logging initialization.
//! - **`error`**: The crate-wide `ScanError` type.
//! - **`validation`**: Shared numeric validation helpers.

pub mod error;
pub mod events;
pub mod execution;
pub mod hardware;
pub mod motion;
pub mod scan;
pub mod service;
pub mod settings;
pub mod telemetry;
pub mod validation;
