//! Configuration DTOs carried across the service boundary.
//!
//! Boundary payloads carry raw numbers and enum names as plain strings; the
//! application service parses and validates them into the typed scan
//! configurations before anything reaches an executor.

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::motion::MotionProfile;
use crate::scan::{FlyScanConfig, ScanZone, StepScanConfig};

fn default_averaging() -> usize {
    1
}

/// Raw step-scan request as received from a UI panel or remote caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepScanRequest {
    /// Lower X bound of the scan zone, in mm.
    pub x_min: f64,
    /// Upper X bound of the scan zone, in mm.
    pub x_max: f64,
    /// Lower Y bound of the scan zone, in mm.
    pub y_min: f64,
    /// Upper Y bound of the scan zone, in mm.
    pub y_max: f64,
    /// Number of grid columns.
    pub x_nb_points: usize,
    /// Number of grid rows.
    pub y_nb_points: usize,
    /// Pattern name: `RASTER`, `SERPENTINE` or `COMB` (case-insensitive).
    pub scan_pattern: String,
    /// Settling time after each arrival, in ms.
    #[serde(default)]
    pub stabilization_delay_ms: u64,
    /// Samples averaged per position.
    #[serde(default = "default_averaging")]
    pub averaging_per_position: usize,
    /// Optional stage speed override for inter-point moves, in mm/s.
    #[serde(default)]
    pub motion_speed_mm_s: Option<f64>,
}

impl StepScanRequest {
    /// Parse and validate into a typed configuration.
    pub fn to_config(&self) -> AppResult<StepScanConfig> {
        let config = StepScanConfig {
            scan_zone: ScanZone::new(self.x_min, self.x_max, self.y_min, self.y_max)?,
            x_nb_points: self.x_nb_points,
            y_nb_points: self.y_nb_points,
            pattern: self.scan_pattern.parse()?,
            stabilization_delay_ms: self.stabilization_delay_ms,
            averaging_per_position: self.averaging_per_position,
            motion_speed_mm_s: self.motion_speed_mm_s,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Raw fly-scan request as received from a UI panel or remote caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlyScanRequest {
    /// Lower X bound of the scan zone, in mm.
    pub x_min: f64,
    /// Upper X bound of the scan zone, in mm.
    pub x_max: f64,
    /// Lower Y bound of the scan zone, in mm.
    pub y_min: f64,
    /// Upper Y bound of the scan zone, in mm.
    pub y_max: f64,
    /// Number of grid columns.
    pub x_nb_points: usize,
    /// Number of grid rows.
    pub y_nb_points: usize,
    /// Pattern name: `RASTER`, `SERPENTINE` or `COMB` (case-insensitive).
    pub scan_pattern: String,
    /// Profile start/end speed, in mm/s.
    pub min_speed_mm_s: f64,
    /// Profile cruise speed, in mm/s.
    pub target_speed_mm_s: f64,
    /// Profile ramp-up rate, in mm/s².
    pub acceleration_mm_s2: f64,
    /// Profile ramp-down rate, in mm/s².
    pub deceleration_mm_s2: f64,
    /// Requested acquisition rate, in Hz.
    pub desired_acquisition_rate_hz: f64,
    /// Largest acceptable gap between samples, in mm.
    pub max_spatial_gap_mm: f64,
}

impl FlyScanRequest {
    /// Parse and validate into a typed configuration.
    pub fn to_config(&self) -> AppResult<FlyScanConfig> {
        let config = FlyScanConfig {
            scan_zone: ScanZone::new(self.x_min, self.x_max, self.y_min, self.y_max)?,
            x_nb_points: self.x_nb_points,
            y_nb_points: self.y_nb_points,
            pattern: self.scan_pattern.parse()?,
            motion_profile: MotionProfile::new(
                self.min_speed_mm_s,
                self.target_speed_mm_s,
                self.acceleration_mm_s2,
                self.deceleration_mm_s2,
            )?,
            desired_acquisition_rate_hz: self.desired_acquisition_rate_hz,
            max_spatial_gap_mm: self.max_spatial_gap_mm,
        };
        config.validate()?;
        Ok(config)
    }
}
