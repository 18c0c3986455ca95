//! Scan configuration value objects.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{AppResult, ScanError};
use crate::motion::MotionProfile;
use crate::scan::Position2D;
use crate::validation::{require_at_least, require_finite, require_positive};

/// Rectangular region of the stage covered by a scan, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanZone {
    /// Lower X bound in mm.
    pub x_min: f64,
    /// Upper X bound in mm.
    pub x_max: f64,
    /// Lower Y bound in mm.
    pub y_min: f64,
    /// Upper Y bound in mm.
    pub y_max: f64,
}

impl ScanZone {
    /// Create a zone, validating finiteness and strict ordering of bounds.
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> AppResult<Self> {
        let zone = Self {
            x_min,
            x_max,
            y_min,
            y_max,
        };
        zone.validate()?;
        Ok(zone)
    }

    /// Validate the zone invariants (`x_min < x_max`, `y_min < y_max`).
    pub fn validate(&self) -> AppResult<()> {
        require_finite("x_min", self.x_min)?;
        require_finite("x_max", self.x_max)?;
        require_finite("y_min", self.y_min)?;
        require_finite("y_max", self.y_max)?;
        if self.x_min >= self.x_max {
            return Err(ScanError::ConfigInvalid(format!(
                "x_min ({}) must be below x_max ({})",
                self.x_min, self.x_max
            )));
        }
        if self.y_min >= self.y_max {
            return Err(ScanError::ConfigInvalid(format!(
                "y_min ({}) must be below y_max ({})",
                self.y_min, self.y_max
            )));
        }
        Ok(())
    }

    /// Zone width in mm.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Zone height in mm.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Whether a position lies inside the closed zone, within `tolerance` mm.
    pub fn contains(&self, position: &Position2D, tolerance: f64) -> bool {
        position.x >= self.x_min - tolerance
            && position.x <= self.x_max + tolerance
            && position.y >= self.y_min - tolerance
            && position.y <= self.y_max + tolerance
    }
}

/// Order in which the grid points of a scan zone are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanPattern {
    /// Every row left to right, rows bottom to top.
    Raster,
    /// Alternating row direction; saves the long traverse between rows.
    Serpentine,
    /// Column-major: Y is the fast axis, X the slow axis.
    Comb,
}

impl FromStr for ScanPattern {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RASTER" => Ok(ScanPattern::Raster),
            "SERPENTINE" => Ok(ScanPattern::Serpentine),
            "COMB" => Ok(ScanPattern::Comb),
            other => Err(ScanError::ConfigInvalid(format!(
                "unknown scan pattern '{other}' (expected RASTER, SERPENTINE or COMB)"
            ))),
        }
    }
}

impl std::fmt::Display for ScanPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanPattern::Raster => write!(f, "RASTER"),
            ScanPattern::Serpentine => write!(f, "SERPENTINE"),
            ScanPattern::Comb => write!(f, "COMB"),
        }
    }
}

/// Configuration of a step scan (full stop at every grid point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepScanConfig {
    /// Region covered by the scan.
    pub scan_zone: ScanZone,
    /// Number of grid columns (at least 2).
    pub x_nb_points: usize,
    /// Number of grid rows (at least 2).
    pub y_nb_points: usize,
    /// Visit order over the grid.
    pub pattern: ScanPattern,
    /// Settling time after each arrival before acquiring, in ms.
    pub stabilization_delay_ms: u64,
    /// Number of samples averaged at each position (at least 1).
    pub averaging_per_position: usize,
    /// Optional stage speed override for the inter-point moves, in mm/s.
    pub motion_speed_mm_s: Option<f64>,
}

impl StepScanConfig {
    /// Validate all invariants of the configuration.
    pub fn validate(&self) -> AppResult<()> {
        self.scan_zone.validate()?;
        require_at_least("x_nb_points", self.x_nb_points, 2)?;
        require_at_least("y_nb_points", self.y_nb_points, 2)?;
        require_at_least("averaging_per_position", self.averaging_per_position, 1)?;
        if let Some(speed) = self.motion_speed_mm_s {
            require_positive("motion_speed_mm_s", speed)?;
        }
        Ok(())
    }

    /// Number of grid points visited by the scan.
    pub fn total_points(&self) -> usize {
        self.x_nb_points * self.y_nb_points
    }
}

/// Configuration of a fly scan (acquisition during continuous motion).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlyScanConfig {
    /// Region covered by the scan.
    pub scan_zone: ScanZone,
    /// Number of grid columns (at least 2).
    pub x_nb_points: usize,
    /// Number of grid rows (at least 2).
    pub y_nb_points: usize,
    /// Visit order over the grid.
    pub pattern: ScanPattern,
    /// Velocity profile shared by every motion segment.
    pub motion_profile: MotionProfile,
    /// Acquisition rate requested by the operator, in Hz.
    pub desired_acquisition_rate_hz: f64,
    /// Largest acceptable distance between consecutive samples, in mm.
    pub max_spatial_gap_mm: f64,
}

impl FlyScanConfig {
    /// Validate all invariants of the configuration.
    pub fn validate(&self) -> AppResult<()> {
        self.scan_zone.validate()?;
        require_at_least("x_nb_points", self.x_nb_points, 2)?;
        require_at_least("y_nb_points", self.y_nb_points, 2)?;
        self.motion_profile.validate()?;
        require_positive(
            "desired_acquisition_rate_hz",
            self.desired_acquisition_rate_hz,
        )?;
        require_positive("max_spatial_gap_mm", self.max_spatial_gap_mm)?;
        Ok(())
    }

    /// Grid-point count; a lower estimate of the real sample count.
    pub fn total_points(&self) -> usize {
        self.x_nb_points * self.y_nb_points
    }

    /// Acquisition rate needed to honor `max_spatial_gap_mm` at cruise speed.
    pub fn required_rate_hz(&self) -> f64 {
        self.motion_profile.target_speed / self.max_spatial_gap_mm
    }
}

/// Configuration carried by a scan aggregate, step or fly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum ScanConfig {
    /// Step-scan configuration.
    Step(StepScanConfig),
    /// Fly-scan configuration.
    Fly(FlyScanConfig),
}

impl ScanConfig {
    /// Grid-point count of the underlying configuration.
    pub fn total_points(&self) -> usize {
        match self {
            ScanConfig::Step(config) => config.total_points(),
            ScanConfig::Fly(config) => config.total_points(),
        }
    }

    /// Zone of the underlying configuration.
    pub fn scan_zone(&self) -> &ScanZone {
        match self {
            ScanConfig::Step(config) => &config.scan_zone,
            ScanConfig::Fly(config) => &config.scan_zone,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> ScanZone {
        ScanZone {
            x_min: 0.0,
            x_max: 10.0,
            y_min: 0.0,
            y_max: 10.0,
        }
    }

    #[test]
    fn zone_rejects_inverted_bounds() {
        assert!(ScanZone::new(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(ScanZone::new(0.0, 10.0, 5.0, 5.0).is_err());
        assert!(ScanZone::new(0.0, f64::NAN, 0.0, 1.0).is_err());
    }

    #[test]
    fn zone_contains_with_tolerance() {
        let zone = zone();
        assert!(zone.contains(&Position2D::new(0.0, 10.0), 0.0));
        assert!(!zone.contains(&Position2D::new(10.1, 5.0), 0.0));
        assert!(zone.contains(&Position2D::new(10.1, 5.0), 0.2));
    }

    #[test]
    fn pattern_parsing_is_case_insensitive() {
        assert_eq!(
            "serpentine".parse::<ScanPattern>().ok(),
            Some(ScanPattern::Serpentine)
        );
        assert_eq!("COMB".parse::<ScanPattern>().ok(), Some(ScanPattern::Comb));
        assert!("spiral".parse::<ScanPattern>().is_err());
    }

    #[test]
    fn step_config_validates_grid_size() {
        let config = StepScanConfig {
            scan_zone: zone(),
            x_nb_points: 1,
            y_nb_points: 3,
            pattern: ScanPattern::Raster,
            stabilization_delay_ms: 0,
            averaging_per_position: 1,
            motion_speed_mm_s: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fly_config_required_rate() {
        let config = FlyScanConfig {
            scan_zone: zone(),
            x_nb_points: 3,
            y_nb_points: 3,
            pattern: ScanPattern::Serpentine,
            motion_profile: MotionProfile {
                min_speed: 1.0,
                target_speed: 10.0,
                acceleration: 5.0,
                deceleration: 5.0,
            },
            desired_acquisition_rate_hz: 100.0,
            max_spatial_gap_mm: 0.5,
        };
        assert!(config.validate().is_ok());
        assert!((config.required_rate_hz() - 20.0).abs() < 1e-12);
    }
}
