//! Shared validation helpers for configuration values.
//!
//! These functions normalize the error messages produced when a scan or
//! motion configuration is rejected, so every boundary (DTO parsing, value
//! object constructors, settings loading) reports problems the same way.

use crate::error::{AppResult, ScanError};

/// Validates that a floating-point value is finite (not NaN or infinite).
pub fn require_finite(name: &str, value: f64) -> AppResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ScanError::ConfigInvalid(format!(
            "{name} must be finite, got {value}"
        )))
    }
}

/// Validates that a value is finite and strictly positive.
pub fn require_positive(name: &str, value: f64) -> AppResult<()> {
    require_finite(name, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ScanError::ConfigInvalid(format!(
            "{name} must be strictly positive, got {value}"
        )))
    }
}

/// Validates that a value is finite and not negative.
pub fn require_non_negative(name: &str, value: f64) -> AppResult<()> {
    require_finite(name, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ScanError::ConfigInvalid(format!(
            "{name} must not be negative, got {value}"
        )))
    }
}

/// Validates that an integer count is at least `min`.
pub fn require_at_least(name: &str, value: usize, min: usize) -> AppResult<()> {
    if value >= min {
        Ok(())
    } else {
        Err(ScanError::ConfigInvalid(format!(
            "{name} must be at least {min}, got {value}"
        )))
    }
}
