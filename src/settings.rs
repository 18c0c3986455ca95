//! Engine tunables, loaded from a TOML file and environment variables.
//!
//! Settings are loaded from (in increasing precedence):
//! 1. Built-in defaults
//! 2. `efield_daq.toml` (or an explicit path)
//! 3. Environment variables prefixed with `EFIELD_DAQ_`

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, ScanError};
use crate::validation::require_positive;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "efield_daq.toml";

/// Tunables of the scan executors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Upper bound on waiting for a motion-done signal, in seconds.
    #[serde(default = "default_motion_wait_timeout_s")]
    pub motion_wait_timeout_s: f64,
    /// Granularity of the pause busy-wait, in milliseconds.
    #[serde(default = "default_pause_poll_ms")]
    pub pause_poll_ms: u64,
    /// How often the fly-scan executor drains streamed samples, in
    /// milliseconds.
    #[serde(default = "default_drain_interval_ms")]
    pub drain_interval_ms: u64,
    /// Coefficient of variation of the measured acquisition rate above which
    /// fly-scan pre-flight logs a warning.
    #[serde(default = "default_rate_cv_warn_threshold")]
    pub rate_cv_warn_threshold: f64,
}

fn default_motion_wait_timeout_s() -> f64 {
    30.0
}

fn default_pause_poll_ms() -> u64 {
    100
}

fn default_drain_interval_ms() -> u64 {
    10
}

fn default_rate_cv_warn_threshold() -> f64 {
    0.05
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            motion_wait_timeout_s: default_motion_wait_timeout_s(),
            pause_poll_ms: default_pause_poll_ms(),
            drain_interval_ms: default_drain_interval_ms(),
            rate_cv_warn_threshold: default_rate_cv_warn_threshold(),
        }
    }
}

impl EngineSettings {
    /// Load settings from `efield_daq.toml` and the environment.
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_SETTINGS_FILE)
    }

    /// Load settings from a specific TOML file and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let settings: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("EFIELD_DAQ_"))
            .extract()
            .map_err(|e| ScanError::ConfigInvalid(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate that every tunable is usable.
    pub fn validate(&self) -> AppResult<()> {
        require_positive("motion_wait_timeout_s", self.motion_wait_timeout_s)?;
        require_positive("pause_poll_ms", self.pause_poll_ms as f64)?;
        require_positive("drain_interval_ms", self.drain_interval_ms as f64)?;
        require_positive("rate_cv_warn_threshold", self.rate_cv_warn_threshold)?;
        Ok(())
    }

    /// Motion-wait timeout as a `Duration`.
    pub fn motion_wait_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.motion_wait_timeout_s)
    }

    /// Pause-poll interval as a `Duration`.
    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }

    /// Sample-drain interval as a `Duration`.
    pub fn drain_interval(&self) -> Duration {
        Duration::from_millis(self.drain_interval_ms)
    }
}
