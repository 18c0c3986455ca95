//! Scan lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a scan aggregate.
///
/// # State Machine
///
/// ```text
/// Created ──start──> Running ──complete──> Completed
///                      │   ▲
///                 pause│   │resume
///                      ▼   │
///                     Paused
///
/// Running | Paused ──cancel──> Cancelled
/// Running | Paused ──fail────> Failed
/// ```
///
/// `Completed`, `Cancelled` and `Failed` are terminal: a terminal scan
/// accepts no further mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanStatus {
    /// Constructed, not yet started.
    Created,
    /// Actively executing.
    Running,
    /// Suspended at a safe point; can be resumed.
    Paused,
    /// All points acquired.
    Completed,
    /// Stopped on operator request or emergency stop.
    Cancelled,
    /// Stopped on an unrecoverable error.
    Failed,
}

impl ScanStatus {
    /// Whether the scan can accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Cancelled | ScanStatus::Failed
        )
    }

    /// Whether a pause request is legal in this state.
    pub fn can_pause(&self) -> bool {
        matches!(self, ScanStatus::Running)
    }

    /// Whether a resume request is legal in this state.
    pub fn can_resume(&self) -> bool {
        matches!(self, ScanStatus::Paused)
    }

    /// Whether a cancel request is legal in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, ScanStatus::Running | ScanStatus::Paused)
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Created => write!(f, "Created"),
            ScanStatus::Running => write!(f, "Running"),
            ScanStatus::Paused => write!(f, "Paused"),
            ScanStatus::Completed => write!(f, "Completed"),
            ScanStatus::Cancelled => write!(f, "Cancelled"),
            ScanStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_set() {
        assert!(!ScanStatus::Created.is_terminal());
        assert!(!ScanStatus::Running.is_terminal());
        assert!(!ScanStatus::Paused.is_terminal());
        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Cancelled.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
    }

    #[test]
    fn pause_resume_legality() {
        assert!(ScanStatus::Running.can_pause());
        assert!(!ScanStatus::Paused.can_pause());
        assert!(ScanStatus::Paused.can_resume());
        assert!(!ScanStatus::Running.can_resume());
        assert!(ScanStatus::Paused.can_cancel());
        assert!(!ScanStatus::Completed.can_cancel());
    }
}
