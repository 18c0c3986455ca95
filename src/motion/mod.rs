//! Motion domain: velocity profiles, atomic segments, user-driven control.

mod atomic;
mod control;
mod profile;

pub use atomic::{AtomicMotion, MotionState};
pub use control::{monitor_position, MotionControlService, MotionOutputPort};
pub use profile::MotionProfile;
