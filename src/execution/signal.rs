//! Motion-completion signal shared between bus handlers and the executor.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Notify;

/// Flag-plus-notify signal the executor blocks on while a move is in flight.
///
/// Bus handlers run on the publishing (hardware) task and record outcomes
/// keyed by motion id; the executor task consumes them. Keying by id makes
/// the signal robust against a completion that is published before the
/// executor has recorded the pending id (instant mock moves do this).
#[derive(Default)]
pub(crate) struct MotionWait {
    state: Mutex<WaitState>,
    notify: Notify,
}

#[derive(Default)]
struct WaitState {
    /// Completed motions: id mapped to `None` (success) or the error text.
    outcomes: HashMap<String, Option<String>>,
    emergency: bool,
}

impl MotionWait {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record the completion (or failure) of a motion and wake the waiter.
    pub(crate) fn record_outcome(&self, motion_id: &str, error: Option<String>) {
        self.state.lock().outcomes.insert(motion_id.to_string(), error);
        self.notify.notify_waiters();
    }

    /// Record an emergency stop and wake the waiter.
    pub(crate) fn record_emergency(&self) {
        self.state.lock().emergency = true;
        self.notify.notify_waiters();
    }

    /// Whether an emergency stop was observed during this run.
    pub(crate) fn emergency_seen(&self) -> bool {
        self.state.lock().emergency
    }

    /// Consume the outcome recorded for `motion_id`, if any.
    ///
    /// `Some(None)` is a successful completion; `Some(Some(error))` a failure.
    pub(crate) fn take_outcome(&self, motion_id: &str) -> Option<Option<String>> {
        self.state.lock().outcomes.remove(motion_id)
    }

    /// Sleep until the next wake-up or for `timeout`, whichever comes first.
    pub(crate) async fn notified_within(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.notify.notified()).await;
    }
}
