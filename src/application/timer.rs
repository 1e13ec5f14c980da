//! Scoped ownership of a scheduled timer.

use crate::application::ports::{TimerId, TimerQueue, TimerTask};
use std::sync::Arc;
use std::time::Duration;

/// Owns one outstanding timer in a [`TimerQueue`].
///
/// The timer is acquired by [`TimerGuard::schedule`] and released exactly once:
/// by [`release`](Self::release) after it fired, or by cancelling it on
/// [`cancel`](Self::cancel) or drop. Replacing a guard therefore cancels the
/// timer it held.
#[derive(Debug)]
#[must_use = "dropping a TimerGuard cancels its timer"]
pub struct TimerGuard {
    queue: Arc<dyn TimerQueue>,
    id: TimerId,
    armed: bool,
}

impl TimerGuard {
    /// Schedule `task` on `queue` after `delay`.
    pub fn schedule(queue: &Arc<dyn TimerQueue>, delay: Duration, task: TimerTask) -> Self {
        let id = queue.schedule(delay, task);
        Self {
            queue: Arc::clone(queue),
            id,
            armed: true,
        }
    }

    /// Id of the owned timer.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Give up ownership of a timer that already fired.
    pub fn release(mut self) {
        self.armed = false;
    }

    /// Cancel the timer now.
    ///
    /// Returns `true` if it had not fired yet.
    pub fn cancel(mut self) -> bool {
        self.armed = false;
        self.queue.cancel(self.id)
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if self.armed {
            self.queue.cancel(self.id);
        }
    }
}
