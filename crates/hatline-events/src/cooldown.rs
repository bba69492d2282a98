//! Rate limiter for the power button.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Drops events that arrive within `window` of the last accepted one,
/// including one landing exactly on the boundary.
///
/// The first event is always accepted. Suppressed events do not extend the
/// window.
#[derive(Debug)]
pub struct Cooldown {
    window: Duration,
    last: Mutex<Option<Instant>>,
}

impl Cooldown {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
        }
    }

    /// Returns `true` if the event should be dispatched, recording it.
    pub fn try_fire(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock();
        match *last {
            Some(previous) if now.duration_since(previous) <= self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Forget the last accepted event.
    pub fn reset(&self) {
        *self.last.lock() = None;
    }
}
