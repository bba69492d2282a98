//! Single-shot retry timer.
//!
//! A [`RetryTimer`] is either disarmed or armed for one fixed delay. Arming
//! an armed timer cancels the pending shot and replaces it; shots never
//! stack. The timer can be armed from any thread, including interrupt
//! context, because it spawns onto a stored runtime handle.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub struct RetryTimer {
    runtime: Handle,
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl RetryTimer {
    pub fn new(runtime: Handle, delay: Duration) -> Self {
        Self {
            runtime,
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Run `task` once after the delay, cancelling any pending shot.
    pub fn arm<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = self.delay;
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        }));
    }

    /// Cancel the pending shot, if any.
    pub fn disarm(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
