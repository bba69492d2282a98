//! Debounce state machine for noisy digital inputs.
//!
//! A change is accepted only after `threshold` consecutive reads of the new
//! value, each separated by the retry delay. Any read that disagrees
//! with the current candidate restarts confirmation for the value just read,
//! so alternating noise never accumulates confirmations.
//!
//! # States
//!
//! - `Stable(s)`: the accepted level. No timer armed.
//! - `Pending { candidate, count }`: `count` consecutive reads of
//!   `candidate`. Timer armed.
//!
//! # Transitions on a read `v`
//!
//! | State                   | Read           | Next                       | Timer  | Event |
//! |-------------------------|----------------|----------------------------|--------|-------|
//! | `Stable(s)`             | `v == s`       | `Stable(s)`                | -      | -     |
//! | `Stable(s)`             | `v != s`       | `Pending(v, 1)`            | re-arm | -     |
//! | `Pending(p, c)`         | `v != p`       | `Pending(v, 1)`            | re-arm | -     |
//! | `Pending(p, c)`         | `c + 1 < t`    | `Pending(p, c + 1)`        | re-arm | -     |
//! | `Pending(p, c)`         | `c + 1 == t`   | `Stable(p)`                | disarm | `p`   |
//!
//! A read equal to the stable value while pending is a fresh candidate like
//! any other. Confirming it returns the machine to `Stable(s)` silently,
//! since the accepted level never moved. With `threshold == 1` a differing
//! read is accepted immediately.
//!
//! [`Debouncer`] works on any `Copy + Eq` reading. [`DebouncedLine`] drives
//! it with single line levels; the attach/detach hook drives it with the
//! identity of the whole detection sample.
//!
//! # Examples
//!
//! ```
//! use hatline_core::Level;
//! use hatline_events::debounce::Debouncer;
//!
//! let mut machine = Debouncer::new(Level::Low, 3);
//! let events: Vec<_> = [Level::Low, Level::High, Level::High, Level::High, Level::High]
//!     .into_iter()
//!     .filter_map(|v| machine.feed(v).changed)
//!     .collect();
//!
//! assert_eq!(events, vec![Level::High]);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hatline_core::{Level, PinId, Result, config::DebounceConfig};
use hatline_hardware::GpioBackend;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::timer::RetryTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState<T = Level> {
    Stable(T),
    Pending { candidate: T, count: u8 },
}

/// What the driver must do with its retry timer after a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Leave the timer as it is.
    None,
    /// Cancel any pending shot and schedule a fresh one.
    Rearm,
    /// Cancel any pending shot.
    Disarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceStep<T = Level> {
    pub timer: TimerAction,
    /// Newly accepted value, when this read completed a transition.
    pub changed: Option<T>,
}

impl<T> DebounceStep<T> {
    const IDLE: Self = Self {
        timer: TimerAction::None,
        changed: None,
    };

    const REARM: Self = Self {
        timer: TimerAction::Rearm,
        changed: None,
    };
}

#[derive(Debug, Clone)]
pub struct Debouncer<T = Level> {
    stable: T,
    pending: Option<(T, u8)>,
    threshold: u8,
}

impl<T: Copy + Eq> Debouncer<T> {
    /// Start in `Stable(initial)`. A threshold of zero is treated as one.
    #[must_use]
    pub fn new(initial: T, threshold: u8) -> Self {
        Self {
            stable: initial,
            pending: None,
            threshold: threshold.max(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> DebounceState<T> {
        match self.pending {
            None => DebounceState::Stable(self.stable),
            Some((candidate, count)) => DebounceState::Pending { candidate, count },
        }
    }

    /// Last accepted value.
    #[must_use]
    pub fn stable_level(&self) -> T {
        self.stable
    }

    /// Drop any pending candidate, keeping the accepted value.
    pub fn abandon(&mut self) {
        self.pending = None;
    }

    /// Feed one raw read.
    pub fn feed(&mut self, read: T) -> DebounceStep<T> {
        match self.pending {
            None if read == self.stable => DebounceStep::IDLE,
            None => self.confirm(read, 1),
            Some((candidate, _)) if read != candidate => self.confirm(read, 1),
            Some((candidate, count)) => self.confirm(candidate, count.saturating_add(1)),
        }
    }

    fn confirm(&mut self, candidate: T, count: u8) -> DebounceStep<T> {
        if count < self.threshold {
            self.pending = Some((candidate, count));
            return DebounceStep::REARM;
        }

        let changed = (candidate != self.stable).then_some(candidate);
        self.stable = candidate;
        self.pending = None;
        DebounceStep {
            timer: TimerAction::Disarm,
            changed,
        }
    }
}

/// A GPIO line read through a [`Debouncer`].
///
/// Edge interrupts and timer shots both call [`sample`](Self::sample); the
/// line re-arms its own timer until the candidate settles, then reports the
/// accepted level through `on_change`. The machine state is private to the
/// line. Once [`stop`](Self::stop)ped, a line ignores every later sample.
pub struct DebouncedLine<G: GpioBackend> {
    pin: PinId,
    gpio: Arc<G>,
    machine: Mutex<Debouncer>,
    timer: RetryTimer,
    stopped: AtomicBool,
    on_change: Box<dyn Fn(Level) + Send + Sync>,
}

impl<G: GpioBackend> DebouncedLine<G> {
    /// Read the current level as the initial stable value.
    ///
    /// # Errors
    /// Returns `Error::Gpio` if the initial read fails.
    pub fn new<F>(
        pin: PinId,
        gpio: Arc<G>,
        config: &DebounceConfig,
        runtime: Handle,
        on_change: F,
    ) -> Result<Arc<Self>>
    where
        F: Fn(Level) + Send + Sync + 'static,
    {
        let initial = gpio.read_digital(pin)?;
        debug!(
            "Debouncing {} from {} (threshold {}, delay {:?})",
            pin,
            initial,
            config.threshold,
            config.delay()
        );

        Ok(Arc::new(Self {
            pin,
            gpio,
            machine: Mutex::new(Debouncer::new(initial, config.threshold)),
            timer: RetryTimer::new(runtime, config.delay()),
            stopped: AtomicBool::new(false),
            on_change: Box::new(on_change),
        }))
    }

    #[must_use]
    pub fn pin(&self) -> PinId {
        self.pin
    }

    #[must_use]
    pub fn state(&self) -> DebounceState<Level> {
        self.machine.lock().state()
    }

    #[must_use]
    pub fn is_timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    /// Read the line once and advance the machine.
    ///
    /// Never fails: a failed read is logged and the step is skipped, leaving
    /// any armed timer to retry.
    pub fn sample(self: &Arc<Self>) {
        if self.is_stopped() {
            return;
        }
        let read = match self.gpio.read_digital(self.pin) {
            Ok(level) => level,
            Err(e) => {
                warn!("Debounce read on {} failed: {}", self.pin, e);
                return;
            }
        };

        // Timer actions happen under the machine lock so a concurrent edge
        // or `stop` cannot interleave with this one.
        let changed = {
            let mut machine = self.machine.lock();
            if self.is_stopped() {
                return;
            }
            let step = machine.feed(read);
            trace!("{} read {} -> {:?}", self.pin, read, machine.state());

            match step.timer {
                TimerAction::Rearm => {
                    let line = Arc::clone(self);
                    self.timer.arm(move || line.sample());
                }
                TimerAction::Disarm => self.timer.disarm(),
                TimerAction::None => {}
            }
            step.changed
        };

        if let Some(level) = changed {
            debug!("{} settled {}", self.pin, level);
            (self.on_change)(level);
        }
    }

    /// Stop sampling for good and disarm the retry timer.
    ///
    /// A sample already in flight on another thread finishes without
    /// re-arming or reporting.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _machine = self.machine.lock();
        self.timer.disarm();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
