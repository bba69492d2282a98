//! Mock GPIO implementation for testing and simulation.
//!
//! Lines idle at their pull default until a test drives them. Driving a
//! line through [`MockGpioHandle`] runs any matching interrupt hook
//! synchronously on the caller's thread, the way a hardware edge would
//! preempt the application.
//!
//! Clearing a hook waits for a run of it that is in progress on another
//! thread, as a real backend joins its poll thread. Clearing a hook from
//! inside its own run returns at once.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hatline_core::{Edge, Level, PinId, PinSample, Pull, constants::DETECTION_LINES};
use parking_lot::Mutex;
use tracing::trace;

use crate::{
    HardwareError, Result,
    traits::{GpioBackend, InterruptHandler},
};

#[derive(Debug, Clone, Copy, Default)]
struct LineState {
    pull: Option<Pull>,
    driven: Option<Level>,
    failing: bool,
}

impl LineState {
    fn level(&self) -> Level {
        match (self.driven, self.pull) {
            (Some(level), _) => level,
            (None, Some(Pull::Up)) => Level::High,
            _ => Level::Low,
        }
    }
}

struct Hook {
    edge: Edge,
    handler: Arc<Mutex<InterruptHandler>>,
}

#[derive(Default)]
struct MockState {
    lines: Mutex<HashMap<PinId, LineState>>,
    hooks: Mutex<HashMap<PinId, Hook>>,
    installs: Mutex<HashMap<PinId, usize>>,
    failing_installs: AtomicBool,
}

thread_local! {
    /// Pins whose hook is running on this thread, innermost last.
    static RUNNING: RefCell<Vec<PinId>> = const { RefCell::new(Vec::new()) };
}

fn running_here(pin: PinId) -> bool {
    RUNNING.with(|running| running.borrow().contains(&pin))
}

impl MockState {
    /// Apply `change` to a line and run its hook if the level moved across
    /// the armed edge. The hook runs with no mock lock held so it can read
    /// other lines.
    fn update(&self, pin: PinId, change: impl FnOnce(&mut LineState)) {
        let (before, after) = {
            let mut lines = self.lines.lock();
            let line = lines.entry(pin).or_default();
            let before = line.level();
            change(line);
            (before, line.level())
        };

        let handler = {
            let hooks = self.hooks.lock();
            hooks
                .get(&pin)
                .filter(|hook| hook.edge.matches(before, after))
                .map(|hook| Arc::clone(&hook.handler))
        };

        if let Some(handler) = handler {
            trace!("Mock edge on {} ({} -> {})", pin, before, after);
            let mut handler = handler.lock();
            RUNNING.with(|running| running.borrow_mut().push(pin));
            (*handler)(after);
            RUNNING.with(|running| running.borrow_mut().pop());
        }
    }
}

/// Simulated GPIO bank.
///
/// # Examples
///
/// ```
/// use hatline_core::{Level, PinId, Pull};
/// use hatline_hardware::mock::MockGpio;
/// use hatline_hardware::traits::GpioBackend;
///
/// let (gpio, handle) = MockGpio::new();
/// let pin = PinId::new(26).unwrap();
///
/// gpio.configure_pull(pin, Pull::Up).unwrap();
/// assert_eq!(gpio.read_digital(pin).unwrap(), Level::High);
///
/// handle.set_level(pin, Level::Low);
/// assert_eq!(gpio.read_digital(pin).unwrap(), Level::Low);
/// ```
#[derive(Clone)]
pub struct MockGpio {
    state: Arc<MockState>,
    name: String,
}

impl MockGpio {
    /// Create a mock bank and the handle that drives it.
    pub fn new() -> (Self, MockGpioHandle) {
        Self::with_name("Mock GPIO")
    }

    pub fn with_name(name: impl Into<String>) -> (Self, MockGpioHandle) {
        let state = Arc::new(MockState::default());
        let gpio = Self {
            state: Arc::clone(&state),
            name: name.into(),
        };
        (gpio, MockGpioHandle { state })
    }
}

impl std::fmt::Debug for MockGpio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGpio").field("name", &self.name).finish()
    }
}

impl GpioBackend for MockGpio {
    fn configure_pull(&self, pin: PinId, pull: Pull) -> Result<()> {
        self.state.update(pin, |line| line.pull = Some(pull));
        Ok(())
    }

    fn read_digital(&self, pin: PinId) -> Result<Level> {
        let lines = self.state.lines.lock();
        let line = lines.get(&pin).copied().unwrap_or_default();
        if line.failing {
            return Err(HardwareError::read(pin, "simulated read failure"));
        }
        Ok(line.level())
    }

    fn install_interrupt(&self, pin: PinId, edge: Edge, handler: InterruptHandler) -> Result<()> {
        if self.state.failing_installs.load(Ordering::SeqCst) {
            return Err(HardwareError::interrupt(pin, "simulated install failure"));
        }
        self.state.hooks.lock().insert(
            pin,
            Hook {
                edge,
                handler: Arc::new(Mutex::new(handler)),
            },
        );
        *self.state.installs.lock().entry(pin).or_default() += 1;
        Ok(())
    }

    fn clear_interrupt(&self, pin: PinId) -> Result<()> {
        let removed = self.state.hooks.lock().remove(&pin);
        if let Some(hook) = removed
            && !running_here(pin)
        {
            drop(hook.handler.lock());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle for driving a [`MockGpio`] and inspecting its configuration.
#[derive(Clone)]
pub struct MockGpioHandle {
    state: Arc<MockState>,
}

impl MockGpioHandle {
    /// Drive `pin` to `level`, running its hook if the edge matches.
    pub fn set_level(&self, pin: PinId, level: Level) {
        self.state.update(pin, |line| line.driven = Some(level));
    }

    /// Stop driving `pin`; it returns to its pull default.
    pub fn release(&self, pin: PinId) {
        self.state.update(pin, |line| line.driven = None);
    }

    /// Drive a rising then a falling edge.
    pub fn pulse(&self, pin: PinId) {
        self.set_level(pin, Level::High);
        self.set_level(pin, Level::Low);
    }

    /// Drive `pins` so that sampling them in order yields `sample`.
    /// Lines change one at a time, lowest bit first.
    pub fn set_sample(&self, pins: &[PinId; DETECTION_LINES], sample: PinSample) {
        for (index, pin) in pins.iter().enumerate() {
            if let Some(level) = sample.line(index) {
                self.set_level(*pin, level);
            }
        }
    }

    /// Make every later `install_interrupt` fail (or succeed again).
    pub fn fail_installs(&self, failing: bool) {
        self.state.failing_installs.store(failing, Ordering::SeqCst);
    }

    /// Make reads of `pin` fail (or succeed again).
    pub fn fail_reads(&self, pin: PinId, failing: bool) {
        self.state.lines.lock().entry(pin).or_default().failing = failing;
    }

    pub fn pull_of(&self, pin: PinId) -> Option<Pull> {
        self.state.lines.lock().get(&pin).and_then(|line| line.pull)
    }

    pub fn has_interrupt(&self, pin: PinId) -> bool {
        self.state.hooks.lock().contains_key(&pin)
    }

    pub fn interrupt_edge(&self, pin: PinId) -> Option<Edge> {
        self.state.hooks.lock().get(&pin).map(|hook| hook.edge)
    }

    /// Number of times a hook has been installed on `pin`.
    pub fn install_count(&self, pin: PinId) -> usize {
        self.state.installs.lock().get(&pin).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pin(bcm: u8) -> PinId {
        PinId::new(bcm).unwrap()
    }

    #[test]
    fn test_unconfigured_line_reads_low() {
        let (gpio, _handle) = MockGpio::new();
        assert_eq!(gpio.read_digital(pin(5)).unwrap(), Level::Low);
    }

    #[test]
    fn test_pull_sets_idle_level() {
        let (gpio, handle) = MockGpio::new();
        gpio.configure_pull(pin(26), Pull::Up).unwrap();
        gpio.configure_pull(pin(22), Pull::Down).unwrap();

        assert_eq!(gpio.read_digital(pin(26)).unwrap(), Level::High);
        assert_eq!(gpio.read_digital(pin(22)).unwrap(), Level::Low);
        assert_eq!(handle.pull_of(pin(26)), Some(Pull::Up));
    }

    #[test]
    fn test_release_returns_to_pull() {
        let (gpio, handle) = MockGpio::new();
        gpio.configure_pull(pin(26), Pull::Up).unwrap();
        handle.set_level(pin(26), Level::Low);
        assert_eq!(gpio.read_digital(pin(26)).unwrap(), Level::Low);

        handle.release(pin(26));
        assert_eq!(gpio.read_digital(pin(26)).unwrap(), Level::High);
    }

    #[test]
    fn test_rising_hook_ignores_falling_edge() {
        let (gpio, handle) = MockGpio::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        gpio.install_interrupt(
            pin(3),
            Edge::Rising,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        handle.pulse(pin(3));
        handle.pulse(pin(3));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_same_level_does_not_fire() {
        let (gpio, handle) = MockGpio::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        gpio.install_interrupt(
            pin(16),
            Edge::Both,
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        handle.set_level(pin(16), Level::Low);
        handle.set_level(pin(16), Level::High);
        handle.set_level(pin(16), Level::High);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_can_read_lines() {
        let (gpio, handle) = MockGpio::new();
        let reader = gpio.clone();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);

        gpio.install_interrupt(
            pin(16),
            Edge::Both,
            Box::new(move |_| {
                *slot.lock() = reader.read_digital(pin(16)).ok();
            }),
        )
        .unwrap();

        handle.set_level(pin(16), Level::High);
        assert_eq!(*seen.lock(), Some(Level::High));
    }

    #[test]
    fn test_clear_interrupt() {
        let (gpio, handle) = MockGpio::new();
        gpio.install_interrupt(pin(3), Edge::Rising, Box::new(|_| {}))
            .unwrap();
        assert!(handle.has_interrupt(pin(3)));
        assert_eq!(handle.interrupt_edge(pin(3)), Some(Edge::Rising));

        gpio.clear_interrupt(pin(3)).unwrap();
        gpio.clear_interrupt(pin(3)).unwrap();
        assert!(!handle.has_interrupt(pin(3)));
        assert_eq!(handle.install_count(pin(3)), 1);
    }

    #[test]
    fn test_handler_can_clear_its_own_hook() {
        let (gpio, handle) = MockGpio::new();
        let clearer = gpio.clone();

        gpio.install_interrupt(
            pin(3),
            Edge::Rising,
            Box::new(move |_| {
                clearer.clear_interrupt(pin(3)).unwrap();
            }),
        )
        .unwrap();

        handle.pulse(pin(3));
        assert!(!handle.has_interrupt(pin(3)));
    }

    #[test]
    fn test_clear_waits_for_running_handler() {
        use std::sync::mpsc;
        use std::thread;
        use std::time::Duration;

        let (gpio, handle) = MockGpio::new();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        gpio.install_interrupt(
            pin(16),
            Edge::Both,
            Box::new(move |_| {
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            }),
        )
        .unwrap();

        let edge = thread::spawn(move || handle.set_level(pin(16), Level::High));
        entered_rx.recv().unwrap();

        let cleared = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&cleared);
        let clearer = gpio.clone();
        let clear = thread::spawn(move || {
            clearer.clear_interrupt(pin(16)).unwrap();
            done.store(true, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(50));
        assert!(!cleared.load(Ordering::SeqCst));

        release_tx.send(()).unwrap();
        edge.join().unwrap();
        clear.join().unwrap();
        assert!(cleared.load(Ordering::SeqCst));
    }

    #[test]
    fn test_failing_installs() {
        let (gpio, handle) = MockGpio::new();
        handle.fail_installs(true);
        assert!(matches!(
            gpio.install_interrupt(pin(3), Edge::Rising, Box::new(|_| {})),
            Err(HardwareError::Interrupt { .. })
        ));
        assert!(!handle.has_interrupt(pin(3)));
        assert_eq!(handle.install_count(pin(3)), 0);

        handle.fail_installs(false);
        gpio.install_interrupt(pin(3), Edge::Rising, Box::new(|_| {}))
            .unwrap();
        assert!(handle.has_interrupt(pin(3)));
    }

    #[test]
    fn test_failing_reads() {
        let (gpio, handle) = MockGpio::new();
        handle.fail_reads(pin(24), true);
        assert!(matches!(
            gpio.read_digital(pin(24)),
            Err(HardwareError::Read { .. })
        ));

        handle.fail_reads(pin(24), false);
        assert!(gpio.read_digital(pin(24)).is_ok());
    }

    #[test]
    fn test_set_sample() {
        let (gpio, handle) = MockGpio::new();
        let pins = [pin(22), pin(23), pin(24), pin(27), pin(26)];
        handle.set_sample(&pins, PinSample::from_bits(0b10100));

        let levels: Vec<Level> = pins
            .iter()
            .map(|p| gpio.read_digital(*p).unwrap())
            .collect();
        assert_eq!(
            levels,
            vec![Level::Low, Level::Low, Level::High, Level::Low, Level::High]
        );
    }
}
