//! The hat orchestrator.
//!
//! A [`HatContext`] owns the GPIO backend, the exclusivity lock, one
//! callback registry per [`EventClass`] and the hardware hooks feeding them.
//! Every public entry point lazily runs [`HatContext::ensure_initialized`],
//! which takes the lock and configures the pins once.
//!
//! # Hooks
//!
//! | Event class    | Lines             | Edge   | Filter                  |
//! |----------------|-------------------|--------|-------------------------|
//! | `HatAttached`  | 5 detection lines | both   | settled identity change |
//! | `HatDetached`  | 5 detection lines | both   | settled identity change |
//! | `PowerButton`  | power button      | rising | hat attached, cooldown  |
//! | `BatteryLevel` | low battery       | both   | Pro attached, debounce  |
//!
//! The two attachment classes share one hook. A hook is installed when its
//! first callback registers and removed when the last one unregisters, so
//! registering more callbacks never installs a duplicate. Power-button
//! callbacks need an identified hat; battery callbacks need the Pro hat.
//! Both conditions are checked again for every event, so a hat that has
//! been unplugged stops reporting presses and battery changes.
//!
//! Contacts open and close one at a time while a hat is plugged in or
//! pulled out, so the detection lines pass through patterns that belong to
//! neither hat. An identity only counts once it has been read
//! `debounce.threshold` times in a row, `debounce.delay_ms` apart, through
//! the same [`Debouncer`] the battery line uses.
//!
//! # Interrupt context
//!
//! Hook handlers hold only a weak reference to the context, never return
//! errors and never hold a context lock while user callbacks run. Callbacks
//! run synchronously on the backend's interrupt thread; a callback that
//! blocks delays every later event on that line.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use hatline_core::{
    Edge, Error, HatConfig, HatVariant, Level, PinId, Pull, Result, SignatureTable,
    constants::{LOW_BATTERY_TRIGGER_VALUE, POWER_PIN_PULL},
};
use hatline_hardware::GpioBackend;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::cooldown::Cooldown;
use crate::debounce::{DebouncedLine, Debouncer, TimerAction};
use crate::detection::{AttachmentChange, AttachmentTracker, PinMatcher};
use crate::lock::ProcessLock;
use crate::registry::{Callback, CallbackId, CallbackRegistry};
use crate::timer::RetryTimer;

/// Independent event channels. No ordering holds across classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventClass {
    HatAttached,
    HatDetached,
    PowerButton,
    BatteryLevel,
}

impl EventClass {
    pub const ALL: [EventClass; 4] = [
        EventClass::HatAttached,
        EventClass::HatDetached,
        EventClass::PowerButton,
        EventClass::BatteryLevel,
    ];
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventClass::HatAttached => write!(f, "hat-attached"),
            EventClass::HatDetached => write!(f, "hat-detached"),
            EventClass::PowerButton => write!(f, "power-button"),
            EventClass::BatteryLevel => write!(f, "battery-level"),
        }
    }
}

struct Hooks<G: GpioBackend> {
    detection: bool,
    power: bool,
    battery: Option<Arc<DebouncedLine<G>>>,
}

impl<G: GpioBackend> Default for Hooks<G> {
    fn default() -> Self {
        Self {
            detection: false,
            power: false,
            battery: None,
        }
    }
}

struct Inner<G: GpioBackend> {
    config: HatConfig,
    gpio: Arc<G>,
    runtime: Handle,
    power_pin: PinId,
    battery_pin: PinId,
    lock: ProcessLock,

    /// Serializes setup and teardown. Never taken from interrupt context.
    initialized: Mutex<bool>,
    identified: Mutex<Option<HatVariant>>,

    attached: CallbackRegistry,
    detached: CallbackRegistry,
    power: CallbackRegistry,
    battery: CallbackRegistry,

    matcher: PinMatcher<G>,
    tracker: AttachmentTracker,
    /// Candidate identity on the detection lines. Its stable value is the
    /// identity last reported to the tracker.
    settle: Mutex<Debouncer<Option<HatVariant>>>,
    settle_timer: RetryTimer,
    /// Cleared before the detection hook goes so in-flight edges bail out.
    /// Handlers never take `hooks`.
    detection_live: AtomicBool,
    hooks: Mutex<Hooks<G>>,
    cooldown: Cooldown,
}

/// Handle to one hat on one GPIO backend.
///
/// Dropping the context tears it down.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// use hatline_core::{HatConfig, PinSample, constants::{DETECTION_PINS, POWER_PIN}};
/// use hatline_events::HatContext;
/// use hatline_hardware::mock::MockGpio;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> hatline_core::Result<()> {
/// # let dir = tempfile::tempdir()?;
/// let (gpio, handle) = MockGpio::new();
/// handle.set_sample(&DETECTION_PINS, PinSample::from_bits(0b00100));
///
/// let config = HatConfig::default().with_lock_path(dir.path().join("hat.lock"));
/// let hat = HatContext::new(config, gpio)?;
/// hat.initialise_pro()?;
///
/// let presses = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&presses);
/// hat.register_power_off(move || {
///     counter.fetch_add(1, Ordering::SeqCst);
/// })?;
///
/// handle.pulse(POWER_PIN);
/// assert_eq!(presses.load(Ordering::SeqCst), 1);
/// # Ok(())
/// # }
/// ```
pub struct HatContext<G: GpioBackend> {
    inner: Arc<Inner<G>>,
}

impl<G: GpioBackend> HatContext<G> {
    /// Build a context on the current tokio runtime.
    ///
    /// # Errors
    /// - `Error::Config` / `Error::InvalidPin` if `config` is invalid.
    /// - `Error::Runtime` when called outside a tokio runtime.
    pub fn new(config: HatConfig, gpio: G) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Error::Runtime(e.to_string()))?;
        Self::with_runtime(config, gpio, runtime)
    }

    /// Build a context whose debounce timers run on `runtime`.
    ///
    /// # Errors
    /// Returns `Error::Config` / `Error::InvalidPin` if `config` is invalid.
    pub fn with_runtime(config: HatConfig, gpio: G, runtime: Handle) -> Result<Self> {
        Self::with_signatures(config, gpio, runtime, SignatureTable::standard())
    }

    /// Build a context that identifies hats with a custom signature table.
    ///
    /// # Errors
    /// Returns `Error::Config` / `Error::InvalidPin` if `config` is invalid.
    pub fn with_signatures(
        config: HatConfig,
        gpio: G,
        runtime: Handle,
        table: SignatureTable,
    ) -> Result<Self> {
        config.validate()?;
        let detection_pins = config.pins.detection_pins()?;
        let power_pin = config.pins.power_pin()?;
        let battery_pin = config.pins.battery_low_pin()?;

        let gpio = Arc::new(gpio);
        debug!("Creating hat context on {}", gpio.name());

        let inner = Inner {
            lock: ProcessLock::new(config.lock_path.clone()),
            cooldown: Cooldown::new(config.power_button.cooldown()),
            matcher: PinMatcher::new(Arc::clone(&gpio), detection_pins, table),
            settle: Mutex::new(Debouncer::new(None, config.debounce.threshold)),
            settle_timer: RetryTimer::new(runtime.clone(), config.debounce.delay()),
            detection_live: AtomicBool::new(false),
            gpio,
            runtime,
            power_pin,
            battery_pin,
            initialized: Mutex::new(false),
            identified: Mutex::new(None),
            attached: CallbackRegistry::uninitialized("hat-attached"),
            detached: CallbackRegistry::uninitialized("hat-detached"),
            power: CallbackRegistry::uninitialized("power-button"),
            battery: CallbackRegistry::uninitialized("battery-level"),
            tracker: AttachmentTracker::default(),
            hooks: Mutex::new(Hooks::default()),
            config,
        };

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    #[must_use]
    pub fn config(&self) -> &HatConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        *self.inner.initialized.lock()
    }

    /// Take the lock, configure pins and initialise the registries, once.
    ///
    /// Also records whichever hat is attached at that moment.
    ///
    /// # Errors
    /// - `Error::LibraryHeldElsewhere` if another process owns the hat.
    /// - `Error::LockUnavailable` if the lock path is unusable.
    /// - `Error::Gpio` if pin configuration fails.
    /// - `Error::AllocationFailure` if a registry cannot allocate.
    pub fn ensure_initialized(&self) -> Result<()> {
        self.inner.ensure_initialized()
    }

    /// Alias of [`ensure_initialized`](Self::ensure_initialized).
    ///
    /// # Errors
    /// See [`ensure_initialized`](Self::ensure_initialized).
    pub fn initialise(&self) -> Result<()> {
        self.ensure_initialized()
    }

    /// Initialise and require `variant` to be attached.
    ///
    /// # Errors
    /// Returns `Error::HardwareNotAttached` on a signature mismatch, or any
    /// [`ensure_initialized`](Self::ensure_initialized) error.
    pub fn initialise_variant(&self, variant: HatVariant) -> Result<()> {
        self.ensure_initialized()?;
        if !self.inner.matcher.is_connected(variant) {
            return Err(Error::HardwareNotAttached { variant });
        }
        self.inner.set_identified(Some(variant));
        info!("{} hat initialised", variant);
        Ok(())
    }

    /// # Errors
    /// See [`initialise_variant`](Self::initialise_variant).
    pub fn initialise_lite(&self) -> Result<()> {
        self.initialise_variant(HatVariant::Lite)
    }

    /// # Errors
    /// See [`initialise_variant`](Self::initialise_variant).
    pub fn initialise_pro(&self) -> Result<()> {
        self.initialise_variant(HatVariant::Pro)
    }

    /// Whether a fresh sample matches `variant` exactly.
    ///
    /// # Errors
    /// Any [`ensure_initialized`](Self::ensure_initialized) error.
    pub fn is_connected(&self, variant: HatVariant) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.inner.matcher.is_connected(variant))
    }

    /// # Errors
    /// See [`is_connected`](Self::is_connected).
    pub fn is_lite_connected(&self) -> Result<bool> {
        self.is_connected(HatVariant::Lite)
    }

    /// # Errors
    /// See [`is_connected`](Self::is_connected).
    pub fn is_pro_connected(&self) -> Result<bool> {
        self.is_connected(HatVariant::Pro)
    }

    /// Variant matching a fresh sample, if any.
    ///
    /// # Errors
    /// Any [`ensure_initialized`](Self::ensure_initialized) error.
    pub fn attached_variant(&self) -> Result<Option<HatVariant>> {
        self.ensure_initialized()?;
        Ok(self.inner.matcher.identify())
    }

    /// Last identity recorded by initialisation or attach/detach events.
    #[must_use]
    pub fn identified_variant(&self) -> Option<HatVariant> {
        *self.inner.identified.lock()
    }

    /// Whether the low-battery line currently reads its trigger value.
    ///
    /// # Errors
    /// `Error::Gpio` if the read fails, or any
    /// [`ensure_initialized`](Self::ensure_initialized) error.
    pub fn is_battery_low(&self) -> Result<bool> {
        self.ensure_initialized()?;
        let level = self.inner.gpio.read_digital(self.inner.battery_pin)?;
        Ok(level == Level::from_bit(LOW_BATTERY_TRIGGER_VALUE))
    }

    /// Append `callback` to `class` and install its hook if needed.
    ///
    /// # Errors
    /// - `Error::NoHatAttached` for [`EventClass::PowerButton`] with no hat
    ///   identified.
    /// - `Error::HardwareNotAttached` for [`EventClass::BatteryLevel`]
    ///   unless the Pro hat is identified.
    /// - `Error::Gpio` if the hook cannot be installed. The callback is not
    ///   kept in that case.
    /// - Any [`ensure_initialized`](Self::ensure_initialized) or registry
    ///   error.
    pub fn register(&self, class: EventClass, callback: Callback) -> Result<CallbackId> {
        self.ensure_initialized()?;
        self.inner.check_precondition(class)?;

        let registry = self.inner.registry(class);
        let id = registry.add(callback)?;
        if let Err(e) = self.inner.install_hook(class) {
            error!("Installing {} hook failed: {}", class, e);
            let _ = registry.remove(id);
            return Err(e);
        }

        debug!("Registered {} callback {}", class, id);
        Ok(id)
    }

    /// # Errors
    /// See [`register`](Self::register).
    pub fn register_hat_attached<F>(&self, callback: F) -> Result<CallbackId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(EventClass::HatAttached, Arc::new(callback))
    }

    /// # Errors
    /// See [`register`](Self::register).
    pub fn register_hat_detached<F>(&self, callback: F) -> Result<CallbackId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(EventClass::HatDetached, Arc::new(callback))
    }

    /// # Errors
    /// See [`register`](Self::register).
    pub fn register_power_off<F>(&self, callback: F) -> Result<CallbackId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(EventClass::PowerButton, Arc::new(callback))
    }

    /// # Errors
    /// See [`register`](Self::register).
    pub fn register_battery_changed<F>(&self, callback: F) -> Result<CallbackId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.register(EventClass::BatteryLevel, Arc::new(callback))
    }

    /// Remove a callback. Removing the last callback of a class uninstalls
    /// its hook.
    ///
    /// # Errors
    /// - `Error::CallbackNotFound` if `id` is not registered for `class`.
    /// - `Error::RegistryNotInitialized` before initialisation.
    /// - `Error::Gpio` if the hook cannot be cleared.
    pub fn unregister(&self, class: EventClass, id: CallbackId) -> Result<()> {
        self.inner.registry(class).remove(id)?;
        debug!("Unregistered {} callback {}", class, id);
        self.inner.uninstall_idle_hook(class)
    }

    #[must_use]
    pub fn is_hook_installed(&self, class: EventClass) -> bool {
        let hooks = self.inner.hooks.lock();
        match class {
            EventClass::HatAttached | EventClass::HatDetached => hooks.detection,
            EventClass::PowerButton => hooks.power,
            EventClass::BatteryLevel => hooks.battery.is_some(),
        }
    }

    #[must_use]
    pub fn callback_count(&self, class: EventClass) -> usize {
        self.inner.registry(class).len()
    }

    /// Clear every hook, destroy the registries and release the lock.
    /// Safe to call repeatedly and before initialisation.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    /// Alias of [`teardown`](Self::teardown).
    pub fn clean_up(&self) {
        self.teardown();
    }
}

impl<G: GpioBackend> Drop for HatContext<G> {
    fn drop(&mut self) {
        self.inner.teardown();
    }
}

impl<G: GpioBackend> fmt::Debug for HatContext<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HatContext")
            .field("backend", &self.inner.gpio.name())
            .field("lock", &self.inner.lock.path())
            .field("initialized", &self.is_initialized())
            .field("identified", &self.identified_variant())
            .finish()
    }
}

impl<G: GpioBackend> Inner<G> {
    fn registry(&self, class: EventClass) -> &CallbackRegistry {
        match class {
            EventClass::HatAttached => &self.attached,
            EventClass::HatDetached => &self.detached,
            EventClass::PowerButton => &self.power,
            EventClass::BatteryLevel => &self.battery,
        }
    }

    fn ensure_initialized(&self) -> Result<()> {
        let mut initialized = self.initialized.lock();
        if *initialized {
            return Ok(());
        }

        self.lock.acquire()?;
        if let Err(e) = self.configure_pins().and_then(|()| self.initialize_registries()) {
            error!("Hat initialisation failed: {}", e);
            self.destroy_registries();
            self.lock.release();
            return Err(e);
        }

        let variant = self.matcher.identify();
        self.tracker.update(variant);
        *self.settle.lock() = Debouncer::new(variant, self.config.debounce.threshold);
        self.set_identified(variant);

        *initialized = true;
        match variant {
            Some(variant) => info!("Initialised on {} with {} hat", self.gpio.name(), variant),
            None => info!("Initialised on {} with no hat attached", self.gpio.name()),
        }
        Ok(())
    }

    fn configure_pins(&self) -> Result<()> {
        self.matcher.configure()?;
        self.gpio.configure_pull(self.power_pin, POWER_PIN_PULL)?;
        self.gpio.configure_pull(self.battery_pin, Pull::Off)?;
        debug!(
            "Configured detection {:?}, power {}, battery {}",
            self.matcher.pins(),
            self.power_pin,
            self.battery_pin
        );
        Ok(())
    }

    fn initialize_registries(&self) -> Result<()> {
        for class in EventClass::ALL {
            self.registry(class).initialize()?;
        }
        Ok(())
    }

    fn destroy_registries(&self) {
        for class in EventClass::ALL {
            self.registry(class).destroy();
        }
    }

    fn set_identified(&self, variant: Option<HatVariant>) {
        *self.identified.lock() = variant;
    }

    fn check_precondition(&self, class: EventClass) -> Result<()> {
        let identified = *self.identified.lock();
        match class {
            EventClass::PowerButton if identified.is_none() => Err(Error::NoHatAttached),
            EventClass::BatteryLevel if identified != Some(HatVariant::Pro) => {
                Err(Error::HardwareNotAttached {
                    variant: HatVariant::Pro,
                })
            }
            _ => Ok(()),
        }
    }

    fn install_hook(self: &Arc<Self>, class: EventClass) -> Result<()> {
        let mut hooks = self.hooks.lock();
        match class {
            EventClass::HatAttached | EventClass::HatDetached => {
                if hooks.detection {
                    return Ok(());
                }
                self.detection_live.store(true, Ordering::SeqCst);
                for (installed, pin) in self.matcher.pins().iter().enumerate() {
                    let weak = Arc::downgrade(self);
                    let result = self.gpio.install_interrupt(
                        *pin,
                        Edge::Both,
                        Box::new(move |_| with_inner(&weak, Inner::on_detection_edge)),
                    );
                    if let Err(e) = result {
                        self.stop_settling();
                        for pin in &self.matcher.pins()[..installed] {
                            let _ = self.gpio.clear_interrupt(*pin);
                        }
                        return Err(e.into());
                    }
                }
                hooks.detection = true;
                info!("Attach/detach hook installed");
            }
            EventClass::PowerButton => {
                if hooks.power {
                    return Ok(());
                }
                let weak = Arc::downgrade(self);
                self.gpio.install_interrupt(
                    self.power_pin,
                    Edge::Rising,
                    Box::new(move |_| with_inner(&weak, |inner| inner.on_power_edge())),
                )?;
                hooks.power = true;
                info!("Power button hook installed on {}", self.power_pin);
            }
            EventClass::BatteryLevel => {
                if hooks.battery.is_some() {
                    return Ok(());
                }
                let weak = Arc::downgrade(self);
                let line = DebouncedLine::new(
                    self.battery_pin,
                    Arc::clone(&self.gpio),
                    &self.config.debounce,
                    self.runtime.clone(),
                    move |level| with_inner(&weak, |inner| inner.on_battery_change(level)),
                )?;
                let edge_line = Arc::clone(&line);
                if let Err(e) = self.gpio.install_interrupt(
                    self.battery_pin,
                    Edge::Both,
                    Box::new(move |_| edge_line.sample()),
                ) {
                    line.stop();
                    return Err(e.into());
                }
                hooks.battery = Some(line);
                info!("Battery hook installed on {}", self.battery_pin);
            }
        }
        Ok(())
    }

    fn uninstall_idle_hook(&self, class: EventClass) -> Result<()> {
        let mut hooks = self.hooks.lock();
        match class {
            EventClass::HatAttached | EventClass::HatDetached => {
                if hooks.detection && self.attached.is_empty() && self.detached.is_empty() {
                    hooks.detection = false;
                    self.stop_settling();
                    for pin in self.matcher.pins() {
                        self.gpio.clear_interrupt(*pin)?;
                    }
                    info!("Attach/detach hook removed");
                }
            }
            EventClass::PowerButton => {
                if hooks.power && self.power.is_empty() {
                    hooks.power = false;
                    self.gpio.clear_interrupt(self.power_pin)?;
                    info!("Power button hook removed");
                }
            }
            EventClass::BatteryLevel => {
                if self.battery.is_empty()
                    && let Some(line) = hooks.battery.take()
                {
                    line.stop();
                    self.gpio.clear_interrupt(self.battery_pin)?;
                    info!("Battery hook removed");
                }
            }
        }
        Ok(())
    }

    fn clear_all_hooks(&self) {
        let mut hooks = std::mem::take(&mut *self.hooks.lock());
        let mut pins = Vec::new();
        if hooks.detection {
            self.stop_settling();
            pins.extend_from_slice(self.matcher.pins());
        }
        if hooks.power {
            pins.push(self.power_pin);
        }
        if let Some(line) = hooks.battery.take() {
            line.stop();
            pins.push(self.battery_pin);
        }

        for pin in pins {
            if let Err(e) = self.gpio.clear_interrupt(pin) {
                warn!("Clearing hook on {} failed: {}", pin, e);
            }
        }
    }

    /// Halt detection settling. An edge already being handled finishes
    /// without re-arming or reporting.
    fn stop_settling(&self) {
        self.detection_live.store(false, Ordering::SeqCst);
        let mut settle = self.settle.lock();
        settle.abandon();
        self.settle_timer.disarm();
    }

    fn teardown(&self) {
        let mut initialized = self.initialized.lock();
        if !*initialized {
            return;
        }

        self.clear_all_hooks();
        self.destroy_registries();
        self.lock.release();
        self.tracker.reset();
        self.cooldown.reset();
        self.set_identified(None);

        *initialized = false;
        info!("Hat context torn down");
    }

    fn dispatch(&self, class: EventClass) {
        match self.registry(class).dispatch() {
            Ok(count) => debug!("Dispatched {} to {} callbacks", class, count),
            Err(e) => warn!("Dropping {} event: {}", class, e),
        }
    }

    /// Edge and retry-shot handler for the detection lines.
    fn on_detection_edge(self: &Arc<Self>) {
        if !self.detection_live.load(Ordering::SeqCst) {
            return;
        }
        let read = self.matcher.identify();

        let settled = {
            let mut settle = self.settle.lock();
            if !self.detection_live.load(Ordering::SeqCst) {
                return;
            }
            let step = settle.feed(read);
            match step.timer {
                TimerAction::Rearm => {
                    let weak = Arc::downgrade(self);
                    self.settle_timer.arm(move || with_inner(&weak, Inner::on_detection_edge));
                }
                TimerAction::Disarm => self.settle_timer.disarm(),
                TimerAction::None => {}
            }
            step.changed
        };

        if let Some(now) = settled {
            self.report_attachment(now);
        }
    }

    fn report_attachment(&self, now: Option<HatVariant>) {
        match self.tracker.update(now) {
            AttachmentChange::Unchanged => {}
            AttachmentChange::Attached(variant) => {
                info!("{} hat attached", variant);
                self.set_identified(Some(variant));
                self.dispatch(EventClass::HatAttached);
            }
            AttachmentChange::Detached(variant) => {
                info!("{} hat detached", variant);
                self.set_identified(None);
                self.dispatch(EventClass::HatDetached);
            }
            AttachmentChange::Swapped { from, to } => {
                info!("{} hat replaced by {}", from, to);
                self.set_identified(Some(to));
                self.dispatch(EventClass::HatDetached);
                self.dispatch(EventClass::HatAttached);
            }
        }
    }

    fn on_power_edge(&self) {
        if self.identified.lock().is_none() {
            debug!("Power button edge with no hat attached ignored");
            return;
        }
        if self.cooldown.try_fire() {
            info!("Power button pressed");
            self.dispatch(EventClass::PowerButton);
        } else {
            debug!("Power button press within cooldown ignored");
        }
    }

    fn on_battery_change(&self, level: Level) {
        if *self.identified.lock() != Some(HatVariant::Pro) {
            debug!("Battery line moved to {} without a Pro hat, ignored", level);
            return;
        }
        let low = level == Level::from_bit(LOW_BATTERY_TRIGGER_VALUE);
        info!("Battery {}", if low { "low" } else { "ok" });
        self.dispatch(EventClass::BatteryLevel);
    }
}

/// Run `f` if the context is still alive.
fn with_inner<G: GpioBackend>(weak: &Weak<Inner<G>>, f: impl FnOnce(&Arc<Inner<G>>)) {
    if let Some(inner) = weak.upgrade() {
        f(&inner);
    }
}
