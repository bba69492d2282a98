//! Raspberry Pi GPIO backend built on `rppal`.
//!
//! Pins are claimed lazily as inputs and kept for the lifetime of the
//! backend. Interrupt callbacks run on `rppal`'s per-pin poll thread.
//!
//! Clearing an interrupt, or dropping a claim that has one, joins that poll
//! thread, and handlers read pins through the claim table. A pin is taken
//! out of the table before either happens, so the table lock is never held
//! across a join. Reads of a pin in that state fail instead of waiting. A
//! handler clearing its own pin hands the clear to a helper thread, since a
//! poll thread cannot join itself.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;

use hatline_core::{Edge, Level, PinId, Pull};
use parking_lot::Mutex;
use ::rppal::gpio::{self, Gpio, InputPin, Trigger};
use tracing::{debug, info, warn};

use crate::{
    HardwareError, Result,
    traits::{GpioBackend, InterruptHandler},
};

#[derive(Default)]
struct Claims {
    pins: HashMap<PinId, InputPin>,
    /// Out of `pins` while an interrupt is cleared or a claim replaced.
    detaching: HashSet<PinId>,
}

thread_local! {
    /// Pin served by this poll thread.
    static POLLING: Cell<Option<PinId>> = const { Cell::new(None) };
}

fn polling(pin: PinId) -> bool {
    POLLING.with(Cell::get) == Some(pin)
}

fn busy(pin: PinId) -> HardwareError {
    HardwareError::configuration(pin, "pin is being released")
}

/// Take `pin` out of the table and mark it detaching. `Ok(None)` when the
/// pin was never claimed.
fn detach(claims: &Mutex<Claims>, pin: PinId) -> Result<Option<InputPin>> {
    let mut claims = claims.lock();
    if !claims.detaching.insert(pin) {
        return Err(busy(pin));
    }
    Ok(claims.pins.remove(&pin))
}

fn reattach(claims: &Mutex<Claims>, pin: PinId, input: Option<InputPin>) {
    let mut claims = claims.lock();
    claims.detaching.remove(&pin);
    if let Some(input) = input {
        claims.pins.insert(pin, input);
    }
}

fn clear_detached(claims: &Mutex<Claims>, pin: PinId) -> Result<()> {
    let mut input = match detach(claims, pin) {
        Ok(Some(input)) => input,
        Ok(None) => {
            reattach(claims, pin, None);
            return Ok(());
        }
        // Another thread is clearing it.
        Err(_) => return Ok(()),
    };

    let result = input
        .clear_async_interrupt()
        .map_err(|e| HardwareError::interrupt(pin, e.to_string()));
    reattach(claims, pin, Some(input));
    result
}

pub struct RppalGpio {
    gpio: Gpio,
    claims: Arc<Mutex<Claims>>,
}

impl RppalGpio {
    /// Open the GPIO peripheral.
    ///
    /// # Errors
    /// Returns `HardwareError::Unavailable` when `/dev/gpiomem` cannot be opened,
    /// typically because the host is not a Raspberry Pi or permissions are missing.
    pub fn new() -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HardwareError::unavailable(e.to_string()))?;
        info!("Opened rppal GPIO backend");
        Ok(Self {
            gpio,
            claims: Arc::new(Mutex::new(Claims::default())),
        })
    }

    fn claim(&self, pin: PinId, pull: Pull) -> Result<InputPin> {
        let raw = self
            .gpio
            .get(pin.as_u8())
            .map_err(|e| HardwareError::configuration(pin, e.to_string()))?;

        let mut input = match pull {
            Pull::Off => raw.into_input(),
            Pull::Down => raw.into_input_pulldown(),
            Pull::Up => raw.into_input_pullup(),
        };
        input.set_reset_on_drop(false);
        Ok(input)
    }

    fn with_pin<T>(&self, pin: PinId, f: impl FnOnce(&mut InputPin) -> Result<T>) -> Result<T> {
        let mut claims = self.claims.lock();
        if claims.detaching.contains(&pin) {
            return Err(busy(pin));
        }
        if !claims.pins.contains_key(&pin) {
            debug!("Claiming {} with no pull", pin);
            let input = self.claim(pin, Pull::Off)?;
            claims.pins.insert(pin, input);
        }
        match claims.pins.get_mut(&pin) {
            Some(input) => f(input),
            None => Err(HardwareError::configuration(pin, "pin not claimed")),
        }
    }
}

fn trigger_for(edge: Edge) -> Trigger {
    match edge {
        Edge::Rising => Trigger::RisingEdge,
        Edge::Falling => Trigger::FallingEdge,
        Edge::Both => Trigger::Both,
    }
}

fn level_of(level: gpio::Level) -> Level {
    match level {
        gpio::Level::Low => Level::Low,
        gpio::Level::High => Level::High,
    }
}

impl GpioBackend for RppalGpio {
    fn configure_pull(&self, pin: PinId, pull: Pull) -> Result<()> {
        if polling(pin) {
            return Err(HardwareError::configuration(
                pin,
                "cannot reconfigure a pin from its own interrupt handler",
            ));
        }

        // The previous claim must be gone before the pin can be claimed again.
        drop(detach(&self.claims, pin)?);
        match self.claim(pin, pull) {
            Ok(input) => {
                reattach(&self.claims, pin, Some(input));
                debug!("Configured {} with {:?} pull", pin, pull);
                Ok(())
            }
            Err(e) => {
                reattach(&self.claims, pin, None);
                Err(e)
            }
        }
    }

    fn read_digital(&self, pin: PinId) -> Result<Level> {
        self.with_pin(pin, |input| Ok(level_of(input.read())))
            .map_err(|e| match e {
                HardwareError::Configuration { pin, message } => HardwareError::read(pin, message),
                other => other,
            })
    }

    fn install_interrupt(
        &self,
        pin: PinId,
        edge: Edge,
        mut handler: InterruptHandler,
    ) -> Result<()> {
        if polling(pin) {
            return Err(HardwareError::interrupt(
                pin,
                "cannot replace an interrupt from its own handler",
            ));
        }

        // rppal joins the old poll thread when replacing, so clear it first.
        clear_detached(&self.claims, pin)?;
        self.with_pin(pin, |input| {
            input
                .set_async_interrupt(trigger_for(edge), None, move |event| {
                    POLLING.with(|polling| polling.set(Some(pin)));
                    let level = match event.trigger {
                        Trigger::FallingEdge => Level::Low,
                        _ => Level::High,
                    };
                    handler(level);
                })
                .map_err(|e| HardwareError::interrupt(pin, e.to_string()))
        })
    }

    fn clear_interrupt(&self, pin: PinId) -> Result<()> {
        if !polling(pin) {
            return clear_detached(&self.claims, pin);
        }

        let claims = Arc::clone(&self.claims);
        thread::Builder::new()
            .name(format!("hatline-clear-{}", pin.as_u8()))
            .spawn(move || {
                if let Err(e) = clear_detached(&claims, pin) {
                    warn!("Deferred interrupt clear on {} failed: {}", pin, e);
                }
            })
            .map_err(|e| HardwareError::interrupt(pin, e.to_string()))?;
        debug!("Clear of {} requested by its own handler, deferred", pin);
        Ok(())
    }

    fn name(&self) -> &str {
        "rppal"
    }
}
