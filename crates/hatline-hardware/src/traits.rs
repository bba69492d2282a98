//! GPIO backend trait.
//!
//! [`GpioBackend`] is the contract between the event subsystem and whatever
//! actually drives the pins. It mirrors the three primitives the hat library
//! needs: pull configuration, digital reads, and edge interrupts.
//!
//! # Interrupt context
//!
//! Backends invoke an [`InterruptHandler`] from their own execution context
//! (a kernel poll thread for `rppal`, the caller of
//! [`MockGpioHandle::set_level`](crate::mock::MockGpioHandle::set_level) for
//! the mock). Handlers must run to completion quickly and must not block on
//! long-held locks; a handler that hangs stalls every later edge on that pin.
//!
//! [`GpioBackend::clear_interrupt`] may wait for a handler run that is in
//! progress on another thread. Backends never hold a lock that handlers need
//! while they wait, and a handler may clear its own hook.
//!
//! # Examples
//!
//! ```
//! use hatline_core::{Edge, Level, PinId, Pull};
//! use hatline_hardware::mock::MockGpio;
//! use hatline_hardware::traits::GpioBackend;
//!
//! let (gpio, handle) = MockGpio::new();
//! let pin = PinId::new(3).unwrap();
//!
//! gpio.configure_pull(pin, Pull::Down).unwrap();
//! assert_eq!(gpio.read_digital(pin).unwrap(), Level::Low);
//!
//! gpio.install_interrupt(pin, Edge::Rising, Box::new(|level| {
//!     assert_eq!(level, Level::High);
//! })).unwrap();
//!
//! handle.set_level(pin, Level::High);
//! ```

use hatline_core::{Edge, Level, PinId, Pull};

use crate::error::Result;

/// Callback run when an armed edge occurs. Receives the level after the edge.
pub type InterruptHandler = Box<dyn FnMut(Level) + Send + 'static>;

/// Access to the digital GPIO lines of the host board.
///
/// Implementations must be shareable across threads: interrupt handlers run
/// concurrently with foreground calls.
pub trait GpioBackend: Send + Sync + 'static {
    /// Configure `pin` as an input with the given pull resistor.
    fn configure_pull(&self, pin: PinId, pull: Pull) -> Result<()>;

    /// Read the current level of `pin`.
    fn read_digital(&self, pin: PinId) -> Result<Level>;

    /// Arm an interrupt on `pin`, replacing any previous hook on that pin.
    fn install_interrupt(&self, pin: PinId, edge: Edge, handler: InterruptHandler) -> Result<()>;

    /// Remove the interrupt hook on `pin`. Removing a missing hook is not an error.
    ///
    /// Once this returns, no run of the old hook is in progress, unless it
    /// was called from that hook.
    fn clear_interrupt(&self, pin: PinId) -> Result<()>;

    /// Human readable backend name for logs.
    fn name(&self) -> &str;
}
