//! GPIO abstraction layer for hatline.
//!
//! The event subsystem talks to the board only through the
//! [`GpioBackend`](traits::GpioBackend) trait, which covers the three
//! primitives a hat needs:
//!
//! - `configure_pull` to set an input's pull resistor
//! - `read_digital` for a single 0/1 read
//! - `install_interrupt` / `clear_interrupt` for edge hooks
//!
//! Two implementations ship with the crate:
//!
//! - [`mock::MockGpio`], a programmable bank for tests and simulation.
//! - `raspberry::RppalGpio` (feature `hardware-rppal`), the Raspberry Pi
//!   header through the `rppal` crate.
//!
//! [`devices::AnyGpio`] wraps both for runtime selection.

pub mod devices;
pub mod error;
pub mod mock;
#[cfg(feature = "hardware-rppal")]
pub mod raspberry;
pub mod traits;

pub use devices::AnyGpio;
pub use error::{HardwareError, Result};
pub use traits::{GpioBackend, InterruptHandler};
