//! Enum wrapper for GPIO backend dispatch.
//!
//! Applications that pick a backend at runtime (real hardware or simulation)
//! hold an [`AnyGpio`] instead of a generic parameter. Hardware variants are
//! gated behind cargo features.
//!
//! ```
//! use hatline_hardware::devices::AnyGpio;
//! use hatline_hardware::mock::MockGpio;
//! use hatline_hardware::traits::GpioBackend;
//!
//! let (gpio, _handle) = MockGpio::new();
//! let any = AnyGpio::Mock(gpio);
//! assert_eq!(any.name(), "Mock GPIO");
//! ```

use hatline_core::{Edge, Level, PinId, Pull};

use crate::Result;
use crate::mock::MockGpio;
#[cfg(feature = "hardware-rppal")]
use crate::raspberry::RppalGpio;
use crate::traits::{GpioBackend, InterruptHandler};

#[non_exhaustive]
pub enum AnyGpio {
    /// Simulated bank for development and testing.
    Mock(MockGpio),

    /// Raspberry Pi header through `rppal`.
    #[cfg(feature = "hardware-rppal")]
    Rppal(RppalGpio),
}

impl GpioBackend for AnyGpio {
    fn configure_pull(&self, pin: PinId, pull: Pull) -> Result<()> {
        match self {
            Self::Mock(gpio) => gpio.configure_pull(pin, pull),
            #[cfg(feature = "hardware-rppal")]
            Self::Rppal(gpio) => gpio.configure_pull(pin, pull),
        }
    }

    fn read_digital(&self, pin: PinId) -> Result<Level> {
        match self {
            Self::Mock(gpio) => gpio.read_digital(pin),
            #[cfg(feature = "hardware-rppal")]
            Self::Rppal(gpio) => gpio.read_digital(pin),
        }
    }

    fn install_interrupt(&self, pin: PinId, edge: Edge, handler: InterruptHandler) -> Result<()> {
        match self {
            Self::Mock(gpio) => gpio.install_interrupt(pin, edge, handler),
            #[cfg(feature = "hardware-rppal")]
            Self::Rppal(gpio) => gpio.install_interrupt(pin, edge, handler),
        }
    }

    fn clear_interrupt(&self, pin: PinId) -> Result<()> {
        match self {
            Self::Mock(gpio) => gpio.clear_interrupt(pin),
            #[cfg(feature = "hardware-rppal")]
            Self::Rppal(gpio) => gpio.clear_interrupt(pin),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Mock(gpio) => gpio.name(),
            #[cfg(feature = "hardware-rppal")]
            Self::Rppal(gpio) => gpio.name(),
        }
    }
}
