//! Error types for GPIO operations.

use hatline_core::PinId;

/// Result type alias for GPIO operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors raised by a [`GpioBackend`](crate::traits::GpioBackend).
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The GPIO peripheral could not be opened.
    #[error("GPIO unavailable: {message}")]
    Unavailable { message: String },

    /// A pin could not be claimed or configured.
    #[error("Failed to configure {pin}: {message}")]
    Configuration { pin: PinId, message: String },

    /// A digital read failed.
    #[error("Failed to read {pin}: {message}")]
    Read { pin: PinId, message: String },

    /// An interrupt hook could not be installed or removed.
    #[error("Interrupt error on {pin}: {message}")]
    Interrupt { pin: PinId, message: String },
}

impl HardwareError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn configuration(pin: PinId, message: impl Into<String>) -> Self {
        Self::Configuration {
            pin,
            message: message.into(),
        }
    }

    pub fn read(pin: PinId, message: impl Into<String>) -> Self {
        Self::Read {
            pin,
            message: message.into(),
        }
    }

    pub fn interrupt(pin: PinId, message: impl Into<String>) -> Self {
        Self::Interrupt {
            pin,
            message: message.into(),
        }
    }
}

impl From<HardwareError> for hatline_core::Error {
    fn from(error: HardwareError) -> Self {
        hatline_core::Error::Gpio(error.to_string())
    }
}
