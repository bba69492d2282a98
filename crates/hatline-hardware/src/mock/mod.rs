//! Mock GPIO for testing and development.
//!
//! Tests and the `--simulate` mode of the CLI drive pins programmatically
//! through [`MockGpioHandle`] without physical hardware.

pub mod gpio;

pub use gpio::{MockGpio, MockGpioHandle};
