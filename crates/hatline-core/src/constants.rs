//! Hardware constants for the supported hats.
//!
//! Pin numbers use BCM numbering with the physical header position noted
//! alongside. The values here are the defaults of [`HatConfig`]; a deployment
//! may remap pins through the configuration file, but the signatures are
//! fixed by the hat wiring.
//!
//! # Detection lines
//!
//! | Line | BCM | Physical | Pull |
//! |------|-----|----------|------|
//! | 1    | 22  | 15       | down |
//! | 2    | 23  | 16       | down |
//! | 3    | 24  | 18       | down |
//! | 4    | 27  | 13       | down |
//! | 5    | 26  | 37       | up   |
//!
//! Line 5 idles high, so an empty header reads [`IDLE_SAMPLE`] (`0b10000`),
//! not `0b00000`.
//!
//! [`HatConfig`]: crate::config::HatConfig

use crate::types::{PinId, PinSample, Pull};

// ============================================================================
// Header
// ============================================================================

/// Highest BCM number exposed on the 40-pin header.
pub const MAX_BCM_PIN: u8 = 27;

/// Number of lines sampled for hat identification.
pub const DETECTION_LINES: usize = 5;

// ============================================================================
// Default pin layout
// ============================================================================

/// Detection lines in sample bit order (line 1 first).
pub const DETECTION_PINS: [PinId; DETECTION_LINES] = [
    PinId::from_const(22), // Physical 15
    PinId::from_const(23), // Physical 16
    PinId::from_const(24), // Physical 18
    PinId::from_const(27), // Physical 13
    PinId::from_const(26), // Physical 37, the only line grounded on the Lite
];

/// Pull applied to each detection line, in detection order.
pub const DETECTION_PULLS: [Pull; DETECTION_LINES] =
    [Pull::Down, Pull::Down, Pull::Down, Pull::Down, Pull::Up];

/// Power button, rising edge on press.
pub const POWER_PIN: PinId = PinId::from_const(3); // Physical 5

pub const POWER_PIN_PULL: Pull = Pull::Down;

/// Low-battery indicator on the Pro hat.
pub const LOW_BATTERY_PIN: PinId = PinId::from_const(16); // Physical 36

/// Raw bit the low-battery line reads when the battery is low.
pub const LOW_BATTERY_TRIGGER_VALUE: u8 = 1;

// ============================================================================
// Signatures
// ============================================================================

/// Empty header: every line at its pull default.
pub const IDLE_SAMPLE: PinSample = PinSample::from_bits(0b10000);

/// Lite hat grounds line 5 and leaves the others floating low.
pub const LITE_SIGNATURE: PinSample = PinSample::from_bits(0b00000);

/// Pro hat raises line 3 and actively lowers all others.
pub const PRO_SIGNATURE: PinSample = PinSample::from_bits(0b00100);

// ============================================================================
// Timing
// ============================================================================

/// Delay between debounce confirmation reads in milliseconds.
pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 30;

/// Consecutive identical reads required to accept a new level.
pub const DEFAULT_DEBOUNCE_THRESHOLD: u8 = 3;

/// Window after a dispatched power press during which presses are ignored.
pub const DEFAULT_POWER_COOLDOWN_SECS: u64 = 5;

// ============================================================================
// Lock
// ============================================================================

/// Well-known path guarding the GPIO subsystem across processes.
pub const DEFAULT_LOCK_PATH: &str = "/var/run/lock/hatline.lock";
