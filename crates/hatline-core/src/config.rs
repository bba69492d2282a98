//! Runtime configuration loaded from TOML.
//!
//! Every section is optional; missing keys fall back to the constants in
//! [`crate::constants`].
//!
//! ```
//! use hatline_core::config::HatConfig;
//!
//! let config = HatConfig::from_toml_str(r#"
//!     [debounce]
//!     threshold = 5
//! "#).unwrap();
//!
//! assert_eq!(config.debounce.threshold, 5);
//! assert_eq!(config.pins.power, 3);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    constants::{
        DEFAULT_DEBOUNCE_DELAY_MS, DEFAULT_DEBOUNCE_THRESHOLD, DEFAULT_LOCK_PATH,
        DEFAULT_POWER_COOLDOWN_SECS, DETECTION_LINES, DETECTION_PINS, LOW_BATTERY_PIN, POWER_PIN,
    },
    error::Error,
    types::PinId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HatConfig {
    /// Path of the cross-process lock file.
    pub lock_path: PathBuf,

    pub pins: PinLayout,

    pub debounce: DebounceConfig,

    pub power_button: PowerButtonConfig,
}

impl Default for HatConfig {
    fn default() -> Self {
        Self {
            lock_path: PathBuf::from(DEFAULT_LOCK_PATH),
            pins: PinLayout::default(),
            debounce: DebounceConfig::default(),
            power_button: PowerButtonConfig::default(),
        }
    }
}

impl HatConfig {
    /// Parse and validate a TOML document.
    ///
    /// # Errors
    /// Returns `Error::Config` on malformed TOML or a failed validation.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: HatConfig =
            toml::from_str(source).map_err(|e| Error::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Use a different lock path.
    pub fn with_lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = path.into();
        self
    }

    /// Check pin ranges, pin uniqueness and timing values.
    pub fn validate(&self) -> Result<()> {
        let mut seen = Vec::with_capacity(DETECTION_LINES + 2);
        for raw in self.pins.all() {
            let pin = PinId::new(raw).map_err(|e| Error::Config(e.to_string()))?;
            if seen.contains(&pin) {
                return Err(Error::Config(format!("{pin} is assigned more than once")));
            }
            seen.push(pin);
        }

        if self.debounce.threshold == 0 {
            return Err(Error::Config(
                "debounce.threshold must be at least 1".to_string(),
            ));
        }
        if self.debounce.delay_ms == 0 {
            return Err(Error::Config(
                "debounce.delay_ms must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// BCM pin assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PinLayout {
    /// Detection lines in sample bit order.
    pub detection: [u8; DETECTION_LINES],

    pub power: u8,

    pub battery_low: u8,
}

impl Default for PinLayout {
    fn default() -> Self {
        Self {
            detection: DETECTION_PINS.map(|p| p.as_u8()),
            power: POWER_PIN.as_u8(),
            battery_low: LOW_BATTERY_PIN.as_u8(),
        }
    }
}

impl PinLayout {
    fn all(&self) -> impl Iterator<Item = u8> + '_ {
        self.detection
            .iter()
            .copied()
            .chain([self.power, self.battery_low])
    }

    /// Detection pins as validated ids.
    pub fn detection_pins(&self) -> Result<[PinId; DETECTION_LINES]> {
        let mut pins = DETECTION_PINS;
        for (slot, raw) in pins.iter_mut().zip(self.detection) {
            *slot = PinId::new(raw)?;
        }
        Ok(pins)
    }

    pub fn power_pin(&self) -> Result<PinId> {
        PinId::new(self.power)
    }

    pub fn battery_low_pin(&self) -> Result<PinId> {
        PinId::new(self.battery_low)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebounceConfig {
    /// Delay between confirmation reads in milliseconds.
    pub delay_ms: u64,

    /// Consecutive identical reads needed to accept a new level.
    pub threshold: u8,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DEBOUNCE_DELAY_MS,
            threshold: DEFAULT_DEBOUNCE_THRESHOLD,
        }
    }
}

impl DebounceConfig {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerButtonConfig {
    /// Seconds after a dispatched press during which further presses are dropped.
    pub cooldown_secs: u64,
}

impl Default for PowerButtonConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_POWER_COOLDOWN_SECS,
        }
    }
}

impl PowerButtonConfig {
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}
