//! Hat identification from the detection lines.
//!
//! [`PinMatcher`] reads the five detection lines in configured order and
//! packs them into a [`PinSample`], line 1 in bit 0. Identification is an
//! exact lookup in a [`SignatureTable`].
//!
//! A failed line read counts as [`Level::Low`]. The first failure is logged
//! as a warning and later ones at debug, so a dead line cannot flood the log
//! from interrupt context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hatline_core::{
    HatVariant, Level, PinId, PinSample, Result, SignatureTable,
    constants::{DETECTION_LINES, DETECTION_PULLS},
    signature,
};
use hatline_hardware::GpioBackend;
use parking_lot::Mutex;
use tracing::{debug, warn};

pub struct PinMatcher<G: GpioBackend> {
    gpio: Arc<G>,
    pins: [PinId; DETECTION_LINES],
    table: SignatureTable,
    read_failure_logged: AtomicBool,
}

impl<G: GpioBackend> PinMatcher<G> {
    pub fn new(gpio: Arc<G>, pins: [PinId; DETECTION_LINES], table: SignatureTable) -> Self {
        Self {
            gpio,
            pins,
            table,
            read_failure_logged: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn pins(&self) -> &[PinId; DETECTION_LINES] {
        &self.pins
    }

    #[must_use]
    pub fn table(&self) -> &SignatureTable {
        &self.table
    }

    /// Apply the detection pull layout: lines 1-4 pulled down, line 5 up.
    ///
    /// # Errors
    /// Returns `Error::Gpio` if the backend rejects a pin.
    pub fn configure(&self) -> Result<()> {
        for (pin, pull) in self.pins.iter().zip(DETECTION_PULLS) {
            self.gpio.configure_pull(*pin, pull)?;
        }
        Ok(())
    }

    /// Read all detection lines once.
    pub fn sample_pins(&self) -> PinSample {
        let mut levels = [Level::Low; DETECTION_LINES];
        for (level, pin) in levels.iter_mut().zip(self.pins) {
            *level = self.read_line(pin);
        }
        let sample = PinSample::from_levels(levels);
        debug!("Detection sample {}", sample);
        sample
    }

    fn read_line(&self, pin: PinId) -> Level {
        match self.gpio.read_digital(pin) {
            Ok(level) => level,
            Err(e) => {
                if self.read_failure_logged.swap(true, Ordering::Relaxed) {
                    debug!("Detection read on {} failed: {}", pin, e);
                } else {
                    warn!("Detection read on {} failed, treating as low: {}", pin, e);
                }
                Level::Low
            }
        }
    }

    /// Whether a fresh sample is exactly `variant`'s signature.
    ///
    /// Variants missing from the table are never connected.
    pub fn is_connected(&self, variant: HatVariant) -> bool {
        self.table
            .signature_of(variant)
            .is_some_and(|sig| signature::matches(self.sample_pins(), sig))
    }

    /// Variant matching a fresh sample.
    pub fn identify(&self) -> Option<HatVariant> {
        self.table.identify(self.sample_pins())
    }
}

/// Identity transition seen by [`AttachmentTracker::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentChange {
    Unchanged,
    Attached(HatVariant),
    Detached(HatVariant),
    Swapped { from: HatVariant, to: HatVariant },
}

/// Last identity observed on the detection lines.
#[derive(Debug, Default)]
pub struct AttachmentTracker {
    last: Mutex<Option<HatVariant>>,
}

impl AttachmentTracker {
    #[must_use]
    pub fn new(initial: Option<HatVariant>) -> Self {
        Self {
            last: Mutex::new(initial),
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<HatVariant> {
        *self.last.lock()
    }

    /// Record `now` and report how it differs from the previous identity.
    pub fn update(&self, now: Option<HatVariant>) -> AttachmentChange {
        let previous = std::mem::replace(&mut *self.last.lock(), now);
        match (previous, now) {
            (None, Some(variant)) => AttachmentChange::Attached(variant),
            (Some(variant), None) => AttachmentChange::Detached(variant),
            (Some(from), Some(to)) if from != to => AttachmentChange::Swapped { from, to },
            _ => AttachmentChange::Unchanged,
        }
    }

    pub fn reset(&self) {
        *self.last.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hatline_core::{Pull, constants::DETECTION_PINS};
    use hatline_hardware::mock::{MockGpio, MockGpioHandle};
    use rstest::rstest;

    fn matcher() -> (PinMatcher<MockGpio>, MockGpioHandle) {
        let (gpio, handle) = MockGpio::new();
        let matcher = PinMatcher::new(Arc::new(gpio), DETECTION_PINS, SignatureTable::standard());
        matcher.configure().unwrap();
        (matcher, handle)
    }

    #[test]
    fn test_configure_applies_pulls() {
        let (_matcher, handle) = matcher();
        for (pin, pull) in DETECTION_PINS.iter().zip(DETECTION_PULLS) {
            assert_eq!(handle.pull_of(*pin), Some(pull));
        }
        assert_eq!(handle.pull_of(DETECTION_PINS[4]), Some(Pull::Up));
    }

    #[test]
    fn test_idle_header_identifies_nothing() {
        let (matcher, _handle) = matcher();
        assert_eq!(matcher.sample_pins().bits(), 0b10000);
        assert_eq!(matcher.identify(), None);
        assert!(!matcher.is_connected(HatVariant::Lite));
        assert!(!matcher.is_connected(HatVariant::Pro));
    }

    #[rstest]
    #[case(0b00000, Some(HatVariant::Lite))]
    #[case(0b00100, Some(HatVariant::Pro))]
    #[case(0b00101, None)]
    #[case(0b10100, None)]
    fn test_identify(#[case] bits: u8, #[case] expected: Option<HatVariant>) {
        let (matcher, handle) = matcher();
        handle.set_sample(&DETECTION_PINS, PinSample::from_bits(bits));

        assert_eq!(matcher.sample_pins(), PinSample::from_bits(bits));
        assert_eq!(matcher.identify(), expected);
    }

    #[test]
    fn test_sample_order_follows_pin_order() {
        let (matcher, handle) = matcher();
        handle.set_level(DETECTION_PINS[0], Level::High);
        handle.set_level(DETECTION_PINS[4], Level::Low);
        assert_eq!(matcher.sample_pins().bits(), 0b00001);
    }

    #[test]
    fn test_failed_read_counts_as_low() {
        let (matcher, handle) = matcher();
        handle.fail_reads(DETECTION_PINS[4], true);

        // Line 5 idles high; a failing read flips the idle header to Lite.
        assert_eq!(matcher.sample_pins().bits(), 0b00000);
        assert_eq!(matcher.sample_pins().bits(), 0b00000);
    }

    #[test]
    fn test_variant_missing_from_table_never_connects() {
        let (gpio, handle) = MockGpio::new();
        let table = SignatureTable::new(vec![hatline_core::HardwareSignature::new(
            HatVariant::Pro,
            PinSample::from_bits(0b00100),
        )])
        .unwrap();
        let matcher = PinMatcher::new(Arc::new(gpio), DETECTION_PINS, table);
        handle.set_sample(&DETECTION_PINS, PinSample::from_bits(0));

        assert!(!matcher.is_connected(HatVariant::Lite));
    }

    #[rstest]
    #[case(None, None, AttachmentChange::Unchanged)]
    #[case(None, Some(HatVariant::Pro), AttachmentChange::Attached(HatVariant::Pro))]
    #[case(Some(HatVariant::Lite), None, AttachmentChange::Detached(HatVariant::Lite))]
    #[case(Some(HatVariant::Pro), Some(HatVariant::Pro), AttachmentChange::Unchanged)]
    #[case(
        Some(HatVariant::Lite),
        Some(HatVariant::Pro),
        AttachmentChange::Swapped { from: HatVariant::Lite, to: HatVariant::Pro }
    )]
    fn test_tracker_transitions(
        #[case] before: Option<HatVariant>,
        #[case] after: Option<HatVariant>,
        #[case] expected: AttachmentChange,
    ) {
        let tracker = AttachmentTracker::new(before);
        assert_eq!(tracker.update(after), expected);
        assert_eq!(tracker.current(), after);
    }
}
