use crate::{
    Result,
    constants::{DETECTION_LINES, MAX_BCM_PIN},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Digital level of a single GPIO line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Build a level from a raw 0/1 read. Any non-zero value is `High`.
    #[must_use]
    pub fn from_bit(bit: u8) -> Self {
        if bit == 0 { Level::Low } else { Level::High }
    }

    #[must_use]
    pub fn as_bit(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }

    #[must_use]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(value: bool) -> Self {
        if value { Level::High } else { Level::Low }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

/// Internal pull resistor applied to an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    Off,
    Down,
    Up,
}

/// Signal edge an interrupt hook fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    /// Whether a transition from `from` to `to` triggers this edge mode.
    #[must_use]
    pub fn matches(self, from: Level, to: Level) -> bool {
        match (self, from, to) {
            (_, a, b) if a == b => false,
            (Edge::Both, _, _) => true,
            (Edge::Rising, Level::Low, Level::High) => true,
            (Edge::Falling, Level::High, Level::Low) => true,
            _ => false,
        }
    }
}

/// BCM GPIO number on the 40-pin header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PinId(u8);

impl PinId {
    /// Create a pin id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidPin` if the number is outside the header range (0-27).
    pub fn new(bcm: u8) -> Result<Self> {
        if bcm > MAX_BCM_PIN {
            return Err(Error::InvalidPin(format!(
                "BCM pin must be 0-{MAX_BCM_PIN}, got {bcm}"
            )));
        }
        Ok(PinId(bcm))
    }

    /// Pin id for compile-time constants. Out-of-range values fail to compile
    /// when used in a `const` context.
    #[must_use]
    pub const fn from_const(bcm: u8) -> Self {
        assert!(bcm <= MAX_BCM_PIN, "BCM pin out of range");
        PinId(bcm)
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for PinId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        PinId::new(value)
    }
}

impl From<PinId> for u8 {
    fn from(pin: PinId) -> Self {
        pin.0
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BCM{}", self.0)
    }
}

/// Snapshot of the detection lines, one bit per line.
///
/// Bit `i` holds the level of detection line `i + 1` in the configured
/// order, so line 1 is the least significant bit. Bits above
/// [`DETECTION_LINES`] are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinSample(u8);

impl PinSample {
    const MASK: u8 = (1 << DETECTION_LINES) - 1;

    /// Build a sample from a raw bit pattern, discarding unused high bits.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        PinSample(bits & Self::MASK)
    }

    /// Build a sample from per-line levels in detection order.
    #[must_use]
    pub fn from_levels(levels: [Level; DETECTION_LINES]) -> Self {
        let bits = levels
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, level)| acc | (level.as_bit() << i));
        PinSample(bits)
    }

    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Level of detection line `index` (0-based).
    #[must_use]
    pub fn line(&self, index: usize) -> Option<Level> {
        (index < DETECTION_LINES).then(|| Level::from_bit((self.0 >> index) & 1))
    }
}

impl fmt::Display for PinSample {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0b{:05b}", self.0)
    }
}

/// Hat hardware variants that can be identified from the detection lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HatVariant {
    Lite,
    Pro,
}

impl HatVariant {
    pub const ALL: [HatVariant; 2] = [HatVariant::Lite, HatVariant::Pro];

    /// Whether this variant carries a battery and its low-battery line.
    #[must_use]
    pub fn has_battery(self) -> bool {
        matches!(self, HatVariant::Pro)
    }
}

impl fmt::Display for HatVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HatVariant::Lite => write!(f, "Lite"),
            HatVariant::Pro => write!(f, "Pro"),
        }
    }
}

impl std::str::FromStr for HatVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lite" => Ok(HatVariant::Lite),
            "pro" => Ok(HatVariant::Pro),
            other => Err(Error::Config(format!("Unknown hat variant: {other}"))),
        }
    }
}

/// Pin pattern that identifies one hat variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HardwareSignature {
    pub variant: HatVariant,
    pub sample: PinSample,
}

impl HardwareSignature {
    #[must_use]
    pub const fn new(variant: HatVariant, sample: PinSample) -> Self {
        Self { variant, sample }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Level::Low)]
    #[case(1, Level::High)]
    #[case(7, Level::High)]
    fn test_level_from_bit(#[case] bit: u8, #[case] expected: Level) {
        assert_eq!(Level::from_bit(bit), expected);
    }

    #[rstest]
    #[case(Edge::Rising, Level::Low, Level::High, true)]
    #[case(Edge::Rising, Level::High, Level::Low, false)]
    #[case(Edge::Falling, Level::High, Level::Low, true)]
    #[case(Edge::Falling, Level::Low, Level::High, false)]
    #[case(Edge::Both, Level::Low, Level::High, true)]
    #[case(Edge::Both, Level::High, Level::Low, true)]
    #[case(Edge::Both, Level::High, Level::High, false)]
    fn test_edge_matches(
        #[case] edge: Edge,
        #[case] from: Level,
        #[case] to: Level,
        #[case] expected: bool,
    ) {
        assert_eq!(edge.matches(from, to), expected);
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(27)]
    fn test_pin_id_valid(#[case] bcm: u8) {
        assert_eq!(PinId::new(bcm).unwrap().as_u8(), bcm);
    }

    #[rstest]
    #[case(28)]
    #[case(255)]
    fn test_pin_id_invalid(#[case] bcm: u8) {
        assert!(matches!(PinId::new(bcm), Err(Error::InvalidPin(_))));
    }

    #[test]
    fn test_sample_bit_order() {
        let sample = PinSample::from_levels([
            Level::Low,
            Level::Low,
            Level::High,
            Level::Low,
            Level::Low,
        ]);
        assert_eq!(sample.bits(), 0b00100);
        assert_eq!(sample.line(2), Some(Level::High));
        assert_eq!(sample.line(4), Some(Level::Low));
        assert_eq!(sample.line(5), None);
    }

    #[test]
    fn test_sample_masks_unused_bits() {
        assert_eq!(PinSample::from_bits(0b1110_0001).bits(), 0b00001);
    }

    #[test]
    fn test_sample_display() {
        assert_eq!(PinSample::from_bits(0b10000).to_string(), "0b10000");
    }

    #[rstest]
    #[case("lite", HatVariant::Lite)]
    #[case("Pro", HatVariant::Pro)]
    #[case(" PRO ", HatVariant::Pro)]
    fn test_variant_from_str(#[case] input: &str, #[case] expected: HatVariant) {
        assert_eq!(input.parse::<HatVariant>().unwrap(), expected);
    }

    #[test]
    fn test_variant_from_str_unknown() {
        assert!("kit".parse::<HatVariant>().is_err());
    }
}
