//! Exact-match hat identification.
//!
//! A hat is connected for a variant only when the live sample equals that
//! variant's signature bit for bit. A board whose wiring drifts by a single
//! line reads as not connected.

use crate::{
    Result,
    constants::{IDLE_SAMPLE, LITE_SIGNATURE, PRO_SIGNATURE},
    error::Error,
    types::{HardwareSignature, HatVariant, PinSample},
};

/// Whether `sample` is exactly `signature`.
#[must_use]
pub fn matches(sample: PinSample, signature: &HardwareSignature) -> bool {
    sample == signature.sample
}

/// Validated set of signatures, one per variant, pairwise distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureTable {
    signatures: Vec<HardwareSignature>,
}

impl SignatureTable {
    /// Build a table from arbitrary signatures.
    ///
    /// # Errors
    /// - `Error::AmbiguousSignature` if two entries share a bit pattern or a
    ///   variant appears twice.
    /// - `Error::SignatureMatchesIdle` if an entry equals the empty header.
    pub fn new(signatures: Vec<HardwareSignature>) -> Result<Self> {
        for (i, first) in signatures.iter().enumerate() {
            if first.sample == IDLE_SAMPLE {
                return Err(Error::SignatureMatchesIdle {
                    variant: first.variant,
                    sample: first.sample,
                });
            }

            for second in &signatures[i + 1..] {
                if first.sample == second.sample || first.variant == second.variant {
                    return Err(Error::AmbiguousSignature {
                        first: first.variant,
                        second: second.variant,
                        sample: second.sample,
                    });
                }
            }
        }

        Ok(Self { signatures })
    }

    /// Signatures of the Lite and Pro hats.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            signatures: vec![
                HardwareSignature::new(HatVariant::Lite, LITE_SIGNATURE),
                HardwareSignature::new(HatVariant::Pro, PRO_SIGNATURE),
            ],
        }
    }

    #[must_use]
    pub fn signature_of(&self, variant: HatVariant) -> Option<&HardwareSignature> {
        self.signatures.iter().find(|s| s.variant == variant)
    }

    /// Variant whose signature equals `sample`, if any.
    #[must_use]
    pub fn identify(&self, sample: PinSample) -> Option<HatVariant> {
        self.signatures
            .iter()
            .find(|s| matches(sample, s))
            .map(|s| s.variant)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HardwareSignature> {
        self.signatures.iter()
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_standard_table_validates() {
        let standard = SignatureTable::standard();
        let rebuilt = SignatureTable::new(standard.iter().copied().collect()).unwrap();
        assert_eq!(rebuilt, standard);
    }

    #[rstest]
    #[case(0b00000, Some(HatVariant::Lite))]
    #[case(0b00100, Some(HatVariant::Pro))]
    #[case(0b10000, None)]
    #[case(0b10100, None)]
    #[case(0b00110, None)]
    fn test_identify(#[case] bits: u8, #[case] expected: Option<HatVariant>) {
        let table = SignatureTable::standard();
        assert_eq!(table.identify(PinSample::from_bits(bits)), expected);
    }

    #[test]
    fn test_duplicate_pattern_rejected() {
        let result = SignatureTable::new(vec![
            HardwareSignature::new(HatVariant::Lite, PinSample::from_bits(0b00011)),
            HardwareSignature::new(HatVariant::Pro, PinSample::from_bits(0b00011)),
        ]);
        assert!(matches!(result, Err(Error::AmbiguousSignature { .. })));
    }

    #[test]
    fn test_duplicate_variant_rejected() {
        let result = SignatureTable::new(vec![
            HardwareSignature::new(HatVariant::Pro, PinSample::from_bits(0b00011)),
            HardwareSignature::new(HatVariant::Pro, PinSample::from_bits(0b00100)),
        ]);
        assert!(matches!(result, Err(Error::AmbiguousSignature { .. })));
    }

    #[test]
    fn test_idle_pattern_rejected() {
        let result = SignatureTable::new(vec![HardwareSignature::new(
            HatVariant::Lite,
            IDLE_SAMPLE,
        )]);
        assert!(matches!(result, Err(Error::SignatureMatchesIdle { .. })));
    }

    proptest! {
        #[test]
        fn prop_no_sample_matches_two_signatures(bits in 0u8..32) {
            let table = SignatureTable::standard();
            let sample = PinSample::from_bits(bits);
            let hits = table.iter().filter(|s| matches(sample, s)).count();
            prop_assert!(hits <= 1);
        }
    }
}
