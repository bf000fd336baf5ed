//! Compiled predicate values and the rules for combining them.
//!
//! Two families exist.  `MaskPattern` is used for the per-file record: bits in
//! `mask` are known for every value satisfying the predicate and `pattern` holds
//! their required values.  `GuaranteedMask` is used for the annotation record:
//! the bits that must be set in any matching record.

use std::fmt::Debug;

/// Combination rules shared by both predicate families.
///
/// Every implementation must be conservative: combining never yields a value
/// that rejects a record satisfying the combined predicate.
pub trait MaskAlgebra: Copy + Debug + PartialEq + Eq {
    /// The value that constrains nothing.
    fn unconstrained() -> Self;

    /// Whether `self` constrains nothing.
    fn is_unconstrained(&self) -> bool;

    /// Value for "`self` AND `other`".
    fn all_of(self, other: Self) -> Self;

    /// Value for "`self` OR `other`".
    fn any_of(self, other: Self) -> Self;
}

/// Deterministically known bits (`mask`) and their required values (`pattern`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct MaskPattern {
    pub mask: u64,
    pub pattern: u64,
}

impl MaskPattern {
    /// Construct, dropping pattern bits outside of `mask`.
    pub fn new(mask: u64, pattern: u64) -> Self {
        Self {
            mask,
            pattern: pattern & mask,
        }
    }

    /// Bits of `mask` that are required to be set.
    pub fn set(mask: u64) -> Self {
        Self::new(mask, mask)
    }

    /// Bits of `mask` that are required to be clear.
    pub fn clear(mask: u64) -> Self {
        Self::new(mask, 0)
    }

    /// Whether the stored word agrees with all known bits.
    #[inline]
    pub fn matches(&self, stored: u64) -> bool {
        stored & self.mask == self.pattern
    }
}

impl MaskAlgebra for MaskPattern {
    fn unconstrained() -> Self {
        Self::default()
    }

    fn is_unconstrained(&self) -> bool {
        self.mask == 0
    }

    /// Union of known bits; bits with contradicting requirements are dropped.
    fn all_of(self, other: Self) -> Self {
        let conflict = self.mask & other.mask & (self.pattern ^ other.pattern);
        let mask = (self.mask | other.mask) & !conflict;
        Self::new(mask, self.pattern | other.pattern)
    }

    /// Bits known in both alternatives with the same value.
    fn any_of(self, other: Self) -> Self {
        let mask = self.mask & other.mask & !(self.pattern ^ other.pattern);
        Self::new(mask, self.pattern)
    }
}

/// Bits that must be set in any record satisfying the predicate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct GuaranteedMask(pub u64);

impl GuaranteedMask {
    /// Whether all guaranteed bits are set in the stored word.
    #[inline]
    pub fn matches(&self, stored: u64) -> bool {
        stored & self.0 == self.0
    }

    /// Whether all bits of `bits` are guaranteed.
    pub fn contains(&self, bits: u64) -> bool {
        self.0 & bits == bits
    }
}

impl MaskAlgebra for GuaranteedMask {
    fn unconstrained() -> Self {
        Self(0)
    }

    fn is_unconstrained(&self) -> bool {
        self.0 == 0
    }

    fn all_of(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    fn any_of(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::{GuaranteedMask, MaskAlgebra, MaskPattern};

    #[rstest]
    // same bit, same value
    #[case(MaskPattern::set(0b01), MaskPattern::set(0b01), MaskPattern::set(0b01))]
    // same bit, different value
    #[case(MaskPattern::set(0b01), MaskPattern::clear(0b01), MaskPattern::unconstrained())]
    // bit only known on one side
    #[case(MaskPattern::set(0b11), MaskPattern::set(0b01), MaskPattern::set(0b01))]
    #[case(
        MaskPattern::new(0b11, 0b10),
        MaskPattern::new(0b11, 0b11),
        MaskPattern::new(0b10, 0b10)
    )]
    #[case(MaskPattern::clear(0b01), MaskPattern::unconstrained(), MaskPattern::unconstrained())]
    fn mask_pattern_any_of(
        #[case] lhs: MaskPattern,
        #[case] rhs: MaskPattern,
        #[case] expected: MaskPattern,
    ) {
        assert_eq!(lhs.any_of(rhs), expected);
        assert_eq!(rhs.any_of(lhs), expected);
    }

    #[rstest]
    #[case(MaskPattern::set(0b01), MaskPattern::clear(0b10), MaskPattern::new(0b11, 0b01))]
    #[case(MaskPattern::set(0b01), MaskPattern::set(0b01), MaskPattern::set(0b01))]
    // contradiction on the shared bit drops it
    #[case(MaskPattern::set(0b01), MaskPattern::clear(0b01), MaskPattern::unconstrained())]
    #[case(
        MaskPattern::new(0b11, 0b01),
        MaskPattern::clear(0b01),
        MaskPattern::clear(0b10)
    )]
    #[case(MaskPattern::set(0b100), MaskPattern::unconstrained(), MaskPattern::set(0b100))]
    fn mask_pattern_all_of(
        #[case] lhs: MaskPattern,
        #[case] rhs: MaskPattern,
        #[case] expected: MaskPattern,
    ) {
        assert_eq!(lhs.all_of(rhs), expected);
        assert_eq!(rhs.all_of(lhs), expected);
    }

    #[test]
    fn guaranteed_mask_rules() {
        let a = GuaranteedMask(0b0001_1000);
        let b = GuaranteedMask(0b0001_0000);

        assert_eq!(a.any_of(b), GuaranteedMask(0b0001_0000));
        assert_eq!(a.all_of(GuaranteedMask(0b1)), GuaranteedMask(0b0001_1001));
        assert!(GuaranteedMask::unconstrained().is_unconstrained());
        assert!(a.contains(0b1000));
        assert!(!b.contains(0b1000));
    }

    #[test]
    fn empty_constraints_always_match() {
        for stored in 0..=255u64 {
            assert!(MaskPattern::unconstrained().matches(stored));
            assert!(GuaranteedMask::unconstrained().matches(stored));
        }
    }

    #[test]
    fn new_drops_pattern_outside_mask() {
        assert_eq!(MaskPattern::new(0b01, 0b11), MaskPattern::set(0b01));
    }
}
